// # DNS Provider Trait
//
// Defines the record-level interface the updater needs from a managed DNS
// provider: look up the zone once, then get, create, and delete records of
// a given type inside it.
//
// ## Implementations
//
// - NS1: `dnsupdate-provider-ns1` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsupdate_core::traits::{DnsProvider, RecordType};
//
// let zone = provider.get_zone("example.com").await?;
// let record = provider
//     .get_record(&zone, "home.example.com", RecordType::A)
//     .await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Handle for the managed zone
///
/// Obtained once from [`DnsProvider::get_zone`] and held immutably for the
/// lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone name as known to the provider
    pub name: String,
    /// Provider-specific identifier, if the provider exposes one
    pub id: Option<String>,
}

impl Zone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Record types managed by the updater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// Service locator record
    Srv,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Srv => "SRV",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordData {
    /// Address record data
    A(Ipv4Addr),
    /// Service record data
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
}

impl RecordData {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordData::A(_) => RecordType::A,
            RecordData::Srv { .. } => RecordType::Srv,
        }
    }
}

/// A record to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    /// Fully-qualified record name
    pub name: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Payload; also determines the record type
    pub data: RecordData,
}

impl RecordSpec {
    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }
}

/// A record as currently published by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Time-to-live, if reported
    pub ttl: Option<u32>,
    /// Raw answer data, one entry per answer, fields joined by spaces
    pub answers: Vec<String>,
}

impl Record {
    /// First answer of the record, if any
    pub fn first_answer(&self) -> Option<&str> {
        self.answers.first().map(String::as_str)
    }
}

/// Trait for DNS provider implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// ## Contract
///
/// - Every method issues a single request and reports its outcome; retry and
///   backoff are owned by the engine.
/// - A record or zone that does not exist must be reported as
///   [`Error::RecordMissing`](crate::Error::RecordMissing), never folded into
///   a generic failure, so the engine can tell "nothing published yet" from a
///   failed request.
/// - Transport failures are reported as transient network errors; explicit
///   refusals (authentication, validation, conflicts) as rejections.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the zone handle for `domain`
    async fn get_zone(&self, domain: &str) -> Result<Zone, crate::Error>;

    /// Get the record `name` of type `record_type` in `zone`
    async fn get_record(
        &self,
        zone: &Zone,
        name: &str,
        record_type: RecordType,
    ) -> Result<Record, crate::Error>;

    /// Create a new record in `zone`
    async fn create_record(&self, zone: &Zone, record: &RecordSpec) -> Result<(), crate::Error>;

    /// Delete the record `name` of type `record_type` from `zone`
    async fn delete_record(
        &self,
        zone: &Zone,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), crate::Error>;

    /// Plain reachability check against the provider's host
    ///
    /// Any failure must be reported as
    /// [`Error::ConnectivityLost`](crate::Error::ConnectivityLost).
    async fn check_connectivity(&self) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
