//! Record writer: replace the address and service records as a pair
//!
//! A change is a delete of both record types, a bounded wait until the
//! provider no longer reports either of them, then two creates. Creating
//! before the delete is visible risks a duplicate or conflicting record.
//!
//! ## Failure mapping
//!
//! | Situation | Error class |
//! |---|---|
//! | delete reports the record does not exist | record-missing |
//! | any other delete failure | provider-rejected |
//! | records still visible at the deadline | provider-rejected |
//! | either create fails | provider-rejected |
//!
//! A half-written pair (one create succeeded) is not rolled back.

use crate::config::{EngineConfig, RecordConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, RecordData, RecordSpec, RecordType, Zone};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const MANAGED_TYPES: [RecordType; 2] = [RecordType::A, RecordType::Srv];

/// Doubling pause between confirmation checks
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            max,
        }
    }

    /// Current pause; advances to the next one
    pub(crate) fn next_pause(&mut self) -> Duration {
        let pause = self.current;
        self.current = (self.current * 2).min(self.max);
        pause
    }
}

/// Performs the delete-then-create sequence for one domain
#[derive(Debug, Clone)]
pub struct RecordWriter {
    records: RecordConfig,
    confirm_deadline: Duration,
    backoff_initial: Duration,
    backoff_max: Duration,
}

impl RecordWriter {
    /// Create a writer from the record shape and engine timing settings
    pub fn new(records: RecordConfig, engine: &EngineConfig) -> Self {
        Self {
            records,
            confirm_deadline: engine.delete_confirm_deadline(),
            backoff_initial: Duration::from_millis(engine.confirm_backoff_initial_ms),
            backoff_max: Duration::from_millis(engine.confirm_backoff_max_ms),
        }
    }

    /// Address record for `domain` pointing at `ip`
    pub fn address_record(&self, domain: &str, ip: Ipv4Addr) -> RecordSpec {
        RecordSpec {
            name: domain.to_string(),
            ttl: self.records.ttl,
            data: RecordData::A(ip),
        }
    }

    /// Service record for `domain`, targeting the domain itself
    pub fn service_record(&self, domain: &str) -> RecordSpec {
        RecordSpec {
            name: domain.to_string(),
            ttl: self.records.ttl,
            data: RecordData::Srv {
                priority: self.records.srv_priority,
                weight: self.records.srv_weight,
                port: self.records.srv_port,
                target: domain.to_string(),
            },
        }
    }

    /// Publish `new_ip` for `domain`
    ///
    /// With `delete_old` the existing records are deleted and confirmed gone
    /// first; without it the creates are issued directly.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: both records were created
    /// - `Err(Error)`: see the module-level failure table
    pub async fn change_ip(
        &self,
        provider: &dyn DnsProvider,
        zone: &Zone,
        domain: &str,
        new_ip: Ipv4Addr,
        delete_old: bool,
    ) -> Result<()> {
        if delete_old {
            self.delete_existing(provider, zone, domain).await?;
        } else {
            debug!("Skipping delete for {}: no existing records", domain);
        }

        let address = self.address_record(domain, new_ip);
        let service = self.service_record(domain);

        // Both creates are attempted even if the first one fails.
        let address_result = provider.create_record(zone, &address).await;
        let service_result = provider.create_record(zone, &service).await;

        match (address_result, service_result) {
            (Ok(()), Ok(())) => {
                info!("Created A and SRV records for {} -> {}", domain, new_ip);
                Ok(())
            }
            (Err(e), Ok(())) => {
                warn!("SRV record created but A record failed for {}: {}", domain, e);
                Err(self.rejection(provider, format!("creating A record for {}: {}", domain, e)))
            }
            (Ok(()), Err(e)) => {
                warn!("A record created but SRV record failed for {}: {}", domain, e);
                Err(self.rejection(provider, format!("creating SRV record for {}: {}", domain, e)))
            }
            (Err(a), Err(srv)) => Err(self.rejection(
                provider,
                format!("creating records for {}: A: {}; SRV: {}", domain, a, srv),
            )),
        }
    }

    /// Delete both record types and wait until neither is visible
    async fn delete_existing(
        &self,
        provider: &dyn DnsProvider,
        zone: &Zone,
        domain: &str,
    ) -> Result<()> {
        let mut missing = Vec::new();
        let mut failures = Vec::new();
        let mut deleted = 0;

        for record_type in MANAGED_TYPES {
            match provider.delete_record(zone, domain, record_type).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_record_missing() => missing.push(record_type),
                Err(e) => failures.push(format!("{}: {}", record_type, e)),
            }
        }

        if !failures.is_empty() {
            return Err(self.rejection(
                provider,
                format!("deleting records for {}: {}", domain, failures.join("; ")),
            ));
        }

        if deleted > 0 {
            self.await_absence(provider, zone, domain).await?;
        }

        if !missing.is_empty() {
            let types: Vec<&str> = missing.iter().map(RecordType::as_str).collect();
            return Err(Error::record_missing(format!(
                "nothing to delete for {} ({})",
                domain,
                types.join(", ")
            )));
        }

        Ok(())
    }

    /// Poll until the provider reports both record types gone
    async fn await_absence(
        &self,
        provider: &dyn DnsProvider,
        zone: &Zone,
        domain: &str,
    ) -> Result<()> {
        let deadline = Instant::now() + self.confirm_deadline;
        let mut backoff = Backoff::new(self.backoff_initial, self.backoff_max);

        loop {
            let check = tokio::time::timeout_at(deadline, self.all_absent(provider, zone, domain));
            match check.await {
                Ok(true) => {
                    debug!("Delete of {} records confirmed", domain);
                    return Ok(());
                }
                Ok(false) => {}
                Err(_) => break,
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let pause = backoff.next_pause().min(deadline - now);
            tokio::time::sleep(pause).await;
        }

        Err(self.rejection(
            provider,
            format!(
                "records for {} still visible {:?} after delete",
                domain, self.confirm_deadline
            ),
        ))
    }

    async fn all_absent(&self, provider: &dyn DnsProvider, zone: &Zone, domain: &str) -> bool {
        for record_type in MANAGED_TYPES {
            match provider.get_record(zone, domain, record_type).await {
                Err(e) if e.is_record_missing() => {}
                Ok(_) => return false,
                Err(e) => {
                    debug!("Confirmation lookup for {} {} failed: {}", domain, record_type, e);
                    return false;
                }
            }
        }
        true
    }

    fn rejection(&self, provider: &dyn DnsProvider, message: String) -> Error {
        Error::rejected(provider.provider_name(), message)
    }
}
