//! Reconciler: decide whether the published address is stale
//!
//! The zone lookup and the public IP lookup are independent requests and run
//! concurrently on the current task. The zone result is consulted first: a
//! missing record is a normal outcome (nothing published yet), any other zone
//! failure aborts the cycle without waiting for the oracle.

use super::lookup;
use crate::error::Result;
use crate::traits::{DnsProvider, IpOracle, Zone};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

/// What one reconciliation observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Address in the zone's A record; `None` when no record exists or
    /// the record has no answers
    pub published: Option<Ipv4Addr>,
    /// Whether an A record exists at all, with or without an address
    pub record_present: bool,
    /// Address reported by the oracle
    pub current: Ipv4Addr,
}

impl Observation {
    /// The only trigger for a write
    pub fn needs_update(&self) -> bool {
        self.published != Some(self.current)
    }
}

/// Fetch the published and current addresses for `domain`
///
/// The oracle wait is bounded by `oracle_timeout`; expiry fails the cycle
/// as transient. Dropping the returned future cancels both lookups.
pub async fn reconcile(
    provider: &dyn DnsProvider,
    oracle: &dyn IpOracle,
    zone: &Zone,
    domain: &str,
    oracle_timeout: Duration,
) -> Result<Observation> {
    let public = lookup::fetch_public_ip(oracle, oracle_timeout);
    let published = lookup::fetch_published_ip(provider, zone, domain);
    tokio::pin!(public);
    tokio::pin!(published);

    // Drive both until the zone lookup resolves, stashing an early oracle result.
    let mut early_public = None;
    let published = loop {
        tokio::select! {
            result = &mut published => break result,
            result = &mut public, if early_public.is_none() => early_public = Some(result),
        }
    };

    let (published, record_present) = match published {
        Ok(Some(ip)) => (Some(ip), true),
        Ok(None) => {
            warn!("A record for {} has no answers, treating it as stale", domain);
            (None, true)
        }
        Err(e) if e.is_record_missing() => {
            debug!("No A record published for {}: {}", domain, e);
            (None, false)
        }
        Err(e) => return Err(e),
    };

    let current = match early_public {
        Some(result) => result?,
        None => public.await?,
    };

    Ok(Observation {
        published,
        record_present,
        current,
    })
}
