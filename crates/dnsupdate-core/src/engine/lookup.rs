//! Thin wrappers around the two lookups a cycle performs
//!
//! - [`fetch_public_ip`]: the IP oracle call, bounded by a timeout
//! - [`fetch_published_ip`]: the address record currently in the zone
//!
//! Neither retries; a failure is reported once and the scheduler decides.

use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpOracle, RecordType, Zone};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Ask the oracle for the current public address
///
/// Any failure, including the timeout expiring, is reported as a
/// transient network error.
pub async fn fetch_public_ip(oracle: &dyn IpOracle, timeout: Duration) -> Result<Ipv4Addr> {
    match tokio::time::timeout(timeout, oracle.fetch_public_ip()).await {
        Ok(Ok(ip)) => Ok(ip),
        Ok(Err(e)) if e.class() == crate::FailureClass::TransientNetwork => Err(e),
        Ok(Err(e)) => Err(Error::network(format!(
            "{} lookup failed: {}",
            oracle.oracle_name(),
            e
        ))),
        Err(_) => Err(Error::timeout("public IP lookup", timeout)),
    }
}

/// Read the address currently published for `domain`
///
/// # Returns
///
/// - `Ok(Some(Ipv4Addr))`: the first answer of the A record
/// - `Ok(None)`: the A record exists but carries no answers; it still has
///   to be deleted before a new one can be created
/// - `Err(Error::RecordMissing)`: no A record exists
/// - `Err(Error)`: the lookup failed, or the record holds non-IPv4 data
pub async fn fetch_published_ip(
    provider: &dyn DnsProvider,
    zone: &Zone,
    domain: &str,
) -> Result<Option<Ipv4Addr>> {
    let record = provider.get_record(zone, domain, RecordType::A).await?;

    let Some(answer) = record.first_answer() else {
        return Ok(None);
    };

    answer.trim().parse().map(Some).map_err(|_| {
        Error::rejected(
            provider.provider_name(),
            format!("A record for {} holds non-IPv4 data: {}", domain, answer),
        )
    })
}
