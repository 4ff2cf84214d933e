// # IP Oracle Trait
//
// Defines the interface for discovering the machine's current public
// IPv4 address.
//
// ## Implementations
//
// - HTTP plain-text lookup: `dnsupdate-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsupdate_core::IpOracle;
//
// let oracle = /* IpOracle implementation */;
// let ip = oracle.fetch_public_ip().await?;
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP oracle implementations
///
/// An oracle performs exactly one outbound lookup per call. It must not
/// retry, cache, or spawn tasks: the scheduler owns retry policy and the
/// reconciler owns the overall wait bound.
#[async_trait]
pub trait IpOracle: Send + Sync {
    /// Fetch the current public address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: the address as seen by the lookup service
    /// - `Err(Error)`: the lookup failed or returned something unparseable
    async fn fetch_public_ip(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Get the oracle name (for logging/debugging)
    fn oracle_name(&self) -> &'static str;
}

/// Helper trait for constructing IP oracles from configuration
pub trait IpOracleFactory: Send + Sync {
    /// Create an IpOracle instance from configuration
    fn create(
        &self,
        config: &crate::config::IpOracleConfig,
    ) -> Result<Box<dyn IpOracle>, crate::Error>;
}
