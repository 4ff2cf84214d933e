// # HTTP IP Oracle
//
// This crate asks an external lookup service for the host's public IPv4
// address. The service must answer a plain GET with the caller's address as
// the whole response body (e.g. https://api.ipify.org).
//
// One lookup is one request. There is no caching and no retry; the engine
// bounds the wait and decides what a failure means.

use dnsupdate_core::ProviderRegistry;
use dnsupdate_core::config::IpOracleConfig;
use dnsupdate_core::traits::{IpOracle, IpOracleFactory};
use dnsupdate_core::{Error, Result};

use std::net::Ipv4Addr;
use std::time::Duration;

/// Parse a lookup response body
///
/// Surrounding whitespace (a trailing newline, typically) is ignored.
pub fn parse_ip(body: &str) -> Result<Ipv4Addr> {
    let text = body.trim();
    text.parse()
        .map_err(|_| Error::invalid_input(format!("Not an IPv4 address: {:?}", text)))
}

/// HTTP public IP oracle
#[derive(Debug, Clone)]
pub struct HttpIpOracle {
    /// URL to fetch the address from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpOracle {
    /// Create a new HTTP IP oracle
    ///
    /// # Parameters
    ///
    /// - `url`: lookup service URL (e.g., "https://api.ipify.org")
    /// - `timeout`: per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl IpOracle for HttpIpOracle {
    async fn fetch_public_ip(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::network(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::network(format!(
                "{} answered HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response: {}", e)))?;

        let ip = parse_ip(&body)?;
        tracing::debug!("Public IP from {}: {}", self.url, ip);
        Ok(ip)
    }

    fn oracle_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP IP oracles
pub struct HttpFactory;

impl IpOracleFactory for HttpFactory {
    fn create(&self, config: &IpOracleConfig) -> Result<Box<dyn IpOracle>> {
        match config {
            IpOracleConfig::Http { url, timeout_secs } => Ok(Box::new(HttpIpOracle::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP IP oracle")),
        }
    }
}

/// Register the HTTP IP oracle with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_ip_oracle("http", Box::new(HttpFactory));
}
