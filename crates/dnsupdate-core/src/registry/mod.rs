//! Plugin-based registry
//!
//! DNS providers and IP oracles register a factory under a type name; the
//! daemon then builds its collaborators from configuration without
//! hard-coding which crates are linked in.
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::new();
//! dnsupdate_provider_ns1::register(&registry);
//! dnsupdate_ip_http::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let oracle = registry.create_ip_oracle(&config.ip_oracle)?;
//! ```

use crate::config::{IpOracleConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, IpOracle, IpOracleFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry of provider and oracle factories
///
/// Uses interior mutability so plugin crates can register through a shared
/// reference.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
    ip_oracles: RwLock<HashMap<String, Box<dyn IpOracleFactory>>>,
}

fn poisoned(what: &str) -> Error {
    Error::Other(format!("{} registry lock poisoned", what))
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under `name`
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        match self.providers.write() {
            Ok(mut providers) => {
                providers.insert(name.into(), factory);
            }
            Err(_) => tracing::error!("{}", poisoned("provider")),
        }
    }

    /// Register an IP oracle factory under `name`
    pub fn register_ip_oracle(&self, name: impl Into<String>, factory: Box<dyn IpOracleFactory>) {
        match self.ip_oracles.write() {
            Ok(mut oracles) => {
                oracles.insert(name.into(), factory);
            }
            Err(_) => tracing::error!("{}", poisoned("IP oracle")),
        }
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().map_err(|_| poisoned("provider"))?;

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create an IP oracle from configuration
    pub fn create_ip_oracle(&self, config: &IpOracleConfig) -> Result<Box<dyn IpOracle>> {
        let oracle_type = config.type_name();
        let oracles = self.ip_oracles.read().map_err(|_| poisoned("IP oracle"))?;

        let factory = oracles
            .get(oracle_type)
            .ok_or_else(|| Error::config(format!("Unknown IP oracle type: {}", oracle_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        self.providers
            .read()
            .map(|providers| providers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// List all registered IP oracle types
    pub fn list_ip_oracles(&self) -> Vec<String> {
        self.ip_oracles
            .read()
            .map(|oracles| oracles.keys().cloned().collect())
            .unwrap_or_default()
    }
}
