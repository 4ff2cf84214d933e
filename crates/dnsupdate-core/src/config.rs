//! Configuration types for the updater
//!
//! All values are supplied once at startup and stay immutable for the
//! lifetime of the process.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Fully-qualified record name being managed (also used as the zone name)
    pub domain: String,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Public IP oracle configuration
    #[serde(default)]
    pub ip_oracle: IpOracleConfig,

    /// Shape of the records written on every change
    #[serde(default)]
    pub records: RecordConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl UpdaterConfig {
    /// Create a configuration for `domain` with default settings
    pub fn new(domain: impl Into<String>, provider: ProviderConfig) -> Self {
        Self {
            domain: domain.into(),
            provider,
            ip_oracle: IpOracleConfig::default(),
            records: RecordConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("Domain cannot be empty"));
        }
        if !self.domain.contains('.') {
            return Err(crate::Error::config(format!(
                "Domain must be fully qualified: {}",
                self.domain
            )));
        }

        self.provider.validate()?;
        self.ip_oracle.validate()?;
        self.records.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// NS1 managed DNS
    Ns1 {
        /// NS1 API key
        api_key: String,
        /// Override for the REST endpoint (defaults to the public API)
        endpoint: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

// The API key must not end up in logs through `{:?}`.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Ns1 { endpoint, .. } => f
                .debug_struct("Ns1")
                .field("api_key", &"<REDACTED>")
                .field("endpoint", endpoint)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Ns1 { api_key, endpoint } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("NS1 API key cannot be empty"));
                }
                if let Some(endpoint) = endpoint
                    && !endpoint.starts_with("https://")
                    && !endpoint.starts_with("http://")
                {
                    return Err(crate::Error::config(format!(
                        "NS1 endpoint must be an HTTP(S) URL: {}",
                        endpoint
                    )));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Ns1 { .. } => "ns1",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Public IP oracle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpOracleConfig {
    /// Plain-text HTTP lookup service
    Http {
        /// URL returning the caller's address as text
        url: String,
        /// Per-request timeout in seconds
        #[serde(default = "default_oracle_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom oracle
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl IpOracleConfig {
    /// Validate the oracle configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            IpOracleConfig::Http { url, timeout_secs } => {
                if url.is_empty() {
                    return Err(crate::Error::config("IP oracle URL cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("IP oracle timeout must be > 0"));
                }
                Ok(())
            }
            IpOracleConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom IP oracle factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the oracle type name
    pub fn type_name(&self) -> &str {
        match self {
            IpOracleConfig::Http { .. } => "http",
            IpOracleConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for IpOracleConfig {
    fn default() -> Self {
        IpOracleConfig::Http {
            url: DEFAULT_IP_ORACLE_URL.to_string(),
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

/// Public IP lookup used when none is configured
pub const DEFAULT_IP_ORACLE_URL: &str = "https://api.ipify.org";

/// Record shape written on every change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    /// TTL of both the address and the service record (seconds)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// SRV priority
    #[serde(default)]
    pub srv_priority: u16,

    /// SRV weight
    #[serde(default)]
    pub srv_weight: u16,

    /// Port advertised by the SRV record
    #[serde(default = "default_srv_port")]
    pub srv_port: u16,
}

impl RecordConfig {
    /// Validate the record settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        if self.srv_port == 0 {
            return Err(crate::Error::config("SRV port must be > 0"));
        }
        Ok(())
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            srv_priority: 0,
            srv_weight: 0,
            srv_port: default_srv_port(),
        }
    }
}

fn default_ttl() -> u32 {
    600
}

fn default_srv_port() -> u16 {
    11774
}

/// Engine cadence and timeout settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay before the first cycle (milliseconds)
    #[serde(default = "default_initial_tick_ms")]
    pub initial_tick_ms: u64,

    /// Poll interval while the published address matches (seconds)
    #[serde(default = "default_steady_interval_secs")]
    pub steady_interval_secs: u64,

    /// Poll interval after a successful change (seconds)
    #[serde(default = "default_quiesce_interval_secs")]
    pub quiesce_interval_secs: u64,

    /// Bound on waiting for the public IP, measured from when the lookup is issued (seconds)
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,

    /// Bound on waiting for a delete to become visible (seconds)
    #[serde(default = "default_delete_confirm_deadline_secs")]
    pub delete_confirm_deadline_secs: u64,

    /// First pause between delete confirmation checks (milliseconds)
    #[serde(default = "default_confirm_backoff_initial_ms")]
    pub confirm_backoff_initial_ms: u64,

    /// Upper bound for the pause between confirmation checks (milliseconds)
    #[serde(default = "default_confirm_backoff_max_ms")]
    pub confirm_backoff_max_ms: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.steady_interval_secs == 0 || self.quiesce_interval_secs == 0 {
            return Err(crate::Error::config("Poll intervals must be > 0"));
        }
        if self.oracle_timeout_secs == 0 {
            return Err(crate::Error::config("Oracle timeout must be > 0"));
        }
        if self.delete_confirm_deadline_secs == 0 {
            return Err(crate::Error::config(
                "Delete confirmation deadline must be > 0",
            ));
        }
        if self.confirm_backoff_initial_ms == 0
            || self.confirm_backoff_initial_ms > self.confirm_backoff_max_ms
        {
            return Err(crate::Error::config(format!(
                "Confirmation backoff must satisfy 0 < initial ({}) <= max ({})",
                self.confirm_backoff_initial_ms, self.confirm_backoff_max_ms
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn initial_tick(&self) -> Duration {
        Duration::from_millis(self.initial_tick_ms)
    }

    pub fn steady_interval(&self) -> Duration {
        Duration::from_secs(self.steady_interval_secs)
    }

    pub fn quiesce_interval(&self) -> Duration {
        Duration::from_secs(self.quiesce_interval_secs)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn delete_confirm_deadline(&self) -> Duration {
        Duration::from_secs(self.delete_confirm_deadline_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_tick_ms: default_initial_tick_ms(),
            steady_interval_secs: default_steady_interval_secs(),
            quiesce_interval_secs: default_quiesce_interval_secs(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
            delete_confirm_deadline_secs: default_delete_confirm_deadline_secs(),
            confirm_backoff_initial_ms: default_confirm_backoff_initial_ms(),
            confirm_backoff_max_ms: default_confirm_backoff_max_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_initial_tick_ms() -> u64 {
    10
}

fn default_steady_interval_secs() -> u64 {
    120
}

fn default_quiesce_interval_secs() -> u64 {
    2 * 60 * 60
}

fn default_oracle_timeout_secs() -> u64 {
    10
}

fn default_delete_confirm_deadline_secs() -> u64 {
    30
}

fn default_confirm_backoff_initial_ms() -> u64 {
    250
}

fn default_confirm_backoff_max_ms() -> u64 {
    4_000
}

fn default_event_channel_capacity() -> usize {
    1000
}
