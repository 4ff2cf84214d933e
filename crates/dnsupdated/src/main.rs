// # dnsupdated - DNSUpdate Daemon
//
// The dnsupdated daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering the DNS provider and IP oracle
// 4. Supervising the updater until a stop signal or a fatal failure
//
// All reconciliation logic lives in dnsupdate-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Required
// - `DNSUPDATE_DOMAIN`: Fully-qualified name whose A and SRV records are managed
// - `DNSUPDATE_API_KEY`: DNS provider API key
//
// ### Optional
// - `DNSUPDATE_PROVIDER_TYPE`: Provider type (default: ns1)
// - `DNSUPDATE_PROVIDER_ENDPOINT`: Provider REST endpoint override
// - `DNSUPDATE_IP_URL`: Public IP lookup service (default: https://api.ipify.org)
// - `DNSUPDATE_SRV_PORT`: Port advertised by the SRV record (default: 11774)
// - `DNSUPDATE_STEADY_INTERVAL_SECS`: Poll interval while unchanged (default: 120)
// - `DNSUPDATE_QUIESCE_INTERVAL_SECS`: Poll interval after a change (default: 7200)
// - `DNSUPDATE_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export DNSUPDATE_DOMAIN=home.example.com
// export DNSUPDATE_API_KEY=your_key
//
// dnsupdated
// ```

mod supervisor;

use anyhow::{Context, Result};
use dnsupdate_core::config::{IpOracleConfig, ProviderConfig, UpdaterConfig};
use dnsupdate_core::ProviderRegistry;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use supervisor::{Outcome, Supervisor};
use tokio::sync::watch;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error, or a fatal failure that must not be restarted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsupdateExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error or non-restartable failure
    RuntimeError = 2,
}

impl From<DnsupdateExitCode> for ExitCode {
    fn from(code: DnsupdateExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    domain: String,
    api_key: String,
    provider_type: String,
    provider_endpoint: Option<String>,
    ip_url: Option<String>,
    srv_port: Option<u16>,
    steady_interval_secs: Option<u64>,
    quiesce_interval_secs: Option<u64>,
    log_level: String,
}

/// Parse an optional variable, failing on a malformed value
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{} has an invalid value: {:?}", name, raw))
        })
        .transpose()
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            domain: lookup("DNSUPDATE_DOMAIN").context(
                "DNSUPDATE_DOMAIN is required. \
                Set it via: export DNSUPDATE_DOMAIN=home.example.com",
            )?,
            api_key: lookup("DNSUPDATE_API_KEY").context(
                "DNSUPDATE_API_KEY is required. \
                Set it via: export DNSUPDATE_API_KEY=your_key",
            )?,
            provider_type: lookup("DNSUPDATE_PROVIDER_TYPE").unwrap_or_else(|| "ns1".to_string()),
            provider_endpoint: lookup("DNSUPDATE_PROVIDER_ENDPOINT"),
            ip_url: lookup("DNSUPDATE_IP_URL"),
            srv_port: parse_var(&lookup, "DNSUPDATE_SRV_PORT")?,
            steady_interval_secs: parse_var(&lookup, "DNSUPDATE_STEADY_INTERVAL_SECS")?,
            quiesce_interval_secs: parse_var(&lookup, "DNSUPDATE_QUIESCE_INTERVAL_SECS")?,
            log_level: lookup("DNSUPDATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// This performs comprehensive validation including:
    /// - Value format validation (API key, domain name)
    /// - Numeric range validation
    /// - Type enumeration validation
    /// - URL scheme checks
    fn validate(&self) -> Result<()> {
        self.validate_domain_name(&self.domain)?;

        if !self.domain.contains('.') {
            anyhow::bail!(
                "DNSUPDATE_DOMAIN must be fully qualified (e.g. home.example.com). Got: {}",
                self.domain
            );
        }

        if self.api_key.is_empty() {
            anyhow::bail!(
                "DNSUPDATE_API_KEY is required. \
                Set it via: export DNSUPDATE_API_KEY=your_key"
            );
        }

        // NS1 keys are 20 characters; anything much shorter is a typo
        if self.api_key.len() < 16 {
            anyhow::bail!(
                "DNSUPDATE_API_KEY appears too short ({} chars). \
                Verify your key is correct.",
                self.api_key.len()
            );
        }

        // Check for obvious placeholder keys (common mistake)
        let key_lower = self.api_key.to_lowercase();
        if key_lower.contains("your_key")
            || key_lower.contains("replace_me")
            || key_lower.contains("fillme")
            || key_lower.contains("example")
        {
            anyhow::bail!(
                "DNSUPDATE_API_KEY appears to be a placeholder. \
                Use an actual API key from your DNS provider."
            );
        }

        match self.provider_type.as_str() {
            "ns1" => {}
            _ => anyhow::bail!(
                "DNSUPDATE_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: ns1",
                self.provider_type
            ),
        }

        if let Some(ref endpoint) = self.provider_endpoint {
            self.validate_url("DNSUPDATE_PROVIDER_ENDPOINT", endpoint)?;
        }

        if let Some(ref url) = self.ip_url {
            self.validate_url("DNSUPDATE_IP_URL", url)?;
        }

        if self.srv_port == Some(0) {
            anyhow::bail!("DNSUPDATE_SRV_PORT must be between 1 and 65535. Got: 0");
        }

        if let Some(interval) = self.steady_interval_secs
            && !(10..=86_400).contains(&interval)
        {
            anyhow::bail!(
                "DNSUPDATE_STEADY_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                interval
            );
        }

        if let Some(interval) = self.quiesce_interval_secs
            && !(60..=604_800).contains(&interval)
        {
            anyhow::bail!(
                "DNSUPDATE_QUIESCE_INTERVAL_SECS must be between 60 and 604800 seconds. Got: {}",
                interval
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DNSUPDATE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn validate_url(&self, name: &str, url: &str) -> Result<()> {
        if !url.starts_with("https://") && !url.starts_with("http://") {
            anyhow::bail!("{} must use HTTP or HTTPS scheme. Got: {}", name, url);
        }

        if url.starts_with("http://") {
            eprintln!(
                "WARNING: {} uses HTTP (not HTTPS). \
                This is less secure. Consider using HTTPS.",
                name
            );
        }

        Ok(())
    }

    /// Validate that a string is a valid domain name
    ///
    /// This implements basic DNS domain name validation per RFC 1035.
    /// It's not comprehensive but catches common errors.
    fn validate_domain_name(&self, domain: &str) -> Result<()> {
        if domain.is_empty() {
            anyhow::bail!("Domain name cannot be empty");
        }

        // Total length limit (RFC 1035: 253 chars max)
        if domain.len() > 253 {
            anyhow::bail!(
                "Domain name too long: {} chars (max 253). Got: {}",
                domain.len(),
                domain
            );
        }

        for label in domain.split('.') {
            if label.is_empty() {
                anyhow::bail!("Domain name has empty label: '{}'", domain);
            }

            if label.len() > 63 {
                anyhow::bail!(
                    "Domain label too long: {} chars (max 63). Label: '{}'",
                    label.len(),
                    label
                );
            }

            if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                anyhow::bail!(
                    "Domain label contains invalid characters. Label: '{}'. \
                    Valid: alphanumeric and hyphen only.",
                    label
                );
            }

            if label.starts_with('-') || label.ends_with('-') {
                anyhow::bail!(
                    "Domain label cannot start or end with hyphen. Label: '{}'",
                    label
                );
            }
        }

        Ok(())
    }

    /// Library configuration for the updater
    fn to_updater_config(&self) -> UpdaterConfig {
        let provider = ProviderConfig::Ns1 {
            api_key: self.api_key.clone(),
            endpoint: self.provider_endpoint.clone(),
        };
        let mut config = UpdaterConfig::new(self.domain.clone(), provider);

        if let Some(ref url) = self.ip_url {
            config.ip_oracle = IpOracleConfig::Http {
                url: url.clone(),
                timeout_secs: config.engine.oracle_timeout_secs,
            };
        }
        if let Some(port) = self.srv_port {
            config.records.srv_port = port;
        }
        if let Some(secs) = self.steady_interval_secs {
            config.engine.steady_interval_secs = secs;
        }
        if let Some(secs) = self.quiesce_interval_secs {
            config.engine.quiesce_interval_secs = secs;
        }

        config
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DnsupdateExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnsupdateExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsupdateExitCode::ConfigError.into();
    }

    info!("Starting dnsupdated for {}", config.domain);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsupdateExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config).await {
            Ok(Outcome::Stopped) => DnsupdateExitCode::CleanShutdown,
            Ok(Outcome::GaveUp) => DnsupdateExitCode::RuntimeError,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DnsupdateExitCode::RuntimeError
            }
        }
    });

    info!("dnsupdated exiting with code {}", code as u8);
    code.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<Outcome> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "ns1")]
    {
        info!("Registering NS1 provider");
        dnsupdate_provider_ns1::register(&registry);
    }

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP IP oracle");
        dnsupdate_ip_http::register(&registry);
    }

    let updater_config = config.to_updater_config();
    updater_config
        .validate()
        .context("Invalid updater configuration")?;
    info!("Provider: {:?}", updater_config.provider);

    let mut signals = ShutdownSignals::install()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let supervisor = Supervisor::new(&registry, updater_config);
    let run = supervisor.run(shutdown_rx);
    tokio::pin!(run);

    tokio::select! {
        outcome = &mut run => outcome,
        signal = signals.recv() => {
            info!("Received shutdown signal: {}", signal);
            info!("Waiting for the current cycle to finish");
            if shutdown_tx.send(true).is_err() {
                warn!("Supervisor already gone");
            }
            let outcome = run.await;
            // A write in progress is never abandoned, so a stuck provider
            // call can delay this; the HTTP clients bound it.
            info!("Shutdown complete");
            outcome
        }
    }
}

/// Process stop signals (SIGTERM, SIGINT)
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?,
        })
    }

    /// Wait for either signal; returns its name
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Fallback for non-Unix platforms: ctrl-c only
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "CTRL-C",
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending().await
            }
        }
    }
}
