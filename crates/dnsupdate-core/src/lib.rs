// # dnsupdate-core
//
// Core library for the dynamic DNS updater.
//
// ## Architecture Overview
//
// This library keeps one A record and one SRV record pointing at the host's
// current public IPv4 address:
// - **IpOracle**: Trait for asking an external service for the public address
// - **DnsProvider**: Trait for reading, creating, and deleting zone records
// - **Updater**: Run loop that reconciles the two and rewrites stale records
// - **ProviderRegistry**: Plugin-based registry for providers and oracles
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Explicit Escalation**: Fatal failures end the run with a restart hint
//    instead of being retried forever

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{DnsProvider, IpOracle};
pub use engine::{EngineEvent, Escalation, Exit, Updater};
pub use registry::ProviderRegistry;
pub use config::{EngineConfig, IpOracleConfig, ProviderConfig, RecordConfig, UpdaterConfig};
pub use error::{Error, FailureClass, Result};
