//! Collaborator traits for the updater
//!
//! - [`DnsProvider`]: read and write records in the managed zone
//! - [`IpOracle`]: discover the machine's current public address

pub mod dns_provider;
pub mod ip_oracle;

pub use dns_provider::{
    DnsProvider, DnsProviderFactory, Record, RecordData, RecordSpec, RecordType, Zone,
};
pub use ip_oracle::{IpOracle, IpOracleFactory};
