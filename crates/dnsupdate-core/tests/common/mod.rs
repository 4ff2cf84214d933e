//! Test doubles and common utilities for contract tests
//!
//! The provider is an in-memory zone with per-operation failure injection,
//! an operation log, and configurable delete propagation lag. All doubles
//! are cheap to clone and share their state, so a test can keep a handle
//! while the updater owns a boxed copy.

#![allow(dead_code)]

use dnsupdate_core::config::{ProviderConfig, UpdaterConfig};
use dnsupdate_core::error::{Error, Result};
use dnsupdate_core::traits::{DnsProvider, IpOracle, Record, RecordData, RecordSpec, RecordType, Zone};
use dnsupdate_core::EngineEvent;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const DOMAIN: &str = "home.example.com";

/// Failure to inject into a double
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    Missing,
    Network,
    Rejected,
    Connectivity,
}

impl Fail {
    pub fn to_error(self, what: &str) -> Error {
        match self {
            Fail::Missing => Error::record_missing(what),
            Fail::Network => Error::network(what),
            Fail::Rejected => Error::rejected("mock", what),
            Fail::Connectivity => Error::connectivity_lost(what),
        }
    }
}

/// One provider call, in the order it was made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    GetZone,
    Get(RecordType),
    Create(RecordType),
    Delete(RecordType),
    Probe,
}

#[derive(Debug, Clone)]
struct Entry {
    answer: String,
    gone_at: Option<Instant>,
}

impl Entry {
    fn visible(&self) -> bool {
        self.gone_at.is_none_or(|at| Instant::now() < at)
    }
}

#[derive(Default)]
struct ZoneState {
    records: HashMap<RecordType, Entry>,
    ops: Vec<Op>,
    zone_failure: Option<Fail>,
    get_failure: HashMap<RecordType, Fail>,
    create_failure: HashMap<RecordType, Fail>,
    delete_failure: HashMap<RecordType, Fail>,
    offline: bool,
    delete_lag: Duration,
    deletes_never_visible: bool,
    create_delay: Duration,
}

/// In-memory DNS provider
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<ZoneState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider with an A record for `ip` and a matching SRV record
    pub fn with_published(ip: Ipv4Addr) -> Self {
        let provider = Self::new();
        provider.publish(RecordType::A, ip.to_string());
        provider.publish(RecordType::Srv, format!("0 0 11774 {}", DOMAIN));
        provider
    }

    pub fn publish(&self, record_type: RecordType, answer: impl Into<String>) {
        self.state.lock().unwrap().records.insert(
            record_type,
            Entry {
                answer: answer.into(),
                gone_at: None,
            },
        );
    }

    /// Currently visible answer for `record_type`
    pub fn answer(&self, record_type: RecordType) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .records
            .get(&record_type)
            .filter(|entry| entry.visible())
            .map(|entry| entry.answer.clone())
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn count(&self, matches: impl Fn(&Op) -> bool) -> usize {
        self.state.lock().unwrap().ops.iter().filter(|op| matches(op)).count()
    }

    pub fn create_count(&self) -> usize {
        self.count(|op| matches!(op, Op::Create(_)))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|op| matches!(op, Op::Delete(_)))
    }

    pub fn fail_zone(&self, fail: Fail) {
        self.state.lock().unwrap().zone_failure = Some(fail);
    }

    pub fn fail_get(&self, record_type: RecordType, fail: Fail) {
        self.state.lock().unwrap().get_failure.insert(record_type, fail);
    }

    pub fn fail_create(&self, record_type: RecordType, fail: Fail) {
        self.state.lock().unwrap().create_failure.insert(record_type, fail);
    }

    pub fn fail_delete(&self, record_type: RecordType, fail: Fail) {
        self.state.lock().unwrap().delete_failure.insert(record_type, fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Deleted records stay visible to lookups for `lag`
    pub fn set_delete_lag(&self, lag: Duration) {
        self.state.lock().unwrap().delete_lag = lag;
    }

    /// Deleted records never disappear from lookups
    pub fn set_deletes_never_visible(&self) {
        self.state.lock().unwrap().deletes_never_visible = true;
    }

    /// Every create takes `delay` to complete
    pub fn set_create_delay(&self, delay: Duration) {
        self.state.lock().unwrap().create_delay = delay;
    }

    fn log(&self, op: Op) {
        self.state.lock().unwrap().ops.push(op);
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockProvider {
    async fn get_zone(&self, domain: &str) -> Result<Zone> {
        self.log(Op::GetZone);
        if let Some(fail) = self.state.lock().unwrap().zone_failure {
            return Err(fail.to_error(domain));
        }
        Ok(Zone::new(domain))
    }

    async fn get_record(&self, _zone: &Zone, name: &str, record_type: RecordType) -> Result<Record> {
        self.log(Op::Get(record_type));
        let state = self.state.lock().unwrap();
        if let Some(fail) = state.get_failure.get(&record_type) {
            return Err(fail.to_error(name));
        }
        match state.records.get(&record_type).filter(|entry| entry.visible()) {
            Some(entry) => Ok(Record {
                name: name.to_string(),
                record_type,
                ttl: Some(600),
                // An empty answer stands for a record with no answers.
                answers: if entry.answer.is_empty() {
                    Vec::new()
                } else {
                    vec![entry.answer.clone()]
                },
            }),
            None => Err(Error::record_missing(format!("{} {}", name, record_type))),
        }
    }

    async fn create_record(&self, _zone: &Zone, record: &RecordSpec) -> Result<()> {
        let record_type = record.record_type();
        self.log(Op::Create(record_type));

        let delay = self.state.lock().unwrap().create_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(fail) = state.create_failure.get(&record_type) {
            return Err(fail.to_error(&record.name));
        }
        let answer = match &record.data {
            RecordData::A(ip) => ip.to_string(),
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => format!("{} {} {} {}", priority, weight, port, target),
        };
        state.records.insert(
            record_type,
            Entry {
                answer,
                gone_at: None,
            },
        );
        Ok(())
    }

    async fn delete_record(&self, _zone: &Zone, name: &str, record_type: RecordType) -> Result<()> {
        self.log(Op::Delete(record_type));
        let mut state = self.state.lock().unwrap();
        if let Some(fail) = state.delete_failure.get(&record_type) {
            return Err(fail.to_error(name));
        }

        let gone_at = if state.deletes_never_visible {
            Instant::now() + Duration::from_secs(365 * 24 * 60 * 60)
        } else {
            Instant::now() + state.delete_lag
        };

        match state.records.get_mut(&record_type) {
            Some(entry) if entry.gone_at.is_none() => {
                entry.gone_at = Some(gone_at);
                Ok(())
            }
            _ => Err(Error::record_missing(format!("{} {}", name, record_type))),
        }
    }

    async fn check_connectivity(&self) -> Result<()> {
        self.log(Op::Probe);
        if self.state.lock().unwrap().offline {
            return Err(Error::connectivity_lost("mock provider offline"));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

struct OracleScript {
    ip: Ipv4Addr,
    delay: Duration,
    failure: Option<Fail>,
}

/// IP oracle answering from a script
#[derive(Clone)]
pub struct ScriptedOracle {
    script: Arc<Mutex<OracleScript>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedOracle {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            script: Arc::new(Mutex::new(OracleScript {
                ip,
                delay: Duration::ZERO,
                failure: None,
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_ip(&self, ip: Ipv4Addr) {
        self.script.lock().unwrap().ip = ip;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().unwrap().delay = delay;
    }

    pub fn fail_with(&self, fail: Option<Fail>) {
        self.script.lock().unwrap().failure = fail;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpOracle for ScriptedOracle {
    async fn fetch_public_ip(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.script.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let script = self.script.lock().unwrap();
        match script.failure {
            Some(fail) => Err(fail.to_error("scripted oracle")),
            None => Ok(script.ip),
        }
    }

    fn oracle_name(&self) -> &'static str {
        "scripted"
    }
}

/// Helper to create a minimal UpdaterConfig for testing
pub fn minimal_config() -> UpdaterConfig {
    UpdaterConfig::new(
        DOMAIN,
        ProviderConfig::Ns1 {
            api_key: "test-key".to_string(),
            endpoint: None,
        },
    )
}

pub fn zone() -> Zone {
    Zone::new(DOMAIN)
}

/// Wait (in virtual time) for the first event matching `matches`
pub async fn next_matching(
    rx: &mut mpsc::Receiver<EngineEvent>,
    matches: impl Fn(&EngineEvent) -> bool,
) -> EngineEvent {
    let wait = async {
        loop {
            match rx.recv().await {
                Some(event) if matches(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed before a matching event"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(24 * 60 * 60), wait)
        .await
        .expect("matching event within a day of virtual time")
}

/// Everything already queued on the channel
pub fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
