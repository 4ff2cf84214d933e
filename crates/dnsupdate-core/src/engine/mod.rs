//! Core update engine
//!
//! The [`Updater`] is responsible for:
//! - Looking up the zone handle once per run
//! - Ticking the reconciliation cycle at the scheduler's cadence
//! - Writing new records when the published address is stale
//! - Classifying failures and escalating the fatal ones
//! - Honouring graceful exit without abandoning a write
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐
//!      tick ────────▶│   Updater    │────── EngineEvent ──────▶ supervisor
//!                    └──────────────┘
//!                           │
//!         ┌─────────────────┼──────────────────┐
//!         ▼                 ▼                  ▼
//! ┌──────────────┐  ┌──────────────┐   ┌──────────────┐
//! │  Reconciler  │  │ RecordWriter │   │SchedulerState│
//! │ (oracle+zone)│  │ (delete/new) │   │ (transitions)│
//! └──────────────┘  └──────────────┘   └──────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Timer fires
//! 2. Connectivity probe against the provider
//! 3. Published and current addresses fetched concurrently
//! 4. If they differ, records are replaced
//! 5. Cadence adjusted, `CycleFinished` emitted

pub mod lookup;
pub mod reconciler;
pub mod state;
pub mod writer;

pub use reconciler::{Observation, reconcile};
pub use state::{Cadence, CycleVerdict, Decision, Escalation, Phase, SchedulerState, WriteVerdict};
pub use writer::RecordWriter;

use crate::config::{EngineConfig, UpdaterConfig};
use crate::error::{FailureClass, Result};
use crate::traits::{DnsProvider, IpOracle, Zone};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Events emitted by the Updater
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Zone resolved, loop starting
    Started { domain: String, zone: String },

    /// Published address differs from the current one
    IpChangeDetected {
        published: Option<Ipv4Addr>,
        current: Ipv4Addr,
    },

    /// Record write started
    UpdateStarted { new_ip: Ipv4Addr, delete_old: bool },

    /// Both records written
    UpdateSucceeded {
        new_ip: Ipv4Addr,
        previous_ip: Option<Ipv4Addr>,
    },

    /// Record write failed
    UpdateFailed { class: FailureClass, error: String },

    /// Reconciliation failed
    CycleFailed { class: FailureClass, error: String },

    /// One cycle completed
    ///
    /// `did_work` is `false` for an idle cycle and `true` once records were
    /// written.
    CycleFinished {
        did_work: bool,
        next_poll_in: Duration,
        next_poll_at: chrono::DateTime<chrono::Utc>,
    },

    /// Fatal failure; `restart` carries the escalation payload
    CatastrophicFailure { restart: bool, reason: String },

    /// Loop exited
    Stopped { reason: String },
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Graceful exit was requested and acknowledged
    ShutDown,
    /// The loop escalated a catastrophic failure
    Catastrophic(Escalation),
}

enum CycleOutcome {
    Completed { did_work: bool },
    Escalate(Escalation, String),
}

/// Core dynamic DNS updater
///
/// Runs a single reconciliation cycle at a time on the calling task. The
/// zone and the collaborators are shared read-only by every cycle; only the
/// [`SchedulerState`] owned by the run loop changes.
///
/// ## Lifecycle
///
/// 1. Create with [`Updater::new()`]
/// 2. Start with [`Updater::run()`] or [`Updater::run_with_shutdown()`]
/// 3. The loop runs until graceful exit or a catastrophic failure
pub struct Updater {
    /// DNS provider for reading and writing records
    provider: Box<dyn DnsProvider>,

    /// Public IP oracle
    oracle: Box<dyn IpOracle>,

    /// Record being managed
    domain: String,

    /// Cadence and timeout settings
    engine: EngineConfig,

    /// Delete/create sequence
    writer: RecordWriter,

    /// Event sender for the supervisor
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Updater {
    /// Create a new updater
    ///
    /// # Returns
    ///
    /// A tuple of (updater, event_receiver) where event_receiver yields engine events
    pub fn new(
        provider: Box<dyn DnsProvider>,
        oracle: Box<dyn IpOracle>,
        config: UpdaterConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);
        let writer = RecordWriter::new(config.records, &config.engine);

        let updater = Self {
            provider,
            oracle,
            domain: config.domain,
            engine: config.engine,
            writer,
            event_tx: tx,
        };

        Ok((updater, rx))
    }

    /// Run until ctrl-c or a catastrophic failure
    ///
    /// A ctrl-c arriving mid-cycle lets the cycle finish first.
    pub async fn run(&self) -> Exit {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = self.run_with_shutdown(shutdown_rx);
        tokio::pin!(run);

        tokio::select! {
            exit = &mut run => exit,
            Ok(()) = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
                run.await
            }
        }
    }

    /// Run until `true` is sent on `shutdown` or a catastrophic failure
    ///
    /// The request is only observed between cycles, so a write in progress
    /// always resolves before [`EngineEvent::Stopped`] is emitted.
    pub async fn run_with_shutdown(&self, mut shutdown: watch::Receiver<bool>) -> Exit {
        let mut state = SchedulerState::new();

        let zone = match self.provider.get_zone(&self.domain).await {
            Ok(zone) => zone,
            Err(e) => {
                let escalation = match e.class() {
                    FailureClass::TransientNetwork | FailureClass::ConnectivityLost => {
                        Escalation::RestartWhenOnline
                    }
                    _ => Escalation::DoNotRestart,
                };
                return self.escalate(
                    &mut state,
                    escalation,
                    format!("zone lookup for {} failed: {}", self.domain, e),
                );
            }
        };

        info!("Managing {} in zone {}", self.domain, zone);
        self.emit_event(EngineEvent::Started {
            domain: self.domain.clone(),
            zone: zone.name.clone(),
        });

        let mut next_poll = Instant::now() + state.next_interval(&self.engine);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep_until(next_poll) => {}
            }

            if let Err(e) = self.provider.check_connectivity().await {
                let escalation = state.on_connectivity_lost();
                return self.escalate(&mut state, escalation, e.to_string());
            }

            let did_work = match self.run_cycle(&zone, &mut state).await {
                CycleOutcome::Completed { did_work } => did_work,
                CycleOutcome::Escalate(escalation, reason) => {
                    return self.escalate(&mut state, escalation, reason);
                }
            };

            let interval = state.next_interval(&self.engine);
            next_poll = Instant::now() + interval;
            debug!("Next check in {:?}", interval);

            self.emit_event(EngineEvent::CycleFinished {
                did_work,
                next_poll_in: interval,
                next_poll_at: chrono::Utc::now()
                    + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero()),
            });
        }

        state.begin_shutdown();
        info!("Graceful exit requested, updater stopped");
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
        Exit::ShutDown
    }

    /// One poll-compare-(write) iteration
    async fn run_cycle(&self, zone: &Zone, state: &mut SchedulerState) -> CycleOutcome {
        let observation = match reconcile(
            self.provider.as_ref(),
            self.oracle.as_ref(),
            zone,
            &self.domain,
            self.engine.oracle_timeout(),
        )
        .await
        {
            Ok(observation) => observation,
            Err(e) => {
                let class = e.class();
                warn!("Reconciliation failed ({}): {}", class, e);
                self.emit_event(EngineEvent::CycleFailed {
                    class,
                    error: e.to_string(),
                });

                let connectivity_ok = class != FailureClass::TransientNetwork
                    || self.provider.check_connectivity().await.is_ok();

                return match state.on_cycle_error(class, connectivity_ok) {
                    CycleVerdict::RetryNextTick => CycleOutcome::Completed { did_work: false },
                    CycleVerdict::Escalate(escalation) => {
                        CycleOutcome::Escalate(escalation, e.to_string())
                    }
                };
            }
        };

        let (new_ip, mut delete_old) = match state.on_reconciled(&observation) {
            Decision::NoChange => {
                debug!("Published address {} is current", observation.current);
                return CycleOutcome::Completed { did_work: false };
            }
            Decision::Update { new_ip, delete_old } => (new_ip, delete_old),
        };

        info!(
            "Address change for {}: {} -> {}",
            self.domain,
            observation
                .published
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            new_ip
        );
        self.emit_event(EngineEvent::IpChangeDetected {
            published: observation.published,
            current: new_ip,
        });

        loop {
            self.emit_event(EngineEvent::UpdateStarted { new_ip, delete_old });

            let result = self
                .writer
                .change_ip(self.provider.as_ref(), zone, &self.domain, new_ip, delete_old)
                .await;

            match result {
                Ok(()) => {
                    state.on_write_succeeded();
                    self.emit_event(EngineEvent::UpdateSucceeded {
                        new_ip,
                        previous_ip: observation.published,
                    });
                    return CycleOutcome::Completed { did_work: true };
                }
                Err(e) => {
                    let class = e.class();
                    self.emit_event(EngineEvent::UpdateFailed {
                        class,
                        error: e.to_string(),
                    });

                    match state.on_write_failed(class) {
                        WriteVerdict::RetryWithoutDelete => {
                            info!("Nothing to delete for {}, writing directly: {}", self.domain, e);
                            delete_old = state.delete_old();
                        }
                        WriteVerdict::Escalate(escalation) => {
                            return CycleOutcome::Escalate(escalation, e.to_string());
                        }
                    }
                }
            }
        }
    }

    fn escalate(&self, state: &mut SchedulerState, escalation: Escalation, reason: String) -> Exit {
        state.mark_broken();
        error!(
            "Catastrophic failure (restart: {}): {}",
            escalation.should_restart(),
            reason
        );
        self.emit_event(EngineEvent::CatastrophicFailure {
            restart: escalation.should_restart(),
            reason: reason.clone(),
        });
        self.emit_event(EngineEvent::Stopped { reason });
        Exit::Catastrophic(escalation)
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping event");
        }
    }
}

/// Resolves once `true` has been sent; never resolves if the sender is dropped first
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
