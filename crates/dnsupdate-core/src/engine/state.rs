//! Scheduler state machine
//!
//! All cadence and failure decisions live here as plain transitions on
//! [`SchedulerState`], so they can be exercised without a timer or a
//! provider. The run loop in [`Updater`](super::Updater) performs the I/O and
//! feeds outcomes in.
//!
//! ```text
//!            ┌──────── equal ────────┐
//!            ▼                       │
//!   Polling ──tick──▶ reconcile ─────┼── differ ──▶ Updating ──ok──▶ Polling (2h)
//!   Quiesced ◀───────────────────────┘                 │
//!                                                      ├─ record-missing ─▶ retry without delete
//!                                                      └─ other ─▶ Broken
//! ```

use super::reconciler::Observation;
use crate::config::EngineConfig;
use crate::error::FailureClass;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Where the scheduler is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the next tick
    Polling,
    /// Writing new records
    Updating,
    /// Waiting for the next tick after finding nothing to do
    Quiesced,
    /// Graceful exit in progress
    ShuttingDown,
    /// Fatal; the loop terminates
    Broken,
}

/// Polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fire almost immediately on startup
    Initial,
    /// Published address matched on the last check
    Steady,
    /// A change was just written
    AfterChange,
}

impl Cadence {
    pub fn interval(&self, engine: &EngineConfig) -> Duration {
        match self {
            Cadence::Initial => engine.initial_tick(),
            Cadence::Steady => engine.steady_interval(),
            Cadence::AfterChange => engine.quiesce_interval(),
        }
    }
}

/// Payload of a catastrophic-failure escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Connectivity was lost; restart once the provider is reachable again
    RestartWhenOnline,
    /// Do not restart; an operator should inspect the zone
    DoNotRestart,
}

impl Escalation {
    /// Boolean form of the payload (`true` = restart me)
    pub fn should_restart(&self) -> bool {
        matches!(self, Escalation::RestartWhenOnline)
    }
}

/// What to do after a successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Published address is current
    NoChange,
    /// Publish `new_ip`
    Update { new_ip: Ipv4Addr, delete_old: bool },
}

/// What to do after a failed write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteVerdict {
    /// Nothing was there to delete; write again straight away without deleting
    RetryWithoutDelete,
    /// Give up and escalate
    Escalate(Escalation),
}

/// What to do after a failed reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleVerdict {
    /// Try again on the next tick
    RetryNextTick,
    /// Give up and escalate
    Escalate(Escalation),
}

/// State owned and mutated only by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    phase: Phase,
    cadence: Cadence,
    delete_old: bool,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerState {
    /// Fresh state: polling at the initial cadence, deleting before writes
    pub fn new() -> Self {
        Self {
            phase: Phase::Polling,
            cadence: Cadence::Initial,
            delete_old: true,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Whether the next write deletes the existing records first
    pub fn delete_old(&self) -> bool {
        self.delete_old
    }

    /// Delay until the next tick
    pub fn next_interval(&self, engine: &EngineConfig) -> Duration {
        self.cadence.interval(engine)
    }

    /// Compare the observed addresses
    pub fn on_reconciled(&mut self, observation: &Observation) -> Decision {
        if !observation.needs_update() {
            self.phase = Phase::Quiesced;
            self.cadence = Cadence::Steady;
            return Decision::NoChange;
        }

        // An existing record has to go before the new one is created, even
        // an answerless one; a missing one must not be deleted.
        self.delete_old = observation.record_present;
        self.phase = Phase::Updating;
        Decision::Update {
            new_ip: observation.current,
            delete_old: self.delete_old,
        }
    }

    /// Both records were created
    pub fn on_write_succeeded(&mut self) {
        self.delete_old = true;
        self.cadence = Cadence::AfterChange;
        self.phase = Phase::Polling;
    }

    /// The record writer failed with `class`
    pub fn on_write_failed(&mut self, class: FailureClass) -> WriteVerdict {
        if class == FailureClass::RecordMissing && self.delete_old {
            self.delete_old = false;
            return WriteVerdict::RetryWithoutDelete;
        }

        self.mark_broken();
        WriteVerdict::Escalate(Escalation::DoNotRestart)
    }

    /// Reconciliation failed with `class`
    ///
    /// `connectivity_ok` is the result of a probe run after a transient
    /// failure; it is ignored for other classes.
    pub fn on_cycle_error(&mut self, class: FailureClass, connectivity_ok: bool) -> CycleVerdict {
        match class {
            FailureClass::RecordMissing => self.retry_next_tick(),
            FailureClass::TransientNetwork if connectivity_ok => self.retry_next_tick(),
            FailureClass::TransientNetwork | FailureClass::ConnectivityLost => {
                CycleVerdict::Escalate(self.on_connectivity_lost())
            }
            FailureClass::ProviderRejected => {
                self.mark_broken();
                CycleVerdict::Escalate(Escalation::DoNotRestart)
            }
        }
    }

    /// The per-iteration connectivity probe failed
    pub fn on_connectivity_lost(&mut self) -> Escalation {
        self.mark_broken();
        Escalation::RestartWhenOnline
    }

    /// Enter the terminal state
    pub fn mark_broken(&mut self) {
        self.phase = Phase::Broken;
    }

    /// Graceful exit requested
    pub fn begin_shutdown(&mut self) {
        self.phase = Phase::ShuttingDown;
    }

    fn retry_next_tick(&mut self) -> CycleVerdict {
        self.phase = Phase::Polling;
        if self.cadence == Cadence::Initial {
            self.cadence = Cadence::Steady;
        }
        CycleVerdict::RetryNextTick
    }
}
