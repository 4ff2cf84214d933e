//! Host-side supervisor
//!
//! Keeps an [`Updater`] running for the lifetime of the process:
//!
//! 1. Wait until the provider is reachable, probing every second
//! 2. Run the updater until it exits
//! 3. On a catastrophic failure asking for a restart, go back to 1 with a
//!    one-minute probe interval; the first probe waits a full interval
//! 4. On a catastrophic failure without restart, give up
//!
//! A stop request is honoured in every phase. While the updater runs it is
//! forwarded as a graceful exit and the supervisor waits for the
//! acknowledgement.

use anyhow::Result;
use dnsupdate_core::engine::shutdown_requested;
use dnsupdate_core::traits::DnsProvider;
use dnsupdate_core::{EngineEvent, Escalation, Exit, ProviderRegistry, Updater, UpdaterConfig};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

/// Probe interval before the first run
pub const STARTUP_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Probe interval after connectivity was lost
pub const RECONNECT_PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// Why the supervisor returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A stop was requested and acknowledged
    Stopped,
    /// The updater escalated a failure that must not be restarted
    GaveUp,
}

pub struct Supervisor<'a> {
    registry: &'a ProviderRegistry,
    config: UpdaterConfig,
    startup_probe_interval: Duration,
    reconnect_probe_interval: Duration,
}

impl<'a> Supervisor<'a> {
    pub fn new(registry: &'a ProviderRegistry, config: UpdaterConfig) -> Self {
        Self {
            registry,
            config,
            startup_probe_interval: STARTUP_PROBE_INTERVAL,
            reconnect_probe_interval: RECONNECT_PROBE_INTERVAL,
        }
    }

    /// Run until `true` is sent on `shutdown` or the updater gives up
    ///
    /// Collaborators are built fresh from the registry for every run.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<Outcome> {
        let mut probe_interval = self.startup_probe_interval;
        let mut generation: u32 = 0;

        loop {
            let provider = self.registry.create_provider(&self.config.provider)?;

            info!(
                "Waiting for {} to become reachable (probing every {:?})",
                provider.provider_name(),
                probe_interval
            );
            // Only the first start probes right away. A restart waits a full
            // interval so a provider failing past the probe is not hammered.
            let first_probe = if generation == 0 {
                Instant::now()
            } else {
                Instant::now() + probe_interval
            };
            if !wait_for_connectivity(provider.as_ref(), first_probe, probe_interval, &mut shutdown)
                .await
            {
                info!("Stop requested while waiting for connectivity");
                return Ok(Outcome::Stopped);
            }

            let oracle = self.registry.create_ip_oracle(&self.config.ip_oracle)?;
            let (updater, events) = Updater::new(provider, oracle, self.config.clone())?;

            generation += 1;
            info!(generation = generation, "Starting updater for {}", self.config.domain);

            match drive(updater, events, shutdown.clone()).await {
                Exit::ShutDown => return Ok(Outcome::Stopped),
                Exit::Catastrophic(Escalation::RestartWhenOnline) => {
                    warn!("Connectivity lost, restarting once the provider is reachable");
                    probe_interval = self.reconnect_probe_interval;
                }
                Exit::Catastrophic(Escalation::DoNotRestart) => {
                    error!("Updater stopped on a fatal error; inspect the zone before restarting");
                    return Ok(Outcome::GaveUp);
                }
            }
        }
    }
}

/// Probe from `first_probe` on, every `interval`, until the provider answers
///
/// Returns `false` if a stop was requested first.
async fn wait_for_connectivity(
    provider: &dyn DnsProvider,
    first_probe: Instant,
    interval: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let mut ticker = tokio::time::interval_at(first_probe, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => return false,
            _ = ticker.tick() => match provider.check_connectivity().await {
                Ok(()) => return true,
                Err(e) => debug!("Still offline: {}", e),
            },
        }
    }
}

/// Run one updater to completion, logging its events
async fn drive(
    updater: Updater,
    events: mpsc::Receiver<EngineEvent>,
    shutdown: watch::Receiver<bool>,
) -> Exit {
    let mut events = ReceiverStream::new(events);

    let exit = {
        let run = updater.run_with_shutdown(shutdown);
        tokio::pin!(run);

        loop {
            tokio::select! {
                exit = &mut run => break exit,
                Some(event) = events.next() => log_event(&event),
            }
        }
    };

    // Dropping the updater closes the channel, so this drains what is left.
    drop(updater);
    while let Some(event) = events.next().await {
        log_event(&event);
    }

    exit
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Started { domain, zone } => info!("Updater started for {} in zone {}", domain, zone),
        EngineEvent::IpChangeDetected { published, current } => match published {
            Some(published) => info!("Public IP changed: {} -> {}", published, current),
            None => info!("No address published yet, publishing {}", current),
        },
        EngineEvent::UpdateStarted { new_ip, delete_old } => {
            debug!("Writing records for {} (delete first: {})", new_ip, delete_old)
        }
        EngineEvent::UpdateSucceeded { new_ip, .. } => info!("Records now point at {}", new_ip),
        EngineEvent::UpdateFailed { class, error } => warn!("Record write failed ({}): {}", class, error),
        EngineEvent::CycleFailed { class, error } => warn!("Check failed ({}): {}", class, error),
        EngineEvent::CycleFinished {
            did_work,
            next_poll_at,
            ..
        } => debug!("Cycle finished (work done: {}), next check at {}", did_work, next_poll_at),
        EngineEvent::CatastrophicFailure { restart, reason } => {
            error!("Catastrophic failure (restart: {}): {}", restart, reason)
        }
        EngineEvent::Stopped { reason } => info!("Updater stopped: {}", reason),
    }
}
