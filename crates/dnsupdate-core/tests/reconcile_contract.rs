//! Contract Test: Reconciliation
//!
//! Constraints verified:
//! - A missing A record is an observation, not a failure
//! - An A record without answers is present, so it gets deleted
//! - Any other zone lookup failure aborts without waiting for the oracle
//! - The oracle wait is bounded; expiry fails the cycle as transient
//! - A failed reconciliation never reaches the record writer

mod common;

use common::*;
use dnsupdate_core::engine::reconcile;
use dnsupdate_core::traits::RecordType;
use dnsupdate_core::{EngineEvent, Exit, FailureClass, Updater};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

const ORACLE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test(start_paused = true)]
async fn published_and_current_addresses_are_observed() {
    let provider = MockProvider::with_published(Ipv4Addr::new(1, 2, 3, 4));
    let oracle = ScriptedOracle::new(Ipv4Addr::new(5, 6, 7, 8));

    let observation = reconcile(&provider, &oracle, &zone(), DOMAIN, ORACLE_TIMEOUT)
        .await
        .expect("both lookups succeed");

    assert_eq!(observation.published, Some(Ipv4Addr::new(1, 2, 3, 4)));
    assert!(observation.record_present);
    assert_eq!(observation.current, Ipv4Addr::new(5, 6, 7, 8));
    assert!(observation.needs_update());
    assert_eq!(provider.ops(), vec![Op::Get(RecordType::A)]);
}

#[tokio::test(start_paused = true)]
async fn missing_record_is_an_observation() {
    let provider = MockProvider::new();
    let oracle = ScriptedOracle::new(Ipv4Addr::new(9, 9, 9, 9));

    let observation = reconcile(&provider, &oracle, &zone(), DOMAIN, ORACLE_TIMEOUT)
        .await
        .expect("record-missing does not fail the cycle");

    assert_eq!(observation.published, None);
    assert!(!observation.record_present);
    assert!(observation.needs_update());
}

#[tokio::test(start_paused = true)]
async fn answerless_record_is_present_but_stale() {
    let provider = MockProvider::new();
    provider.publish(RecordType::A, "");
    let oracle = ScriptedOracle::new(Ipv4Addr::new(9, 9, 9, 9));

    let observation = reconcile(&provider, &oracle, &zone(), DOMAIN, ORACLE_TIMEOUT)
        .await
        .expect("an empty record does not fail the cycle");

    assert_eq!(observation.published, None);
    assert!(observation.record_present);
    assert!(observation.needs_update());
}

#[tokio::test(start_paused = true)]
async fn rejected_zone_lookup_short_circuits_the_oracle() {
    let provider = MockProvider::with_published(Ipv4Addr::new(1, 2, 3, 4));
    provider.fail_get(RecordType::A, Fail::Rejected);
    let oracle = ScriptedOracle::new(Ipv4Addr::new(5, 6, 7, 8));
    oracle.set_delay(Duration::from_secs(5));

    let start = Instant::now();
    let err = reconcile(&provider, &oracle, &zone(), DOMAIN, ORACLE_TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(err.class(), FailureClass::ProviderRejected);
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "zone failure must not wait for the oracle, took {:?}",
        start.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_oracle_times_out_as_transient() {
    let provider = MockProvider::with_published(Ipv4Addr::new(1, 2, 3, 4));
    let oracle = ScriptedOracle::new(Ipv4Addr::new(5, 6, 7, 8));
    oracle.set_delay(Duration::from_secs(60));

    let start = Instant::now();
    let err = reconcile(&provider, &oracle, &zone(), DOMAIN, ORACLE_TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(err.class(), FailureClass::TransientNetwork);
    assert!(start.elapsed() >= ORACLE_TIMEOUT);
    assert!(start.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn oracle_failures_are_transient() {
    let provider = MockProvider::with_published(Ipv4Addr::new(1, 2, 3, 4));
    let oracle = ScriptedOracle::new(Ipv4Addr::new(5, 6, 7, 8));

    for fail in [Fail::Network, Fail::Rejected, Fail::Connectivity] {
        oracle.fail_with(Some(fail));
        let err = reconcile(&provider, &oracle, &zone(), DOMAIN, ORACLE_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.class(), FailureClass::TransientNetwork, "{:?}", fail);
    }
}

#[tokio::test(start_paused = true)]
async fn non_ipv4_answer_is_rejected() {
    let provider = MockProvider::new();
    provider.publish(RecordType::A, "not-an-address");
    let oracle = ScriptedOracle::new(Ipv4Addr::new(5, 6, 7, 8));

    let err = reconcile(&provider, &oracle, &zone(), DOMAIN, ORACLE_TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.class(), FailureClass::ProviderRejected);
}

#[tokio::test(start_paused = true)]
async fn oracle_timeout_never_reaches_the_writer() {
    let provider = MockProvider::with_published(Ipv4Addr::new(1, 2, 3, 4));
    let oracle = ScriptedOracle::new(Ipv4Addr::new(5, 6, 7, 8));
    oracle.set_delay(Duration::from_secs(60));

    let (updater, mut events) = Updater::new(
        Box::new(provider.clone()),
        Box::new(oracle.clone()),
        minimal_config(),
    )
    .expect("updater construction succeeds");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { updater.run_with_shutdown(shutdown_rx).await });

    let failed = next_matching(&mut events, |e| matches!(e, EngineEvent::CycleFailed { .. })).await;
    let EngineEvent::CycleFailed { class, .. } = failed else {
        unreachable!()
    };
    assert_eq!(class, FailureClass::TransientNetwork);

    // Connectivity is fine, so the cycle is simply retried at the steady cadence.
    let finished =
        next_matching(&mut events, |e| matches!(e, EngineEvent::CycleFinished { .. })).await;
    let EngineEvent::CycleFinished {
        did_work,
        next_poll_in,
        ..
    } = finished
    else {
        unreachable!()
    };
    assert!(!did_work);
    assert_eq!(next_poll_in, Duration::from_secs(120));

    assert_eq!(provider.create_count(), 0, "writer must not run");
    assert_eq!(provider.delete_count(), 0, "writer must not run");

    shutdown_tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), Exit::ShutDown);
}
