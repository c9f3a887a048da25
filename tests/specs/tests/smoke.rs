// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the fully wired node — duty-cycle thread,
//! JSONL log, channel adapters — and observe it through the log file, the
//! message index, and the shutdown barrier.

use std::time::Duration;

use bytes::Bytes;

use sequin::control::{ClusterAction, ToggleMode};
use sequin::ingress::IngressEvent;
use sequin::log::LogRecord;
use sequin::service::ServiceAck;
use sequin::session::CloseReason;
use sequin_specs::NodeHarness;

const TIMEOUT: Duration = Duration::from_secs(10);

fn connect(correlation_id: u64) -> IngressEvent {
    IngressEvent::SessionConnect {
        correlation_id,
        response_stream_id: 1,
        response_channel: "client:0".to_owned(),
        credentials: Bytes::new(),
    }
}

#[tokio::test]
async fn session_lifecycle_reaches_the_log_in_order() -> anyhow::Result<()> {
    let harness = NodeHarness::start()?;
    harness.node.services_tx.send(ServiceAck::Ready).await?;

    harness.node.ingress_tx.send(connect(100)).await?;
    harness
        .wait_for_record(TIMEOUT, |r| {
            matches!(r, LogRecord::ConnectedSession { session_id: 1, correlation_id: 100, .. })
        })
        .await?;

    harness
        .node
        .ingress_tx
        .send(IngressEvent::SessionMessage {
            cluster_session_id: 1,
            correlation_id: 101,
            payload: Bytes::from_static(&[0xAB]),
        })
        .await?;
    harness
        .wait_for_record(TIMEOUT, |r| {
            matches!(r, LogRecord::ClientMessage { session_id: 1, correlation_id: 101, payload, .. }
                if payload.as_ref() == [0xAB])
        })
        .await?;

    harness
        .node
        .ingress_tx
        .send(IngressEvent::SessionClose { cluster_session_id: 1 })
        .await?;
    harness
        .wait_for_record(TIMEOUT, |r| {
            matches!(
                r,
                LogRecord::ClosedSession { session_id: 1, reason: CloseReason::UserAction, .. }
            )
        })
        .await?;

    // Exactly one index increment per appended record.
    let records = harness.records();
    assert_eq!(harness.node.message_index.get(), records.len() as u64);

    // Connect → message → close, in that order.
    assert!(matches!(records[0], LogRecord::ConnectedSession { .. }));
    assert!(matches!(records[1], LogRecord::ClientMessage { .. }));
    assert!(matches!(records[2], LogRecord::ClosedSession { .. }));
    Ok(())
}

#[tokio::test]
async fn idle_session_is_closed_with_a_timeout_record() -> anyhow::Result<()> {
    let harness = NodeHarness::start_with(&["--session-timeout-ms", "200"])?;
    harness.node.services_tx.send(ServiceAck::Ready).await?;

    harness.node.ingress_tx.send(connect(100)).await?;
    harness
        .wait_for_record(TIMEOUT, |r| matches!(r, LogRecord::ConnectedSession { .. }))
        .await?;

    harness
        .wait_for_record(TIMEOUT, |r| {
            matches!(r, LogRecord::ClosedSession { reason: CloseReason::Timeout, .. })
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn timer_fires_after_its_deadline() -> anyhow::Result<()> {
    let harness = NodeHarness::start()?;
    harness.node.services_tx.send(ServiceAck::Ready).await?;

    let deadline_ms = harness.node.cached_clock.now_ms() + 100;
    harness
        .node
        .ingress_tx
        .send(IngressEvent::ScheduleTimer { correlation_id: 7, deadline_ms })
        .await?;
    harness
        .wait_for_record(TIMEOUT, |r| {
            matches!(r, LogRecord::TimerEvent { correlation_id: 7, .. })
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn snapshot_round_trip_returns_to_active() -> anyhow::Result<()> {
    let harness = NodeHarness::start()?;
    harness.node.services_tx.send(ServiceAck::Ready).await?;

    assert!(harness.node.control.request(ToggleMode::Snapshot));
    harness
        .wait_for_record(TIMEOUT, |r| {
            matches!(r, LogRecord::ActionRequest { action: ClusterAction::Snapshot, .. })
        })
        .await?;

    harness.node.services_tx.send(ServiceAck::Action(ClusterAction::Snapshot)).await?;

    // Back to ACTIVE: a fresh session gets admitted and logged.
    harness.node.ingress_tx.send(connect(200)).await?;
    harness
        .wait_for_record(TIMEOUT, |r| matches!(r, LogRecord::ConnectedSession { .. }))
        .await?;
    Ok(())
}

#[tokio::test]
async fn shutdown_toggle_signals_the_barrier_and_joins() -> anyhow::Result<()> {
    let harness = NodeHarness::start()?;
    harness.node.services_tx.send(ServiceAck::Ready).await?;

    assert!(harness.node.control.request(ToggleMode::Shutdown));
    harness
        .wait_for_record(TIMEOUT, |r| {
            matches!(r, LogRecord::ActionRequest { action: ClusterAction::Shutdown, .. })
        })
        .await?;

    harness.node.services_tx.send(ServiceAck::Action(ClusterAction::Shutdown)).await?;
    harness.wait_shutdown(TIMEOUT).await?;
    harness.join()
}

#[tokio::test]
async fn abort_terminates_without_a_toggle_reset() -> anyhow::Result<()> {
    let harness = NodeHarness::start()?;
    harness.node.services_tx.send(ServiceAck::Ready).await?;

    harness.node.control.abort();
    harness
        .wait_for_record(TIMEOUT, |r| {
            matches!(r, LogRecord::ActionRequest { action: ClusterAction::Abort, .. })
        })
        .await?;
    assert_eq!(harness.node.control.load()?, ToggleMode::Abort);

    harness.node.services_tx.send(ServiceAck::Action(ClusterAction::Abort)).await?;
    harness.wait_shutdown(TIMEOUT).await?;
    harness.join()
}
