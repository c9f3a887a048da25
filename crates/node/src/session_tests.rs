// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use crate::egress::SESSION_LIMIT_DETAIL;

fn session() -> ClusterSession {
    ClusterSession::new(7, 100, 1, "udp://client:19001")
}

#[test]
fn new_session_starts_in_init() {
    let s = session();
    assert_eq!(s.id(), 7);
    assert_eq!(s.correlation_id(), 100);
    assert_eq!(s.response_stream_id(), 1);
    assert_eq!(s.state(), SessionState::Init);
    assert_eq!(s.last_activity_ms(), 0);
}

#[test]
fn record_activity_refreshes_the_clock() {
    let mut s = session();
    s.record_activity(500);
    assert_eq!(s.last_activity_ms(), 500);
    assert_eq!(s.correlation_id(), 100);
}

#[test]
fn record_request_tracks_the_correlation_id() {
    let mut s = session();
    s.record_request(750, 101);
    assert_eq!(s.last_activity_ms(), 750);
    assert_eq!(s.correlation_id(), 101);
}

#[test]
fn timeout_boundary_is_exclusive() {
    let mut s = session();
    s.record_activity(1_000);
    assert!(!s.has_timed_out(2_000, 1_000));
    assert!(s.has_timed_out(2_001, 1_000));
}

#[test]
fn mark_connected_only_advances_init() {
    let mut s = session();
    s.mark_connected();
    assert_eq!(s.state(), SessionState::Connected);
    s.challenge();
    s.mark_connected();
    assert_eq!(s.state(), SessionState::Challenged);
}

#[test]
fn rejection_carries_the_event_to_deliver() {
    let mut s = session();
    s.reject(EgressEvent::Error { detail: SESSION_LIMIT_DETAIL.to_owned() });
    assert_eq!(s.state(), SessionState::Rejected);
    assert_eq!(
        s.rejection_event(),
        EgressEvent::Error { detail: SESSION_LIMIT_DETAIL.to_owned() }
    );
}

#[test]
fn rejection_event_defaults_to_authentication_rejected() {
    let s = session();
    assert_eq!(
        s.rejection_event(),
        EgressEvent::AuthenticationRejected { detail: SESSION_REJECTED_DETAIL.to_owned() }
    );
}

#[test]
fn timed_out_pins_the_close_reason() {
    let mut s = session();
    s.open();
    s.timed_out();
    assert_eq!(s.state(), SessionState::TimedOut);
    assert_eq!(s.close_reason(), CloseReason::Timeout);
}

#[test]
fn closing_pins_the_requested_reason() {
    let mut s = session();
    s.open();
    s.closing(CloseReason::ServiceAction);
    assert_eq!(s.state(), SessionState::Closed);
    assert_eq!(s.close_reason(), CloseReason::ServiceAction);
}

#[test]
fn retry_connect_demotes_an_authenticated_session() {
    let mut s = session();
    s.mark_connected();
    s.authenticate();
    s.retry_connect();
    assert_eq!(s.state(), SessionState::Connected);
}

#[test]
fn state_as_str_matches_serde() -> anyhow::Result<()> {
    let states = [
        SessionState::Init,
        SessionState::Connected,
        SessionState::Challenged,
        SessionState::Authenticated,
        SessionState::Rejected,
        SessionState::Open,
        SessionState::TimedOut,
        SessionState::Closed,
    ];
    for state in &states {
        let json =
            serde_json::to_string(state).map_err(|e| anyhow::anyhow!("serialize {state:?}: {e}"))?;
        assert_eq!(state.as_str(), json.trim_matches('"'));
    }
    Ok(())
}

#[test]
fn close_reason_as_str_matches_serde() -> anyhow::Result<()> {
    let reasons = [CloseReason::UserAction, CloseReason::Timeout, CloseReason::ServiceAction];
    for reason in &reasons {
        let json = serde_json::to_string(reason)
            .map_err(|e| anyhow::anyhow!("serialize {reason:?}: {e}"))?;
        assert_eq!(reason.as_str(), json.trim_matches('"'));
    }
    Ok(())
}
