// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-client session state.
//!
//! A session lives in exactly one container at a time: the pending list while
//! it authenticates, the active map once its connected-session record is in
//! the log, or the rejected list awaiting a best-effort notification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::egress::{EgressEvent, SESSION_REJECTED_DETAIL};

/// Lifecycle state of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Connected,
    Challenged,
    Authenticated,
    Rejected,
    Open,
    TimedOut,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Connected => "connected",
            Self::Challenged => "challenged",
            Self::Authenticated => "authenticated",
            Self::Rejected => "rejected",
            Self::Open => "open",
            Self::TimedOut => "timed_out",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session's closed-session record was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    UserAction,
    Timeout,
    ServiceAction,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserAction => "user_action",
            Self::Timeout => "timeout",
            Self::ServiceAction => "service_action",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical conversation between one client and the cluster.
#[derive(Debug)]
pub struct ClusterSession {
    id: u64,
    correlation_id: u64,
    response_stream_id: i32,
    response_channel: String,
    last_activity_ms: u64,
    state: SessionState,
    close_reason: CloseReason,
    rejection: Option<EgressEvent>,
}

impl ClusterSession {
    pub fn new(
        id: u64,
        correlation_id: u64,
        response_stream_id: i32,
        response_channel: impl Into<String>,
    ) -> Self {
        Self {
            id,
            correlation_id,
            response_stream_id,
            response_channel: response_channel.into(),
            last_activity_ms: 0,
            state: SessionState::Init,
            close_reason: CloseReason::UserAction,
            rejection: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Correlation id of the most recent request seen from this client.
    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    pub fn response_stream_id(&self) -> i32 {
        self.response_stream_id
    }

    pub fn response_channel(&self) -> &str {
        &self.response_channel
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms
    }

    pub fn close_reason(&self) -> CloseReason {
        self.close_reason
    }

    /// Refresh the activity clock.
    pub fn record_activity(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
    }

    /// Refresh the activity clock and remember the request's correlation id.
    pub fn record_request(&mut self, now_ms: u64, correlation_id: u64) {
        self.last_activity_ms = now_ms;
        self.correlation_id = correlation_id;
    }

    pub fn has_timed_out(&self, now_ms: u64, timeout_ms: u64) -> bool {
        now_ms > self.last_activity_ms + timeout_ms
    }

    /// The response publication is up; INIT becomes CONNECTED.
    pub fn mark_connected(&mut self) {
        if self.state == SessionState::Init {
            self.state = SessionState::Connected;
        }
    }

    pub fn challenge(&mut self) {
        self.state = SessionState::Challenged;
    }

    pub fn authenticate(&mut self) {
        self.state = SessionState::Authenticated;
    }

    /// Terminal rejection, carrying the event to deliver to the client.
    pub fn reject(&mut self, event: EgressEvent) {
        self.state = SessionState::Rejected;
        self.rejection = Some(event);
    }

    /// The event owed to a rejected client.
    pub fn rejection_event(&self) -> EgressEvent {
        self.rejection.clone().unwrap_or(EgressEvent::AuthenticationRejected {
            detail: SESSION_REJECTED_DETAIL.to_owned(),
        })
    }

    /// Connected-session record is in the log; the session is live.
    pub fn open(&mut self) {
        self.state = SessionState::Open;
    }

    /// Demote an authenticated session whose log append was refused; the
    /// active-map retry path picks it up next tick.
    pub fn retry_connect(&mut self) {
        self.state = SessionState::Connected;
    }

    /// Inactivity expiry observed; the closed-session record is still owed.
    pub fn timed_out(&mut self) {
        self.state = SessionState::TimedOut;
        self.close_reason = CloseReason::Timeout;
    }

    /// Close requested; the closed-session record is still owed.
    pub fn closing(&mut self, reason: CloseReason) {
        self.state = SessionState::Closed;
        self.close_reason = reason;
    }

    /// Final teardown once no further record is owed.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
