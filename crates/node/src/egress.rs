// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound events to a session's response channel.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::ClusterSession;

/// Detail for sessions bounced by the concurrent-session limit.
pub const SESSION_LIMIT_DETAIL: &str = "Concurrent session limit";
/// Detail for sessions torn down by the inactivity timeout.
pub const SESSION_TIMEOUT_DETAIL: &str = "Session inactive";
/// Detail for sessions the authenticator refused.
pub const SESSION_REJECTED_DETAIL: &str = "Session failed authentication";

/// Events emitted to clients, tagged with the delivery kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EgressEvent {
    AuthenticationRejected { detail: String },
    Error { detail: String },
    Challenge { data: Bytes },
}

/// Non-blocking publisher for a session's response channel.
///
/// `try_send` is best-effort: a refusal means the event could not be
/// delivered now, and the caller decides whether to retry or drop.
pub trait EgressPublisher: Send {
    /// Whether the session's response publication is up.
    fn is_connected(&self, session: &ClusterSession) -> bool;

    /// Attempt to deliver one event. Never blocks.
    fn try_send(&mut self, session: &ClusterSession, event: &EgressEvent) -> bool;
}

/// Egress for standalone runs with no wire transport: always connected,
/// every event is emitted to the log stream instead of a client.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEgress;

impl EgressPublisher for TracingEgress {
    fn is_connected(&self, _session: &ClusterSession) -> bool {
        true
    }

    fn try_send(&mut self, session: &ClusterSession, event: &EgressEvent) -> bool {
        debug!(
            session_id = session.id(),
            channel = session.response_channel(),
            event = ?event,
            "egress"
        );
        true
    }
}

#[cfg(test)]
#[path = "egress_tests.rs"]
mod tests;
