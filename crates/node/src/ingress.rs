// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound frames from clients, delivered through a bounded channel and
//! drained non-blockingly by the sequencer's tick.
//!
//! Session messages use controlled acknowledgement: a frame the log refused
//! is parked in a deferred slot and re-offered verbatim before any newer
//! frame, so retries preserve fragment identity.

use bytes::Bytes;
use tokio::sync::mpsc;

/// One inbound frame. Every frame carries the client's correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressEvent {
    SessionConnect {
        correlation_id: u64,
        response_stream_id: i32,
        response_channel: String,
        credentials: Bytes,
    },
    SessionClose {
        cluster_session_id: u64,
    },
    SessionMessage {
        cluster_session_id: u64,
        correlation_id: u64,
        payload: Bytes,
    },
    KeepAlive {
        correlation_id: u64,
        cluster_session_id: u64,
    },
    ChallengeResponse {
        correlation_id: u64,
        cluster_session_id: u64,
        credentials: Bytes,
    },
    ScheduleTimer {
        correlation_id: u64,
        deadline_ms: u64,
    },
    CancelTimer {
        correlation_id: u64,
    },
}

/// Result of dispatching one session message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlledAck {
    /// Accepted, or the session is gone — advance past the frame.
    Continue,
    /// The log append refused — re-offer the same frame next poll.
    Abort,
}

/// Channel-fed ingress with a single deferred-frame slot.
#[derive(Debug)]
pub struct IngressAdapter {
    rx: mpsc::Receiver<IngressEvent>,
    deferred: Option<IngressEvent>,
}

impl IngressAdapter {
    pub fn new(rx: mpsc::Receiver<IngressEvent>) -> Self {
        Self { rx, deferred: None }
    }

    /// Bounded channel plus adapter, for wiring and tests.
    pub fn channel(capacity: usize) -> (mpsc::Sender<IngressEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    /// Next frame to dispatch: the deferred frame first, then the channel.
    /// Never blocks.
    pub fn next_frame(&mut self) -> Option<IngressEvent> {
        if let Some(frame) = self.deferred.take() {
            return Some(frame);
        }
        self.rx.try_recv().ok()
    }

    /// Park a frame for re-offer. At most one frame is ever deferred: the
    /// poll loop stops on the first ABORT.
    pub fn defer(&mut self, frame: IngressEvent) {
        debug_assert!(self.deferred.is_none());
        self.deferred = Some(frame);
    }

    /// Stop accepting new frames; already-buffered frames still drain.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod tests;
