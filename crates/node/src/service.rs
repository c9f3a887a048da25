// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Acknowledgements from downstream services, delivered through a bounded
//! channel and drained non-blockingly by the sequencer's tick.

use std::fmt;

use tokio::sync::mpsc;

use crate::control::ClusterAction;

/// One acknowledgement from the service side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAck {
    /// A service finished start-up and can consume the log.
    Ready,
    /// A service completed the named requested action.
    Action(ClusterAction),
}

impl fmt::Display for ServiceAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::Action(action) => write!(f, "{action}-complete"),
        }
    }
}

/// Channel-fed service acknowledgement adapter.
#[derive(Debug)]
pub struct ServiceAdapter {
    rx: mpsc::Receiver<ServiceAck>,
}

impl ServiceAdapter {
    pub fn new(rx: mpsc::Receiver<ServiceAck>) -> Self {
        Self { rx }
    }

    /// Bounded channel plus adapter, for wiring and tests.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ServiceAck>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    /// Next pending acknowledgement, if any. Never blocks.
    pub fn poll_next(&mut self) -> Option<ServiceAck> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new acknowledgements.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
