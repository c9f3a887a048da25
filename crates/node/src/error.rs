// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use crate::control::ToggleMode;
use crate::sequencer::SequencerState;
use crate::service::ServiceAck;

/// Fatal contract violations surfaced by the sequencer agent.
///
/// Everything else in the tick protocol is a boolean the loop retries;
/// these terminate the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerError {
    /// The control toggle held a code outside the known set.
    UnknownToggleCode(u64),
    /// A toggle command arrived in a state that cannot honor it.
    InvalidToggle { state: SequencerState, toggle: ToggleMode },
    /// A service acknowledgement arrived in a state that does not expect it.
    UnexpectedAck { state: SequencerState, ack: ServiceAck },
    /// More READY acknowledgements than configured services.
    ServicesReadyOverflow { acked: u32, expected: u32 },
}

impl fmt::Display for SequencerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownToggleCode(code) => {
                write!(f, "unknown control toggle code: {code}")
            }
            Self::InvalidToggle { state, toggle } => {
                write!(f, "invalid control toggle {toggle} in state {state}")
            }
            Self::UnexpectedAck { state, ack } => {
                write!(f, "unexpected service ack {ack} in state {state}")
            }
            Self::ServicesReadyOverflow { acked, expected } => {
                write!(f, "services ready overflow: {acked} acks for {expected} services")
            }
        }
    }
}

impl std::error::Error for SequencerError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
