// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator control plane: the shared control toggle and the action codes
//! that flow through the replicated log.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::SequencerError;

/// Mode-change commands an operator can inject through the control toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleMode {
    Neutral,
    Suspend,
    Resume,
    Snapshot,
    Shutdown,
    Abort,
}

impl ToggleMode {
    pub fn code(self) -> u64 {
        match self {
            Self::Neutral => 0,
            Self::Suspend => 1,
            Self::Resume => 2,
            Self::Snapshot => 3,
            Self::Shutdown => 4,
            Self::Abort => 5,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Neutral),
            1 => Some(Self::Suspend),
            2 => Some(Self::Resume),
            3 => Some(Self::Snapshot),
            4 => Some(Self::Shutdown),
            5 => Some(Self::Abort),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Snapshot => "snapshot",
            Self::Shutdown => "shutdown",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for ToggleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions the sequencer requests from downstream services via the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterAction {
    Snapshot,
    Shutdown,
    Abort,
}

impl ClusterAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Shutdown => "shutdown",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for ClusterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared 64-bit counter operators use to request a mode change.
///
/// The only datum written by threads other than the agent. Requests use
/// compare-and-swap from NEUTRAL so concurrent operators cannot clobber each
/// other; the agent resets the toggle once it has applied the command.
#[derive(Debug, Default)]
pub struct ControlToggle {
    value: AtomicU64,
}

impl ControlToggle {
    pub fn new() -> Self {
        Self { value: AtomicU64::new(ToggleMode::Neutral.code()) }
    }

    /// Request a mode change. Returns false if another command is pending.
    pub fn request(&self, mode: ToggleMode) -> bool {
        self.value
            .compare_exchange(
                ToggleMode::Neutral.code(),
                mode.code(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Force ABORT regardless of any pending command.
    pub fn abort(&self) {
        self.value.store(ToggleMode::Abort.code(), Ordering::Release);
    }

    /// Read the current command. An unknown code is a contract violation.
    pub fn load(&self) -> Result<ToggleMode, SequencerError> {
        let code = self.value.load(Ordering::Acquire);
        ToggleMode::from_code(code).ok_or(SequencerError::UnknownToggleCode(code))
    }

    /// Test-only injection of an arbitrary code, to pin the fatal path.
    #[cfg(test)]
    pub(crate) fn set_raw(&self, code: u64) {
        self.value.store(code, Ordering::Release);
    }

    /// Reset the toggle back to NEUTRAL if it still holds `expected`.
    pub(crate) fn reset(&self, expected: ToggleMode) {
        let _ = self.value.compare_exchange(
            expected.code(),
            ToggleMode::Neutral.code(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
