// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use crate::control::ClusterAction;

#[test]
fn display_names_the_offending_code() {
    let err = SequencerError::UnknownToggleCode(42);
    assert!(err.to_string().contains("42"));
}

#[test]
fn display_names_state_and_toggle() {
    let err = SequencerError::InvalidToggle {
        state: SequencerState::Suspended,
        toggle: ToggleMode::Snapshot,
    };
    let msg = err.to_string();
    assert!(msg.contains("suspended"), "got: {msg}");
    assert!(msg.contains("snapshot"), "got: {msg}");
}

#[test]
fn display_names_state_and_ack() {
    let err = SequencerError::UnexpectedAck {
        state: SequencerState::Active,
        ack: ServiceAck::Action(ClusterAction::Shutdown),
    };
    let msg = err.to_string();
    assert!(msg.contains("active"), "got: {msg}");
    assert!(msg.contains("shutdown-complete"), "got: {msg}");
}

#[test]
fn display_names_the_overflow_counts() {
    let err = SequencerError::ServicesReadyOverflow { acked: 3, expected: 2 };
    let msg = err.to_string();
    assert!(msg.contains('3'), "got: {msg}");
    assert!(msg.contains('2'), "got: {msg}");
}
