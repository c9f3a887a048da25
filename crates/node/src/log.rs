// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The replicated log seam: record kinds, the non-blocking append contract,
//! the message index, and a file-backed JSONL appender for standalone runs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::control::ClusterAction;
use crate::session::CloseReason;

/// One record in the replicated log, in total order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogRecord {
    ConnectedSession {
        session_id: u64,
        correlation_id: u64,
        response_stream_id: i32,
        response_channel: String,
        timestamp_ms: u64,
    },
    ClosedSession {
        session_id: u64,
        reason: CloseReason,
        timestamp_ms: u64,
    },
    ClientMessage {
        session_id: u64,
        correlation_id: u64,
        payload: Bytes,
        timestamp_ms: u64,
    },
    TimerEvent {
        correlation_id: u64,
        timestamp_ms: u64,
    },
    ActionRequest {
        action: ClusterAction,
        timestamp_ms: u64,
    },
}

/// Non-blocking append to the replicated log.
///
/// A refusal means "try again next tick" — the tick cadence is the back-off.
pub trait LogAppender: Send {
    fn try_append(&mut self, record: &LogRecord) -> bool;
}

/// Monotonic count of records this node has appended, incremented exactly
/// once per successful append with release semantics so downstream observers
/// see the log write before the new index.
#[derive(Debug, Clone, Default)]
pub struct MessageIndex {
    value: Arc<AtomicU64>,
}

impl MessageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Release);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

/// File-backed append-only log writing one JSON record per line.
///
/// Stands in for the replicated log transport in standalone runs. An append
/// that fails at the filesystem reports refusal and the tick retries; nothing
/// is buffered in memory.
#[derive(Debug)]
pub struct JsonlLogAppender {
    path: PathBuf,
}

impl JsonlLogAppender {
    /// Create an appender writing to `path`. The parent directory is created
    /// best-effort; a missing directory surfaces as append refusals.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogAppender for JsonlLogAppender {
    fn try_append(&mut self, record: &LogRecord) -> bool {
        let Ok(mut line) = serde_json::to_string(record) else {
            return false;
        };
        line.push('\n');
        let Ok(mut file) =
            std::fs::OpenOptions::new().create(true).append(true).open(&self.path)
        else {
            return false;
        };
        file.write_all(line.as_bytes()).is_ok()
    }
}

/// Read every record from a JSONL log file, skipping unparseable lines.
pub fn read_records(path: &Path) -> Vec<LogRecord> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return vec![];
    };
    contents.lines().filter_map(|line| serde_json::from_str::<LogRecord>(line).ok()).collect()
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
