// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end node specs.
//!
//! Starts a fully wired node (JSONL log, duty-cycle thread, channel
//! adapters) in a temp directory and observes it the way an operator would:
//! through the log file, the message index, and the shutdown barrier.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tempfile::TempDir;

use sequin::config::Config;
use sequin::log::{read_records, LogRecord};
use sequin::run::{self, Node};

/// How often the harness re-reads the log while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A running node backed by a temp directory, stopped by the test.
pub struct NodeHarness {
    pub node: Node,
    pub log_path: PathBuf,
    _dir: TempDir,
}

impl NodeHarness {
    /// Start a node with the stock configuration (one service).
    pub fn start() -> anyhow::Result<Self> {
        Self::start_with(&[])
    }

    /// Start a node with extra CLI arguments layered over the defaults.
    pub fn start_with(args: &[&str]) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let log_dir = dir.path().join("log");
        let log_dir_arg = log_dir
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("non-utf8 temp dir"))?
            .to_owned();

        let mut full = vec!["sequin".to_owned(), "--log-dir".to_owned(), log_dir_arg];
        full.extend(args.iter().map(|s| (*s).to_owned()));

        let config = Config::try_parse_from(full)?;
        config.validate()?;
        let node = run::start(&config)?;

        Ok(Self { node, log_path: config.log_path(), _dir: dir })
    }

    pub fn records(&self) -> Vec<LogRecord> {
        read_records(&self.log_path)
    }

    /// Wait until some log record satisfies `pred`.
    pub async fn wait_for_record(
        &self,
        timeout: Duration,
        pred: impl Fn(&LogRecord) -> bool,
    ) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.records().iter().any(&pred) {
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("expected log record not observed within {timeout:?}");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for the shutdown barrier.
    pub async fn wait_shutdown(&self, timeout: Duration) -> anyhow::Result<()> {
        tokio::time::timeout(timeout, self.node.shutdown.cancelled())
            .await
            .map_err(|_| anyhow::anyhow!("shutdown barrier not signalled within {timeout:?}"))
    }

    /// Wait for the agent thread to exit.
    pub fn join(self) -> anyhow::Result<()> {
        self.node.join()
    }
}
