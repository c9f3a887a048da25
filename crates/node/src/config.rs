// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Consensus-cluster leader sequencer.
#[derive(Debug, Parser)]
#[command(name = "sequin", version, about)]
pub struct Config {
    /// Maximum concurrent sessions (pending plus active).
    #[arg(long, env = "SEQUIN_MAX_SESSIONS", default_value = "64")]
    pub max_sessions: usize,

    /// Session inactivity timeout in milliseconds.
    #[arg(long, env = "SEQUIN_SESSION_TIMEOUT_MS", default_value = "10000")]
    pub session_timeout_ms: u64,

    /// Number of downstream services that must signal readiness.
    #[arg(long, env = "SEQUIN_SERVICE_COUNT", default_value = "1")]
    pub service_count: u32,

    /// Directory for the JSONL log.
    #[arg(long, env = "SEQUIN_LOG_DIR", default_value = "sequin-data")]
    pub log_dir: PathBuf,

    /// Ingress channel capacity.
    #[arg(long, env = "SEQUIN_INGRESS_CAPACITY", default_value = "1024")]
    pub ingress_capacity: usize,

    /// Log format (json or text).
    #[arg(long, env = "SEQUIN_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "SEQUIN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_sessions == 0 {
            anyhow::bail!("--max-sessions must be at least 1");
        }
        if self.session_timeout_ms == 0 {
            anyhow::bail!("--session-timeout-ms must be at least 1");
        }
        if self.service_count == 0 {
            anyhow::bail!("--service-count must be at least 1");
        }
        if self.ingress_capacity == 0 {
            anyhow::bail!("--ingress-capacity must be at least 1");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    /// Path of the JSONL log file inside `log_dir`.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join("log.jsonl")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
