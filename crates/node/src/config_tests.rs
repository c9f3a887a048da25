// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use crate::test_support::AnyhowExt;

fn parse(args: &[&str]) -> anyhow::Result<Config> {
    let mut full = vec!["sequin"];
    full.extend_from_slice(args);
    Config::try_parse_from(full).anyhow()
}

#[test]
fn defaults_validate() -> anyhow::Result<()> {
    let config = parse(&[])?;
    config.validate()?;
    assert_eq!(config.max_sessions, 64);
    assert_eq!(config.session_timeout_ms, 10_000);
    assert_eq!(config.service_count, 1);
    Ok(())
}

#[yare::parameterized(
    zero_sessions = { &["--max-sessions", "0"], "--max-sessions" },
    zero_timeout = { &["--session-timeout-ms", "0"], "--session-timeout-ms" },
    zero_services = { &["--service-count", "0"], "--service-count" },
    zero_capacity = { &["--ingress-capacity", "0"], "--ingress-capacity" },
    bad_format = { &["--log-format", "yaml"], "invalid log format" },
)]
fn invalid_values_fail_validation(args: &[&str], expected: &str) {
    let result = parse(args).and_then(|config| config.validate());
    let msg = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert!(msg.contains(expected), "got: {msg:?}");
}

#[test]
fn log_path_is_inside_log_dir() -> anyhow::Result<()> {
    let config = parse(&["--log-dir", "/var/lib/sequin"])?;
    assert_eq!(config.log_path(), std::path::PathBuf::from("/var/lib/sequin/log.jsonl"));
    Ok(())
}

#[test]
fn json_log_format_is_accepted() -> anyhow::Result<()> {
    let config = parse(&["--log-format", "json"])?;
    config.validate()?;
    Ok(())
}
