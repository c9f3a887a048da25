// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node wiring and the duty-cycle loop — shared by `main` and the
//! integration tests.
//!
//! The sequencer runs on a dedicated thread, sleeping briefly whenever a tick
//! performs no work. The async side owns the control plane: ctrl-c requests
//! SHUTDOWN through the control toggle, a second ctrl-c escalates to ABORT,
//! and a loopback service task stands in for the service container so a
//! standalone node completes the full lifecycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::clock::CachedClock;
use crate::config::Config;
use crate::control::{ControlToggle, ToggleMode};
use crate::egress::TracingEgress;
use crate::error::SequencerError;
use crate::ingress::{IngressAdapter, IngressEvent};
use crate::log::{self, JsonlLogAppender, LogRecord, MessageIndex};
use crate::sequencer::{Sequencer, SequencerConfig, SequencerState};
use crate::service::{ServiceAck, ServiceAdapter};

/// Sleep when a tick performs zero units of work.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);
/// Cadence of the loopback service's log tail.
const LOOPBACK_POLL: Duration = Duration::from_millis(25);
/// Bound on buffered service acknowledgements.
const SERVICE_ACK_CAPACITY: usize = 64;

/// A running node: the agent thread plus the handles the host needs.
pub struct Node {
    pub ingress_tx: mpsc::Sender<IngressEvent>,
    pub services_tx: mpsc::Sender<ServiceAck>,
    pub control: Arc<ControlToggle>,
    pub shutdown: CancellationToken,
    pub message_index: MessageIndex,
    pub cached_clock: CachedClock,
    agent: std::thread::JoinHandle<Result<(), SequencerError>>,
}

impl Node {
    /// Wait for the agent thread to finish.
    pub fn join(self) -> anyhow::Result<()> {
        match self.agent.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => anyhow::bail!("sequencer thread panicked"),
        }
    }
}

/// Wire the sequencer and start its duty-cycle thread.
pub fn start(config: &Config) -> anyhow::Result<Node> {
    let (ingress_tx, ingress) = IngressAdapter::channel(config.ingress_capacity);
    let (services_tx, services) = ServiceAdapter::channel(SERVICE_ACK_CAPACITY);
    let control = Arc::new(ControlToggle::new());
    let shutdown = CancellationToken::new();

    let appender = JsonlLogAppender::new(config.log_path());
    let mut sequencer = Sequencer::new(
        SequencerConfig::new(appender, TracingEgress, ingress, services)
            .with_limits(config.max_sessions, config.session_timeout_ms)
            .with_service_count(config.service_count)
            .with_control_toggle(Arc::clone(&control))
            .with_shutdown(shutdown.clone()),
    );
    let message_index = sequencer.message_index();
    let cached_clock = sequencer.cached_clock();

    let agent = std::thread::Builder::new().name("sequencer".to_owned()).spawn(move || {
        loop {
            let work = match sequencer.work() {
                Ok(n) => n,
                Err(e) => {
                    error!("sequencer contract violation: {e}");
                    return Err(e);
                }
            };
            if sequencer.state() == SequencerState::Closed {
                return Ok(());
            }
            if work == 0 {
                std::thread::sleep(IDLE_BACKOFF);
            }
        }
    })?;

    Ok(Node {
        ingress_tx,
        services_tx,
        control,
        shutdown,
        message_index,
        cached_clock,
        agent,
    })
}

/// Run a node until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let node = start(&config)?;
    info!(log = %config.log_path().display(), "sequin node started");

    tokio::spawn(loopback_service(
        config.log_path(),
        node.services_tx.clone(),
        config.service_count,
        node.shutdown.clone(),
    ));

    let shutdown = node.shutdown.clone();
    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutdown requested");
            let _ = node.control.request(ToggleMode::Shutdown);
            tokio::select! {
                _ = shutdown.cancelled() => {}
                result = tokio::signal::ctrl_c() => {
                    result?;
                    warn!("abort requested");
                    node.control.abort();
                    shutdown.cancelled().await;
                }
            }
        }
    }

    node.join()
}

/// Stand-in for the service container on standalone nodes: announces
/// readiness for each configured service, then tails the log and
/// acknowledges each requested action once.
async fn loopback_service(
    log_path: PathBuf,
    acks: mpsc::Sender<ServiceAck>,
    service_count: u32,
    shutdown: CancellationToken,
) {
    for _ in 0..service_count {
        if acks.send(ServiceAck::Ready).await.is_err() {
            return;
        }
    }

    let mut acked = 0;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(LOOPBACK_POLL) => {}
        }

        let actions: Vec<_> = log::read_records(&log_path)
            .into_iter()
            .filter_map(|record| match record {
                LogRecord::ActionRequest { action, .. } => Some(action),
                _ => None,
            })
            .collect();

        for action in actions.into_iter().skip(acked) {
            if acks.send(ServiceAck::Action(action)).await.is_err() {
                return;
            }
            acked += 1;
        }
    }
}
