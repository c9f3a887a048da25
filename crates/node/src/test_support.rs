// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: recording collaborators, a manual clock, stub
//! authenticators, and a sequencer builder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::{AllowAll, Authenticator, AuthProxy};
use crate::clock::EpochClock;
use crate::control::ControlToggle;
use crate::egress::{EgressEvent, EgressPublisher};
use crate::error::SequencerError;
use crate::ingress::{IngressAdapter, IngressEvent};
use crate::log::{LogAppender, LogRecord};
use crate::sequencer::{Sequencer, SequencerConfig};
use crate::service::{ServiceAck, ServiceAdapter};
use crate::session::ClusterSession;

/// Extension trait to convert any `Display` error into `anyhow::Error`.
/// Replaces `.map_err(|e| anyhow::anyhow!("{e}"))` with `.anyhow()`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

// -- recording log ------------------------------------------------------------

#[derive(Debug, Default)]
struct RecordingLogInner {
    records: Vec<LogRecord>,
    refuse_next: usize,
    refuse_all: bool,
}

/// In-memory log appender with programmable refusals. Clones share state so
/// tests keep a handle while the sequencer owns the appender.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog {
    inner: Arc<Mutex<RecordingLogInner>>,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` appends, then accept again.
    pub fn refuse_next(&self, n: usize) {
        self.inner.lock().refuse_next = n;
    }

    /// Refuse every append until switched back.
    pub fn refuse_all(&self, refuse: bool) {
        self.inner.lock().refuse_all = refuse;
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.inner.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }
}

impl LogAppender for RecordingLog {
    fn try_append(&mut self, record: &LogRecord) -> bool {
        let mut inner = self.inner.lock();
        if inner.refuse_all {
            return false;
        }
        if inner.refuse_next > 0 {
            inner.refuse_next -= 1;
            return false;
        }
        inner.records.push(record.clone());
        true
    }
}

// -- recording egress ---------------------------------------------------------

#[derive(Debug)]
struct RecordingEgressInner {
    connected: bool,
    refuse_next: usize,
    refuse_all: bool,
    sent: Vec<(u64, EgressEvent)>,
}

/// In-memory egress publisher with programmable connectivity and refusals.
#[derive(Debug, Clone)]
pub struct RecordingEgress {
    inner: Arc<Mutex<RecordingEgressInner>>,
}

impl Default for RecordingEgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEgress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecordingEgressInner {
                connected: true,
                refuse_next: 0,
                refuse_all: false,
                sent: Vec::new(),
            })),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().connected = connected;
    }

    pub fn refuse_next(&self, n: usize) {
        self.inner.lock().refuse_next = n;
    }

    pub fn refuse_all(&self, refuse: bool) {
        self.inner.lock().refuse_all = refuse;
    }

    /// Events delivered so far, tagged with the session id.
    pub fn sent(&self) -> Vec<(u64, EgressEvent)> {
        self.inner.lock().sent.clone()
    }
}

impl EgressPublisher for RecordingEgress {
    fn is_connected(&self, _session: &ClusterSession) -> bool {
        self.inner.lock().connected
    }

    fn try_send(&mut self, session: &ClusterSession, event: &EgressEvent) -> bool {
        let mut inner = self.inner.lock();
        if inner.refuse_all {
            return false;
        }
        if inner.refuse_next > 0 {
            inner.refuse_next -= 1;
            return false;
        }
        inner.sent.push((session.id(), event.clone()));
        true
    }
}

// -- manual clock -------------------------------------------------------------

/// Hand-driven clock for deterministic ticks.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self { now_ms: Arc::new(AtomicU64::new(start_ms)) }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::Release);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }
}

impl EpochClock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }
}

// -- stub authenticators ------------------------------------------------------

/// Rejects every session at first processing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl Authenticator for RejectAll {
    fn on_connect_request(&mut self, _session_id: u64, _credentials: &Bytes, _now_ms: u64) {}

    fn on_challenge_response(&mut self, _session_id: u64, _credentials: &Bytes, _now_ms: u64) {}

    fn on_connected_session(&mut self, proxy: &mut AuthProxy<'_>, _now_ms: u64) {
        proxy.reject();
    }

    fn on_challenged_session(&mut self, proxy: &mut AuthProxy<'_>, _now_ms: u64) {
        proxy.reject();
    }
}

/// Never advances any session; pending entries age out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stalled;

impl Authenticator for Stalled {
    fn on_connect_request(&mut self, _session_id: u64, _credentials: &Bytes, _now_ms: u64) {}

    fn on_challenge_response(&mut self, _session_id: u64, _credentials: &Bytes, _now_ms: u64) {}

    fn on_connected_session(&mut self, _proxy: &mut AuthProxy<'_>, _now_ms: u64) {}

    fn on_challenged_session(&mut self, _proxy: &mut AuthProxy<'_>, _now_ms: u64) {}
}

/// Challenges once and authenticates when the response matches `expected`.
#[derive(Debug, Clone)]
pub struct ChallengeAuthenticator {
    challenge: Bytes,
    expected: Bytes,
    responses: Arc<Mutex<HashMap<u64, Bytes>>>,
}

impl ChallengeAuthenticator {
    pub fn new(challenge: impl Into<Bytes>, expected: impl Into<Bytes>) -> Self {
        Self {
            challenge: challenge.into(),
            expected: expected.into(),
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Authenticator for ChallengeAuthenticator {
    fn on_connect_request(&mut self, _session_id: u64, _credentials: &Bytes, _now_ms: u64) {}

    fn on_challenge_response(&mut self, session_id: u64, credentials: &Bytes, _now_ms: u64) {
        self.responses.lock().insert(session_id, credentials.clone());
    }

    fn on_connected_session(&mut self, proxy: &mut AuthProxy<'_>, _now_ms: u64) {
        let _ = proxy.challenge(self.challenge.clone());
    }

    fn on_challenged_session(&mut self, proxy: &mut AuthProxy<'_>, _now_ms: u64) {
        let response = self.responses.lock().get(&proxy.session_id()).cloned();
        if let Some(response) = response {
            if response == self.expected {
                proxy.authenticate();
            } else {
                proxy.reject();
            }
        }
    }
}

// -- sequencer builder --------------------------------------------------------

/// A wired sequencer plus every handle a test needs to drive and observe it.
pub struct SequencerCtx {
    pub sequencer: Sequencer,
    pub ingress_tx: mpsc::Sender<IngressEvent>,
    pub services_tx: mpsc::Sender<ServiceAck>,
    pub control: Arc<ControlToggle>,
    pub shutdown: CancellationToken,
    pub clock: ManualClock,
    pub log: RecordingLog,
    pub egress: RecordingEgress,
}

impl SequencerCtx {
    pub fn work(&mut self) -> Result<usize, SequencerError> {
        self.sequencer.work()
    }

    /// Enqueue an ingress frame without awaiting.
    pub fn send_ingress(&self, event: IngressEvent) -> anyhow::Result<()> {
        self.ingress_tx.try_send(event).anyhow()
    }

    /// Enqueue a service acknowledgement without awaiting.
    pub fn send_ack(&self, ack: ServiceAck) -> anyhow::Result<()> {
        self.services_tx.try_send(ack).anyhow()
    }

    /// Enqueue a connect request with fixed stream id and empty credentials.
    pub fn connect(&self, correlation_id: u64, channel: &str) -> anyhow::Result<()> {
        self.send_ingress(IngressEvent::SessionConnect {
            correlation_id,
            response_stream_id: 1,
            response_channel: channel.to_owned(),
            credentials: Bytes::new(),
        })
    }
}

/// Builder for constructing a [`Sequencer`] in tests with sensible defaults.
///
/// `service_count` defaults to 0 so the sequencer constructs directly into
/// ACTIVE; startup tests override it and drive READY acks themselves.
pub struct SequencerBuilder {
    max_sessions: usize,
    session_timeout_ms: u64,
    service_count: u32,
    start_ms: u64,
    authenticator: Option<Box<dyn Authenticator>>,
}

impl Default for SequencerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequencerBuilder {
    pub fn new() -> Self {
        Self {
            max_sessions: 4,
            session_timeout_ms: 1_000,
            service_count: 0,
            start_ms: 0,
            authenticator: None,
        }
    }

    pub fn max_sessions(mut self, n: usize) -> Self {
        self.max_sessions = n;
        self
    }

    pub fn session_timeout_ms(mut self, ms: u64) -> Self {
        self.session_timeout_ms = ms;
        self
    }

    pub fn service_count(mut self, n: u32) -> Self {
        self.service_count = n;
        self
    }

    pub fn start_ms(mut self, ms: u64) -> Self {
        self.start_ms = ms;
        self
    }

    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Box::new(authenticator));
        self
    }

    pub fn build(self) -> SequencerCtx {
        let (ingress_tx, ingress) = IngressAdapter::channel(64);
        let (services_tx, services) = ServiceAdapter::channel(64);
        let control = Arc::new(ControlToggle::new());
        let shutdown = CancellationToken::new();
        let clock = ManualClock::new(self.start_ms);
        let log = RecordingLog::new();
        let egress = RecordingEgress::new();

        let mut config = SequencerConfig::new(log.clone(), egress.clone(), ingress, services)
            .with_clock(clock.clone())
            .with_limits(self.max_sessions, self.session_timeout_ms)
            .with_service_count(self.service_count)
            .with_control_toggle(Arc::clone(&control))
            .with_shutdown(shutdown.clone());
        config.authenticator = self.authenticator.unwrap_or_else(|| Box::new(AllowAll));

        SequencerCtx {
            sequencer: Sequencer::new(config),
            ingress_tx,
            services_tx,
            control,
            shutdown,
            clock,
            log,
            egress,
        }
    }
}
