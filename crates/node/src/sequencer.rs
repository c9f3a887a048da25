// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sequencer agent: single-threaded serialization point of the leader
//! node.
//!
//! One `work()` tick sweeps every input source in a fixed order — control
//! toggle, service acks, pending sessions, timers, ingress, session aging,
//! rejected drain — so the order records reach the log is a deterministic
//! function of arrival order and tick boundaries. Nothing in a tick blocks;
//! any collaborator that cannot make progress reports refusal and is retried
//! next tick.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::{Authenticator, AuthProxy};
use crate::clock::{CachedClock, EpochClock};
use crate::control::{ClusterAction, ControlToggle, ToggleMode};
use crate::egress::{EgressEvent, EgressPublisher, SESSION_LIMIT_DETAIL, SESSION_TIMEOUT_DETAIL};
use crate::error::SequencerError;
use crate::ingress::{ControlledAck, IngressAdapter, IngressEvent};
use crate::log::{LogAppender, LogRecord, MessageIndex};
use crate::service::{ServiceAck, ServiceAdapter};
use crate::session::{CloseReason, ClusterSession, SessionState};
use crate::timer::TimerService;

/// Ingress frames dispatched per tick before yielding to session aging.
const INGRESS_FRAGMENT_LIMIT: usize = 16;

/// Operational state of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Init,
    Active,
    Suspended,
    Snapshot,
    Shutdown,
    Abort,
    Closed,
}

impl SequencerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Snapshot => "snapshot",
            Self::Shutdown => "shutdown",
            Self::Abort => "abort",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime objects for building a [`Sequencer`].
pub struct SequencerConfig {
    pub log: Box<dyn LogAppender>,
    pub egress: Box<dyn EgressPublisher>,
    pub authenticator: Box<dyn Authenticator>,
    pub clock: Box<dyn EpochClock>,
    pub ingress: IngressAdapter,
    pub services: ServiceAdapter,
    pub control_toggle: Arc<ControlToggle>,
    pub shutdown: CancellationToken,
    pub max_sessions: usize,
    pub session_timeout_ms: u64,
    pub service_count: u32,
}

impl SequencerConfig {
    pub fn new(
        log: impl LogAppender + 'static,
        egress: impl EgressPublisher + 'static,
        ingress: IngressAdapter,
        services: ServiceAdapter,
    ) -> Self {
        Self {
            log: Box::new(log),
            egress: Box::new(egress),
            authenticator: Box::new(crate::auth::AllowAll),
            clock: Box::new(crate::clock::SystemClock),
            ingress,
            services,
            control_toggle: Arc::new(ControlToggle::new()),
            shutdown: CancellationToken::new(),
            max_sessions: 64,
            session_timeout_ms: 10_000,
            service_count: 1,
        }
    }

    pub fn with_authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Box::new(authenticator);
        self
    }

    pub fn with_clock(mut self, clock: impl EpochClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_control_toggle(mut self, toggle: Arc<ControlToggle>) -> Self {
        self.control_toggle = toggle;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_limits(mut self, max_sessions: usize, session_timeout_ms: u64) -> Self {
        self.max_sessions = max_sessions;
        self.session_timeout_ms = session_timeout_ms;
        self
    }

    pub fn with_service_count(mut self, service_count: u32) -> Self {
        self.service_count = service_count;
        self
    }
}

/// The agent. Owns every collaborator; all callbacks run on the tick thread.
pub struct Sequencer {
    log: Box<dyn LogAppender>,
    egress: Box<dyn EgressPublisher>,
    authenticator: Box<dyn Authenticator>,
    clock: Box<dyn EpochClock>,
    cached_clock: CachedClock,
    ingress: IngressAdapter,
    services: ServiceAdapter,
    timers: TimerService,
    control_toggle: Arc<ControlToggle>,
    shutdown: CancellationToken,
    message_index: MessageIndex,
    max_sessions: usize,
    session_timeout_ms: u64,
    service_count: u32,
    services_ready: u32,
    state: SequencerState,
    next_session_id: u64,
    pending: Vec<ClusterSession>,
    active: IndexMap<u64, ClusterSession>,
    rejected: Vec<ClusterSession>,
}

impl Sequencer {
    pub fn new(config: SequencerConfig) -> Self {
        let SequencerConfig {
            log,
            egress,
            authenticator,
            clock,
            ingress,
            services,
            control_toggle,
            shutdown,
            max_sessions,
            session_timeout_ms,
            service_count,
        } = config;

        let state =
            if service_count == 0 { SequencerState::Active } else { SequencerState::Init };

        Self {
            log,
            egress,
            authenticator,
            clock,
            cached_clock: CachedClock::new(),
            ingress,
            services,
            timers: TimerService::new(),
            control_toggle,
            shutdown,
            message_index: MessageIndex::new(),
            max_sessions,
            session_timeout_ms,
            service_count,
            services_ready: 0,
            state,
            next_session_id: 1,
            pending: Vec::new(),
            active: IndexMap::new(),
            rejected: Vec::new(),
        }
    }

    /// One tick. Returns the units of work performed so the host can back
    /// off when idle; an error is a fatal contract violation.
    pub fn work(&mut self) -> Result<usize, SequencerError> {
        if self.state == SequencerState::Closed {
            return Ok(0);
        }

        let now = self.cached_clock.advance_to(self.clock.now_ms());
        let mut work = 0;

        work += self.check_control_toggle(now)?;
        work += self.poll_services(now)?;

        if self.state == SequencerState::Active {
            work += self.process_pending_sessions(now);
            work += self.poll_timers(now);
            work += self.poll_ingress(now);
            work += self.check_sessions(now);
        }

        work += self.process_rejected_sessions(now);

        Ok(work)
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn services_ready(&self) -> u32 {
        self.services_ready
    }

    /// Observer handle for the message index.
    pub fn message_index(&self) -> MessageIndex {
        self.message_index.clone()
    }

    /// Observer handle for the per-tick cached clock.
    pub fn cached_clock(&self) -> CachedClock {
        self.cached_clock.clone()
    }

    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    pub fn pending_ids(&self) -> Vec<u64> {
        self.pending.iter().map(ClusterSession::id).collect()
    }

    pub fn active_ids(&self) -> Vec<u64> {
        self.active.keys().copied().collect()
    }

    pub fn rejected_ids(&self) -> Vec<u64> {
        self.rejected.iter().map(ClusterSession::id).collect()
    }

    pub fn active_session_state(&self, session_id: u64) -> Option<SessionState> {
        self.active.get(&session_id).map(ClusterSession::state)
    }

    // -- control toggle -------------------------------------------------------

    fn check_control_toggle(&mut self, now: u64) -> Result<usize, SequencerError> {
        let toggle = self.control_toggle.load()?;
        match (self.state, toggle) {
            (_, ToggleMode::Neutral) => Ok(0),
            // ABORT stays set until the abort ack arrives; re-reading it in
            // ABORT state is the steady state, not a violation.
            (SequencerState::Abort, ToggleMode::Abort) => Ok(0),
            (_, ToggleMode::Abort) => {
                if self.append_action(ClusterAction::Abort, now) {
                    self.transition(SequencerState::Abort);
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
            (SequencerState::Active, ToggleMode::Snapshot) => {
                if self.append_action(ClusterAction::Snapshot, now) {
                    self.transition(SequencerState::Snapshot);
                    self.control_toggle.reset(ToggleMode::Snapshot);
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
            (SequencerState::Active, ToggleMode::Shutdown) => {
                if self.append_action(ClusterAction::Shutdown, now) {
                    self.transition(SequencerState::Shutdown);
                    self.control_toggle.reset(ToggleMode::Shutdown);
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
            (SequencerState::Active, ToggleMode::Suspend) => {
                self.transition(SequencerState::Suspended);
                self.control_toggle.reset(ToggleMode::Suspend);
                Ok(1)
            }
            (SequencerState::Suspended, ToggleMode::Resume) => {
                self.transition(SequencerState::Active);
                self.control_toggle.reset(ToggleMode::Resume);
                Ok(1)
            }
            (state, toggle) => Err(SequencerError::InvalidToggle { state, toggle }),
        }
    }

    fn append_action(&mut self, action: ClusterAction, now: u64) -> bool {
        let record = LogRecord::ActionRequest { action, timestamp_ms: now };
        if self.log.try_append(&record) {
            self.message_index.increment();
            true
        } else {
            false
        }
    }

    // -- service acknowledgements ---------------------------------------------

    fn poll_services(&mut self, now: u64) -> Result<usize, SequencerError> {
        let mut work = 0;
        while let Some(ack) = self.services.poll_next() {
            self.on_service_ack(ack, now)?;
            work += 1;
        }
        Ok(work)
    }

    fn on_service_ack(&mut self, ack: ServiceAck, _now: u64) -> Result<(), SequencerError> {
        match (self.state, ack) {
            (SequencerState::Init, ServiceAck::Ready) => {
                self.services_ready += 1;
                if self.services_ready > self.service_count {
                    return Err(SequencerError::ServicesReadyOverflow {
                        acked: self.services_ready,
                        expected: self.service_count,
                    });
                }
                if self.services_ready == self.service_count {
                    self.transition(SequencerState::Active);
                }
                Ok(())
            }
            (SequencerState::Snapshot, ServiceAck::Action(ClusterAction::Snapshot)) => {
                self.transition(SequencerState::Active);
                Ok(())
            }
            (SequencerState::Shutdown, ServiceAck::Action(ClusterAction::Shutdown))
            | (SequencerState::Abort, ServiceAck::Action(ClusterAction::Abort)) => {
                self.on_close();
                Ok(())
            }
            (state, ack) => Err(SequencerError::UnexpectedAck { state, ack }),
        }
    }

    // -- pending sessions -----------------------------------------------------

    fn process_pending_sessions(&mut self, now: u64) -> usize {
        let timeout_ms = self.session_timeout_ms;
        let Self { pending, active, rejected, egress, authenticator, log, message_index, .. } =
            self;
        let mut work = 0;

        // Newest to oldest so swap_remove never skips an unvisited entry.
        let mut i = pending.len();
        while i > 0 {
            i -= 1;

            {
                // One state-keyed upcall per session per tick: a session
                // challenged here waits for the next tick to be processed
                // as CHALLENGED.
                let session = &mut pending[i];
                match session.state() {
                    SessionState::Init | SessionState::Connected
                        if egress.is_connected(session) =>
                    {
                        session.mark_connected();
                        let mut proxy = AuthProxy::new(session, egress.as_mut());
                        authenticator.on_connected_session(&mut proxy, now);
                    }
                    SessionState::Challenged if egress.is_connected(session) => {
                        let mut proxy = AuthProxy::new(session, egress.as_mut());
                        authenticator.on_challenged_session(&mut proxy, now);
                    }
                    _ => {}
                }
            }

            match pending[i].state() {
                SessionState::Authenticated => {
                    let mut session = pending.swap_remove(i);
                    session.record_activity(now);
                    // Demote first: a refused append leaves the session in
                    // CONNECTED for the active-map retry path.
                    session.retry_connect();
                    append_connected_session(
                        log.as_mut(),
                        message_index,
                        &mut session,
                        now,
                    );
                    active.insert(session.id(), session);
                    work += 1;
                }
                SessionState::Rejected => {
                    let session = pending.swap_remove(i);
                    rejected.push(session);
                    work += 1;
                }
                _ => {
                    if pending[i].has_timed_out(now, timeout_ms) {
                        let mut session = pending.swap_remove(i);
                        debug!(session_id = session.id(), "pending session timed out");
                        session.close();
                        work += 1;
                    }
                }
            }
        }

        work
    }

    // -- timers ---------------------------------------------------------------

    fn poll_timers(&mut self, now: u64) -> usize {
        let Self { timers, log, message_index, .. } = self;
        timers.poll(now, |correlation_id| {
            let record = LogRecord::TimerEvent { correlation_id, timestamp_ms: now };
            if log.try_append(&record) {
                message_index.increment();
                true
            } else {
                false
            }
        })
    }

    // -- ingress --------------------------------------------------------------

    fn poll_ingress(&mut self, now: u64) -> usize {
        let mut work = 0;
        while work < INGRESS_FRAGMENT_LIMIT {
            let Some(frame) = self.ingress.next_frame() else {
                break;
            };
            match self.dispatch_ingress(frame, now) {
                None => work += 1,
                Some(frame) => {
                    self.ingress.defer(frame);
                    break;
                }
            }
        }
        work
    }

    /// Dispatch one frame. Returns the frame back when it must be re-offered
    /// (controlled ABORT).
    fn dispatch_ingress(&mut self, frame: IngressEvent, now: u64) -> Option<IngressEvent> {
        match frame {
            IngressEvent::SessionConnect {
                correlation_id,
                response_stream_id,
                response_channel,
                credentials,
            } => {
                self.on_session_connect(
                    correlation_id,
                    response_stream_id,
                    response_channel,
                    &credentials,
                    now,
                );
                None
            }
            IngressEvent::SessionClose { cluster_session_id } => {
                self.on_session_close(cluster_session_id, now);
                None
            }
            IngressEvent::SessionMessage { cluster_session_id, correlation_id, payload } => {
                match self.on_session_message(cluster_session_id, correlation_id, &payload, now) {
                    ControlledAck::Continue => None,
                    ControlledAck::Abort => Some(IngressEvent::SessionMessage {
                        cluster_session_id,
                        correlation_id,
                        payload,
                    }),
                }
            }
            IngressEvent::KeepAlive { correlation_id: _, cluster_session_id } => {
                self.on_keep_alive(cluster_session_id, now);
                None
            }
            IngressEvent::ChallengeResponse {
                correlation_id,
                cluster_session_id,
                credentials,
            } => {
                self.on_challenge_response(cluster_session_id, correlation_id, &credentials, now);
                None
            }
            IngressEvent::ScheduleTimer { correlation_id, deadline_ms } => {
                self.timers.schedule_timer(correlation_id, deadline_ms);
                None
            }
            IngressEvent::CancelTimer { correlation_id } => {
                self.timers.cancel_timer(correlation_id);
                None
            }
        }
    }

    fn on_session_connect(
        &mut self,
        correlation_id: u64,
        response_stream_id: i32,
        response_channel: String,
        credentials: &Bytes,
        now: u64,
    ) {
        let session_id = self.next_session_id;
        self.next_session_id += 1;

        let mut session =
            ClusterSession::new(session_id, correlation_id, response_stream_id, response_channel);
        session.record_activity(now);

        if self.pending.len() + self.active.len() >= self.max_sessions {
            debug!(session_id, "session rejected: concurrent session limit");
            session.reject(EgressEvent::Error { detail: SESSION_LIMIT_DETAIL.to_owned() });
            self.rejected.push(session);
        } else {
            self.authenticator.on_connect_request(session_id, credentials, now);
            self.pending.push(session);
        }
    }

    fn on_session_close(&mut self, cluster_session_id: u64, now: u64) {
        let Self { active, log, message_index, .. } = self;
        let Some(session) = active.get_mut(&cluster_session_id) else {
            return;
        };
        session.closing(CloseReason::UserAction);
        if append_closed_session(log.as_mut(), message_index, session, now) {
            active.swap_remove(&cluster_session_id);
        }
    }

    fn on_session_message(
        &mut self,
        cluster_session_id: u64,
        correlation_id: u64,
        payload: &Bytes,
        now: u64,
    ) -> ControlledAck {
        let Some(session) = self.active.get_mut(&cluster_session_id) else {
            // Session is gone; let ingress advance past the frame.
            return ControlledAck::Continue;
        };
        if session.state() != SessionState::Open {
            return ControlledAck::Continue;
        }
        let record = LogRecord::ClientMessage {
            session_id: cluster_session_id,
            correlation_id,
            payload: payload.clone(),
            timestamp_ms: now,
        };
        if self.log.try_append(&record) {
            self.message_index.increment();
            session.record_request(now, correlation_id);
            ControlledAck::Continue
        } else {
            ControlledAck::Abort
        }
    }

    fn on_keep_alive(&mut self, cluster_session_id: u64, now: u64) {
        if let Some(session) = self.active.get_mut(&cluster_session_id) {
            session.record_activity(now);
        }
    }

    fn on_challenge_response(
        &mut self,
        cluster_session_id: u64,
        correlation_id: u64,
        credentials: &Bytes,
        now: u64,
    ) {
        let Self { pending, authenticator, .. } = self;
        if let Some(session) = pending.iter_mut().find(|s| s.id() == cluster_session_id) {
            if session.state() == SessionState::Challenged {
                session.record_request(now, correlation_id);
                authenticator.on_challenge_response(cluster_session_id, credentials, now);
            }
        }
    }

    // -- active-session aging -------------------------------------------------

    fn check_sessions(&mut self, now: u64) -> usize {
        let timeout_ms = self.session_timeout_ms;
        let Self { active, egress, log, message_index, .. } = self;
        let mut work = 0;

        let mut i = 0;
        while i < active.len() {
            let mut remove = false;
            {
                let Some((_, session)) = active.get_index_mut(i) else {
                    break;
                };
                if session.has_timed_out(now, timeout_ms) {
                    match session.state() {
                        SessionState::Open => {
                            let event = EgressEvent::Error {
                                detail: SESSION_TIMEOUT_DETAIL.to_owned(),
                            };
                            let _ = egress.try_send(session, &event);
                            session.timed_out();
                            debug!(session_id = session.id(), "session timed out");
                            remove = append_closed_session(
                                log.as_mut(),
                                message_index,
                                session,
                                now,
                            );
                        }
                        SessionState::TimedOut | SessionState::Closed => {
                            remove = append_closed_session(
                                log.as_mut(),
                                message_index,
                                session,
                                now,
                            );
                        }
                        _ => {
                            // Never fully opened; nothing is owed to the log.
                            session.close();
                            remove = true;
                        }
                    }
                } else if session.state() == SessionState::Connected {
                    // Promoted session whose connected-session append was
                    // refused; retry until the log accepts it.
                    if append_connected_session(log.as_mut(), message_index, session, now) {
                        work += 1;
                    }
                } else if session.state() == SessionState::Closed {
                    // Close requested earlier, record still owed.
                    remove =
                        append_closed_session(log.as_mut(), message_index, session, now);
                }
            }
            if remove {
                active.swap_remove_index(i);
                work += 1;
            } else {
                i += 1;
            }
        }

        work
    }

    // -- rejected sessions ----------------------------------------------------

    fn process_rejected_sessions(&mut self, now: u64) -> usize {
        let timeout_ms = self.session_timeout_ms;
        let Self { rejected, egress, .. } = self;
        let mut work = 0;

        let mut i = rejected.len();
        while i > 0 {
            i -= 1;
            let session = &mut rejected[i];
            let event = session.rejection_event();
            let sent = egress.try_send(session, &event);
            if sent || session.has_timed_out(now, timeout_ms) {
                let mut session = rejected.swap_remove(i);
                session.close();
                work += 1;
            }
        }

        work
    }

    // -- teardown -------------------------------------------------------------

    fn on_close(&mut self) {
        let now = self.cached_clock.now_ms();
        let Self { active, log, message_index, .. } = self;
        for session in active.values_mut() {
            session.closing(CloseReason::ServiceAction);
            // Best-effort: there is no next tick to retry a refusal.
            append_closed_session(log.as_mut(), message_index, session, now);
        }
        active.clear();
        self.ingress.close();
        self.services.close();
        self.transition(SequencerState::Closed);
        self.shutdown.cancel();
    }

    fn transition(&mut self, next: SequencerState) {
        if self.state != next {
            debug!(prev = self.state.as_str(), next = next.as_str(), "sequencer state");
            self.state = next;
        }
    }
}

/// Append the connected-session record; on success the session is OPEN and
/// the message index advances.
fn append_connected_session(
    log: &mut dyn LogAppender,
    message_index: &MessageIndex,
    session: &mut ClusterSession,
    now_ms: u64,
) -> bool {
    let record = LogRecord::ConnectedSession {
        session_id: session.id(),
        correlation_id: session.correlation_id(),
        response_stream_id: session.response_stream_id(),
        response_channel: session.response_channel().to_owned(),
        timestamp_ms: now_ms,
    };
    if log.try_append(&record) {
        message_index.increment();
        session.open();
        true
    } else {
        false
    }
}

/// Append the closed-session record with the session's close reason; on
/// success the session is closed and the message index advances.
fn append_closed_session(
    log: &mut dyn LogAppender,
    message_index: &MessageIndex,
    session: &mut ClusterSession,
    now_ms: u64,
) -> bool {
    let record = LogRecord::ClosedSession {
        session_id: session.id(),
        reason: session.close_reason(),
        timestamp_ms: now_ms,
    };
    if log.try_append(&record) {
        message_index.increment();
        session.close();
        true
    } else {
        false
    }
}

#[cfg(test)]
#[path = "sequencer_tests.rs"]
mod tests;
