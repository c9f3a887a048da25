// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable session authentication.
//!
//! The sequencer treats credentials as opaque. An [`Authenticator`] hears
//! about connect requests and challenge responses, and is handed an
//! [`AuthProxy`] once per tick for each pending session it may advance. The
//! proxy is a capability scoped to that call — the authenticator keeps no
//! reference back into the sequencer.

use bytes::Bytes;

use crate::egress::{EgressEvent, EgressPublisher, SESSION_REJECTED_DETAIL};
use crate::session::ClusterSession;

/// Scoped mutator for one pending session.
pub struct AuthProxy<'a> {
    session: &'a mut ClusterSession,
    egress: &'a mut dyn EgressPublisher,
}

impl<'a> AuthProxy<'a> {
    pub fn new(session: &'a mut ClusterSession, egress: &'a mut dyn EgressPublisher) -> Self {
        Self { session, egress }
    }

    pub fn session_id(&self) -> u64 {
        self.session.id()
    }

    /// Send a challenge payload to the client. The session moves to
    /// CHALLENGED only once the send succeeds.
    pub fn challenge(&mut self, data: Bytes) -> bool {
        let event = EgressEvent::Challenge { data };
        if self.egress.try_send(self.session, &event) {
            self.session.challenge();
            true
        } else {
            false
        }
    }

    pub fn authenticate(&mut self) {
        self.session.authenticate();
    }

    pub fn reject(&mut self) {
        self.session.reject(EgressEvent::AuthenticationRejected {
            detail: SESSION_REJECTED_DETAIL.to_owned(),
        });
    }
}

/// Drives sessions from connected through challenged to authenticated or
/// rejected. Credential semantics are entirely the implementation's.
pub trait Authenticator: Send {
    /// A client asked to connect, presenting credentials.
    fn on_connect_request(&mut self, session_id: u64, credentials: &Bytes, now_ms: u64);

    /// A challenged client answered, presenting credentials.
    fn on_challenge_response(&mut self, session_id: u64, credentials: &Bytes, now_ms: u64);

    /// Called each tick for a pending session in CONNECTED state.
    fn on_connected_session(&mut self, proxy: &mut AuthProxy<'_>, now_ms: u64);

    /// Called each tick for a pending session in CHALLENGED state.
    fn on_challenged_session(&mut self, proxy: &mut AuthProxy<'_>, now_ms: u64);
}

/// Admits every session without inspecting credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn on_connect_request(&mut self, _session_id: u64, _credentials: &Bytes, _now_ms: u64) {}

    fn on_challenge_response(&mut self, _session_id: u64, _credentials: &Bytes, _now_ms: u64) {}

    fn on_connected_session(&mut self, proxy: &mut AuthProxy<'_>, _now_ms: u64) {
        proxy.authenticate();
    }

    fn on_challenged_session(&mut self, proxy: &mut AuthProxy<'_>, _now_ms: u64) {
        proxy.authenticate();
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
