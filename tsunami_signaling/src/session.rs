//! Per-peer negotiation state machine
//!
//! ```text
//! NEW --initiate--> OFFER_SENT --sdp-answer--> CONFIRMED --engine up--> CONNECTED
//! NEW --sdp-offer--> OFFERED --> ANSWERED --answer-pong--> CONFIRMED --engine up--> CONNECTED
//! any active --engine failed / timeout / webrtc-failed--> FAILED
//! any --close--> CLOSED
//! ```
//!
//! Every handler checks the current state first. An envelope that arrives in
//! the wrong state is rejected with [`ProtocolError::UnexpectedState`] and the
//! session is left untouched.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::candidate::{CandidateCache, FlushReport};
use crate::codec::{Envelope, IceCandidate, PeerId, RoomIdentity, SessionDescription};
use crate::engine::{ConnectionEngine, ConnectionState};
use crate::error::{ProtocolError, SignalingError};
use crate::observer::SessionObserver;

/// Which side sends the offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    OfferSent,
    Offered,
    Answered,
    Confirmed,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    /// Failed and closed sessions accept nothing further
    pub fn is_active(self) -> bool {
        !matches!(self, SessionState::Failed | SessionState::Closed)
    }
}

/// Negotiation with one remote peer
pub struct PeerSession {
    peer_id: PeerId,
    role: Role,
    state: SessionState,
    engine: Box<dyn ConnectionEngine>,
    identity: Arc<RoomIdentity>,
    observer: Arc<dyn SessionObserver>,
    local_offer: Option<SessionDescription>,
    cached_remote_answer: Option<SessionDescription>,
    remote_description_set: bool,
    candidates: CandidateCache,
    /// Set by the first flush; later candidates are applied on arrival
    flush_armed: bool,
    negotiation_started: Option<Instant>,
}

impl PeerSession {
    pub fn new(
        peer_id: PeerId,
        role: Role,
        engine: Box<dyn ConnectionEngine>,
        identity: Arc<RoomIdentity>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            peer_id,
            role,
            state: SessionState::New,
            engine,
            identity,
            observer,
            local_offer: None,
            cached_remote_answer: None,
            remote_description_set: false,
            candidates: CandidateCache::new(),
            flush_armed: false,
            negotiation_started: None,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn local_offer(&self) -> Option<&SessionDescription> {
        self.local_offer.as_ref()
    }

    pub fn cached_remote_answer(&self) -> Option<&SessionDescription> {
        self.cached_remote_answer.as_ref()
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    pub fn candidates(&self) -> &CandidateCache {
        &self.candidates
    }

    /// Create and send our offer
    pub async fn initiate(&mut self) -> Result<Vec<Envelope>, SignalingError> {
        if self.role != Role::Initiator {
            return Err(ProtocolError::NotInitiator(self.peer_id.clone()).into());
        }
        if self.local_offer.is_some() {
            return Err(ProtocolError::OfferAlreadySent(self.peer_id.clone()).into());
        }
        self.expect_state("initiate", &[SessionState::New])?;

        let offer = self.engine.create_offer().await?;
        self.engine.set_local_description(offer.clone()).await?;
        self.local_offer = Some(offer.clone());
        self.start_clock();
        self.transition(SessionState::OfferSent);

        Ok(vec![self.identity.sdp_offer(&self.peer_id, offer)])
    }

    /// Claim the initiator role on a session nothing was negotiated on yet
    ///
    /// Sessions created by an early candidate start as responders; this lets
    /// the peer list still offer to them. Returns `false` once an offer went
    /// out or a remote description was applied.
    pub fn take_initiative(&mut self) -> bool {
        if self.state != SessionState::New
            || self.local_offer.is_some()
            || self.remote_description_set
        {
            return false;
        }
        if self.role != Role::Initiator {
            debug!(peer = %self.peer_id, "taking the initiator role");
            self.role = Role::Initiator;
        }
        true
    }

    /// Apply a remote offer and answer it
    pub async fn handle_offer(&mut self, offer: SessionDescription) -> Result<Vec<Envelope>, SignalingError> {
        self.expect_state("sdp-offer", &[SessionState::New, SessionState::Offered])?;
        if self.role == Role::Initiator {
            debug!(peer = %self.peer_id, "offer received before ours was sent, answering instead");
            self.role = Role::Responder;
        }

        self.engine.set_remote_description(offer).await?;
        self.remote_description_set = true;
        self.start_clock();
        self.transition(SessionState::Offered);

        let answer = self.engine.create_answer().await?;
        self.engine.set_local_description(answer.clone()).await?;
        self.transition(SessionState::Answered);

        Ok(vec![self.identity.sdp_answer(&self.peer_id, answer)])
    }

    /// Commit the remote answer, then flush buffered candidates and confirm
    ///
    /// The answer becomes the remote description before any candidate is
    /// applied; candidates added to a connection without one are rejected.
    pub async fn handle_answer(&mut self, answer: SessionDescription) -> Result<Vec<Envelope>, SignalingError> {
        self.expect_state("sdp-answer", &[SessionState::OfferSent])?;

        self.engine.set_remote_description(answer.clone()).await?;
        self.remote_description_set = true;
        self.cached_remote_answer = Some(answer);
        self.flush().await;
        self.transition(SessionState::Confirmed);

        Ok(vec![self.identity.answer_pong(&self.peer_id)])
    }

    /// Buffer a remote candidate
    pub async fn handle_candidate(&mut self, candidate: Option<IceCandidate>) -> Result<Vec<Envelope>, SignalingError> {
        self.expect_active()?;
        self.candidates.push(candidate);
        self.start_clock();
        if self.flush_armed && self.remote_description_set {
            self.flush().await;
        }
        Ok(Vec::new())
    }

    /// The initiator applied our answer; apply what it sent meanwhile
    pub async fn handle_answer_pong(&mut self) -> Result<Vec<Envelope>, SignalingError> {
        self.expect_state(
            "answer-pong",
            &[
                SessionState::Answered,
                SessionState::Confirmed,
                SessionState::Connected,
            ],
        )?;

        self.flush().await;
        if self.state != SessionState::Connected {
            self.transition(SessionState::Confirmed);
        }
        Ok(Vec::new())
    }

    /// Turn a locally gathered candidate into an envelope for the peer
    pub fn on_local_candidate(&self, candidate: Option<IceCandidate>) -> Option<Envelope> {
        if !self.state.is_active() {
            return None;
        }
        Some(self.identity.ice_exchange(&self.peer_id, candidate))
    }

    /// Follow the engine's connectivity report
    ///
    /// Returns `true` when this report failed the session.
    pub fn on_connection_state(&mut self, state: ConnectionState) -> bool {
        if !self.state.is_active() {
            return false;
        }
        match state {
            s if s.is_connected() => {
                if self.state != SessionState::Connected {
                    self.transition(SessionState::Connected);
                    self.observer.on_connected(&self.peer_id);
                }
                false
            }
            ConnectionState::Failed => self.fail(),
            other => {
                debug!(peer = %self.peer_id, state = ?other, "engine state changed");
                false
            }
        }
    }

    /// Move to `FAILED`; returns `false` if already inactive
    pub fn fail(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        self.transition(SessionState::Failed);
        true
    }

    /// Whether negotiation has been running longer than `timeout` without
    /// reaching `CONNECTED`
    pub fn negotiation_expired(&self, now: Instant, timeout: Duration) -> bool {
        match self.negotiation_started {
            Some(started) if self.state.is_active() && self.state != SessionState::Connected => {
                now.saturating_duration_since(started) >= timeout
            }
            _ => false,
        }
    }

    /// Release the engine and discard buffered candidates
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.engine.close().await;
        self.candidates.clear();
        self.transition(SessionState::Closed);
    }

    async fn flush(&mut self) -> FlushReport {
        self.flush_armed = true;
        self.candidates
            .flush(self.engine.as_mut(), &self.peer_id)
            .await
    }

    fn start_clock(&mut self) {
        self.negotiation_started.get_or_insert_with(Instant::now);
    }

    fn expect_state(
        &self,
        event: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), ProtocolError> {
        self.expect_active()?;
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedState {
                peer: self.peer_id.clone(),
                event,
                state: self.state,
            })
        }
    }

    fn expect_active(&self) -> Result<(), ProtocolError> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(ProtocolError::SessionInactive {
                peer: self.peer_id.clone(),
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        let from = std::mem::replace(&mut self.state, next);
        debug!(peer = %self.peer_id, ?from, to = ?next, "session transition");
        self.observer.on_transition(&self.peer_id, from, next);
    }
}

impl std::fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSession")
            .field("peer_id", &self.peer_id)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("pending_candidates", &self.candidates.pending())
            .finish_non_exhaustive()
    }
}
