//! Inbound envelope routing
//!
//! Each event is handed to the session it concerns; whatever the session
//! produces is sent back out before the next envelope is looked at.

use tracing::{debug, info, trace, warn};

use crate::client::SignalingClient;
use crate::codec::{Envelope, GetPeers, PeerId};
use crate::error::{ProtocolError, SignalingError};
use crate::fallback::FallbackReason;
use crate::session::Role;

impl SignalingClient {
    /// Route a decoded envelope
    pub(crate) async fn dispatch(&mut self, envelope: Envelope) -> Result<(), SignalingError> {
        let local = &self.identity.local_user_id;
        if envelope.sender() == Some(local) {
            trace!(event = envelope.event(), "ignoring our own envelope");
            return Ok(());
        }
        if let Some(recipient) = envelope.recipient() {
            if recipient != local {
                trace!(event = envelope.event(), %recipient, "envelope for another peer");
                return Ok(());
            }
        }

        match envelope {
            Envelope::UserConnected { userid } => {
                info!(peer = ?userid, "peer joined room");
                self.observer.on_peer_joined(userid.as_ref());
                Ok(())
            }
            Envelope::UserDisconnected { userid } => self.handle_peer_left(&userid).await,
            Envelope::GetPeers(GetPeers::Reply { peers }) => self.connect_to_peers(peers).await,
            Envelope::SdpOffer { userid, offer, .. } => {
                debug!(peer = %userid, "sdp offer");
                let (session, _) = self.registry.get_or_create(&userid, Role::Responder)?;
                let outbound = session.handle_offer(offer).await?;
                self.send_all(outbound).await
            }
            Envelope::SdpAnswer { userid, answer, .. } => {
                debug!(peer = %userid, "sdp answer");
                let (session, _) = self.registry.get_or_create(&userid, Role::Responder)?;
                let outbound = session.handle_answer(answer).await?;
                self.send_all(outbound).await
            }
            Envelope::IceExchange {
                userid, candidate, ..
            } => {
                trace!(peer = %userid, "remote candidate");
                // Candidates may beat the offer; buffer them in a new session
                let (session, _) = self.registry.get_or_create(&userid, Role::Responder)?;
                let outbound = session.handle_candidate(candidate).await?;
                self.send_all(outbound).await
            }
            Envelope::AnswerPong { userid, .. } => {
                debug!(peer = %userid, "answer pong");
                let outbound = self.registry.require(&userid)?.handle_answer_pong().await?;
                self.send_all(outbound).await
            }
            Envelope::WebrtcFailed { userid, .. } => {
                self.registry.require(&userid)?.fail();
                self.engage_fallback(&userid, FallbackReason::RemoteFailure)
                    .await
            }
            // join-room and get-peers requests only travel to the server
            other => Err(ProtocolError::UnexpectedEvent(other.event()).into()),
        }
    }

    /// Offer to every peer already in the room
    async fn connect_to_peers(&mut self, peers: Vec<PeerId>) -> Result<(), SignalingError> {
        info!(count = peers.len(), "received peer list");
        for peer in peers {
            if peer == self.identity.local_user_id {
                continue;
            }
            match self.offer_to(&peer).await {
                Err(SignalingError::Transport(err)) => return Err(err.into()),
                // One bad peer does not stop the others
                Err(err) => self.report_peer_error(&peer, &err),
                Ok(()) => {}
            }
        }
        Ok(())
    }

    pub(crate) async fn offer_to(&mut self, peer: &PeerId) -> Result<(), SignalingError> {
        let (session, _) = self.registry.get_or_create(peer, Role::Initiator)?;
        if !session.take_initiative() {
            debug!(peer = %peer, state = ?session.state(), "already negotiating");
            return Ok(());
        }
        let outbound = session.initiate().await?;
        self.send_all(outbound).await
    }

    async fn handle_peer_left(&mut self, peer: &PeerId) -> Result<(), SignalingError> {
        info!(peer = %peer, "peer left room");
        self.registry.remove(peer).await;
        self.fallback.forget(peer);
        self.observer.on_peer_left(peer);
        Ok(())
    }

    fn report_peer_error(&self, peer: &PeerId, err: &SignalingError) {
        warn!(peer = %peer, error = %err, "could not offer to peer");
        if let SignalingError::Protocol(err) = err {
            self.observer.on_rejected(err);
        }
    }
}
