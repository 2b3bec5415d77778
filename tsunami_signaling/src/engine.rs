//! Connection engine abstraction
//!
//! The engine performs the actual offer/answer generation, description
//! application and candidate gathering. Signaling only drives it through
//! [`ConnectionEngine`] and listens to it through [`EngineEventSink`], so a
//! real WebRTC stack and an in-memory mock plug in the same way.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::codec::{IceCandidate, PeerId, SessionDescription};
use crate::error::EngineError;

/// Connectivity state reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// Whether the direct path is usable
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Completed)
    }
}

/// Something the engine reported asynchronously
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    /// A local candidate was gathered; `None` ends gathering
    LocalCandidate(Option<IceCandidate>),
    StateChanged(ConnectionState),
}

/// Engine callback tagged with the peer whose engine raised it
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub peer: PeerId,
    pub kind: EngineEventKind,
}

/// Callback path handed to each engine at creation
///
/// Events are queued and later consumed by the signaling loop, one at a time,
/// alongside inbound envelopes.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    peer: PeerId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEventSink {
    pub fn new(peer: PeerId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { peer, tx }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn local_candidate(&self, candidate: Option<IceCandidate>) {
        self.emit(EngineEventKind::LocalCandidate(candidate));
    }

    pub fn connection_state_changed(&self, state: ConnectionState) {
        self.emit(EngineEventKind::StateChanged(state));
    }

    fn emit(&self, kind: EngineEventKind) {
        // Receiver only goes away when the client is dropped
        let _ = self.tx.send(EngineEvent {
            peer: self.peer.clone(),
            kind,
        });
    }
}

/// Settings passed to every engine the factory builds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    /// STUN/TURN server URLs
    pub ice_servers: Vec<String>,
}

/// One peer connection, owned exclusively by its session
#[async_trait]
pub trait ConnectionEngine: Send + Sync {
    async fn create_offer(&mut self) -> Result<SessionDescription, EngineError>;

    async fn create_answer(&mut self) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), EngineError>;

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), EngineError>;

    async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), EngineError>;

    /// Release the underlying connection
    async fn close(&mut self);
}

/// Builds a fresh engine for each remote peer
pub trait EngineFactory: Send + Sync {
    fn create(
        &self,
        peer: &PeerId,
        settings: &EngineSettings,
        events: EngineEventSink,
    ) -> Result<Box<dyn ConnectionEngine>, EngineError>;
}
