//! Session registry: one negotiation per remote peer
//!
//! The registry is owned by the signaling client and only ever mutated from
//! its event loop, so it needs no lock.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::codec::{PeerId, RoomIdentity};
use crate::engine::{EngineEvent, EngineEventSink, EngineFactory, EngineSettings};
use crate::error::{EngineError, ProtocolError};
use crate::observer::SessionObserver;
use crate::session::{PeerSession, Role};

/// Map of peer id -> negotiation with that peer
pub struct SessionRegistry {
    identity: Arc<RoomIdentity>,
    factory: Box<dyn EngineFactory>,
    settings: EngineSettings,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    observer: Arc<dyn SessionObserver>,
    sessions: HashMap<PeerId, PeerSession>,
}

impl SessionRegistry {
    pub fn new(
        identity: Arc<RoomIdentity>,
        factory: Box<dyn EngineFactory>,
        settings: EngineSettings,
        events_tx: mpsc::UnboundedSender<EngineEvent>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            identity,
            factory,
            settings,
            events_tx,
            observer,
            sessions: HashMap::new(),
        }
    }

    /// Get the session for `peer`, creating it in `NEW` if there is none
    ///
    /// A new session gets a fresh engine whose callbacks are tagged with
    /// `peer`. Asking again for an existing peer returns the same session and
    /// ignores `role`. The flag tells whether a session was created.
    pub fn get_or_create(
        &mut self,
        peer: &PeerId,
        role: Role,
    ) -> Result<(&mut PeerSession, bool), EngineError> {
        match self.sessions.entry(peer.clone()) {
            Entry::Occupied(entry) => Ok((entry.into_mut(), false)),
            Entry::Vacant(entry) => {
                let sink = EngineEventSink::new(peer.clone(), self.events_tx.clone());
                let engine = self.factory.create(peer, &self.settings, sink)?;
                let session = PeerSession::new(
                    peer.clone(),
                    role,
                    engine,
                    self.identity.clone(),
                    self.observer.clone(),
                );
                debug!(peer = %peer, ?role, "created session");
                Ok((entry.insert(session), true))
            }
        }
    }

    pub fn get(&self, peer: &PeerId) -> Option<&PeerSession> {
        self.sessions.get(peer)
    }

    pub fn get_mut(&mut self, peer: &PeerId) -> Option<&mut PeerSession> {
        self.sessions.get_mut(peer)
    }

    /// Session that must already exist for the message to make sense
    pub fn require(&mut self, peer: &PeerId) -> Result<&mut PeerSession, ProtocolError> {
        self.sessions
            .get_mut(peer)
            .ok_or_else(|| ProtocolError::UnknownSession(peer.clone()))
    }

    /// Close and drop the session for `peer`
    pub async fn remove(&mut self, peer: &PeerId) -> Option<PeerSession> {
        let mut session = self.sessions.remove(peer)?;
        session.close().await;
        info!(peer = %peer, "removed session");
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerSession> {
        self.sessions.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerSession> {
        self.sessions.values_mut()
    }
}
