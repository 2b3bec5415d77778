//! Relay fallback decisions for peers whose direct negotiation failed

use std::collections::HashMap;
use tracing::{info, warn};

use crate::codec::{Envelope, PeerId, RoomIdentity};
use crate::observer::SessionObserver;

/// Why a peer was moved to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Our engine reported the connection failed
    LocalFailure,
    /// The remote peer told us its side failed
    RemoteFailure,
    /// Negotiation did not finish in time
    Timeout,
}

/// Tracks which peers are routed through the relay
#[derive(Debug, Default)]
pub struct FallbackCoordinator {
    relayed: HashMap<PeerId, FallbackReason>,
}

impl FallbackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `peer` through the relay
    ///
    /// Returns the `webrtc-failed` notice to send to the peer, at most once per
    /// peer and never when the peer reported the failure itself.
    pub fn engage(
        &mut self,
        identity: &RoomIdentity,
        peer: &PeerId,
        reason: FallbackReason,
        observer: &dyn SessionObserver,
    ) -> Option<Envelope> {
        if self.relayed.contains_key(peer) {
            return None;
        }
        self.relayed.insert(peer.clone(), reason);

        warn!(peer = %peer, ?reason, "peer connection failed, falling back to relay");
        observer.on_relay_fallback(peer, reason);

        match reason {
            FallbackReason::RemoteFailure => None,
            FallbackReason::LocalFailure | FallbackReason::Timeout => {
                Some(identity.webrtc_failed(peer))
            }
        }
    }

    pub fn is_relayed(&self, peer: &PeerId) -> bool {
        self.relayed.contains_key(peer)
    }

    pub fn reason(&self, peer: &PeerId) -> Option<FallbackReason> {
        self.relayed.get(peer).copied()
    }

    /// Peers currently routed through the relay
    pub fn relayed_peers(&self) -> Vec<PeerId> {
        self.relayed.keys().cloned().collect()
    }

    /// Stop tracking a peer that left the room
    pub fn forget(&mut self, peer: &PeerId) {
        if self.relayed.remove(peer).is_some() {
            info!(peer = %peer, "dropped relay route");
        }
    }
}
