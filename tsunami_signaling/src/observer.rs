//! Hooks for the hosting application
//!
//! The client reports what happens to each peer through a [`SessionObserver`].
//! Every method has an empty default, so applications only implement what
//! they render.

use crate::codec::PeerId;
use crate::error::ProtocolError;
use crate::fallback::FallbackReason;
use crate::session::SessionState;

pub trait SessionObserver: Send + Sync {
    /// A session changed state
    fn on_transition(&self, _peer: &PeerId, _from: SessionState, _to: SessionState) {}

    /// The engine reports the direct path to `peer` is up
    fn on_connected(&self, _peer: &PeerId) {}

    /// Traffic for `peer` should go through the relay from now on
    fn on_relay_fallback(&self, _peer: &PeerId, _reason: FallbackReason) {}

    /// The server announced a new room member
    fn on_peer_joined(&self, _peer: Option<&PeerId>) {}

    /// The server announced a member left; its session is gone
    fn on_peer_left(&self, _peer: &PeerId) {}

    /// An inbound envelope or engine event was dropped
    fn on_rejected(&self, _error: &ProtocolError) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
