//! Room-based WebRTC signaling client
//!
//! This crate negotiates direct peer-to-peer connections among the members
//! of a room by relaying offers, answers and candidates through a central
//! signaling server. The connection engine itself (SDP generation, ICE) is
//! supplied by the application through [`EngineFactory`].
//!
//! # Protocol
//!
//! JSON envelopes over a WebSocket, discriminated by `event`:
//!
//! - `{"event": "join-room", "roomid": ..., "userid": ...}` - announce ourselves
//! - `{"event": "get-peers", "roomid": ..., "userid": ...}` - ask for the room's members
//! - `{"event": "get-peers", "peers": [...]}` - reply; we offer to each of them
//! - `{"event": "user-connected"}` / `{"event": "user-disconnected", "userid": ...}`
//! - `sdp-offer`, `sdp-answer`, `ice-exchange`, `answer-pong`, `webrtc-failed` -
//!   relayed between peers, each carrying `roomid`, `userid` (the sender) and
//!   usually `recipient`
//!
//! ## Negotiation
//!
//! 1. The joining peer sends `sdp-offer` to every peer in the `get-peers` reply
//! 2. Each of them answers with `sdp-answer`
//! 3. The initiator applies the answer, its buffered candidates, and replies
//!    `answer-pong`
//! 4. The responder applies its buffered candidates on `answer-pong`
//! 5. Either side's engine reporting `failed` sends `webrtc-failed` and moves
//!    that peer to the relay. The session stays failed until
//!    [`SignalingClient::reset_peer`] negotiates again
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tsunami_signaling::{ClientConfig, EngineFactory, NoopObserver, SignalingClient};
//!
//! async fn join(factory: Box<dyn EngineFactory>) -> Result<(), tsunami_signaling::SignalingError> {
//!     let config = ClientConfig {
//!         room_id: "lobby".to_string(),
//!         ..Default::default()
//!     };
//!     let (mut client, frames) =
//!         SignalingClient::connect(&config, factory, Arc::new(NoopObserver)).await?;
//!     client.run(frames).await
//! }
//! ```

#![forbid(unsafe_code)]

pub mod candidate;
pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
mod handler;
pub mod observer;
pub mod session;
pub mod state;
pub mod transport;

pub use candidate::{CandidateCache, FlushReport};
pub use client::SignalingClient;
pub use codec::{Envelope, GetPeers, IceCandidate, PeerId, RoomIdentity, SdpType, SessionDescription};
pub use config::{ClientConfig, ReconnectConfig};
pub use engine::{
    ConnectionEngine, ConnectionState, EngineEvent, EngineEventKind, EngineEventSink,
    EngineFactory, EngineSettings,
};
pub use error::{ConfigError, EngineError, ProtocolError, SignalingError, TransportError};
pub use fallback::{FallbackCoordinator, FallbackReason};
pub use observer::{NoopObserver, SessionObserver};
pub use session::{PeerSession, Role, SessionState};
pub use state::SessionRegistry;
pub use transport::{InboundFrames, SignalSink, WsSink};
