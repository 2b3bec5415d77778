//! Error types for the signaling client

use crate::codec::PeerId;
use crate::session::SessionState;
use thiserror::Error;

/// Errors that can occur while signaling
#[derive(Error, Debug)]
pub enum SignalingError {
    /// Malformed or out-of-state envelope
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connection engine operation failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Signaling transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// An envelope that cannot be acted on. The message is dropped, the
/// connection continues.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON parsing error or missing required field
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// Outbound envelope could not be serialized
    #[error("failed to encode envelope: {0}")]
    Encode(serde_json::Error),

    /// Client-to-server event received from the server
    #[error("unexpected inbound {0} envelope")]
    UnexpectedEvent(&'static str),

    /// Message references a peer with no session
    #[error("no session for peer {0}")]
    UnknownSession(PeerId),

    /// Message arrived for a session in the wrong state
    #[error("unexpected {event} from {peer} in state {state:?}")]
    UnexpectedState {
        peer: PeerId,
        event: &'static str,
        state: SessionState,
    },

    /// Session already failed or closed
    #[error("session for {peer} is inactive ({state:?})")]
    SessionInactive { peer: PeerId, state: SessionState },

    /// Only one offer per negotiation attempt
    #[error("offer already sent to {0}")]
    OfferAlreadySent(PeerId),

    /// Offer requested from a responder session
    #[error("session for {0} is not the initiator")]
    NotInitiator(PeerId),
}

/// Failure reported by the connection engine
#[derive(Error, Debug, Clone)]
#[error("{operation} failed: {reason}")]
pub struct EngineError {
    pub operation: &'static str,
    pub reason: String,
}

impl EngineError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// Errors from the signaling transport
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Could not reach the signaling server
    #[error("connect failed: {0}")]
    Connect(String),

    /// Failed to send message to the server
    #[error("send failed: {0}")]
    Send(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection was closed
    #[error("connection closed")]
    Closed,
}

/// Errors loading the client configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
