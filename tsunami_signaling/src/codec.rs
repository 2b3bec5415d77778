//! Signaling envelopes and their JSON encoding
//!
//! Every message exchanged with the signaling server is a JSON object whose
//! `event` field selects the schema. Decoding validates the fields required
//! by that schema, so a successfully decoded [`Envelope`] is always complete.

use crate::error::ProtocolError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a room participant
///
/// Serialized as a string. Numeric ids (as produced by older web clients)
/// are accepted on input and normalized to their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<uuid::Uuid> for PeerId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => PeerId(s),
            RawId::Unsigned(n) => PeerId(n.to_string()),
            RawId::Signed(n) => PeerId(n.to_string()),
        })
    }
}

/// Kind of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Offer or answer produced by the connection engine; opaque to signaling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Network-path candidate for establishing the direct connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

/// Body of a `get-peers` envelope: a request going up, a reply coming down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GetPeers {
    Reply { peers: Vec<PeerId> },
    Request { roomid: String, userid: PeerId },
}

/// A signaling message, discriminated by its `event` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Envelope {
    JoinRoom {
        roomid: String,
        userid: PeerId,
    },
    GetPeers(GetPeers),
    UserConnected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        userid: Option<PeerId>,
    },
    UserDisconnected {
        userid: PeerId,
    },
    SdpOffer {
        roomid: String,
        userid: PeerId,
        offer: SessionDescription,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient: Option<PeerId>,
    },
    SdpAnswer {
        roomid: String,
        userid: PeerId,
        answer: SessionDescription,
        recipient: PeerId,
    },
    IceExchange {
        roomid: String,
        userid: PeerId,
        /// `null` marks the end of candidate gathering
        #[serde(deserialize_with = "Option::deserialize")]
        candidate: Option<IceCandidate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient: Option<PeerId>,
    },
    AnswerPong {
        roomid: String,
        userid: PeerId,
        recipient: PeerId,
    },
    WebrtcFailed {
        roomid: String,
        userid: PeerId,
        recipient: PeerId,
    },
}

impl Envelope {
    /// Decode an envelope from its wire form
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Encode an envelope to its wire form
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// The `event` discriminant as it appears on the wire
    pub fn event(&self) -> &'static str {
        match self {
            Envelope::JoinRoom { .. } => "join-room",
            Envelope::GetPeers(_) => "get-peers",
            Envelope::UserConnected { .. } => "user-connected",
            Envelope::UserDisconnected { .. } => "user-disconnected",
            Envelope::SdpOffer { .. } => "sdp-offer",
            Envelope::SdpAnswer { .. } => "sdp-answer",
            Envelope::IceExchange { .. } => "ice-exchange",
            Envelope::AnswerPong { .. } => "answer-pong",
            Envelope::WebrtcFailed { .. } => "webrtc-failed",
        }
    }

    /// Sender of a peer-to-peer envelope
    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Envelope::SdpOffer { userid, .. }
            | Envelope::SdpAnswer { userid, .. }
            | Envelope::IceExchange { userid, .. }
            | Envelope::AnswerPong { userid, .. }
            | Envelope::WebrtcFailed { userid, .. } => Some(userid),
            _ => None,
        }
    }

    /// Addressee, when the envelope names one
    pub fn recipient(&self) -> Option<&PeerId> {
        match self {
            Envelope::SdpOffer { recipient, .. } | Envelope::IceExchange { recipient, .. } => {
                recipient.as_ref()
            }
            Envelope::SdpAnswer { recipient, .. }
            | Envelope::AnswerPong { recipient, .. }
            | Envelope::WebrtcFailed { recipient, .. } => Some(recipient),
            _ => None,
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{s}")
    }
}

impl FromStr for Envelope {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// The local room membership: fixed for the life of the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomIdentity {
    pub room_id: String,
    pub local_user_id: PeerId,
}

impl RoomIdentity {
    /// Join `room_id` under a freshly generated user id
    pub fn new(room_id: impl Into<String>) -> Self {
        Self::with_user_id(room_id, uuid::Uuid::new_v4().into())
    }

    pub fn with_user_id(room_id: impl Into<String>, local_user_id: PeerId) -> Self {
        Self {
            room_id: room_id.into(),
            local_user_id,
        }
    }

    pub fn join_room(&self) -> Envelope {
        Envelope::JoinRoom {
            roomid: self.room_id.clone(),
            userid: self.local_user_id.clone(),
        }
    }

    pub fn get_peers(&self) -> Envelope {
        Envelope::GetPeers(GetPeers::Request {
            roomid: self.room_id.clone(),
            userid: self.local_user_id.clone(),
        })
    }

    pub fn sdp_offer(&self, to: &PeerId, offer: SessionDescription) -> Envelope {
        Envelope::SdpOffer {
            roomid: self.room_id.clone(),
            userid: self.local_user_id.clone(),
            offer,
            recipient: Some(to.clone()),
        }
    }

    pub fn sdp_answer(&self, to: &PeerId, answer: SessionDescription) -> Envelope {
        Envelope::SdpAnswer {
            roomid: self.room_id.clone(),
            userid: self.local_user_id.clone(),
            answer,
            recipient: to.clone(),
        }
    }

    pub fn ice_exchange(&self, to: &PeerId, candidate: Option<IceCandidate>) -> Envelope {
        Envelope::IceExchange {
            roomid: self.room_id.clone(),
            userid: self.local_user_id.clone(),
            candidate,
            recipient: Some(to.clone()),
        }
    }

    pub fn answer_pong(&self, to: &PeerId) -> Envelope {
        Envelope::AnswerPong {
            roomid: self.room_id.clone(),
            userid: self.local_user_id.clone(),
            recipient: to.clone(),
        }
    }

    pub fn webrtc_failed(&self, to: &PeerId) -> Envelope {
        Envelope::WebrtcFailed {
            roomid: self.room_id.clone(),
            userid: self.local_user_id.clone(),
            recipient: to.clone(),
        }
    }
}
