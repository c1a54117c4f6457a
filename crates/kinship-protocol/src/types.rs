//! Message types for Kinship's wire format.
//!
//! Everything in this module is serialized onto the connection. The
//! outermost shape is always an [`Envelope`]; its [`Payload`] is either a
//! [`SystemMessage`] (handshake, heartbeat, errors) or a [`PresencePush`]
//! (the four presence events the server pushes to clients).

use serde::{Deserialize, Serialize};

use crate::{KickReason, PlayerId, PlayerIdentity};

// ---------------------------------------------------------------------------
// SystemMessage: connection plumbing
// ---------------------------------------------------------------------------

/// Connection-level messages, in both directions.
///
/// Internally tagged: `{ "type": "Heartbeat", "client_time": 5000 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: first frame on a new connection.
    /// `token` is handed to the authenticator as-is.
    Handshake {
        version: u32,
        token: Option<String>,
    },

    /// Server → Client: the token was accepted; this is who you are.
    HandshakeAck {
        player: PlayerIdentity,
        server_time: u64,
    },

    /// Either direction: "I'm leaving." The reason is for logs only.
    Disconnect { reason: String },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client keep-alive reply.
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    /// Server → Client: the request was rejected.
    /// `code` follows HTTP conventions (400, 401, ...).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// PresencePush: the one-way presence operations
// ---------------------------------------------------------------------------

/// A one-way presence event pushed from the server to a connected client.
///
/// These are fire-and-forget: the client never replies, and the server
/// never waits for confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PresencePush {
    /// One of your friends just came online.
    FriendOnline { friend: PlayerIdentity },

    /// One of your friends disconnected (or was dropped by the server).
    FriendOffline { player_id: PlayerId },

    /// Reply to your own connect: the friends that are online right now.
    OnlineFriends { friends: Vec<PlayerIdentity> },

    /// The server is ending your connection.
    Kicked { reason: KickReason },
}

impl PresencePush {
    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FriendOnline { .. } => "friend_online",
            Self::FriendOffline { .. } => "friend_offline",
            Self::OnlineFriends { .. } => "online_friends",
            Self::Kicked { .. } => "kicked",
        }
    }
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope.
///
/// Adjacently tagged, so the two message families can reuse the `"type"`
/// key internally without clashing:
///   `{ "type": "Presence", "data": { "type": "FriendOffline", "player_id": "..." } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Presence(PresencePush),
}

/// The top-level frame. Every message on the wire is an `Envelope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number, starting at 0 for the handshake.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! These pin the JSON shapes clients parse. A serde attribute change
    //! that breaks one of them is a protocol break.

    use uuid::Uuid;

    use super::*;

    fn alice() -> PlayerIdentity {
        PlayerIdentity::new(PlayerId(Uuid::from_u128(1)), "alice")
    }

    #[test]
    fn test_system_message_handshake_json_format() {
        let msg = SystemMessage::Handshake {
            version: 1,
            token: Some("abc".into()),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Handshake");
        assert_eq!(json["version"], 1);
        assert_eq!(json["token"], "abc");
    }

    #[test]
    fn test_system_message_handshake_ack_carries_identity() {
        let msg = SystemMessage::HandshakeAck {
            player: alice(),
            server_time: 0,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "HandshakeAck");
        assert_eq!(json["player"]["username"], "alice");
        assert_eq!(
            json["player"]["id"],
            "00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn test_system_message_error_json_format() {
        let msg = SystemMessage::Error {
            code: 401,
            message: "unauthorized".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], 401);
    }

    #[test]
    fn test_presence_push_friend_online_json_format() {
        let push = PresencePush::FriendOnline { friend: alice() };
        let json: serde_json::Value = serde_json::to_value(&push).unwrap();

        assert_eq!(json["type"], "FriendOnline");
        assert_eq!(json["friend"]["username"], "alice");
    }

    #[test]
    fn test_presence_push_kicked_json_format() {
        let push = PresencePush::Kicked {
            reason: KickReason::DuplicateLogin,
        };
        let json: serde_json::Value = serde_json::to_value(&push).unwrap();

        assert_eq!(json["type"], "Kicked");
        assert_eq!(json["reason"], "DUPLICATE_LOGIN");
    }

    #[test]
    fn test_presence_push_online_friends_empty_list() {
        let push = PresencePush::OnlineFriends { friends: vec![] };
        let json: serde_json::Value = serde_json::to_value(&push).unwrap();

        assert_eq!(json["type"], "OnlineFriends");
        assert_eq!(json["friends"], serde_json::json!([]));
    }

    #[test]
    fn test_presence_push_kind_names() {
        assert_eq!(
            PresencePush::FriendOffline {
                player_id: alice().id
            }
            .kind(),
            "friend_offline"
        );
        assert_eq!(
            PresencePush::OnlineFriends { friends: vec![] }.kind(),
            "online_friends"
        );
    }

    #[test]
    fn test_payload_presence_is_adjacently_tagged() {
        let payload = Payload::Presence(PresencePush::FriendOffline {
            player_id: alice().id,
        });
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "Presence");
        assert_eq!(json["data"]["type"], "FriendOffline");
        assert_eq!(
            json["data"]["player_id"],
            "00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn test_envelope_decodes_client_heartbeat() {
        let raw = r#"{
            "seq": 3,
            "timestamp": 100,
            "payload": {
                "type": "System",
                "data": { "type": "Heartbeat", "client_time": 99 }
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();

        assert_eq!(envelope.seq, 3);
        assert_eq!(
            envelope.payload,
            Payload::System(SystemMessage::Heartbeat { client_time: 99 })
        );
    }

    #[test]
    fn test_decode_unknown_push_type_returns_error() {
        let unknown = r#"{"type": "FriendTeleported", "where": "moon"}"#;
        let result: Result<PresencePush, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let result: Result<Envelope, _> =
            serde_json::from_slice(b"not json at all");
        assert!(result.is_err());
    }
}
