//! Rendezvous wire messages, shared by the relay server and the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role assigned by join order. The initiator originates the connection
/// offer once the responder has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerRole {
    Initiator,
    Responder,
}

/// Messages from client to relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join (or implicitly create) the named room.
    JoinRoom { room: String },
    LeaveRoom { room: String },
    /// Opaque signaling payload for the other room member. The relay never
    /// inspects `signal`.
    Signal { room: String, signal: Value },
}

/// Messages from relay to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomJoined { role: PeerRole, room_size: usize },
    /// Join rejected, the room already has two members. Membership is
    /// untouched and the connection stays usable.
    RoomFull { room: String },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    Signal { signal: Value },
    Error { message: String },
}
