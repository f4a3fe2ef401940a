//! Room registry: the only process-wide mutable state in the relay.
//!
//! A room pairs at most two connections. It is created implicitly by the
//! first join and deleted when the last member leaves; nothing persists. All
//! membership changes funnel through [`RoomRegistry::join`] /
//! [`RoomRegistry::leave`] under the write lock, so two near-simultaneous
//! joins to an empty room cannot both become the initiator.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use webdrop_core::signaling::{PeerRole, ServerMessage};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room {0} already has two members")]
    RoomFull(String),
}

/// What a successful join told the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub role: PeerRole,
    pub room_size: usize,
}

struct RoomMember {
    conn_id: String,
    tx: mpsc::Sender<ServerMessage>,
}

#[derive(Default)]
struct Room {
    members: Vec<RoomMember>,
}

#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the named room, creating the room if needed.
    /// The first joiner becomes the initiator, the second the responder; the
    /// existing member is notified with `peer-joined`. A third join is
    /// rejected without touching membership.
    pub async fn join(
        &self,
        room_id: &str,
        conn_id: &str,
        tx: mpsc::Sender<ServerMessage>,
    ) -> Result<JoinOutcome, RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_default();
        if room.members.len() >= 2 {
            return Err(RoomError::RoomFull(room_id.to_string()));
        }

        let role = if room.members.is_empty() {
            PeerRole::Initiator
        } else {
            PeerRole::Responder
        };
        let existing = room.members.first().map(|m| m.tx.clone());

        room.members.push(RoomMember {
            conn_id: conn_id.to_string(),
            tx,
        });
        let room_size = room.members.len();
        drop(rooms);
        tracing::info!(room = room_id, conn = conn_id, ?role, room_size, "joined room");

        // Queue peer-joined before returning. The new member only learns it is
        // in the room from the caller's room-joined reply, so it cannot get a
        // signal relayed ahead of this notification. The send happens outside
        // the lock: a member with a full outbound queue must not stall the
        // registry for everyone else.
        if let Some(existing) = existing {
            let _ = existing
                .send(ServerMessage::PeerJoined {
                    peer_id: conn_id.to_string(),
                })
                .await;
        }

        Ok(JoinOutcome { role, room_size })
    }

    /// Forward an opaque signaling payload to the other room member.
    /// Returns whether it was delivered; with no peer present the payload is
    /// dropped, by design, and the caller sees no error.
    pub async fn relay(&self, room_id: &str, from: &str, signal: serde_json::Value) -> bool {
        // Look the peer up under the lock, send after releasing it; a slow
        // peer then stalls only this connection's task.
        let peer = {
            let rooms = self.rooms.read().await;
            let Some(room) = rooms.get(room_id) else {
                tracing::debug!(room = room_id, "signal for unknown room dropped");
                return false;
            };
            room.members
                .iter()
                .find(|m| m.conn_id != from)
                .map(|m| m.tx.clone())
        };
        match peer {
            Some(tx) => {
                let _ = tx.send(ServerMessage::Signal { signal }).await;
                true
            }
            None => {
                tracing::debug!(room = room_id, conn = from, "no peer yet, signal dropped");
                false
            }
        }
    }

    /// Remove a member; notify the remaining one with `peer-left` so it can
    /// abort an in-progress session, and delete the room once empty.
    pub async fn leave(&self, room_id: &str, conn_id: &str) {
        let remaining = {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(room_id) else {
                return;
            };
            let before = room.members.len();
            room.members.retain(|m| m.conn_id != conn_id);
            if room.members.len() == before {
                return;
            }
            let remaining = room.members.first().map(|m| m.tx.clone());
            if remaining.is_none() {
                rooms.remove(room_id);
                tracing::debug!(room = room_id, "room empty, removed");
            }
            remaining
        };
        tracing::info!(room = room_id, conn = conn_id, "left room");

        if let Some(remaining) = remaining {
            let _ = remaining
                .send(ServerMessage::PeerLeft {
                    peer_id: conn_id.to_string(),
                })
                .await;
        }
    }

    pub async fn room_size(&self, room_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map(|r| r.members.len()).unwrap_or(0)
    }
}
