//! Per-connection handler for the rendezvous WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;
use webdrop_core::signaling::{ClientMessage, ServerMessage};

use crate::room::{RoomError, RoomRegistry};

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 32;

static CONNECTION_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Handle one signaling connection until it closes, then run the implicit
/// leave so the peer gets its `peer-left` notification.
pub async fn handle_socket(socket: WebSocket, registry: Arc<RoomRegistry>, client: String) {
    let conn_id = Uuid::new_v4().simple().to_string();
    let live = CONNECTION_COUNT.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::info!(conn = %conn_id, %client, live, "signaling connection established");

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);

    // Everything said to this client, by the handler or by the registry on
    // behalf of the peer, funnels through one queue; that keeps the
    // per-connection ordering the protocol depends on.
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize server message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // A connection is a member of at most one room.
    let mut joined: Option<String> = None;

    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(conn = %conn_id, error = %e, "socket error");
                break;
            }
        };
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Pings are answered by axum; binary has no meaning here.
            _ => continue,
        };

        let parsed: ClientMessage = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                let _ = out_tx
                    .send(ServerMessage::Error {
                        message: format!("malformed message: {e}"),
                    })
                    .await;
                continue;
            }
        };

        match parsed {
            ClientMessage::JoinRoom { room } => {
                if joined.is_some() {
                    let _ = out_tx
                        .send(ServerMessage::Error {
                            message: "already in a room".to_string(),
                        })
                        .await;
                    continue;
                }
                match registry.join(&room, &conn_id, out_tx.clone()).await {
                    Ok(outcome) => {
                        joined = Some(room);
                        let _ = out_tx
                            .send(ServerMessage::RoomJoined {
                                role: outcome.role,
                                room_size: outcome.room_size,
                            })
                            .await;
                    }
                    Err(RoomError::RoomFull(room)) => {
                        tracing::debug!(conn = %conn_id, room, "join rejected, room full");
                        let _ = out_tx.send(ServerMessage::RoomFull { room }).await;
                    }
                }
            }
            ClientMessage::Signal { room, signal } => {
                if joined.as_deref() != Some(room.as_str()) {
                    let _ = out_tx
                        .send(ServerMessage::Error {
                            message: "not a member of that room".to_string(),
                        })
                        .await;
                    continue;
                }
                // Dropped silently when the peer has not arrived yet.
                registry.relay(&room, &conn_id, signal).await;
            }
            ClientMessage::LeaveRoom { room } => {
                if joined.as_deref() == Some(room.as_str()) {
                    joined = None;
                    registry.leave(&room, &conn_id).await;
                }
            }
        }
    }

    if let Some(room) = joined {
        registry.leave(&room, &conn_id).await;
    }

    drop(out_tx);
    let _ = writer.await;
    let live = CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst) - 1;
    tracing::info!(conn = %conn_id, live, "signaling connection closed");
}
