//! Signaling client for the rendezvous relay.
//!
//! Drives one local connection through the pairing handshake: join a room,
//! wait for the second member if we got there first, then shuttle opaque
//! signaling payloads between the relay and the peer channel until the
//! channel reports connected. Every wait is keyed on a protocol milestone
//! (`room-joined`, `peer-joined`, channel connect); there are no timers.
//!
//! The client is an explicit handle with caller-managed lifetime. Dropping it
//! closes the socket and abandons any in-flight handshake; the relay's
//! disconnect cleanup takes care of the rest.

pub mod messages;

pub use messages::{ClientMessage, PeerRole, ServerMessage};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::channel::{ChannelError, ChannelEvent, PeerChannel};

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed server message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("signaling connection closed")]
    ConnectionClosed,
    #[error("peer left the room")]
    PeerLeft,
    #[error("peer channel error: {0}")]
    Channel(String),
    #[error("peer channel closed before connecting")]
    ChannelClosed,
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ChannelError> for SignalError {
    fn from(_: ChannelError) -> Self {
        SignalError::ChannelClosed
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy)]
pub struct JoinInfo {
    pub role: PeerRole,
    /// 1 when we created the room, 2 when we completed the pair.
    pub room_size: usize,
}

pub struct SignalingClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    room: Option<String>,
}

impl SignalingClient {
    pub async fn connect(url: &str) -> Result<Self, SignalError> {
        let (ws, _) = connect_async(url).await?;
        tracing::debug!(url, "signaling connection established");
        Ok(Self { ws, room: None })
    }

    /// Join the named room and wait for the relay's verdict.
    pub async fn join(&mut self, room: &str) -> Result<JoinInfo, SignalError> {
        self.send(&ClientMessage::JoinRoom {
            room: room.to_string(),
        })
        .await?;

        loop {
            match self.next_server_message().await? {
                ServerMessage::RoomJoined { role, room_size } => {
                    self.room = Some(room.to_string());
                    tracing::info!(room, ?role, room_size, "joined room");
                    return Ok(JoinInfo { role, room_size });
                }
                ServerMessage::RoomFull { room } => return Err(SignalError::RoomFull(room)),
                ServerMessage::Error { message } => return Err(SignalError::Protocol(message)),
                other => tracing::debug!(?other, "ignoring message while joining"),
            }
        }
    }

    /// Block until the second member arrives. The first joiner must call this
    /// before relaying anything: an offer produced for an empty room would be
    /// dropped by the relay. There is deliberately no timeout here; callers
    /// can wrap the future in `tokio::time::timeout` if they want one.
    pub async fn wait_for_peer(&mut self) -> Result<String, SignalError> {
        loop {
            match self.next_server_message().await? {
                ServerMessage::PeerJoined { peer_id } => {
                    tracing::info!(peer_id, "peer joined");
                    return Ok(peer_id);
                }
                ServerMessage::PeerLeft { .. } => return Err(SignalError::PeerLeft),
                other => tracing::debug!(?other, "ignoring message while waiting for peer"),
            }
        }
    }

    /// Relay a locally generated signaling payload to the peer.
    pub async fn send_signal(&mut self, signal: Value) -> Result<(), SignalError> {
        let room = self
            .room
            .clone()
            .ok_or_else(|| SignalError::Protocol("not in a room".to_string()))?;
        self.send(&ClientMessage::Signal { room, signal }).await
    }

    /// Shuttle signaling payloads between the relay and the peer channel
    /// until the channel reports connected. Returns with the channel ready
    /// for a transfer session.
    pub async fn drive_handshake(
        &mut self,
        channel: &mut PeerChannel,
    ) -> Result<(), SignalError> {
        loop {
            tokio::select! {
                event = channel.next_event() => match event {
                    Some(ChannelEvent::Signal(payload)) => self.send_signal(payload).await?,
                    Some(ChannelEvent::Connected) => {
                        tracing::info!("peer channel connected");
                        return Ok(());
                    }
                    Some(ChannelEvent::Error(e)) => return Err(SignalError::Channel(e)),
                    Some(ChannelEvent::Closed) | None => return Err(SignalError::ChannelClosed),
                    Some(ChannelEvent::Data(_)) => {
                        tracing::warn!("peer channel data before connect, dropped");
                    }
                },
                msg = self.ws.next() => {
                    let msg = msg.ok_or(SignalError::ConnectionClosed)??;
                    let Some(parsed) = parse_server_message(msg)? else { continue };
                    match parsed {
                        ServerMessage::Signal { signal } => channel.signal(signal).await?,
                        ServerMessage::PeerLeft { .. } => return Err(SignalError::PeerLeft),
                        ServerMessage::Error { message } => {
                            return Err(SignalError::Protocol(message));
                        }
                        other => tracing::debug!(?other, "ignoring message during handshake"),
                    }
                }
            }
        }
    }

    /// Leave the current room, keeping the connection for a later join.
    pub async fn leave(&mut self) -> Result<(), SignalError> {
        if let Some(room) = self.room.take() {
            self.send(&ClientMessage::LeaveRoom { room }).await?;
        }
        Ok(())
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<(), SignalError> {
        let text = serde_json::to_string(msg)?;
        self.ws.send(Message::text(text)).await?;
        Ok(())
    }

    async fn next_server_message(&mut self) -> Result<ServerMessage, SignalError> {
        while let Some(msg) = self.ws.next().await {
            if let Some(parsed) = parse_server_message(msg?)? {
                return Ok(parsed);
            }
        }
        Err(SignalError::ConnectionClosed)
    }
}

fn parse_server_message(msg: Message) -> Result<Option<ServerMessage>, SignalError> {
    match msg {
        Message::Text(text) => Ok(Some(serde_json::from_str(text.as_str())?)),
        // Pings are answered by tungstenite itself.
        _ => Ok(None),
    }
}
