//! Peer-channel capability.
//!
//! An established peer connection is exposed to the rest of the crate as a
//! pair of mpsc queues: commands in, events out. The transfer protocol relies
//! on the channel delivering frames reliably and exactly in emission order,
//! so any backing transport must preserve that guarantee (WebRTC data
//! channels in reliable ordered mode do). The in-process backend built by
//! [`memory_pair`] satisfies it trivially and doubles as the test transport.
//!
//! Connection establishment itself happens out of band: the driver emits
//! opaque signaling payloads as [`ChannelEvent::Signal`], the owner relays
//! them through the rendezvous server, and payloads arriving from the remote
//! side are fed back in with [`PeerChannel::signal`] until the driver reports
//! [`ChannelEvent::Connected`].

use bytes::Bytes;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::frame::Frame;

/// Queue depth for commands and events on one endpoint.
const ENDPOINT_QUEUE: usize = 64;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("peer channel closed")]
    Closed,
    #[error("unexpected event during local connect")]
    Handshake,
}

/// What the channel driver tells its owner.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Locally generated signaling payload that must be relayed to the peer.
    Signal(Value),
    /// The channel is established; frames may flow.
    Connected,
    /// One inbound frame, still encoded.
    Data(Bytes),
    Error(String),
    Closed,
}

/// What the owner tells the channel driver.
#[derive(Debug)]
pub enum ChannelCommand {
    /// Signaling payload relayed from the remote peer.
    Signal(Value),
    Send(Bytes),
    Close,
}

/// Owning handle for one end of a peer channel. Dropping it releases the
/// capability: the driver task observes the closed command queue and stops,
/// and the remote end sees [`ChannelEvent::Closed`].
pub struct PeerChannel {
    cmd_tx: mpsc::Sender<ChannelCommand>,
    event_rx: mpsc::Receiver<ChannelEvent>,
}

impl PeerChannel {
    /// Wrap the command/event queues of an already-spawned driver.
    pub fn new(cmd_tx: mpsc::Sender<ChannelCommand>, event_rx: mpsc::Receiver<ChannelEvent>) -> Self {
        Self { cmd_tx, event_rx }
    }

    /// Feed in a signaling payload relayed from the remote peer.
    pub async fn signal(&self, payload: Value) -> Result<(), ChannelError> {
        self.cmd_tx
            .send(ChannelCommand::Signal(payload))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    pub async fn send_frame(&self, frame: &Frame) -> Result<(), ChannelError> {
        self.send_raw(frame.encode()).await
    }

    pub async fn send_raw(&self, raw: Bytes) -> Result<(), ChannelError> {
        self.cmd_tx
            .send(ChannelCommand::Send(raw))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.event_rx.recv().await
    }

    /// Non-blocking poll, used by the sender to notice mid-transfer errors
    /// without suspending between chunks.
    pub fn try_event(&mut self) -> Option<ChannelEvent> {
        self.event_rx.try_recv().ok()
    }

    pub async fn close(&self) {
        let _ = self.cmd_tx.send(ChannelCommand::Close).await;
    }
}

#[derive(Clone, Copy)]
enum EndpointRole {
    Initiator,
    Responder,
}

/// Raw link between the two in-process endpoints.
#[derive(Debug)]
enum LinkMsg {
    Data(Bytes),
    Close,
}

/// Build two connected in-process endpoints. The first is the initiator: its
/// driver emits an offer payload immediately, the responder answers once that
/// offer is fed in, and both sides then report `Connected`. Data submitted on
/// one end surfaces on the other in submission order.
pub fn memory_pair() -> (PeerChannel, PeerChannel) {
    let (a_cmd_tx, a_cmd_rx) = mpsc::channel(ENDPOINT_QUEUE);
    let (a_event_tx, a_event_rx) = mpsc::channel(ENDPOINT_QUEUE);
    let (b_cmd_tx, b_cmd_rx) = mpsc::channel(ENDPOINT_QUEUE);
    let (b_event_tx, b_event_rx) = mpsc::channel(ENDPOINT_QUEUE);
    let (ab_tx, ab_rx) = mpsc::channel(ENDPOINT_QUEUE);
    let (ba_tx, ba_rx) = mpsc::channel(ENDPOINT_QUEUE);

    tokio::spawn(drive_endpoint(
        EndpointRole::Initiator,
        a_cmd_rx,
        a_event_tx,
        ab_tx,
        ba_rx,
    ));
    tokio::spawn(drive_endpoint(
        EndpointRole::Responder,
        b_cmd_rx,
        b_event_tx,
        ba_tx,
        ab_rx,
    ));

    (
        PeerChannel::new(a_cmd_tx, a_event_rx),
        PeerChannel::new(b_cmd_tx, b_event_rx),
    )
}

async fn drive_endpoint(
    role: EndpointRole,
    mut cmd_rx: mpsc::Receiver<ChannelCommand>,
    event_tx: mpsc::Sender<ChannelEvent>,
    link_tx: mpsc::Sender<LinkMsg>,
    mut link_rx: mpsc::Receiver<LinkMsg>,
) {
    if matches!(role, EndpointRole::Initiator) {
        // The offer sits in the owner's event queue until the owner decides
        // to relay it, so emitting it up front cannot race an empty room.
        if event_tx
            .send(ChannelEvent::Signal(json!({ "sdp": "offer" })))
            .await
            .is_err()
        {
            return;
        }
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(ChannelCommand::Signal(payload)) => {
                    let events = match (role, payload.get("sdp").and_then(Value::as_str)) {
                        (EndpointRole::Responder, Some("offer")) => vec![
                            ChannelEvent::Signal(json!({ "sdp": "answer" })),
                            ChannelEvent::Connected,
                        ],
                        (EndpointRole::Initiator, Some("answer")) => vec![ChannelEvent::Connected],
                        _ => vec![ChannelEvent::Error(format!(
                            "unexpected signaling payload: {payload}"
                        ))],
                    };
                    for event in events {
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Some(ChannelCommand::Send(raw)) => {
                    if link_tx.send(LinkMsg::Data(raw)).await.is_err() {
                        let _ = event_tx.send(ChannelEvent::Closed).await;
                        return;
                    }
                }
                Some(ChannelCommand::Close) | None => {
                    let _ = link_tx.send(LinkMsg::Close).await;
                    return;
                }
            },
            msg = link_rx.recv() => match msg {
                Some(LinkMsg::Data(raw)) => {
                    if event_tx.send(ChannelEvent::Data(raw)).await.is_err() {
                        return;
                    }
                }
                Some(LinkMsg::Close) | None => {
                    let _ = event_tx.send(ChannelEvent::Closed).await;
                    return;
                }
            },
        }
    }
}

/// Complete the offer/answer exchange of a [`memory_pair`] directly, without
/// a rendezvous server in between. Transfer tests use this; the end-to-end
/// path relays the same payloads through the relay instead.
pub async fn connect_local(a: &mut PeerChannel, b: &mut PeerChannel) -> Result<(), ChannelError> {
    let offer = match a.next_event().await {
        Some(ChannelEvent::Signal(payload)) => payload,
        _ => return Err(ChannelError::Handshake),
    };
    b.signal(offer).await?;

    let answer = match b.next_event().await {
        Some(ChannelEvent::Signal(payload)) => payload,
        _ => return Err(ChannelError::Handshake),
    };
    if !matches!(b.next_event().await, Some(ChannelEvent::Connected)) {
        return Err(ChannelError::Handshake);
    }

    a.signal(answer).await?;
    if !matches!(a.next_event().await, Some(ChannelEvent::Connected)) {
        return Err(ChannelError::Handshake);
    }
    Ok(())
}
