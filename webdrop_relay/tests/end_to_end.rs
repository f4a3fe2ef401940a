//! The whole flow: two clients rendezvous through a real relay, establish a
//! peer channel by relaying its offer/answer payloads, and move a file.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::serve;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use webdrop_core::SessionEvent;
use webdrop_core::channel::memory_pair;
use webdrop_core::signaling::{PeerRole, SignalError, SignalingClient};
use webdrop_core::transfer::{receive, send_file};
use webdrop_relay::{RoomRegistry, create_router};

async fn spawn_relay() -> String {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init()
        .ok();
    let registry = Arc::new(RoomRegistry::new());
    let router = create_router(registry);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("ws://127.0.0.1:{port}/ws")
}

#[tokio::test]
async fn file_reaches_the_receiver_through_the_relay() {
    let url = spawn_relay().await;

    // The sharer creates the room and owns the initiating end of the peer
    // channel; the receiver follows the shared link.
    let (sender_chan, receiver_chan) = memory_pair();

    let mut sharer = SignalingClient::connect(&url).await.unwrap();
    let info = sharer.join("r1").await.unwrap();
    assert_eq!(info.role, PeerRole::Initiator);
    assert_eq!(info.room_size, 1);

    let mut guest = SignalingClient::connect(&url).await.unwrap();
    let info = guest.join("r1").await.unwrap();
    assert_eq!(info.role, PeerRole::Responder);
    assert_eq!(info.room_size, 2);

    let sharer_task = tokio::spawn(async move {
        let mut chan = sender_chan;
        // First joiner: no offer leaves before the peer is in the room.
        sharer.wait_for_peer().await?;
        sharer.drive_handshake(&mut chan).await?;
        Ok::<_, SignalError>(chan)
    });
    let guest_task = tokio::spawn(async move {
        let mut chan = receiver_chan;
        guest.drive_handshake(&mut chan).await?;
        Ok::<_, SignalError>(chan)
    });

    let mut sender_chan = sharer_task.await.unwrap().unwrap();
    let mut receiver_chan = guest_task.await.unwrap().unwrap();

    // Channel is up; the relay is out of the picture from here on.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    tokio::fs::write(&path, b"hello").await.unwrap();

    let (send_events, _send_events_rx) = mpsc::channel(64);
    let (recv_events, mut recv_events_rx) = mpsc::channel(64);

    let send_task = tokio::spawn(async move {
        match send_file(&mut sender_chan, &path, Some("text/plain"), &send_events).await {
            Ok(meta) => Ok(meta),
            Err(e) => {
                // The owner's single error report for the session.
                let _ = send_events.send(SessionEvent::Failed(e.to_string())).await;
                Err(e)
            }
        }
    });

    let received = receive(&mut receiver_chan, &recv_events).await.unwrap();
    assert_eq!(received.bytes.as_ref(), b"hello");
    assert_eq!(received.meta.name, "a.txt");
    assert_eq!(received.meta.size, 5);
    assert_eq!(received.meta.content_type, "text/plain");

    let sent_meta = send_task.await.unwrap().unwrap();
    assert_eq!(sent_meta.size, 5);

    // The receiver saw metadata, monotone progress up to exactly 100, and a
    // single completion.
    drop(recv_events);
    let mut saw_metadata = false;
    let mut completions = 0;
    let mut last_progress = 0.0f32;
    while let Some(event) = recv_events_rx.recv().await {
        match event {
            SessionEvent::Metadata(meta) => {
                assert_eq!(meta.name, "a.txt");
                saw_metadata = true;
            }
            SessionEvent::Progress { percent, .. } => {
                assert!(percent >= last_progress);
                last_progress = percent;
            }
            SessionEvent::Completed { file_name } => {
                assert_eq!(file_name, "a.txt");
                completions += 1;
            }
            SessionEvent::Failed(e) => panic!("session failed: {e}"),
        }
    }
    assert!(saw_metadata);
    assert_eq!(last_progress, 100.0);
    assert_eq!(completions, 1);

    // And the assembled bytes land on disk under the declared name.
    let out_dir = tempfile::tempdir().unwrap();
    let saved = received.save_to(out_dir.path()).await.unwrap();
    assert_eq!(tokio::fs::read(&saved).await.unwrap(), b"hello");
}

#[tokio::test]
async fn joining_a_full_room_is_a_typed_error() {
    let url = spawn_relay().await;

    let mut a = SignalingClient::connect(&url).await.unwrap();
    a.join("busy").await.unwrap();
    let mut b = SignalingClient::connect(&url).await.unwrap();
    b.join("busy").await.unwrap();

    let mut c = SignalingClient::connect(&url).await.unwrap();
    match c.join("busy").await {
        Err(SignalError::RoomFull(room)) => assert_eq!(room, "busy"),
        other => panic!("expected room-full, got {other:?}"),
    }
}

#[tokio::test]
async fn peer_leaving_mid_handshake_aborts_the_wait() {
    let url = spawn_relay().await;

    let mut a = SignalingClient::connect(&url).await.unwrap();
    a.join("r1").await.unwrap();
    let mut b = SignalingClient::connect(&url).await.unwrap();
    b.join("r1").await.unwrap();
    b.close().await;

    // a sees peer-joined first, then peer-left ends the wait-for-peer flow.
    a.wait_for_peer().await.unwrap();
    match a.wait_for_peer().await {
        Err(SignalError::PeerLeft) => {}
        other => panic!("expected peer-left, got {other:?}"),
    }
}
