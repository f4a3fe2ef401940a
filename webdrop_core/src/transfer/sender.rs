//! Sender side of a transfer session.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use super::{CHUNK_SIZE, TransferError, percent};
use crate::channel::{ChannelEvent, PeerChannel};
use crate::frame::Frame;
use crate::{FileMeta, SessionEvent};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Send one file over a connected peer channel.
///
/// Emits the metadata frame, then reads the file sequentially in
/// [`CHUNK_SIZE`] slices with a single chunk in flight, and finishes with a
/// done frame. Progress is reported after each chunk is queued; the final
/// report is exactly 100, including for an empty file. Any failure is
/// terminal and done is never emitted after one.
pub async fn send_file(
    channel: &mut PeerChannel,
    path: &Path,
    content_type: Option<&str>,
    event_tx: &mpsc::Sender<SessionEvent>,
) -> Result<FileMeta, TransferError> {
    let mut file = File::open(path).await?;
    let total = file.metadata().await?.len();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown_file.bin")
        .to_string();

    let meta = FileMeta {
        name: name.clone(),
        size: total,
        content_type: content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string(),
    };
    tracing::info!(name, total, "sending file");

    channel.send_frame(&Frame::Metadata(meta.clone())).await?;
    let _ = event_tx.send(SessionEvent::Metadata(meta.clone())).await;

    let mut sent: u64 = 0;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        fail_on_channel_trouble(channel)?;

        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        channel.send_frame(&Frame::Chunk(buf[..n].to_vec())).await?;
        sent += n as u64;

        let _ = event_tx
            .send(SessionEvent::Progress {
                percent: percent(sent, total),
                bytes: sent,
                total,
                is_sending: true,
            })
            .await;
    }

    // The file changed size underneath us; the declared total is now a lie.
    if sent != total {
        return Err(TransferError::SizeMismatch {
            declared: total,
            received: sent,
        });
    }

    channel.send_frame(&Frame::Done).await?;
    let _ = event_tx
        .send(SessionEvent::Progress {
            percent: 100.0,
            bytes: sent,
            total,
            is_sending: true,
        })
        .await;
    let _ = event_tx
        .send(SessionEvent::Completed { file_name: name })
        .await;
    tracing::info!(bytes = sent, "file sent");

    Ok(meta)
}

/// Surface a channel error or closure noticed between chunks.
fn fail_on_channel_trouble(channel: &mut PeerChannel) -> Result<(), TransferError> {
    while let Some(event) = channel.try_event() {
        match event {
            ChannelEvent::Error(e) => return Err(TransferError::Channel(e)),
            ChannelEvent::Closed => return Err(TransferError::ChannelClosed),
            _ => {}
        }
    }
    Ok(())
}
