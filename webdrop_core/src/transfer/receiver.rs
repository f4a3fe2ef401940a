//! Receiver side of a transfer session.
//!
//! [`ReceiverSession`] is the frame-by-frame state machine; [`receive`]
//! drives it from peer-channel events and reports to the owning caller.

use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use super::{SessionState, TransferError, percent};
use crate::channel::{ChannelEvent, PeerChannel};
use crate::frame::Frame;
use crate::{FileMeta, SessionEvent};

/// A fully assembled transfer.
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    pub meta: FileMeta,
    pub bytes: Bytes,
}

impl ReceivedFile {
    /// Write the assembled bytes into `dir` under the declared file name.
    /// The name is reduced to its final component so a hostile sender cannot
    /// steer the write outside the directory.
    pub async fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let name = Path::new(&self.meta.name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown_file.bin".to_string());
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// What one accepted frame meant.
#[derive(Debug)]
pub enum FrameOutcome {
    Metadata(FileMeta),
    Progress { percent: f32, bytes: u64, total: u64 },
    Complete(ReceivedFile),
}

/// Receiver state machine. Starts in `Connected` (a session only exists once
/// the peer channel is up); the first frame must be metadata, chunks
/// accumulate in arrival order, and done closes the session after the size
/// check. Any rejected frame drives the session to `Failed` for good.
pub struct ReceiverSession {
    state: SessionState,
    meta: Option<FileMeta>,
    chunks: Vec<Bytes>,
    received: u64,
}

impl Default for ReceiverSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Connected,
            meta: None,
            chunks: Vec::new(),
            received: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.received
    }

    pub fn on_frame(&mut self, frame: Frame) -> Result<FrameOutcome, TransferError> {
        let outcome = self.apply(frame);
        if outcome.is_err() {
            self.state = SessionState::Failed;
        }
        outcome
    }

    fn apply(&mut self, frame: Frame) -> Result<FrameOutcome, TransferError> {
        match (self.state, frame) {
            (SessionState::Connected, Frame::Metadata(meta)) => {
                self.meta = Some(meta.clone());
                self.state = SessionState::Transferring;
                Ok(FrameOutcome::Metadata(meta))
            }
            (SessionState::Connected, _) => {
                Err(TransferError::UnexpectedFrame("first frame must be metadata"))
            }
            (SessionState::Transferring, Frame::Chunk(data)) => {
                self.received += data.len() as u64;
                self.chunks.push(Bytes::from(data));
                let total = self.meta.as_ref().map(|m| m.size).unwrap_or(0);
                Ok(FrameOutcome::Progress {
                    percent: percent(self.received, total),
                    bytes: self.received,
                    total,
                })
            }
            (SessionState::Transferring, Frame::Done) => {
                let Some(meta) = self.meta.take() else {
                    return Err(TransferError::UnexpectedFrame("done before metadata"));
                };
                if self.received != meta.size {
                    return Err(TransferError::SizeMismatch {
                        declared: meta.size,
                        received: self.received,
                    });
                }
                let mut assembled = BytesMut::with_capacity(self.received as usize);
                for chunk in self.chunks.drain(..) {
                    assembled.extend_from_slice(&chunk);
                }
                self.state = SessionState::Complete;
                Ok(FrameOutcome::Complete(ReceivedFile {
                    meta,
                    bytes: assembled.freeze(),
                }))
            }
            (SessionState::Transferring, Frame::Metadata(_)) => {
                Err(TransferError::UnexpectedFrame("duplicate metadata frame"))
            }
            (SessionState::Complete, _) => {
                Err(TransferError::UnexpectedFrame("frame received after done"))
            }
            (SessionState::Failed, _) => {
                Err(TransferError::UnexpectedFrame("session already failed"))
            }
            (SessionState::Idle, _) => {
                Err(TransferError::UnexpectedFrame("peer channel not connected"))
            }
        }
    }
}

/// Drive a receiver session off a connected peer channel until the file is
/// assembled. Channel errors or closure before done are terminal; the
/// returned error is the single error report for the session.
pub async fn receive(
    channel: &mut PeerChannel,
    event_tx: &mpsc::Sender<SessionEvent>,
) -> Result<ReceivedFile, TransferError> {
    let mut session = ReceiverSession::new();

    loop {
        let event = channel
            .next_event()
            .await
            .ok_or(TransferError::ChannelClosed)?;
        match event {
            ChannelEvent::Data(raw) => {
                let frame = Frame::decode(&raw)?;
                match session.on_frame(frame)? {
                    FrameOutcome::Metadata(meta) => {
                        tracing::info!(name = meta.name, size = meta.size, "receiving file");
                        let _ = event_tx.send(SessionEvent::Metadata(meta)).await;
                    }
                    FrameOutcome::Progress {
                        percent,
                        bytes,
                        total,
                    } => {
                        let _ = event_tx
                            .send(SessionEvent::Progress {
                                percent,
                                bytes,
                                total,
                                is_sending: false,
                            })
                            .await;
                    }
                    FrameOutcome::Complete(file) => {
                        let _ = event_tx
                            .send(SessionEvent::Progress {
                                percent: 100.0,
                                bytes: file.meta.size,
                                total: file.meta.size,
                                is_sending: false,
                            })
                            .await;
                        let _ = event_tx
                            .send(SessionEvent::Completed {
                                file_name: file.meta.name.clone(),
                            })
                            .await;
                        tracing::info!(bytes = file.meta.size, "file received");
                        return Ok(file);
                    }
                }
            }
            ChannelEvent::Error(e) => return Err(TransferError::Channel(e)),
            ChannelEvent::Closed => return Err(TransferError::ChannelClosed),
            // A late re-announce of the connect, or a straggling signaling
            // payload; neither carries transfer state.
            ChannelEvent::Connected | ChannelEvent::Signal(_) => {}
        }
    }
}
