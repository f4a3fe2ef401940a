//! Chunked file transfer over an established peer channel.
//!
//! One session moves exactly one file. The sender frames the file into
//! fixed-size chunks behind a single metadata frame and a trailing done
//! frame; the receiver accumulates chunks in arrival order and assembles the
//! final byte sequence on done. There is no retry or resume at this layer:
//! any failure is terminal and the whole flow restarts with a fresh room.

pub mod receiver;
pub mod sender;

pub use receiver::{FrameOutcome, ReceivedFile, ReceiverSession, receive};
pub use sender::send_file;

use thiserror::Error;

use crate::frame::FrameError;

/// Chunk size for file slicing (16 KiB). Small enough to stay under typical
/// peer-channel message-size ceilings, large enough to amortize the framing
/// overhead.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Session lifecycle. `Failed` is terminal and reachable from every
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, peer channel not yet connected.
    Idle,
    Connected,
    Transferring,
    Complete,
    Failed,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to read source file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("peer channel error: {0}")]
    Channel(String),
    #[error("peer channel closed mid-transfer")]
    ChannelClosed,
    #[error("protocol violation: {0}")]
    UnexpectedFrame(&'static str),
    #[error(transparent)]
    Decode(#[from] FrameError),
    #[error("size mismatch: declared {declared} bytes, received {received}")]
    SizeMismatch { declared: u64, received: u64 },
}

impl From<crate::channel::ChannelError> for TransferError {
    fn from(_: crate::channel::ChannelError) -> Self {
        TransferError::ChannelClosed
    }
}

/// Completion fraction in percent. An empty file is 100% done the moment the
/// session reaches it.
pub(crate) fn percent(done: u64, total: u64) -> f32 {
    if total == 0 {
        100.0
    } else {
        (done as f64 / total as f64 * 100.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_exact_at_the_ends() {
        assert_eq!(percent(0, 100), 0.0);
        assert_eq!(percent(100, 100), 100.0);
        assert_eq!(percent(0, 0), 100.0);
    }

    #[test]
    fn percent_is_monotone() {
        let total = 5 * CHUNK_SIZE as u64 + 37;
        let mut last = 0.0f32;
        let mut done = 0;
        while done < total {
            done = (done + CHUNK_SIZE as u64).min(total);
            let p = percent(done, total);
            assert!(p >= last);
            last = p;
        }
        assert_eq!(last, 100.0);
    }
}
