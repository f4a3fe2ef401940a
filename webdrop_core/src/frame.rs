//! Frame codec for the peer-channel transfer protocol.
//!
//! Exactly one `Metadata` frame precedes all `Chunk` frames and exactly one
//! `Done` frame follows the last chunk. Frames carry no sequence numbers;
//! ordering comes from the peer channel itself.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::FileMeta;

/// A malformed or unrecognized frame. Surfaces as a failed session,
/// never a crash.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One protocol message on the peer channel, encoded as a tagged record
/// `{kind: "metadata" | "chunk" | "done", data?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Frame {
    Metadata(FileMeta),
    Chunk(Vec<u8>),
    Done,
}

impl Frame {
    pub fn encode(&self) -> Bytes {
        // A closed enum of plain data always serializes.
        Bytes::from(serde_json::to_vec(self).expect("frame serialization"))
    }

    pub fn decode(raw: &[u8]) -> Result<Frame, FrameError> {
        Ok(serde_json::from_slice(raw)?)
    }
}
