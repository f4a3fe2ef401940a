use serde::{Deserialize, Serialize};

pub mod channel;
pub mod frame;
pub mod signaling;
pub mod transfer;

/// Metadata describing the file of a transfer session.
///
/// Sent once as the first frame of every transfer and immutable afterwards;
/// `size` is the byte count the receiver checks against on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    /// MIME type, carried as `type` on the wire.
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Reports from a transfer session to the owning caller (UI, test harness).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Receiver learned the file metadata; sender announced it.
    Metadata(FileMeta),
    Progress {
        percent: f32,
        bytes: u64,
        total: u64,
        is_sending: bool,
    },
    Completed {
        file_name: String,
    },
    Failed(String),
}
