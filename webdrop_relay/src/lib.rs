//! Rendezvous relay for webdrop.
//!
//! Pairs two signaling connections in a room and relays their opaque
//! connection offers; it never sees file data and runs no transfer logic.
//! The chunked transfer itself lives in `webdrop_core` and happens directly
//! between the peers once their channel is up.

pub mod config;
pub mod room;
pub mod ws;

pub use config::RelayConfig;
pub use room::{JoinOutcome, RoomError, RoomRegistry};
pub use ws::create_router;
