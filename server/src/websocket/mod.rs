//! WebSocket live change feed.
//!
//! Clients connect via WebSocket and are told whenever a record changes,
//! a spreadsheet merge lands, or a cloud snapshot replaces a collection, so
//! they can re-read what they display.

mod manager;
mod protocol;

pub use manager::{ConnectionManager, LiveFeedHook};
pub use protocol::*;
