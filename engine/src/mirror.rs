//! Cloud document mirror seam.
//!
//! In cloud mode the store does not mutate its own collections. Writes are
//! forwarded to a [`CloudMirror`] and the collections are replaced wholesale
//! whenever the mirror delivers a fresh snapshot (see
//! [`RecordStore::replace_items`](crate::RecordStore::replace_items)).

use crate::{error::Result, CollectionKind, RecordId};

/// A remote document collection set (one collection per [`CollectionKind`]).
///
/// Writes are fire-and-forget: an `Ok` means the write was handed off, not
/// that the remote accepted it. Delivery failures surface later, if at all,
/// as a snapshot that lacks the change.
pub trait CloudMirror: Send {
    /// Add a document.
    fn add(&self, collection: CollectionKind, id: &RecordId, doc: serde_json::Value) -> Result<()>;

    /// Merge fields into an existing document.
    fn update(
        &self,
        collection: CollectionKind,
        id: &RecordId,
        fields: serde_json::Value,
    ) -> Result<()>;

    /// Delete a document.
    fn delete(&self, collection: CollectionKind, id: &RecordId) -> Result<()>;
}

/// Mode the store runs in for the whole session.
pub enum StoreMode {
    /// Collections live in memory and are persisted to the key-value store
    Local,
    /// Collections mirror a remote document store
    Cloud(Box<dyn CloudMirror>),
}

impl StoreMode {
    pub fn is_cloud(&self) -> bool {
        matches!(self, StoreMode::Cloud(_))
    }
}

impl std::fmt::Debug for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreMode::Local => f.write_str("Local"),
            StoreMode::Cloud(_) => f.write_str("Cloud"),
        }
    }
}
