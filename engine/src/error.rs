//! Error types for the Custody engine.

use crate::{CollectionKind, Quantity, RecordId};
use thiserror::Error;

/// All possible errors from the Custody engine.
///
/// Validation errors are returned before any state is touched. Storage and
/// hook failures are logged by the store and never fail a mutation; a mirror
/// that refuses a write in cloud mode does.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("item name is required")]
    MissingItemName,

    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Quantity),

    #[error("{field} must not be negative, got {value}")]
    NegativeQuantity { field: &'static str, value: Quantity },

    #[error("insufficient quantity for '{item}': {available} available, {requested} requested")]
    InsufficientQuantity {
        item: String,
        available: Quantity,
        requested: Quantity,
    },

    #[error("cannot return {requested} against loan {loan_id}: at most {max_returnable} remaining")]
    OverReturn {
        loan_id: RecordId,
        max_returnable: Quantity,
        requested: Quantity,
    },

    #[error("{collection} record not found: {id}")]
    RecordNotFound {
        collection: CollectionKind,
        id: RecordId,
    },

    // Collaborator errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("cloud mirror error: {0}")]
    Mirror(String),

    #[error("change hook failed: {0}")]
    Hook(String),
}

impl Error {
    /// True for errors caused by the caller's input rather than a collaborator.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Error::Storage(_) | Error::Mirror(_) | Error::Hook(_) | Error::RecordNotFound { .. }
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
