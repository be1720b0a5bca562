//! # Custody Engine
//!
//! Core logic for an equipment custody tracker: what is owned, what is out on
//! loan, and what came back.
//!
//! The engine keeps three collections (items, loans, returns), derives
//! availability from them on demand, and merges rows from an external
//! spreadsheet feed. It has no IO of its own: persistence goes through a
//! [`KeyValueStore`], a remote document store through a [`CloudMirror`], and
//! every timestamp is passed in by the caller.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! - [`Item`] - a piece of equipment with an owned quantity
//! - [`Loan`] - units handed out, referring to the item by name
//! - [`Return`] - units coming back, optionally linked to a loan
//!
//! ### Availability
//!
//! The [`Ledger`] computes `totalQty - loaned + returned` per item name and
//! the returned / remaining balance per loan. Nothing is cached.
//!
//! ### Import
//!
//! The [`Importer`] merges feed rows into the store. A [`SyncWatermark`]
//! remembers the newest row already merged; rows it covers are skipped,
//! others are matched by external number, then by name, and created or
//! updated. Import never deletes.
//!
//! ### Change hooks
//!
//! Every committed mutation produces a [`ChangeEvent`] delivered to the
//! registered [`ChangeHook`]s. Events carry an [`Origin`] so consumers can
//! tell user edits from imported ones.
//!
//! ## Quick Start
//!
//! ```rust
//! use custody_engine::{
//!     MemoryStorage, NewItem, NewLoan, NewReturn, RecordStore, StoreMode,
//! };
//!
//! let mut store = RecordStore::open(Box::new(MemoryStorage::new()), StoreMode::Local);
//!
//! store.add_item(NewItem::new("Drill", 10, 10), 1706745600000).unwrap();
//! let loan = store
//!     .add_loan(NewLoan::new("Drill", 4, "2024-02-01"), 1706745600000)
//!     .unwrap();
//! store
//!     .add_return(NewReturn::new("Drill", 1, "2024-02-03").for_loan(&loan.id), 1706918400000)
//!     .unwrap();
//!
//! assert_eq!(store.available_for("Drill"), 7);
//! assert_eq!(store.remaining_for_loan(&loan), 3);
//! ```

pub mod availability;
pub mod error;
pub mod hooks;
pub mod import;
pub mod mirror;
pub mod record;
pub mod report;
pub mod storage;
pub mod store;
pub mod watermark;

// Re-export main types at crate root
pub use availability::{Ledger, LoanStatus};
pub use error::{Error, Result};
pub use hooks::{Change, ChangeEvent, ChangeHook, ChangeKind, HookError, HookRegistry};
pub use import::{
    normalize_name, parse_item_row, ImportPolicy, Importer, ItemRow, MergeReport, NoveltySignal,
    UnknownSignal,
};
pub use mirror::{CloudMirror, StoreMode};
pub use record::{
    CollectionKind, Item, ItemPatch, Loan, NewItem, NewLoan, NewReturn, Origin, Return,
};
pub use report::Report;
pub use storage::{KeyValueStore, MemoryStorage, WATERMARK_KEY};
pub use store::{new_record_id, RecordStore};
pub use watermark::SyncWatermark;

/// Type aliases for clarity
pub type RecordId = String;
/// Milliseconds since the Unix epoch
pub type Timestamp = i64;
pub type Quantity = i64;
