//! Record store - the in-memory authoritative collections.
//!
//! The store holds items, loans and returns, validates every mutation, and
//! either persists the touched collection to a [`KeyValueStore`] (local mode)
//! or forwards the write to a [`CloudMirror`] (cloud mode). Committed
//! mutations are announced to the registered [`ChangeHook`]s.

use crate::{
    availability::{Ledger, LoanStatus},
    error::Result,
    hooks::{Change, ChangeEvent, ChangeHook, HookRegistry},
    mirror::StoreMode,
    storage::{KeyValueStore, WATERMARK_KEY},
    CollectionKind, Error, Item, ItemPatch, Loan, NewItem, NewLoan, NewReturn, Origin, Quantity,
    RecordId, Return, SyncWatermark, Timestamp,
};
use serde::de::DeserializeOwned;

/// The record store.
pub struct RecordStore {
    items: Vec<Item>,
    loans: Vec<Loan>,
    returns: Vec<Return>,
    /// Cloud adds handed to the mirror but not yet seen in a snapshot
    pending_items: Vec<Item>,
    watermark: SyncWatermark,
    storage: Box<dyn KeyValueStore>,
    mode: StoreMode,
    hooks: HookRegistry,
}

impl RecordStore {
    /// Create an empty store. Nothing is read from `storage`.
    pub fn new(storage: Box<dyn KeyValueStore>, mode: StoreMode) -> Self {
        Self {
            items: Vec::new(),
            loans: Vec::new(),
            returns: Vec::new(),
            pending_items: Vec::new(),
            watermark: SyncWatermark::default(),
            storage,
            mode,
            hooks: HookRegistry::new(),
        }
    }

    /// Open a store, loading whatever `storage` holds.
    ///
    /// In cloud mode only the watermark is loaded; collections arrive with
    /// the first mirror snapshot. Unreadable entries are logged and treated
    /// as empty.
    pub fn open(storage: Box<dyn KeyValueStore>, mode: StoreMode) -> Self {
        let mut store = Self::new(storage, mode);

        if !store.mode.is_cloud() {
            store.items = load_entry(store.storage.as_ref(), CollectionKind::Inventory.as_str())
                .unwrap_or_default();
            store.loans = load_entry(store.storage.as_ref(), CollectionKind::Loans.as_str())
                .unwrap_or_default();
            store.returns = load_entry(store.storage.as_ref(), CollectionKind::Returns.as_str())
                .unwrap_or_default();
        }
        store.watermark = load_entry(store.storage.as_ref(), WATERMARK_KEY).unwrap_or_default();

        tracing::info!(
            mode = ?store.mode,
            items = store.items.len(),
            loans = store.loans.len(),
            returns = store.returns.len(),
            "record store opened"
        );

        store
    }

    pub fn is_cloud(&self) -> bool {
        self.mode.is_cloud()
    }

    /// Register a change hook.
    pub fn register_hook(&mut self, hook: Box<dyn ChangeHook>) {
        self.hooks.register(hook);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn returns(&self) -> &[Return] {
        &self.returns
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Items added in cloud mode that the last snapshot did not contain yet.
    /// Always empty in local mode.
    pub fn pending_items(&self) -> &[Item] {
        &self.pending_items
    }

    /// A stored item, or a pending cloud add with this id.
    pub(crate) fn known_item(&self, id: &str) -> Option<&Item> {
        self.item(id)
            .or_else(|| self.pending_items.iter().find(|i| i.id == id))
    }

    /// First item whose name matches exactly.
    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn loan(&self, id: &str) -> Option<&Loan> {
        self.loans.iter().find(|l| l.id == id)
    }

    /// Snapshot view for derived quantities.
    pub fn ledger(&self) -> Ledger<'_> {
        Ledger::new(&self.items, &self.loans, &self.returns)
    }

    pub fn available_for(&self, item_name: &str) -> Quantity {
        self.ledger().available_for(item_name)
    }

    pub fn returned_qty_for_loan(&self, loan_id: &str) -> Quantity {
        self.ledger().returned_qty_for_loan(loan_id)
    }

    pub fn remaining_for_loan(&self, loan: &Loan) -> Quantity {
        self.ledger().remaining_for_loan(loan)
    }

    pub fn is_fully_returned(&self, loan: &Loan) -> bool {
        self.ledger().is_fully_returned(loan)
    }

    /// Items whose name contains `query`, sorted by name.
    pub fn search_items(&self, query: &str) -> Vec<&Item> {
        let q = query.trim();
        let mut found: Vec<&Item> = self.items.iter().filter(|i| i.name.contains(q)).collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Loans matching `query` on item, person, department or phone, newest
    /// first, with their return accounting.
    pub fn search_loans(&self, query: &str) -> Vec<LoanStatus> {
        let q = query.trim();
        let ledger = self.ledger();
        let mut found: Vec<&Loan> = self
            .loans
            .iter()
            .filter(|l| {
                [&l.item_name, &l.person, &l.dept, &l.phone]
                    .iter()
                    .any(|field| field.contains(q))
            })
            .collect();
        found.sort_by(|a, b| b.date.cmp(&a.date));
        found.into_iter().map(|l| ledger.loan_status(l)).collect()
    }

    /// Returns matching `query` on item or notes, newest first.
    pub fn search_returns(&self, query: &str) -> Vec<&Return> {
        let q = query.trim();
        let mut found: Vec<&Return> = self
            .returns
            .iter()
            .filter(|r| r.item_name.contains(q) || r.notes.contains(q))
            .collect();
        found.sort_by(|a, b| b.date.cmp(&a.date));
        found
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    pub fn add_item(&mut self, payload: NewItem, now: Timestamp) -> Result<Item> {
        let item = payload.normalized()?.into_item(new_record_id());
        self.insert_item(item, Origin::Local, now)
    }

    /// Partial update: only fields present in `patch` overwrite.
    pub fn update_item(&mut self, id: &str, patch: ItemPatch, now: Timestamp) -> Result<Item> {
        self.patch_item(id, patch, Origin::Local, now)
    }

    pub fn delete_item(&mut self, id: &str, now: Timestamp) -> Result<()> {
        if self.known_item(id).is_none() {
            return Err(not_found(CollectionKind::Inventory, id));
        }

        if let StoreMode::Cloud(mirror) = &self.mode {
            mirror.delete(CollectionKind::Inventory, &id.to_string())?;
            self.pending_items.retain(|i| i.id != id);
        } else {
            self.items.retain(|i| i.id != id);
            self.persist(CollectionKind::Inventory);
        }

        self.emit(Change::ItemDeleted { id: id.into() }, Origin::Local, now);
        Ok(())
    }

    pub(crate) fn insert_item(&mut self, item: Item, origin: Origin, now: Timestamp) -> Result<Item> {
        if let StoreMode::Cloud(mirror) = &self.mode {
            mirror.add(CollectionKind::Inventory, &item.id, to_doc(&item)?)?;
            self.pending_items.push(item.clone());
        } else {
            self.items.push(item.clone());
            self.persist(CollectionKind::Inventory);
        }

        tracing::debug!(item_id = %item.id, name = %item.name, ?origin, "item added");
        self.emit(Change::ItemAdded { item: item.clone() }, origin, now);
        Ok(item)
    }

    pub(crate) fn patch_item(
        &mut self,
        id: &str,
        patch: ItemPatch,
        origin: Origin,
        now: Timestamp,
    ) -> Result<Item> {
        patch.validate()?;

        let mut updated = self
            .known_item(id)
            .cloned()
            .ok_or_else(|| not_found(CollectionKind::Inventory, id))?;
        patch.apply_to(&mut updated);

        if let StoreMode::Cloud(mirror) = &self.mode {
            mirror.update(CollectionKind::Inventory, &updated.id, to_doc(&patch)?)?;
            if let Some(pending) = self.pending_items.iter_mut().find(|i| i.id == id) {
                *pending = updated.clone();
            }
        } else {
            if let Some(slot) = self.items.iter_mut().find(|i| i.id == id) {
                *slot = updated.clone();
            }
            self.persist(CollectionKind::Inventory);
        }

        tracing::debug!(item_id = %updated.id, ?origin, "item updated");
        self.emit(
            Change::ItemUpdated {
                item: updated.clone(),
            },
            origin,
            now,
        );
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Loans
    // ------------------------------------------------------------------

    /// Record a loan. Rejected if it would drive the item's availability
    /// below zero.
    pub fn add_loan(&mut self, payload: NewLoan, now: Timestamp) -> Result<Loan> {
        let payload = payload.normalized()?;

        let available = self.available_for(&payload.item_name);
        if available - payload.qty < 0 {
            return Err(Error::InsufficientQuantity {
                item: payload.item_name,
                available,
                requested: payload.qty,
            });
        }

        let loan = payload.into_loan(new_record_id());
        if let StoreMode::Cloud(mirror) = &self.mode {
            mirror.add(CollectionKind::Loans, &loan.id, to_doc(&loan)?)?;
        } else {
            self.loans.push(loan.clone());
            self.persist(CollectionKind::Loans);
        }

        tracing::debug!(loan_id = %loan.id, item = %loan.item_name, qty = loan.qty, "loan added");
        self.emit(Change::LoanAdded { loan: loan.clone() }, Origin::Local, now);
        Ok(loan)
    }

    pub fn delete_loan(&mut self, id: &str, now: Timestamp) -> Result<()> {
        let index = self
            .loans
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| not_found(CollectionKind::Loans, id))?;

        if let StoreMode::Cloud(mirror) = &self.mode {
            mirror.delete(CollectionKind::Loans, &id.to_string())?;
        } else {
            self.loans.remove(index);
            self.persist(CollectionKind::Loans);
        }

        self.emit(Change::LoanDeleted { id: id.into() }, Origin::Local, now);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Returns
    // ------------------------------------------------------------------

    /// Record a return. When linked to an existing loan the quantity may not
    /// exceed that loan's remaining balance. A link to an unknown loan is
    /// kept as-is and only affects item-level availability.
    pub fn add_return(&mut self, payload: NewReturn, now: Timestamp) -> Result<Return> {
        let payload = payload.normalized()?;

        if let Some(loan_id) = &payload.loan_id {
            if let Some(loan) = self.loan(loan_id) {
                let max_returnable = self.remaining_for_loan(loan);
                if payload.qty > max_returnable {
                    return Err(Error::OverReturn {
                        loan_id: loan_id.clone(),
                        max_returnable,
                        requested: payload.qty,
                    });
                }
            } else {
                tracing::debug!(loan_id = %loan_id, "return linked to unknown loan");
            }
        }

        let ret = payload.into_return(new_record_id());
        if let StoreMode::Cloud(mirror) = &self.mode {
            mirror.add(CollectionKind::Returns, &ret.id, to_doc(&ret)?)?;
        } else {
            self.returns.push(ret.clone());
            self.persist(CollectionKind::Returns);
        }

        tracing::debug!(return_id = %ret.id, item = %ret.item_name, qty = ret.qty, "return added");
        self.emit(Change::ReturnAdded { ret: ret.clone() }, Origin::Local, now);
        Ok(ret)
    }

    pub fn delete_return(&mut self, id: &str, now: Timestamp) -> Result<()> {
        let index = self
            .returns
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| not_found(CollectionKind::Returns, id))?;

        if let StoreMode::Cloud(mirror) = &self.mode {
            mirror.delete(CollectionKind::Returns, &id.to_string())?;
        } else {
            self.returns.remove(index);
            self.persist(CollectionKind::Returns);
        }

        self.emit(Change::ReturnDeleted { id: id.into() }, Origin::Local, now);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cloud snapshots
    // ------------------------------------------------------------------

    /// Replace the items with a mirror snapshot, sorted by name.
    ///
    /// Pending cloud adds the snapshot contains are dropped from the
    /// pending list.
    pub fn replace_items(&mut self, mut items: Vec<Item>) {
        self.pending_items
            .retain(|pending| !items.iter().any(|i| i.id == pending.id));
        items.sort_by(|a, b| a.name.cmp(&b.name));
        self.items = items;
        self.persist(CollectionKind::Inventory);
    }

    /// Replace the loans with a mirror snapshot, newest first.
    pub fn replace_loans(&mut self, mut loans: Vec<Loan>) {
        loans.sort_by(|a, b| b.date.cmp(&a.date));
        self.loans = loans;
        self.persist(CollectionKind::Loans);
    }

    /// Replace the returns with a mirror snapshot, newest first.
    pub fn replace_returns(&mut self, mut returns: Vec<Return>) {
        returns.sort_by(|a, b| b.date.cmp(&a.date));
        self.returns = returns;
        self.persist(CollectionKind::Returns);
    }

    // ------------------------------------------------------------------
    // Watermark
    // ------------------------------------------------------------------

    pub fn watermark(&self) -> &SyncWatermark {
        &self.watermark
    }

    /// Move the watermark forward and persist it. Lower marks are ignored.
    pub(crate) fn advance_watermark(&mut self, observed: &SyncWatermark) {
        let before = self.watermark;
        self.watermark.merge(observed);
        if self.watermark == before {
            return;
        }

        match serde_json::to_string(&self.watermark) {
            Ok(json) => {
                if let Err(e) = self.storage.set(WATERMARK_KEY, &json) {
                    tracing::warn!("failed to persist sync watermark: {}", e);
                }
            }
            Err(e) => tracing::warn!("failed to encode sync watermark: {}", e),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Write one collection to storage. No-op in cloud mode; failures are
    /// logged and the in-memory state stays authoritative.
    fn persist(&mut self, kind: CollectionKind) {
        if self.mode.is_cloud() {
            return;
        }

        let encoded = match kind {
            CollectionKind::Inventory => serde_json::to_string(&self.items),
            CollectionKind::Loans => serde_json::to_string(&self.loans),
            CollectionKind::Returns => serde_json::to_string(&self.returns),
        };

        let result = encoded
            .map_err(|e| Error::Storage(e.to_string()))
            .and_then(|json| self.storage.set(kind.as_str(), &json));

        if let Err(e) = result {
            tracing::warn!(collection = %kind, "failed to persist collection: {}", e);
        }
    }

    fn emit(&mut self, change: Change, origin: Origin, timestamp: Timestamp) {
        let event = ChangeEvent {
            change,
            origin,
            timestamp,
        };
        self.hooks.fire(&event);
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("mode", &self.mode)
            .field("items", &self.items.len())
            .field("loans", &self.loans.len())
            .field("returns", &self.returns.len())
            .field("pending_items", &self.pending_items.len())
            .field("watermark", &self.watermark)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Generate an id for a new record.
pub fn new_record_id() -> RecordId {
    uuid::Uuid::new_v4().simple().to_string()
}

fn not_found(collection: CollectionKind, id: &str) -> Error {
    Error::RecordNotFound {
        collection,
        id: id.into(),
    }
}

fn to_doc<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::Mirror(e.to_string()))
}

fn load_entry<T: DeserializeOwned>(storage: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, "failed to read stored entry: {}", e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, "ignoring unreadable stored entry: {}", e);
            None
        }
    }
}
