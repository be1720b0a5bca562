//! Change hooks fired after committed mutations.
//!
//! Hooks are pure notification. They run synchronously, in registration
//! order, after the mutation is already applied; an error from a hook is
//! logged and otherwise ignored.

use crate::{CollectionKind, Item, Loan, Origin, RecordId, Return, Timestamp};
use serde::Serialize;

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

/// The fixed set of extension points, one per collection and change kind.
///
/// `LoanUpdated` and `ReturnUpdated` exist for completeness; loans and
/// returns are immutable once created, so the store never emits them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Change {
    ItemAdded { item: Item },
    ItemUpdated { item: Item },
    ItemDeleted { id: RecordId },
    LoanAdded { loan: Loan },
    LoanUpdated { loan: Loan },
    LoanDeleted { id: RecordId },
    ReturnAdded {
        #[serde(rename = "return")]
        ret: Return,
    },
    ReturnUpdated {
        #[serde(rename = "return")]
        ret: Return,
    },
    ReturnDeleted { id: RecordId },
}

impl Change {
    pub fn collection(&self) -> CollectionKind {
        match self {
            Change::ItemAdded { .. } | Change::ItemUpdated { .. } | Change::ItemDeleted { .. } => {
                CollectionKind::Inventory
            }
            Change::LoanAdded { .. } | Change::LoanUpdated { .. } | Change::LoanDeleted { .. } => {
                CollectionKind::Loans
            }
            Change::ReturnAdded { .. }
            | Change::ReturnUpdated { .. }
            | Change::ReturnDeleted { .. } => CollectionKind::Returns,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::ItemAdded { .. } | Change::LoanAdded { .. } | Change::ReturnAdded { .. } => {
                ChangeKind::Add
            }
            Change::ItemUpdated { .. }
            | Change::LoanUpdated { .. }
            | Change::ReturnUpdated { .. } => ChangeKind::Update,
            Change::ItemDeleted { .. }
            | Change::LoanDeleted { .. }
            | Change::ReturnDeleted { .. } => ChangeKind::Delete,
        }
    }

    /// Id of the affected record.
    pub fn record_id(&self) -> &RecordId {
        match self {
            Change::ItemAdded { item } | Change::ItemUpdated { item } => &item.id,
            Change::LoanAdded { loan } | Change::LoanUpdated { loan } => &loan.id,
            Change::ReturnAdded { ret } | Change::ReturnUpdated { ret } => &ret.id,
            Change::ItemDeleted { id } | Change::LoanDeleted { id } | Change::ReturnDeleted { id } => {
                id
            }
        }
    }

    /// The affected record as JSON, absent for deletions.
    pub fn payload(&self) -> Option<serde_json::Value> {
        let value = match self {
            Change::ItemAdded { item } | Change::ItemUpdated { item } => serde_json::to_value(item),
            Change::LoanAdded { loan } | Change::LoanUpdated { loan } => serde_json::to_value(loan),
            Change::ReturnAdded { ret } | Change::ReturnUpdated { ret } => serde_json::to_value(ret),
            _ => return None,
        };
        value.ok()
    }
}

/// A committed change, as delivered to hooks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(flatten)]
    pub change: Change,
    pub origin: Origin,
    pub timestamp: Timestamp,
}

/// Error type hooks report; only ever logged.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A consumer of change events.
pub trait ChangeHook: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn on_change(&mut self, event: &ChangeEvent) -> Result<(), HookError>;
}

/// Ordered set of registered hooks.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn ChangeHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn ChangeHook>) {
        tracing::debug!(hook = hook.name(), "change hook registered");
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Deliver an event to every hook. Failures are logged, never returned.
    pub fn fire(&mut self, event: &ChangeEvent) {
        for hook in &mut self.hooks {
            if let Err(e) = hook.on_change(event) {
                tracing::warn!(
                    hook = hook.name(),
                    collection = %event.change.collection(),
                    record_id = %event.change.record_id(),
                    "change hook failed: {}",
                    e
                );
            }
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        seen: Arc<Mutex<Vec<ChangeKind>>>,
    }

    impl ChangeHook for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_change(&mut self, event: &ChangeEvent) -> Result<(), HookError> {
            self.seen.lock().unwrap().push(event.change.kind());
            Ok(())
        }
    }

    struct Failing;

    impl ChangeHook for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_change(&mut self, _event: &ChangeEvent) -> Result<(), HookError> {
            Err("endpoint unreachable".into())
        }
    }

    fn deleted(id: &str) -> ChangeEvent {
        ChangeEvent {
            change: Change::LoanDeleted { id: id.into() },
            origin: Origin::Local,
            timestamp: 1000,
        }
    }

    #[test]
    fn failing_hook_does_not_stop_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register(Box::new(Failing));
        registry.register(Box::new(Recorder { seen: seen.clone() }));

        registry.fire(&deleted("loan-1"));

        assert_eq!(registry.len(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![ChangeKind::Delete]);
    }

    #[test]
    fn empty_registry_is_fine() {
        let mut registry = HookRegistry::new();
        registry.fire(&deleted("loan-1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn event_accessors() {
        let event = deleted("loan-9");
        assert_eq!(event.change.collection(), CollectionKind::Loans);
        assert_eq!(event.change.record_id(), "loan-9");
        assert!(event.change.payload().is_none());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "loanDeleted");
        assert_eq!(json["origin"], "local");
        assert_eq!(json["timestamp"], 1000);
    }
}
