//! Edge case tests for custody-engine
//!
//! Scenario walkthroughs plus boundary conditions and unusual inputs.

use custody_engine::{
    ChangeEvent, ChangeHook, CollectionKind, Error, HookError, ImportPolicy, Importer, ItemPatch,
    MemoryStorage, NewItem, NewLoan, NewReturn, Origin, RecordStore, Report, StoreMode,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn local_store() -> RecordStore {
    RecordStore::open(Box::new(MemoryStorage::new()), StoreMode::Local)
}

fn feed(value: Value) -> Vec<Vec<Value>> {
    serde_json::from_value(value).unwrap()
}

struct OriginLog(Arc<Mutex<Vec<Origin>>>);

impl ChangeHook for OriginLog {
    fn name(&self) -> &str {
        "origin-log"
    }

    fn on_change(&mut self, event: &ChangeEvent) -> Result<(), HookError> {
        self.0.lock().unwrap().push(event.origin);
        Ok(())
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn availability_scenario() {
    let mut store = local_store();
    store.add_item(NewItem::new("Drill", 10, 10), 1000).unwrap();
    store
        .add_loan(NewLoan::new("Drill", 4, "2024-05-01"), 1000)
        .unwrap();
    store
        .add_return(NewReturn::new("Drill", 1, "2024-05-02"), 2000)
        .unwrap();

    assert_eq!(store.available_for("Drill"), 7);
}

#[test]
fn over_return_scenario() {
    let mut store = local_store();
    store.add_item(NewItem::new("Drill", 5, 5), 1000).unwrap();
    let loan = store
        .add_loan(NewLoan::new("Drill", 5, "2024-05-01"), 1000)
        .unwrap();
    store
        .add_return(NewReturn::new("Drill", 3, "2024-05-02").for_loan(&loan.id), 2000)
        .unwrap();

    let before = store.returns().len();
    let result =
        store.add_return(NewReturn::new("Drill", 3, "2024-05-03").for_loan(&loan.id), 3000);

    assert!(matches!(result, Err(Error::OverReturn { max_returnable: 2, .. })));
    assert_eq!(store.returns().len(), before);
    assert_eq!(store.returned_qty_for_loan(&loan.id), 3);
}

#[test]
fn import_scenario() {
    let mut store = local_store();
    let importer = Importer::default();
    let rows = feed(json!([[1, "Drill", 5, 5, 5, ""]]));

    let report = importer.merge(&mut store, &rows, 1000);
    assert_eq!(report.created, 1);
    assert_eq!(store.items().len(), 1);
    assert_eq!(store.items()[0].total_qty, 5);

    let again = importer.merge(&mut store, &rows, 2000);
    assert_eq!(again.changed(), 0);
    assert_eq!(store.items().len(), 1);
}

#[test]
fn unlinked_return_only_moves_item_availability() {
    let mut store = local_store();
    store.add_item(NewItem::new("Saw", 2, 2), 1000).unwrap();
    let loan = store
        .add_loan(NewLoan::new("Saw", 2, "2024-05-01"), 1000)
        .unwrap();
    store
        .add_return(NewReturn::new("Saw", 1, "2024-05-02").for_loan("no-such-loan"), 2000)
        .unwrap();

    assert_eq!(store.available_for("Saw"), 1);
    assert_eq!(store.returned_qty_for_loan(&loan.id), 0);
    assert!(!store.is_fully_returned(&loan));
}

// ============================================================================
// Names
// ============================================================================

#[test]
fn unicode_item_names() {
    let mut store = local_store();
    let names = ["مثقاب", "ドリル", "Дрель", "🔧 wrench"];
    for name in names {
        store.add_item(NewItem::new(name, 3, 3), 1000).unwrap();
        store
            .add_loan(NewLoan::new(name, 1, "2024-05-01"), 1000)
            .unwrap();
        assert_eq!(store.available_for(name), 2);
    }
    assert_eq!(store.search_items("ドリ").len(), 1);
}

#[test]
fn renaming_orphans_history() {
    let mut store = local_store();
    let item = store.add_item(NewItem::new("Drill", 3, 3), 1000).unwrap();
    store
        .add_loan(NewLoan::new("Drill", 2, "2024-05-01"), 1000)
        .unwrap();

    store
        .update_item(
            &item.id,
            ItemPatch {
                name: Some("Hammer Drill".into()),
                ..Default::default()
            },
            2000,
        )
        .unwrap();

    assert_eq!(store.available_for("Hammer Drill"), 3);
    assert_eq!(store.available_for("Drill"), -2);
}

#[test]
fn blank_names_are_rejected() {
    let mut store = local_store();
    assert_eq!(
        store.add_item(NewItem::new("   ", 1, 1), 1000),
        Err(Error::MissingItemName)
    );
    assert_eq!(
        store.add_loan(NewLoan::new("", 1, "2024-05-01"), 1000),
        Err(Error::MissingItemName)
    );
    assert!(store.items().is_empty());
}

// ============================================================================
// Quantities
// ============================================================================

#[test]
fn zero_and_negative_quantities() {
    let mut store = local_store();
    store.add_item(NewItem::new("Tape", 0, 0), 1000).unwrap();

    assert!(matches!(
        store.add_item(NewItem::new("Rope", 0, -1), 1000),
        Err(Error::NegativeQuantity { field: "totalQty", .. })
    ));
    assert_eq!(
        store.add_loan(NewLoan::new("Tape", 0, "2024-05-01"), 1000),
        Err(Error::NonPositiveQuantity(0))
    );
    assert!(matches!(
        store.add_loan(NewLoan::new("Tape", 1, "2024-05-01"), 1000),
        Err(Error::InsufficientQuantity { available: 0, .. })
    ));
    assert!(matches!(
        store.add_return(NewReturn::new("Tape", 1, "2024-05-01").with_damaged(-1), 1000),
        Err(Error::NegativeQuantity { field: "damaged", .. })
    ));
}

#[test]
fn loan_exactly_at_availability() {
    let mut store = local_store();
    store.add_item(NewItem::new("Ladder", 2, 2), 1000).unwrap();
    store
        .add_loan(NewLoan::new("Ladder", 2, "2024-05-01"), 1000)
        .unwrap();
    assert_eq!(store.available_for("Ladder"), 0);
}

// ============================================================================
// Import
// ============================================================================

#[test]
fn header_rows_and_blank_rows_are_ignored() {
    let mut store = local_store();
    let rows = feed(json!([
        ["رقم", "الاسم", "الكمية الأصلية", "الكمية الكلية", "المتاح", "ملاحظات"],
        [],
        [2, ""],
        [3, "Clamp", "2", "2", "", "blue"]
    ]));

    let report = Importer::default().merge(&mut store, &rows, 1000);

    assert_eq!(report.skipped, 3);
    assert_eq!(report.created, 1);
    assert_eq!(store.item("item_3").unwrap().notes, "blue");
}

#[test]
fn edited_row_with_newer_timestamp_updates_in_place() {
    let mut store = local_store();
    let importer = Importer::default();

    importer.merge(
        &mut store,
        &feed(json!([[1, "Drill", 5, 5, 5, "", "2024-05-01T08:00:00Z"]])),
        1000,
    );
    let report = importer.merge(
        &mut store,
        &feed(json!([[1, "Drill", 5, 6, 6, "new case", "2024-05-02T08:00:00Z"]])),
        2000,
    );

    assert_eq!(report.updated, 1);
    assert_eq!(store.items().len(), 1);
    let item = store.item("item_1").unwrap();
    assert_eq!(item.total_qty, 6);
    assert_eq!(item.available_qty, Some(6));
    assert_eq!(item.last_modified.as_deref(), Some("2024-05-02T08:00:00Z"));
}

#[test]
fn older_timestamp_is_stale() {
    let mut store = local_store();
    let importer = Importer::default();

    importer.merge(
        &mut store,
        &feed(json!([[1, "Drill", 5, 5, 5, "", "2024-05-02"]])),
        1000,
    );
    let report = importer.merge(
        &mut store,
        &feed(json!([[1, "Drill", 5, 9, 9, "", "2024-05-01"]])),
        2000,
    );

    assert_eq!(report.stale, 1);
    assert_eq!(store.item("item_1").unwrap().total_qty, 5);
}

#[test]
fn import_events_are_remote() {
    let origins = Arc::new(Mutex::new(Vec::new()));
    let mut store = local_store();
    store.register_hook(Box::new(OriginLog(origins.clone())));

    store.add_item(NewItem::new("Saw", 1, 1), 1000).unwrap();
    Importer::new(ImportPolicy::new(vec![])).merge(
        &mut store,
        &feed(json!([[4, "Saw", 1, 2, "", ""], [5, "Level", 1, 1, "", ""]])),
        2000,
    );

    assert_eq!(
        *origins.lock().unwrap(),
        vec![Origin::Local, Origin::Remote, Origin::Remote]
    );
}

// ============================================================================
// Reports
// ============================================================================

#[test]
fn report_over_store() {
    let mut store = local_store();
    store.add_item(NewItem::new("Drill", 5, 5), 1000).unwrap();
    let loan = store
        .add_loan(
            NewLoan::new("Drill", 3, "2024-05-01")
                .borrowed_by("Omar", "Workshop", "555-0100")
                .due_on("2024-05-05"),
            1000,
        )
        .unwrap();

    let report = Report::build(&store.ledger(), "2024-05-06");
    assert_eq!(report.total_loaned, 3);
    assert_eq!(report.due.len(), 1);
    assert_eq!(report.due[0].remaining_qty, 3);

    store
        .add_return(NewReturn::new("Drill", 3, "2024-05-06").for_loan(&loan.id), 2000)
        .unwrap();
    assert!(Report::build(&store.ledger(), "2024-05-06").due.is_empty());
}

#[test]
fn not_found_carries_collection() {
    let mut store = local_store();
    let err = store.delete_return("r-404", 1000).unwrap_err();
    assert_eq!(
        err,
        Error::RecordNotFound {
            collection: CollectionKind::Returns,
            id: "r-404".into()
        }
    );
    assert_eq!(err.to_string(), "returns record not found: r-404");
}
