//! Merge policy for the external tabular feed.
//!
//! The feed is a list of rows with a fixed column order:
//!
//! ```text
//! [number, name, originalQty, totalQty, availableQty, notes, lastModified?]
//! ```
//!
//! A merge walks the rows once. Each row is parsed, checked against the
//! stored [`SyncWatermark`], matched against existing items and then either
//! creates an item, updates one in place, or leaves things alone. Import
//! never deletes.

use crate::{
    store::{new_record_id, RecordStore},
    Item, ItemPatch, NewItem, Origin, Quantity, SyncWatermark, Timestamp,
};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

/// First-cell values that mark a header row.
pub const HEADER_LABELS: &[&str] = &["رقم", "id", "number", "#"];

/// A feed column that can tell whether a row is newer than the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoveltySignal {
    /// The numeric identity column. Opt-in only: once the watermark passes a
    /// row's number, edits to that row are never imported again.
    Sequence,
    /// The last-modified column
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown novelty signal '{0}' (expected 'sequence' or 'timestamp')")]
pub struct UnknownSignal(pub String);

impl FromStr for NoveltySignal {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" | "seq" => Ok(NoveltySignal::Sequence),
            "timestamp" | "ts" | "time" => Ok(NoveltySignal::Timestamp),
            other => Err(UnknownSignal(other.to_string())),
        }
    }
}

/// How rows are gated before the field comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPolicy {
    /// Signals in precedence order. The first one a row carries decides
    /// whether the row is stale. Rows carrying none of them, and every row
    /// when this is empty, go to the field comparison.
    pub priority: Vec<NoveltySignal>,
}

impl Default for ImportPolicy {
    fn default() -> Self {
        Self {
            priority: vec![NoveltySignal::Timestamp],
        }
    }
}

impl ImportPolicy {
    pub fn new(priority: Vec<NoveltySignal>) -> Self {
        Self { priority }
    }

    /// Parse a comma-separated list such as `timestamp,sequence`.
    pub fn parse(list: &str) -> Result<Self, UnknownSignal> {
        let priority = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(NoveltySignal::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { priority })
    }

    /// True if the watermark already covers this row.
    pub fn is_stale(&self, row: &ItemRow, mark: &SyncWatermark) -> bool {
        for signal in &self.priority {
            match signal {
                NoveltySignal::Sequence => {
                    if let Some(seq) = row.sequence {
                        return mark.covers_sequence(seq);
                    }
                }
                NoveltySignal::Timestamp => {
                    if let Some(at) = row.modified_at {
                        return mark.covers_timestamp(at);
                    }
                }
            }
        }
        false
    }
}

/// Counts from one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Rows the watermark already covered
    pub stale: usize,
    /// Header, malformed or rejected rows
    pub skipped: usize,
}

impl MergeReport {
    /// Number of rows that changed the store.
    pub fn changed(&self) -> usize {
        self.created + self.updated
    }

    pub fn rows(&self) -> usize {
        self.created + self.updated + self.unchanged + self.stale + self.skipped
    }
}

/// One parsed feed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    /// External identity as written in the feed
    pub number: Option<String>,
    /// External identity when it is a non-negative integer
    pub sequence: Option<u64>,
    pub name: String,
    pub initial_qty: Quantity,
    pub total_qty: Quantity,
    pub available_qty: Option<Quantity>,
    pub notes: String,
    /// Last-modified column as written in the feed
    pub last_modified: Option<String>,
    /// Last-modified column in milliseconds, when it parses
    pub modified_at: Option<Timestamp>,
}

impl ItemRow {
    fn to_new_item(&self) -> NewItem {
        NewItem {
            name: self.name.clone(),
            initial_qty: self.initial_qty,
            total_qty: self.total_qty,
            notes: self.notes.clone(),
            number: self.number.clone(),
            available_qty: self.available_qty,
            last_modified: self.last_modified.clone(),
        }
    }

    /// True if any compared field differs from `item`.
    fn differs_from(&self, item: &Item) -> bool {
        item.name != self.name
            || item.initial_qty != self.initial_qty
            || item.total_qty != self.total_qty
            || (self.available_qty.is_some() && item.available_qty != self.available_qty)
            || item.notes != self.notes
    }

    fn to_patch(&self, item: &Item) -> ItemPatch {
        ItemPatch {
            name: Some(self.name.clone()),
            initial_qty: Some(self.initial_qty),
            total_qty: Some(self.total_qty),
            available_qty: self.available_qty,
            notes: Some(self.notes.clone()),
            number: match (&item.number, &self.number) {
                (None, Some(number)) => Some(number.clone()),
                _ => None,
            },
            last_modified: self.last_modified.clone(),
        }
    }
}

/// Parse one feed row. Header and malformed rows yield `None`.
pub fn parse_item_row(row: &[Value]) -> Option<ItemRow> {
    if row.len() < 2 {
        return None;
    }

    let first = cell_text(&row[0]);
    if is_header_label(&first) {
        return None;
    }

    let name = cell_text(&row[1]);
    if name.is_empty() {
        return None;
    }

    let number = (!first.is_empty()).then(|| first.clone());
    let sequence = number.as_deref().and_then(|n| n.parse::<u64>().ok());

    let available_qty = row
        .get(4)
        .filter(|cell| !cell_text(cell).is_empty())
        .map(cell_quantity);

    let last_modified = row
        .get(6)
        .map(cell_text)
        .filter(|stamp| !stamp.is_empty());
    let modified_at = row.get(6).and_then(cell_timestamp);

    Some(ItemRow {
        number,
        sequence,
        name,
        initial_qty: row.get(2).map(cell_quantity).unwrap_or(0),
        total_qty: row.get(3).map(cell_quantity).unwrap_or(0),
        available_qty,
        notes: row.get(5).map(cell_text).unwrap_or_default(),
        last_modified,
        modified_at,
    })
}

/// Case-insensitive, whitespace-collapsed form used for name matching.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_header_label(cell: &str) -> bool {
    HEADER_LABELS
        .iter()
        .any(|label| label.eq_ignore_ascii_case(cell))
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Integer prefix of the cell, or 0.
fn cell_quantity(cell: &Value) -> Quantity {
    match cell {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => leading_integer(s).unwrap_or(0),
        _ => 0,
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    let digits_from = usize::from(s.starts_with(['-', '+']));
    let end = s[digits_from..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + digits_from);
    s[..end].parse().ok()
}

/// Milliseconds since epoch from an RFC 3339 stamp, a `YYYY-MM-DD` date or a
/// numeric cell.
fn cell_timestamp(cell: &Value) -> Option<Timestamp> {
    match cell {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Some(at.timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc().timestamp_millis())
}

enum RowOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Applies feed rows to a [`RecordStore`].
#[derive(Debug, Clone, Default)]
pub struct Importer {
    policy: ImportPolicy,
}

impl Importer {
    pub fn new(policy: ImportPolicy) -> Self {
        Self { policy }
    }

    /// Merge a batch of rows into the store and advance its watermark.
    ///
    /// The caller must hold exclusive access to the store for the whole call
    /// so that the watermark read, the merge and the watermark write are not
    /// interleaved with user mutations.
    pub fn merge(&self, store: &mut RecordStore, rows: &[Vec<Value>], now: Timestamp) -> MergeReport {
        let mark = *store.watermark();
        let mut observed = SyncWatermark::default();
        let mut report = MergeReport::default();

        for row in rows {
            let Some(parsed) = parse_item_row(row) else {
                report.skipped += 1;
                continue;
            };

            if self.policy.is_stale(&parsed, &mark) {
                report.stale += 1;
                continue;
            }

            match apply_row(store, &parsed, now) {
                Ok(outcome) => {
                    match outcome {
                        RowOutcome::Created => report.created += 1,
                        RowOutcome::Updated => report.updated += 1,
                        RowOutcome::Unchanged => report.unchanged += 1,
                    }
                    if let Some(seq) = parsed.sequence {
                        observed.observe_sequence(seq);
                    }
                    if let Some(at) = parsed.modified_at {
                        observed.observe_timestamp(at);
                    }
                }
                Err(e) => {
                    tracing::warn!(name = %parsed.name, "rejected feed row: {}", e);
                    report.skipped += 1;
                }
            }
        }

        store.advance_watermark(&observed);

        tracing::info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            stale = report.stale,
            skipped = report.skipped,
            "feed merged"
        );

        report
    }
}

fn apply_row(store: &mut RecordStore, row: &ItemRow, now: Timestamp) -> crate::Result<RowOutcome> {
    let existing = find_match(store, row).cloned();

    match existing {
        None => {
            let id = match &row.number {
                Some(number) if store.known_item(&format!("item_{number}")).is_none() => {
                    format!("item_{number}")
                }
                _ => new_record_id(),
            };
            let item = row.to_new_item().normalized()?.into_item(id);
            store.insert_item(item, Origin::Remote, now)?;
            Ok(RowOutcome::Created)
        }
        Some(item) if row.differs_from(&item) => {
            store.patch_item(&item.id, row.to_patch(&item), Origin::Remote, now)?;
            Ok(RowOutcome::Updated)
        }
        Some(_) => Ok(RowOutcome::Unchanged),
    }
}

/// Stored items first, then cloud adds not yet confirmed by a snapshot.
fn find_match<'a>(store: &'a RecordStore, row: &ItemRow) -> Option<&'a Item> {
    let known = move || store.items().iter().chain(store.pending_items());
    if let Some(number) = &row.number {
        if let Some(item) = known().find(|i| i.number.as_ref() == Some(number)) {
            return Some(item);
        }
    }
    let wanted = normalize_name(&row.name);
    known().find(|i| normalize_name(&i.name) == wanted)
}
