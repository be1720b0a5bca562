//! Wire format for the spreadsheet script endpoint.
//!
//! Requests are JSON objects with a `type` field. Reads use
//! `get_row_count` and `sync_read`; pushes use `<kind>_<collection>`
//! (for example `add_inventory` or `delete_loans`). Field names are
//! camelCase.

use custody_engine::{ChangeEvent, ChangeKind, CollectionKind, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SheetError;

/// Which sheet a read targets.
pub const DATA_TYPE_ALL: &str = "all";

/// A read request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SheetRequest {
    GetRowCount {
        #[serde(rename = "dataType")]
        data_type: String,
    },
    SyncRead {
        #[serde(rename = "dataType")]
        data_type: String,
    },
}

impl SheetRequest {
    pub fn row_count() -> Self {
        SheetRequest::GetRowCount {
            data_type: DATA_TYPE_ALL.to_string(),
        }
    }

    pub fn sync_read() -> Self {
        SheetRequest::SyncRead {
            data_type: DATA_TYPE_ALL.to_string(),
        }
    }
}

/// An outbound change, one per committed local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// `<kind>_<collection>`
    #[serde(rename = "type")]
    pub kind: String,
    /// The record, absent for deletions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The record id, present for updates and deletions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub timestamp: Timestamp,
}

impl PushMessage {
    pub fn from_event(event: &ChangeEvent) -> Self {
        let change = &event.change;
        let kind = change.kind();
        Self {
            kind: push_type(kind, change.collection()),
            data: change.payload(),
            id: (kind != ChangeKind::Add).then(|| change.record_id().clone()),
            timestamp: event.timestamp,
        }
    }
}

/// Message type for a change, e.g. `update_inventory`.
pub fn push_type(kind: ChangeKind, collection: CollectionKind) -> String {
    let verb = match kind {
        ChangeKind::Add => "add",
        ChangeKind::Update => "update",
        ChangeKind::Delete => "delete",
    };
    format!("{}_{}", verb, collection.as_str())
}

/// Row count from a `get_row_count` response.
///
/// Accepts `{"rowCount": n}`, `{"data": {"rowCount": n}}` or a bare number.
pub fn parse_row_count(response: &Value) -> Result<u64, SheetError> {
    check_status(response)?;
    let count = response
        .get("rowCount")
        .or_else(|| response.get("data").and_then(|d| d.get("rowCount")))
        .unwrap_or(response);
    count
        .as_u64()
        .or_else(|| count.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| SheetError::Protocol("response has no row count".into()))
}

/// Rows from a `sync_read` response.
///
/// Accepts `{"rows": [...]}`, `{"data": {"rows": [...]}}`,
/// `{"data": {"<dataType>": [...]}}`, `{"data": [...]}` or a bare array.
/// Entries that are not arrays are dropped.
pub fn parse_rows(response: &Value, data_type: &str) -> Result<Vec<Vec<Value>>, SheetError> {
    check_status(response)?;
    let data = response.get("data");
    let rows = response
        .get("rows")
        .or_else(|| data.and_then(|d| d.get("rows")))
        .or_else(|| data.and_then(|d| d.get(data_type)))
        .or_else(|| data.filter(|d| d.is_array()))
        .or_else(|| Some(response).filter(|r| r.is_array()))
        .and_then(Value::as_array)
        .ok_or_else(|| SheetError::Protocol("response has no rows".into()))?;

    Ok(rows
        .iter()
        .filter_map(|row| row.as_array().cloned())
        .collect())
}

/// Surface `{"success": false, "error": "..."}` as an error.
fn check_status(response: &Value) -> Result<(), SheetError> {
    if response.get("success").and_then(Value::as_bool) == Some(false) {
        let message = response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request rejected");
        return Err(SheetError::Rejected(message.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_engine::{Change, Origin};
    use serde_json::json;

    #[test]
    fn request_format() {
        let json = serde_json::to_value(SheetRequest::sync_read()).unwrap();
        assert_eq!(json, json!({"type": "sync_read", "dataType": "all"}));

        let json = serde_json::to_value(SheetRequest::row_count()).unwrap();
        assert_eq!(json["type"], "get_row_count");
    }

    #[test]
    fn push_message_for_delete() {
        let event = ChangeEvent {
            change: Change::LoanDeleted { id: "l7".into() },
            origin: Origin::Local,
            timestamp: 42,
        };
        let json = serde_json::to_value(PushMessage::from_event(&event)).unwrap();
        assert_eq!(json, json!({"type": "delete_loans", "id": "l7", "timestamp": 42}));
    }

    #[test]
    fn row_count_shapes() {
        assert_eq!(parse_row_count(&json!({"rowCount": 7})).unwrap(), 7);
        assert_eq!(parse_row_count(&json!({"data": {"rowCount": "3"}})).unwrap(), 3);
        assert_eq!(parse_row_count(&json!(12)).unwrap(), 12);
        assert!(parse_row_count(&json!({"ok": true})).is_err());
    }

    #[test]
    fn rows_shapes() {
        let expected = vec![vec![json!(1), json!("Drill")]];
        assert_eq!(parse_rows(&json!({"rows": [[1, "Drill"]]}), "all").unwrap(), expected);
        assert_eq!(
            parse_rows(&json!({"data": {"all": [[1, "Drill"], "junk"]}}), "all").unwrap(),
            expected
        );
        assert_eq!(parse_rows(&json!([[1, "Drill"]]), "all").unwrap(), expected);
    }

    #[test]
    fn rejected_response() {
        let err = parse_rows(&json!({"success": false, "error": "quota"}), "all").unwrap_err();
        assert!(matches!(err, SheetError::Rejected(msg) if msg == "quota"));
    }
}
