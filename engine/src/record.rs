//! Record types for the three collections.
//!
//! Field names serialize in camelCase so the persisted layout is the same one
//! the browser client keeps in its local storage.

use crate::{error::Result, Error, Quantity, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Inventory,
    Loans,
    Returns,
}

impl CollectionKind {
    /// Key-value entry (and remote collection) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Inventory => "inventory",
            CollectionKind::Loans => "loans",
            CollectionKind::Returns => "returns",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Requested through the local data API
    Local,
    /// Merged in from the external tabular feed
    Remote,
}

/// A trackable piece of equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Stable identifier
    pub id: RecordId,
    /// Identity of the matching row in the external feed, if imported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Display name, also the key loans and returns refer to
    pub name: String,
    /// Historical baseline quantity (informational)
    #[serde(default, alias = "originalQty")]
    pub initial_qty: Quantity,
    /// Currently owned quantity
    #[serde(default)]
    pub total_qty: Quantity,
    /// Available quantity as reported by the external feed (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_qty: Option<Quantity>,
    #[serde(default)]
    pub notes: String,
    /// Last-modified stamp as reported by the external feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Payload for creating an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewItem {
    pub name: String,
    #[serde(alias = "originalQty")]
    pub initial_qty: Quantity,
    pub total_qty: Quantity,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_qty: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl NewItem {
    /// Create a payload with the fields a user fills in.
    pub fn new(name: impl Into<String>, initial_qty: Quantity, total_qty: Quantity) -> Self {
        Self {
            name: name.into(),
            initial_qty,
            total_qty,
            ..Default::default()
        }
    }

    /// Set the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub(crate) fn normalized(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        self.notes = self.notes.trim().to_string();
        if self.name.is_empty() {
            return Err(Error::MissingItemName);
        }
        if self.total_qty < 0 {
            return Err(Error::NegativeQuantity {
                field: "totalQty",
                value: self.total_qty,
            });
        }
        Ok(self)
    }

    pub(crate) fn into_item(self, id: RecordId) -> Item {
        Item {
            id,
            number: self.number,
            name: self.name,
            initial_qty: self.initial_qty,
            total_qty: self.total_qty,
            available_qty: self.available_qty,
            notes: self.notes,
            last_modified: self.last_modified,
        }
    }
}

/// Partial update for an item; only provided fields overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(alias = "originalQty", skip_serializing_if = "Option::is_none")]
    pub initial_qty: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_qty: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_qty: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl ItemPatch {
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::MissingItemName);
            }
        }
        if let Some(total) = self.total_qty {
            if total < 0 {
                return Err(Error::NegativeQuantity {
                    field: "totalQty",
                    value: total,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn apply_to(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.trim().to_string();
        }
        if let Some(v) = self.initial_qty {
            item.initial_qty = v;
        }
        if let Some(v) = self.total_qty {
            item.total_qty = v;
        }
        if let Some(v) = self.available_qty {
            item.available_qty = Some(v);
        }
        if let Some(notes) = &self.notes {
            item.notes = notes.trim().to_string();
        }
        if let Some(number) = &self.number {
            item.number = Some(number.clone());
        }
        if let Some(stamp) = &self.last_modified {
            item.last_modified = Some(stamp.clone());
        }
    }
}

/// Equipment handed out to a person or department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: RecordId,
    /// Item reference by name, not id
    pub item_name: String,
    pub qty: Quantity,
    #[serde(default)]
    pub person: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub dept: String,
    /// Loan date (ISO `YYYY-MM-DD`)
    #[serde(default)]
    pub date: String,
    /// Due date (ISO `YYYY-MM-DD`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
}

/// Payload for creating a loan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewLoan {
    pub item_name: String,
    pub qty: Quantity,
    pub person: String,
    pub phone: String,
    pub dept: String,
    pub date: String,
    pub due: Option<String>,
}

impl NewLoan {
    pub fn new(item_name: impl Into<String>, qty: Quantity, date: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            qty,
            date: date.into(),
            ..Default::default()
        }
    }

    /// Set the borrower.
    pub fn borrowed_by(
        mut self,
        person: impl Into<String>,
        dept: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        self.person = person.into();
        self.dept = dept.into();
        self.phone = phone.into();
        self
    }

    /// Set the due date.
    pub fn due_on(mut self, due: impl Into<String>) -> Self {
        self.due = Some(due.into());
        self
    }

    pub(crate) fn normalized(mut self) -> Result<Self> {
        self.item_name = self.item_name.trim().to_string();
        self.person = self.person.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.dept = self.dept.trim().to_string();
        self.due = self.due.filter(|d| !d.trim().is_empty());
        if self.item_name.is_empty() {
            return Err(Error::MissingItemName);
        }
        if self.qty <= 0 {
            return Err(Error::NonPositiveQuantity(self.qty));
        }
        Ok(self)
    }

    pub(crate) fn into_loan(self, id: RecordId) -> Loan {
        Loan {
            id,
            item_name: self.item_name,
            qty: self.qty,
            person: self.person,
            phone: self.phone,
            dept: self.dept,
            date: self.date,
            due: self.due,
        }
    }
}

/// Equipment coming back, optionally against a specific loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Return {
    pub id: RecordId,
    #[serde(default)]
    pub date: String,
    pub item_name: String,
    pub qty: Quantity,
    /// How many of the returned units are damaged (informational)
    #[serde(default)]
    pub damaged: Quantity,
    #[serde(default)]
    pub notes: String,
    /// Linked loan; `None` makes this an unlinked return
    #[serde(default)]
    pub loan_id: Option<RecordId>,
}

/// Payload for recording a return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewReturn {
    pub date: String,
    pub item_name: String,
    pub qty: Quantity,
    pub damaged: Quantity,
    pub notes: String,
    pub loan_id: Option<RecordId>,
}

impl NewReturn {
    pub fn new(item_name: impl Into<String>, qty: Quantity, date: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            qty,
            date: date.into(),
            ..Default::default()
        }
    }

    /// Link the return to a loan.
    pub fn for_loan(mut self, loan_id: impl Into<RecordId>) -> Self {
        self.loan_id = Some(loan_id.into());
        self
    }

    /// Set the damaged count.
    pub fn with_damaged(mut self, damaged: Quantity) -> Self {
        self.damaged = damaged;
        self
    }

    pub(crate) fn normalized(mut self) -> Result<Self> {
        self.item_name = self.item_name.trim().to_string();
        self.notes = self.notes.trim().to_string();
        self.loan_id = self.loan_id.filter(|id| !id.trim().is_empty());
        if self.item_name.is_empty() {
            return Err(Error::MissingItemName);
        }
        if self.qty <= 0 {
            return Err(Error::NonPositiveQuantity(self.qty));
        }
        if self.damaged < 0 {
            return Err(Error::NegativeQuantity {
                field: "damaged",
                value: self.damaged,
            });
        }
        Ok(self)
    }

    pub(crate) fn into_return(self, id: RecordId) -> Return {
        Return {
            id,
            date: self.date,
            item_name: self.item_name,
            qty: self.qty,
            damaged: self.damaged,
            notes: self.notes,
            loan_id: self.loan_id,
        }
    }
}
