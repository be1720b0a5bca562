//! Derived quantities over a store snapshot.
//!
//! Nothing here is cached. Every call walks the collections, so results are
//! always consistent with the store contents at the moment of the call.

use crate::{Item, Loan, Quantity, Return};
use serde::Serialize;

/// Read-only view over the three collections.
#[derive(Debug, Clone, Copy)]
pub struct Ledger<'a> {
    items: &'a [Item],
    loans: &'a [Loan],
    returns: &'a [Return],
}

/// A loan together with its return accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanStatus {
    #[serde(flatten)]
    pub loan: Loan,
    pub returned_qty: Quantity,
    pub remaining_qty: Quantity,
    pub fully_returned: bool,
}

impl<'a> Ledger<'a> {
    pub fn new(items: &'a [Item], loans: &'a [Loan], returns: &'a [Return]) -> Self {
        Self {
            items,
            loans,
            returns,
        }
    }

    /// Owned quantity minus everything loaned out plus everything returned.
    ///
    /// Not clamped: inconsistent data (returns recorded without loans, loans
    /// recorded before stock) can make this negative.
    pub fn available_for(&self, item_name: &str) -> Quantity {
        let total = self
            .items
            .iter()
            .find(|i| i.name == item_name)
            .map(|i| i.total_qty)
            .unwrap_or(0);
        let loaned: Quantity = self
            .loans
            .iter()
            .filter(|l| l.item_name == item_name)
            .map(|l| l.qty)
            .sum();
        let returned: Quantity = self
            .returns
            .iter()
            .filter(|r| r.item_name == item_name)
            .map(|r| r.qty)
            .sum();
        total - loaned + returned
    }

    /// Sum of returns linked to exactly this loan id.
    pub fn returned_qty_for_loan(&self, loan_id: &str) -> Quantity {
        self.returns
            .iter()
            .filter(|r| r.loan_id.as_deref() == Some(loan_id))
            .map(|r| r.qty)
            .sum()
    }

    pub fn remaining_for_loan(&self, loan: &Loan) -> Quantity {
        loan.qty - self.returned_qty_for_loan(&loan.id)
    }

    pub fn is_fully_returned(&self, loan: &Loan) -> bool {
        self.returned_qty_for_loan(&loan.id) >= loan.qty
    }

    pub fn loan_status(&self, loan: &Loan) -> LoanStatus {
        let returned_qty = self.returned_qty_for_loan(&loan.id);
        LoanStatus {
            loan: loan.clone(),
            returned_qty,
            remaining_qty: loan.qty - returned_qty,
            fully_returned: returned_qty >= loan.qty,
        }
    }

    /// Total quantity across all loans.
    pub fn total_loaned(&self) -> Quantity {
        self.loans.iter().map(|l| l.qty).sum()
    }

    pub fn items(&self) -> &'a [Item] {
        self.items
    }

    pub fn loans(&self) -> &'a [Loan] {
        self.loans
    }

    pub fn returns(&self) -> &'a [Return] {
        self.returns
    }
}
