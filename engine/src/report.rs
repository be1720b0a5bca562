//! Summary figures for the reports view.

use crate::{availability::Ledger, LoanStatus, Quantity};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Date the report was built for (`YYYY-MM-DD`)
    pub today: String,
    /// Quantity across all loans
    pub total_loaned: Quantity,
    /// Quantity across all returns
    pub total_returned: Quantity,
    pub item_count: usize,
    pub loan_count: usize,
    pub return_count: usize,
    /// Loans due on or before `today` that are not fully returned
    pub due: Vec<LoanStatus>,
}

impl Report {
    /// Build the report. Dates are ISO strings, so ordering is lexical.
    pub fn build(ledger: &Ledger<'_>, today: &str) -> Self {
        let mut due: Vec<LoanStatus> = ledger
            .loans()
            .iter()
            .filter(|l| l.due.as_deref().is_some_and(|d| d <= today))
            .map(|l| ledger.loan_status(l))
            .filter(|s| !s.fully_returned)
            .collect();
        due.sort_by(|a, b| a.loan.due.cmp(&b.loan.due));

        Self {
            today: today.to_string(),
            total_loaned: ledger.total_loaned(),
            total_returned: ledger.returns().iter().map(|r| r.qty).sum(),
            item_count: ledger.items().len(),
            loan_count: ledger.loans().len(),
            return_count: ledger.returns().len(),
            due,
        }
    }

    pub fn due_count(&self) -> usize {
        self.due.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewLoan, NewReturn};

    #[test]
    fn due_list_excludes_future_and_returned() {
        let loans = vec![
            NewLoan::new("Drill", 2, "2024-05-01")
                .due_on("2024-05-10")
                .into_loan("overdue".into()),
            NewLoan::new("Saw", 1, "2024-05-01")
                .due_on("2024-05-20")
                .into_loan("today".into()),
            NewLoan::new("Tape", 1, "2024-05-01")
                .due_on("2024-06-01")
                .into_loan("later".into()),
            NewLoan::new("Ladder", 1, "2024-05-01")
                .due_on("2024-05-01")
                .into_loan("back".into()),
            NewLoan::new("Rope", 1, "2024-05-01").into_loan("open".into()),
        ];
        let returns = vec![NewReturn::new("Ladder", 1, "2024-05-02")
            .for_loan("back")
            .into_return("r1".into())];
        let ledger = Ledger::new(&[], &loans, &returns);

        let report = Report::build(&ledger, "2024-05-20");

        let ids: Vec<&str> = report.due.iter().map(|s| s.loan.id.as_str()).collect();
        assert_eq!(ids, vec!["overdue", "today"]);
        assert_eq!(report.total_loaned, 6);
        assert_eq!(report.total_returned, 1);
        assert_eq!(report.due_count(), 2);
    }
}
