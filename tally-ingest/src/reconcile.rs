//! Running-balance reconciliation.
//!
//! A pure fold over the extracted rows: the only state is the running
//! balance, threaded from one row to the next. When the printed amount
//! disagrees with the delta between consecutive balances by more than a cent,
//! the delta wins and the disagreement is recorded on the transaction.

use chrono::NaiveDate;

use crate::types::{Transaction, TransactionType};

/// Amounts of one block after classification and normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub date: NaiveDate,
    pub description: String,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
    pub balance: Option<f64>,
}

/// Result of reconciling one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub transactions: Vec<Transaction>,
    /// Running balance after the last row.
    pub closing_balance: Option<f64>,
}

fn round2(v: f64) -> f64 {
    let r = (v * 100.0).round() / 100.0;
    // avoid printing "-0.00"
    if r == 0.0 { 0.0 } else { r }
}

/// Whole cents between two amounts.
fn cents_apart(a: f64, b: f64) -> f64 {
    ((a - b) * 100.0).round().abs()
}

/// Signed movement printed for a row: credit, else minus the debit, else zero.
pub fn printed_amount(row: &ExtractedRow) -> f64 {
    match (row.credit, row.debit) {
        (Some(credit), _) => credit,
        (None, Some(debit)) => -debit.abs(),
        (None, None) => 0.0,
    }
}

/// Reconcile one row against the running balance. Returns the transaction
/// and the new running balance.
pub fn reconcile_row(running: Option<f64>, row: &ExtractedRow) -> (Transaction, f64) {
    let printed = round2(printed_amount(row));
    let balance = row.balance.or(running).unwrap_or(0.0);

    let mut amount = printed;
    let mut calculated_balance = None;
    let mut balance_diff_error = None;

    if let Some(previous) = running {
        let expected = round2(balance - previous);
        if cents_apart(expected, printed) > 1.0 {
            log::warn!(
                "{} {:?}: balance moved by {:.2} but row shows {:.2}",
                row.date,
                row.description,
                expected,
                printed
            );
            balance_diff_error = Some(format!("Expected {expected:.2}, got {printed:.2}"));
            calculated_balance = Some(round2(previous + printed));
            amount = expected;
        }
    }

    let txn = Transaction {
        date: row.date,
        description: row.description.clone(),
        amount,
        balance,
        calculated_balance,
        kind: TransactionType::from_amount(amount),
        balance_diff_error,
    };
    (txn, balance)
}

/// Fold every row through [`reconcile_row`], starting from `opening_balance`.
pub fn reconcile(rows: &[ExtractedRow], opening_balance: Option<f64>) -> Reconciliation {
    let (transactions, closing_balance) = rows.iter().fold(
        (Vec::with_capacity(rows.len()), opening_balance),
        |(mut out, running), row| {
            let (txn, balance) = reconcile_row(running, row);
            out.push(txn);
            (out, Some(balance))
        },
    );
    Reconciliation {
        transactions,
        closing_balance,
    }
}
