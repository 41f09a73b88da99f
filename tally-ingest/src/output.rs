//! Tabular rendering of transactions (header + rows) and CSV encoding.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::types::Transaction;

/// A column of the tabular output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputField {
    Date,
    Description,
    Amount,
    Balance,
    CalculatedBalance,
    Type,
    BalanceDiffError,
}

pub const DEFAULT_OUTPUT_ORDER: &[OutputField] = &[
    OutputField::Date,
    OutputField::Description,
    OutputField::Amount,
    OutputField::Balance,
    OutputField::CalculatedBalance,
    OutputField::Type,
    OutputField::BalanceDiffError,
];

impl OutputField {
    pub fn header(&self) -> &'static str {
        match self {
            OutputField::Date => "date",
            OutputField::Description => "description",
            OutputField::Amount => "amount",
            OutputField::Balance => "balance",
            OutputField::CalculatedBalance => "calculated_balance",
            OutputField::Type => "type",
            OutputField::BalanceDiffError => "balance_diff_error",
        }
    }

    /// Cell text for one transaction. Money has two decimals; absent
    /// optional values are empty.
    pub fn cell(&self, txn: &Transaction) -> String {
        match self {
            OutputField::Date => txn.date.format("%Y-%m-%d").to_string(),
            OutputField::Description => txn.description.clone(),
            OutputField::Amount => format!("{:.2}", txn.amount),
            OutputField::Balance => format!("{:.2}", txn.balance),
            OutputField::CalculatedBalance => txn
                .calculated_balance
                .map(|b| format!("{b:.2}"))
                .unwrap_or_default(),
            OutputField::Type => txn.kind.as_str().to_string(),
            OutputField::BalanceDiffError => txn.balance_diff_error.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn build(transactions: &[Transaction], order: &[OutputField]) -> Self {
        Self {
            header: order.iter().map(|f| f.header().to_string()).collect(),
            rows: transactions
                .iter()
                .map(|t| order.iter().map(|f| f.cell(t)).collect())
                .collect(),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.header)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> csv::Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
