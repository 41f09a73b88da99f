use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One positioned word as produced by the PDF text-extraction layer.
///
/// Coordinates are in points, in the same space the rulesets are measured in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub text: String,
}

impl Token {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64, text: impl Into<String>) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            text: text.into(),
        }
    }
}

/// Tokens of a single page, in whatever order the extractor emitted them.
pub type Page = Vec<Token>;

/// Extractor output for one document, pages in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordDump {
    pub pages: Vec<Page>,
}

/// A visual text line: tokens sharing a rounded y, sorted left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub y: f64,
    pub tokens: Vec<Token>,
}

impl Line {
    /// x0 of the first token, or 0.0 for an empty line.
    pub fn leading_x(&self) -> f64 {
        self.tokens.first().map(|t| t.x0).unwrap_or(0.0)
    }

    /// Token texts joined by single spaces.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Lines belonging to one transaction, anchored by a dated line.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub date: NaiveDate,
    /// Number of leading tokens on the first line that make up the date.
    pub anchor_tokens: usize,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    /// Zero net movement, e.g. an opening-balance row.
    Balance,
}

impl TransactionType {
    pub fn from_amount(amount: f64) -> Self {
        if amount > 0.0 {
            TransactionType::Credit
        } else if amount < 0.0 {
            TransactionType::Debit
        } else {
            TransactionType::Balance
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::Balance => "balance",
        }
    }
}

/// Normalized output of the statement parser (bank-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Serialized as YYYY-MM-DD.
    pub date: NaiveDate,
    pub description: String,
    /// Positive means credit; negative means debit.
    pub amount: f64,
    /// Printed running balance, or the carried-forward one when none was printed.
    pub balance: f64,
    /// Balance implied by the printed amount, only set when it disagreed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_balance: Option<f64>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_diff_error: Option<String>,
}

impl Transaction {
    pub fn is_debit(&self) -> bool {
        self.kind == TransactionType::Debit
    }

    pub fn is_credit(&self) -> bool {
        self.kind == TransactionType::Credit
    }
}
