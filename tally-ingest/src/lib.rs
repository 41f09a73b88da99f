//! tally-ingest: turn positioned-word dumps of bank statements into
//! reconciled transactions, driven by per-layout rulesets.

pub mod classify;
pub mod detect;
pub mod error;
pub mod lines;
pub mod normalize;
pub mod output;
pub mod reconcile;
pub mod rules;
pub mod segment;
pub mod statement;
pub mod types;

pub use detect::FallbackYear;
pub use error::{ParseError, Result};
pub use output::{OutputField, Table};
pub use rules::{Detector, Ruleset, RulesetRegistry};
pub use statement::{ParseOptions, Statement, StatementParser};
pub use types::{Line, Page, Token, Transaction, TransactionType, WordDump};
