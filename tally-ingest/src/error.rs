//! Error types for statement parsing.

use std::io;
use thiserror::Error;

/// Result type alias for tally-ingest operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Document-level failures. Anything not listed here (a token that will not
/// normalize, a printed amount that disagrees with the balance delta) is
/// recovered locally and never aborts a document.
#[derive(Error, Debug)]
pub enum ParseError {
    /// No (bank, account type) keyword pair matched the first page.
    #[error("Unable to detect bank/account type in document")]
    DetectionFailure,

    /// A detector matched but the registry holds no ruleset for its key.
    #[error("Unsupported bank/account type configuration: {key}")]
    UnconfiguredRuleset { key: String },

    /// Segmentation produced no transactions.
    #[error("No transactions found using ruleset {key}; verify the column zones ({zones})")]
    EmptyResult { key: String, zones: String },

    /// A ruleset failed validation.
    #[error("Invalid ruleset {key}: {reason}")]
    InvalidRuleset { key: String, reason: String },

    /// Reading a rules file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A rules file is not valid TOML for the registry schema.
    #[error("Rules file error: {0}")]
    RulesFile(#[from] toml::de::Error),
}

impl ParseError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ParseError::InvalidRuleset {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the conditions a caller should report as a rejected document
    /// rather than a configuration or system fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ParseError::DetectionFailure | ParseError::EmptyResult { .. }
        )
    }
}
