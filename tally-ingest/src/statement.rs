//! Document pipeline: lines -> ruleset -> blocks -> fields -> transactions.

use serde::Serialize;

use crate::classify::{extract_row, zone_text};
use crate::detect::{resolve_ruleset, FallbackYear};
use crate::error::{ParseError, Result};
use crate::lines::reconstruct_lines;
use crate::normalize::parse_amount;
use crate::output::{OutputField, Table};
use crate::reconcile::{reconcile, ExtractedRow};
use crate::rules::{Ruleset, RulesetRegistry};
use crate::segment::{block_start, segment};
use crate::types::{Line, Page, Transaction};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseOptions {
    /// Year for dates printed without one.
    pub fallback_year: FallbackYear,
    /// Seeds the running balance. When absent, a "brought forward" line
    /// ahead of the first transaction is used if there is one.
    pub opening_balance: Option<f64>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            fallback_year: FallbackYear::from_header_or_current(),
            opening_balance: None,
        }
    }
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub ruleset_key: String,
    /// Year used for yearless dates; `None` when every pattern prints one.
    pub fallback_year: Option<i32>,
    pub opening_balance: Option<f64>,
    pub closing_balance: Option<f64>,
    pub transactions: Vec<Transaction>,
    #[serde(skip)]
    pub output_order: Vec<OutputField>,
}

impl Statement {
    /// Header + rows in the ruleset's output order.
    pub fn table(&self) -> Table {
        Table::build(&self.transactions, &self.output_order)
    }
}

/// Balance on a "brought forward" line printed before the first transaction.
pub fn brought_forward(lines: &[Line], ruleset: &Ruleset, fallback_year: i32) -> Option<f64> {
    lines
        .iter()
        .take_while(|l| block_start(l, ruleset, fallback_year).is_none())
        .filter(|l| l.text().to_lowercase().contains("brought forward"))
        .map(|l| zone_text(l, &ruleset.zones.balance))
        .filter(|text| !text.is_empty())
        .filter_map(|text| parse_amount(&text, &ruleset.amount_format))
        .last()
}

/// Parses page token dumps against a read-only registry. Holds no mutable
/// state, so one parser can serve many documents concurrently.
#[derive(Debug, Clone)]
pub struct StatementParser<'r> {
    registry: &'r RulesetRegistry,
    options: ParseOptions,
}

impl<'r> StatementParser<'r> {
    pub fn new(registry: &'r RulesetRegistry) -> Self {
        Self {
            registry,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve the ruleset from the first page only.
    pub fn detect(&self, pages: &[Page]) -> Result<&'r Ruleset> {
        let first_page = pages
            .first()
            .map(|p| reconstruct_lines(p))
            .unwrap_or_default();
        resolve_ruleset(&first_page, self.registry)
    }

    /// Detect the layout and parse every page.
    pub fn parse(&self, pages: &[Page]) -> Result<Statement> {
        let ruleset = self.detect(pages)?;
        self.parse_with_ruleset(pages, ruleset)
    }

    /// Parse with a known ruleset, skipping detection.
    pub fn parse_with_ruleset(&self, pages: &[Page], ruleset: &Ruleset) -> Result<Statement> {
        let page_lines: Vec<Vec<Line>> = pages.iter().map(|p| reconstruct_lines(p)).collect();
        let first_page = page_lines.first().map(Vec::as_slice).unwrap_or(&[]);
        let fallback_year = ruleset
            .date_format
            .needs_fallback_year()
            .then(|| self.options.fallback_year.resolve(first_page));
        // never read by patterns that carry a year
        let year = fallback_year.unwrap_or_default();

        let lines: Vec<Line> = page_lines.into_iter().flatten().collect();
        let blocks = segment(&lines, ruleset, year);

        let opening_balance = self
            .options
            .opening_balance
            .or_else(|| brought_forward(&lines, ruleset, year));

        let rows: Vec<ExtractedRow> = blocks.iter().map(|b| extract_row(b, ruleset)).collect();
        let rec = reconcile(&rows, opening_balance);

        if rec.transactions.is_empty() {
            return Err(ParseError::EmptyResult {
                key: ruleset.key.clone(),
                zones: ruleset.zones.to_string(),
            });
        }

        let mismatches = rec
            .transactions
            .iter()
            .filter(|t| t.balance_diff_error.is_some())
            .count();
        log::info!(
            "{}: {} transactions from {} pages ({} balance corrections)",
            ruleset.key,
            rec.transactions.len(),
            pages.len(),
            mismatches
        );

        Ok(Statement {
            ruleset_key: ruleset.key.clone(),
            fallback_year,
            opening_balance,
            closing_balance: rec.closing_balance,
            transactions: rec.transactions,
            output_order: ruleset.output_order().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Token;

    fn tok(x: f64, y: f64, text: &str) -> Token {
        Token::new(x, y, x + 20.0, y + 8.0, text)
    }

    #[test]
    fn test_brought_forward_before_first_block() {
        let reg = RulesetRegistry::builtin();
        let rs = reg.get("ABSA_CHEQUE_ACCOUNT_STATEMENT").unwrap();
        let lines = reconstruct_lines(&[
            tok(100.0, 10.0, "Balance"),
            tok(140.0, 10.0, "Brought"),
            tok(180.0, 10.0, "Forward"),
            tok(480.0, 10.0, "2"),
            tok(487.0, 10.0, "500.00"),
            tok(40.0, 20.0, "01/02/2024"),
            tok(100.0, 20.0, "Fee"),
            tok(100.0, 30.0, "brought"),
            tok(140.0, 30.0, "forward"),
            tok(480.0, 30.0, "9.00"),
        ]);
        assert_eq!(brought_forward(&lines, rs, 2024), Some(2500.0));
        assert_eq!(brought_forward(&lines[1..], rs, 2024), None);
    }

    #[test]
    fn test_parser_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StatementParser<'static>>();
        assert_send_sync::<RulesetRegistry>();
    }

    #[test]
    fn test_detect_uses_first_page_only() {
        let reg = RulesetRegistry::builtin();
        let parser = StatementParser::new(&reg);
        let pages = vec![
            vec![tok(100.0, 10.0, "Welcome")],
            vec![tok(100.0, 10.0, "ABSA"), tok(140.0, 10.0, "Cheque"), tok(180.0, 10.0, "Account"), tok(220.0, 10.0, "Statement")],
        ];
        assert!(matches!(parser.detect(&pages), Err(ParseError::DetectionFailure)));
        assert!(matches!(parser.detect(&[]), Err(ParseError::DetectionFailure)));
    }

    #[test]
    fn test_fallback_year_only_resolved_for_yearless_patterns() {
        let reg = RulesetRegistry::builtin();
        let parser = StatementParser::new(&reg).with_options(ParseOptions {
            fallback_year: FallbackYear::FromHeader { otherwise: 1999 },
            opening_balance: None,
        });
        let page = vec![
            tok(100.0, 10.0, "Opening"),
            tok(40.0, 20.0, "01/02/2024"),
            tok(100.0, 20.0, "Fee"),
            tok(480.0, 20.0, "9.00"),
        ];

        let absa = reg.get("ABSA_CHEQUE_ACCOUNT_STATEMENT").unwrap();
        let stmt = parser.parse_with_ruleset(&[page.clone()], absa).unwrap();
        assert_eq!(stmt.fallback_year, None);
        assert_eq!(stmt.transactions.len(), 1);

        let mut yearless = absa.clone();
        yearless.date_format.patterns.push("%d/%m".to_string());
        yearless.date_format.year_optional = true;
        let stmt = parser.parse_with_ruleset(&[page], &yearless).unwrap();
        assert_eq!(stmt.fallback_year, Some(2024));
    }
}
