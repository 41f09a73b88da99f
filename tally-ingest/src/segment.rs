//! Split the document's line stream into date-anchored transaction blocks.

use chrono::NaiveDate;

use crate::normalize::parse_date_prefix;
use crate::rules::{AnchorRule, Ruleset};
use crate::types::{Block, Line};

/// If `line` opens a new transaction under `ruleset`, the date it carries and
/// the number of leading tokens that spell it.
pub fn block_start(line: &Line, ruleset: &Ruleset, fallback_year: i32) -> Option<(NaiveDate, usize)> {
    let words: Vec<&str> = line.tokens.iter().map(|t| t.text.as_str()).collect();
    let date = parse_date_prefix(&words, &ruleset.date_format, fallback_year)?;
    match ruleset.anchor {
        AnchorRule::Date => Some(date),
        AnchorRule::DateLeftOfThreshold => {
            (line.leading_x() < ruleset.date_x_threshold).then_some(date)
        }
    }
}

/// Partition `lines` into blocks. Lines before the first anchor are
/// preamble and dropped; lines starting left of the date threshold without
/// a date are margin noise and dropped.
pub fn segment(lines: &[Line], ruleset: &Ruleset, fallback_year: i32) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;
    let mut skipped = 0usize;

    for line in lines.iter().filter(|l| !l.is_empty()) {
        if let Some((date, anchor_tokens)) = block_start(line, ruleset, fallback_year) {
            if let Some(done) = current.take() {
                blocks.push(done);
            }
            current = Some(Block {
                date,
                anchor_tokens,
                lines: vec![line.clone()],
            });
            continue;
        }

        if line.leading_x() < ruleset.date_x_threshold {
            skipped += 1;
            continue;
        }

        match current.as_mut() {
            Some(block) => block.lines.push(line.clone()),
            None => skipped += 1,
        }
    }
    if let Some(done) = current {
        blocks.push(done);
    }

    log::debug!(
        "segmented {} lines into {} blocks ({} skipped)",
        lines.len(),
        blocks.len(),
        skipped
    );
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesetRegistry;
    use crate::types::Token;

    fn absa() -> Ruleset {
        RulesetRegistry::builtin()
            .get("ABSA_CHEQUE_ACCOUNT_STATEMENT")
            .unwrap()
            .clone()
    }

    fn line(y: f64, words: &[(f64, &str)]) -> Line {
        Line {
            y,
            tokens: words
                .iter()
                .map(|(x, w)| Token::new(*x, y, x + 30.0, y + 8.0, *w))
                .collect(),
        }
    }

    #[test]
    fn test_blocks_start_at_dates_and_absorb_continuations() {
        let lines = vec![
            line(10.0, &[(100.0, "Statement"), (160.0, "header")]),
            line(20.0, &[(40.0, "01/02/2024"), (100.0, "Opening"), (480.0, "1000.00")]),
            line(30.0, &[(40.0, "02/02/2024"), (100.0, "Card"), (320.0, "150.00")]),
            line(40.0, &[(100.0, "purchase"), (150.0, "Woolworths")]),
            line(50.0, &[(40.0, "03/02/2024"), (100.0, "Salary")]),
        ];
        let blocks = segment(&lines, &absa(), 2024);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(blocks[0].lines.len(), 1);
        assert_eq!(blocks[1].lines.len(), 2);
        assert_eq!(blocks[1].anchor_tokens, 1);
        assert_eq!(blocks[2].lines.len(), 1);
    }

    #[test]
    fn test_left_margin_noise_is_skipped() {
        let lines = vec![
            line(20.0, &[(40.0, "02/02/2024"), (100.0, "Card")]),
            line(30.0, &[(20.0, "Page"), (50.0, "1"), (100.0, "of"), (120.0, "3")]),
            line(40.0, &[(100.0, "purchase")]),
        ];
        let blocks = segment(&lines, &absa(), 2024);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines.len(), 2);
        assert_eq!(blocks[0].lines[1].text(), "purchase");
    }

    #[test]
    fn test_no_dates_yields_no_blocks() {
        let lines = vec![
            line(10.0, &[(100.0, "Nothing"), (150.0, "here")]),
            line(20.0, &[(40.0, "Total"), (480.0, "12.00")]),
        ];
        assert!(segment(&lines, &absa(), 2024).is_empty());
        assert!(segment(&[], &absa(), 2024).is_empty());
    }

    #[test]
    fn test_date_anchor_ignores_position_by_default() {
        // A date printed right of the threshold still opens a block.
        let lines = vec![line(20.0, &[(120.0, "02/02/2024"), (200.0, "Card")])];
        assert_eq!(segment(&lines, &absa(), 2024).len(), 1);
    }

    #[test]
    fn test_date_left_of_threshold_policy() {
        let mut rs = absa();
        rs.anchor = AnchorRule::DateLeftOfThreshold;
        let lines = vec![
            line(20.0, &[(40.0, "02/02/2024"), (100.0, "Transfer")]),
            // a date inside the description column continues the block
            line(30.0, &[(120.0, "05/02/2024"), (200.0, "value"), (240.0, "date")]),
            // exactly on the threshold is not left of it
            line(40.0, &[(95.0, "06/02/2024"), (200.0, "ref")]),
            line(50.0, &[(94.9, "07/02/2024"), (200.0, "Fee")]),
        ];
        let blocks = segment(&lines, &rs, 2024);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines.len(), 3);
        assert_eq!(blocks[1].date, NaiveDate::from_ymd_opt(2024, 2, 7).unwrap());
    }

    #[test]
    fn test_multi_token_yearless_anchor() {
        let rs = RulesetRegistry::builtin()
            .get("STANDARD_BANK_BUSINESS_CURRENT_ACCOUNT")
            .unwrap()
            .clone();
        let lines = vec![line(20.0, &[(20.0, "03"), (35.0, "22"), (70.0, "Fee")])];
        let blocks = segment(&lines, &rs, 2025);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].date, NaiveDate::from_ymd_opt(2025, 3, 22).unwrap());
        assert_eq!(blocks[0].anchor_tokens, 2);
    }
}
