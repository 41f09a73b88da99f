//! Column-zone field classification.
//!
//! Every token in a block lands in the first zone (in precedence order)
//! containing its x0. Description tokens are space-joined across the whole
//! block; amount tokens are concatenated without separators so that numbers
//! the extractor split ("1" "234.56") come back together.

use crate::normalize::parse_amount;
use crate::reconcile::ExtractedRow;
use crate::rules::{Field, Ruleset, Zone};
use crate::types::{Block, Line};

/// Raw per-field text of one block, before amount normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockFields {
    pub description: String,
    pub debit: Option<String>,
    pub credit: Option<String>,
    pub balance: Option<String>,
}

/// Amount zones hold exactly one number; letters there mean description
/// text drifted across the boundary.
fn numeric_field(field: Field, text: String) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if text.chars().any(char::is_alphabetic) {
        log::debug!("discarding {} text {:?}: not numeric", field.as_str(), text);
        return None;
    }
    Some(text)
}

pub fn classify_block(block: &Block, ruleset: &Ruleset) -> BlockFields {
    let mut description: Vec<&str> = Vec::new();
    let mut debit = String::new();
    let mut credit = String::new();
    let mut balance = String::new();

    for (i, line) in block.lines.iter().enumerate() {
        // The date anchor was already consumed by segmentation.
        let skip = if i == 0 { block.anchor_tokens } else { 0 };
        for tok in line.tokens.iter().skip(skip) {
            match ruleset.zones.field_at(tok.x0) {
                Some(Field::Description) => {
                    if i == 0 || ruleset.multiline_description {
                        description.push(tok.text.as_str());
                    }
                }
                Some(Field::Debit) => debit.push_str(&tok.text),
                Some(Field::Credit) => credit.push_str(&tok.text),
                Some(Field::Balance) => balance.push_str(&tok.text),
                // value-date column and unzoned gaps
                Some(Field::Date) | None => {}
            }
        }
    }

    BlockFields {
        description: description.join(" "),
        debit: numeric_field(Field::Debit, debit),
        credit: numeric_field(Field::Credit, credit),
        balance: numeric_field(Field::Balance, balance),
    }
}

/// Concatenated text of the tokens of `line` inside `zone`.
pub fn zone_text(line: &Line, zone: &Zone) -> String {
    line.tokens
        .iter()
        .filter(|t| zone.contains(t.x0))
        .map(|t| t.text.as_str())
        .collect()
}

/// Classify a block and normalize its amounts.
pub fn extract_row(block: &Block, ruleset: &Ruleset) -> ExtractedRow {
    let fields = classify_block(block, ruleset);
    let fmt = &ruleset.amount_format;
    let amount = |text: &Option<String>| text.as_deref().and_then(|s| parse_amount(s, fmt));

    ExtractedRow {
        date: block.date,
        description: fields.description.trim().to_string(),
        debit: amount(&fields.debit),
        credit: amount(&fields.credit),
        balance: amount(&fields.balance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesetRegistry;
    use crate::types::Token;
    use chrono::NaiveDate;

    fn ruleset(key: &str) -> Ruleset {
        RulesetRegistry::builtin().get(key).unwrap().clone()
    }

    fn absa() -> Ruleset {
        ruleset("ABSA_CHEQUE_ACCOUNT_STATEMENT")
    }

    fn line(y: f64, words: &[(f64, &str)]) -> Line {
        Line {
            y,
            tokens: words
                .iter()
                .map(|(x, w)| Token::new(*x, y, x + 10.0, y + 8.0, *w))
                .collect(),
        }
    }

    fn block(lines: Vec<Line>) -> Block {
        Block {
            date: NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
            anchor_tokens: 1,
            lines,
        }
    }

    #[test]
    fn test_multiline_description_and_split_amounts() {
        let b = block(vec![
            line(10.0, &[(40.0, "02/02/2024"), (100.0, "Card"), (130.0, "purchase"), (320.0, "1"), (327.0, "234.56"), (480.0, "8"), (487.0, "765.44")]),
            line(20.0, &[(100.0, "Woolworths"), (160.0, "Rosebank")]),
        ]);
        let f = classify_block(&b, &absa());
        assert_eq!(f.description, "Card purchase Woolworths Rosebank");
        assert_eq!(f.debit.as_deref(), Some("1234.56"));
        assert_eq!(f.credit, None);
        assert_eq!(f.balance.as_deref(), Some("8765.44"));
    }

    #[test]
    fn test_anchor_token_not_in_description() {
        // A date sitting inside the description zone is still the anchor.
        let b = block(vec![line(10.0, &[(100.0, "02/02/2024"), (150.0, "Fee")])]);
        assert_eq!(classify_block(&b, &absa()).description, "Fee");
    }

    #[test]
    fn test_alphabetic_spill_discarded() {
        let b = block(vec![line(10.0, &[(40.0, "02/02/2024"), (100.0, "Transfer"), (312.0, "Ref"), (330.0, "50.00"), (480.0, "100.00")])]);
        let f = classify_block(&b, &absa());
        assert_eq!(f.debit, None);
        assert_eq!(f.balance.as_deref(), Some("100.00"));
    }

    #[test]
    fn test_zone_edges() {
        let rs = absa();
        // 305..310 is a gap, 390 starts nothing, 395 is credit
        let b = block(vec![line(10.0, &[(40.0, "02/02/2024"), (95.0, "Edge"), (306.0, "9.99"), (390.0, "1.00"), (395.0, "20.00")])]);
        let f = classify_block(&b, &rs);
        assert_eq!(f.description, "Edge");
        assert_eq!(f.debit, None);
        assert_eq!(f.credit.as_deref(), Some("20.00"));
    }

    #[test]
    fn test_single_line_description_mode() {
        let mut rs = absa();
        rs.multiline_description = false;
        let b = block(vec![
            line(10.0, &[(40.0, "02/02/2024"), (100.0, "Card")]),
            line(20.0, &[(100.0, "Woolworths"), (480.0, "10.00")]),
        ]);
        let f = classify_block(&b, &rs);
        assert_eq!(f.description, "Card");
        assert_eq!(f.balance.as_deref(), Some("10.00"));
    }

    #[test]
    fn test_explicit_date_zone_is_ignored() {
        let mut rs = absa();
        rs.zones.date = Some(crate::rules::Zone::new(0.0, 95.0));
        let b = block(vec![line(10.0, &[(40.0, "02/02/2024"), (60.0, "03/02/2024"), (100.0, "Fee")])]);
        assert_eq!(classify_block(&b, &rs).description, "Fee");
    }

    #[test]
    fn test_extract_row_normalizes_amounts() {
        let rs = ruleset("STANDARD_BANK_BUSINESS_CURRENT_ACCOUNT");
        let b = Block {
            date: NaiveDate::from_ymd_opt(2025, 3, 22).unwrap(),
            anchor_tokens: 2,
            lines: vec![line(10.0, &[(20.0, "03"), (35.0, "22"), (70.0, "Debit"), (100.0, "order"), (330.0, "800,00-"), (530.0, "40.129,08")])],
        };
        let row = extract_row(&b, &rs);
        assert_eq!(row.description, "Debit order");
        assert_eq!(row.debit, Some(-800.0));
        assert_eq!(row.credit, None);
        assert_eq!(row.balance, Some(40129.08));
    }

    #[test]
    fn test_zone_text() {
        let l = line(10.0, &[(480.0, "1"), (487.0, "000.00"), (100.0, "x")]);
        assert_eq!(zone_text(&l, &absa().zones.balance), "1000.00");
    }
}
