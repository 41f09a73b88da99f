//! First-page inspection: which layout is this, and which year does it
//! cover.

use std::sync::OnceLock;

use chrono::Datelike;
use regex::Regex;

use crate::error::{ParseError, Result};
use crate::rules::{Ruleset, RulesetRegistry};
use crate::types::Line;

/// Lower-cased text of a page, one line per visual line.
pub fn page_text(lines: &[Line]) -> String {
    lines
        .iter()
        .map(Line::text)
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}

/// Pick the ruleset whose (bank, account type) keywords both appear on the
/// first page. Detectors are tried in registry order.
pub fn resolve_ruleset<'r>(
    first_page: &[Line],
    registry: &'r RulesetRegistry,
) -> Result<&'r Ruleset> {
    let text = page_text(first_page);
    let detector = registry
        .detectors()
        .iter()
        .find(|d| d.matches(&text))
        .ok_or(ParseError::DetectionFailure)?;

    let key = detector.key();
    log::info!("detected {} / {} -> {}", detector.bank, detector.account_type, key);
    registry
        .get(&key)
        .ok_or(ParseError::UnconfiguredRuleset { key })
}

fn period_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)statement\s+(?:period|from|date)\b[^\n]*?\b((?:19|20)\d{2})\b")
            .expect("period year regex")
    })
}

fn any_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("year regex"))
}

/// Year printed in the statement header: the statement-period line if there
/// is one, otherwise the first standalone 19xx/20xx on the page.
pub fn detect_header_year(first_page: &[Line]) -> Option<i32> {
    let text = page_text(first_page);
    period_year_re()
        .captures(&text)
        .or_else(|| any_year_re().captures(&text))
        .and_then(|caps| caps[1].parse().ok())
}

/// Year used to complete dates printed without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackYear {
    /// Always use this year.
    Fixed(i32),
    /// Use the header year, or `otherwise` if the header has none.
    FromHeader { otherwise: i32 },
}

impl FallbackYear {
    /// Header year, falling back to the current local year.
    pub fn from_header_or_current() -> Self {
        FallbackYear::FromHeader {
            otherwise: chrono::Local::now().year(),
        }
    }

    pub fn resolve(&self, first_page: &[Line]) -> i32 {
        match *self {
            FallbackYear::Fixed(year) => year,
            FallbackYear::FromHeader { otherwise } => match detect_header_year(first_page) {
                Some(year) => year,
                None => {
                    log::warn!("no year in statement header, using {otherwise} for yearless dates");
                    otherwise
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Detector;
    use crate::types::Token;
    use std::collections::BTreeMap;

    fn line(y: f64, text: &str) -> Line {
        let tokens = text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| Token::new(40.0 + i as f64 * 30.0, y, 60.0 + i as f64 * 30.0, y + 8.0, w))
            .collect();
        Line { y, tokens }
    }

    #[test]
    fn test_detects_absa() {
        let reg = RulesetRegistry::builtin();
        let page = vec![line(10.0, "ABSA Bank Limited"), line(20.0, "Cheque Account Statement")];
        let rs = resolve_ruleset(&page, &reg).unwrap();
        assert_eq!(rs.key, "ABSA_CHEQUE_ACCOUNT_STATEMENT");
    }

    #[test]
    fn test_requires_both_keywords() {
        let reg = RulesetRegistry::builtin();
        // Shared account-type phrase without the bank name
        let page = vec![line(10.0, "Nedbank"), line(20.0, "Business Current Account")];
        assert!(matches!(
            resolve_ruleset(&page, &reg),
            Err(ParseError::DetectionFailure)
        ));

        let page = vec![line(10.0, "Standard Bank"), line(20.0, "Business Current Account")];
        assert_eq!(
            resolve_ruleset(&page, &reg).unwrap().key,
            "STANDARD_BANK_BUSINESS_CURRENT_ACCOUNT"
        );
    }

    #[test]
    fn test_empty_page_is_detection_failure() {
        let reg = RulesetRegistry::builtin();
        assert!(matches!(
            resolve_ruleset(&[], &reg),
            Err(ParseError::DetectionFailure)
        ));
    }

    #[test]
    fn test_unconfigured_ruleset_carries_key() {
        let reg =
            RulesetRegistry::new(vec![Detector::new("capitec", "savings")], BTreeMap::new())
                .unwrap();
        let page = vec![line(10.0, "Capitec Savings")];
        match resolve_ruleset(&page, &reg) {
            Err(ParseError::UnconfiguredRuleset { key }) => assert_eq!(key, "CAPITEC_SAVINGS"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_header_year_prefers_statement_period() {
        let page = vec![
            line(10.0, "Account 2019 4455 1020"),
            line(20.0, "Statement from 01 March 2025 to 31 March 2025"),
        ];
        assert_eq!(detect_header_year(&page), Some(2025));
    }

    #[test]
    fn test_header_year_any_year_fallback() {
        let page = vec![line(10.0, "Issued on 04/04/2024")];
        assert_eq!(detect_header_year(&page), Some(2024));
        let page = vec![line(10.0, "Account 12345678")];
        assert_eq!(detect_header_year(&page), None);
    }

    #[test]
    fn test_fallback_year_policies() {
        let page = vec![line(10.0, "Statement period 2023")];
        assert_eq!(FallbackYear::Fixed(2020).resolve(&page), 2020);
        assert_eq!(FallbackYear::FromHeader { otherwise: 2020 }.resolve(&page), 2023);
        assert_eq!(FallbackYear::FromHeader { otherwise: 2020 }.resolve(&[]), 2020);
    }
}
