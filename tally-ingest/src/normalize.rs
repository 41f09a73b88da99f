//! Locale-aware amount and date normalization.
//!
//! Failures here are token-level anomalies: callers get `None` and treat the
//! field as absent.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::rules::{AmountFormat, DateFormat};

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-+]?(?:\d+(?:\.\d*)?|\.\d+)$").expect("decimal regex"))
}

fn unify_dash(c: char) -> char {
    match c {
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        other => other,
    }
}

/// Canonicalize an amount string to `[-]digits[.digits]`.
///
/// Whitespace of any kind is dropped (which also covers space thousands
/// separators), the thousands separator is removed, the decimal separator
/// becomes `.`, and a trailing minus moves to the front when the format
/// allows it.
pub fn normalize_amount(raw: &str, fmt: &AmountFormat) -> Option<String> {
    let mut s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(unify_dash)
        .collect();

    let thousands = fmt.thousands_separator.trim();
    if !thousands.is_empty() {
        s = s.replace(thousands, "");
    }
    if fmt.decimal_separator != "." {
        s = s.replace(fmt.decimal_separator.as_str(), ".");
    }
    if fmt.negative_trailing {
        if let Some(digits) = s.strip_suffix('-') {
            s = format!("-{digits}");
        }
    }

    decimal_re().is_match(&s).then_some(s)
}

pub fn parse_amount(raw: &str, fmt: &AmountFormat) -> Option<f64> {
    let parsed = normalize_amount(raw, fmt).and_then(|s| s.parse::<f64>().ok());
    if parsed.is_none() {
        log::debug!("unparseable amount token {raw:?}");
    }
    parsed
}

/// Spaces, `-` and `/` are interchangeable date separators.
fn unify_separators(s: &str) -> String {
    s.trim().replace([' ', '-'], "/")
}

pub fn pattern_has_year(pattern: &str) -> bool {
    pattern.contains("%Y") || pattern.contains("%y")
}

/// Parse `text` with one chrono pattern. Yearless patterns only succeed when
/// `year_optional` is set, in which case `fallback_year` is supplied.
/// `%Y` must be a four-digit year; chrono alone would take `24` as year 24.
pub fn parse_date(
    text: &str,
    pattern: &str,
    year_optional: bool,
    fallback_year: i32,
) -> Option<NaiveDate> {
    let text = unify_separators(text);
    let pattern = unify_separators(pattern);
    if pattern_has_year(&pattern) {
        let date = NaiveDate::parse_from_str(&text, &pattern).ok()?;
        if pattern.contains("%Y") && !(1000..=9999).contains(&date.year()) {
            return None;
        }
        return Some(date);
    }
    if !year_optional {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{text}/{fallback_year}"), &format!("{pattern}/%Y")).ok()
}

/// Match the leading words of a line against the ruleset's date patterns,
/// in listed order. A space-separated pattern with N directives may span up
/// to N words (`03 22` is two tokens on the page); any other pattern must
/// match the first word alone. Returns the date and how many words it
/// consumed.
pub fn parse_date_prefix(
    words: &[&str],
    fmt: &DateFormat,
    fallback_year: i32,
) -> Option<(NaiveDate, usize)> {
    fmt.patterns.iter().find_map(|pattern| {
        let max_width = if pattern.trim().contains(' ') {
            pattern.matches('%').count().max(1)
        } else {
            1
        };
        (1..=max_width.min(words.len())).find_map(|width| {
            parse_date(&words[..width].join(" "), pattern, fmt.year_optional, fallback_year)
                .map(|d| (d, width))
        })
    })
}
