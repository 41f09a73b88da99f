//! Declarative statement layouts.
//!
//! A [`Ruleset`] describes one bank/account-type layout: where each column
//! lives on the page, how amounts and dates are printed, and where the date
//! column ends. Adding a layout means adding a registry entry, either to
//! [`RulesetRegistry::builtin`] or to a TOML rules file.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};
use crate::normalize::pattern_has_year;
use crate::output::{OutputField, DEFAULT_OUTPUT_ORDER};

/// Half-open horizontal range `[min, max)` in page points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub min: f64,
    pub max: f64,
}

impl Zone {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, x: f64) -> bool {
        self.min <= x && x < self.max
    }

    /// Shared edges do not count as overlap.
    pub fn overlaps(&self, other: &Zone) -> bool {
        self.min < other.max && other.min < self.max
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.min, self.max)
    }
}

/// Semantic field a token can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Description,
    Debit,
    Credit,
    Balance,
    Date,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Description => "description",
            Field::Debit => "debit",
            Field::Credit => "credit",
            Field::Balance => "balance",
            Field::Date => "date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnZones {
    pub description: Zone,
    pub debit: Zone,
    pub credit: Zone,
    pub balance: Zone,
    /// Explicit date column, for layouts that print a second date (value
    /// date) that must not leak into the description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Zone>,
}

impl ColumnZones {
    /// Zones in classification precedence order.
    pub fn in_precedence(&self) -> Vec<(Field, Zone)> {
        let mut zones = vec![
            (Field::Description, self.description),
            (Field::Debit, self.debit),
            (Field::Credit, self.credit),
            (Field::Balance, self.balance),
        ];
        if let Some(date) = self.date {
            zones.push((Field::Date, date));
        }
        zones
    }

    /// First zone (in precedence order) containing `x`.
    pub fn field_at(&self, x: f64) -> Option<Field> {
        self.in_precedence()
            .into_iter()
            .find(|(_, zone)| zone.contains(x))
            .map(|(field, _)| field)
    }
}

impl fmt::Display for ColumnZones {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .in_precedence()
            .iter()
            .map(|(field, zone)| format!("{}={}", field.as_str(), zone))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountFormat {
    pub thousands_separator: String,
    pub decimal_separator: String,
    /// Minus printed after the digits, e.g. `800,00-`.
    #[serde(default)]
    pub negative_trailing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateFormat {
    /// chrono format strings, tried in order. Spaces, `/` and `-` are
    /// interchangeable separators.
    pub patterns: Vec<String>,
    /// Yearless patterns are completed with the document's fallback year.
    #[serde(default)]
    pub year_optional: bool,
}

impl DateFormat {
    /// Whether any pattern is completed with the fallback year.
    pub fn needs_fallback_year(&self) -> bool {
        self.year_optional && self.patterns.iter().any(|p| !pattern_has_year(p))
    }
}

/// What makes a line the start of a new transaction block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorRule {
    /// The leading token(s) parse as a date.
    #[default]
    Date,
    /// The leading token(s) parse as a date and start left of
    /// `date_x_threshold`.
    DateLeftOfThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Registry key; filled from the table name when loaded from TOML.
    #[serde(skip)]
    pub key: String,
    pub zones: ColumnZones,
    pub amount_format: AmountFormat,
    pub date_format: DateFormat,
    /// Lines starting left of this x without a date are header/footer noise.
    pub date_x_threshold: f64,
    #[serde(default)]
    pub anchor: AnchorRule,
    #[serde(default = "default_true")]
    pub multiline_description: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_order: Option<Vec<OutputField>>,
}

fn default_true() -> bool {
    true
}

impl Ruleset {
    pub fn output_order(&self) -> &[OutputField] {
        self.output_order.as_deref().unwrap_or(DEFAULT_OUTPUT_ORDER)
    }

    pub fn validate(&self) -> Result<()> {
        let key = self.key.as_str();
        let zones = self.zones.in_precedence();

        for (field, zone) in &zones {
            if !(zone.min.is_finite() && zone.max.is_finite()) || zone.min >= zone.max {
                return Err(ParseError::invalid(
                    key,
                    format!("{} zone {} is empty or not finite", field.as_str(), zone),
                ));
            }
        }
        for (i, (fa, za)) in zones.iter().enumerate() {
            for (fb, zb) in &zones[i + 1..] {
                if za.overlaps(zb) {
                    return Err(ParseError::invalid(
                        key,
                        format!(
                            "{} zone {} overlaps {} zone {}",
                            fa.as_str(),
                            za,
                            fb.as_str(),
                            zb
                        ),
                    ));
                }
            }
        }

        let amounts = &self.amount_format;
        if amounts.decimal_separator.is_empty() {
            return Err(ParseError::invalid(key, "decimal separator is empty"));
        }
        if amounts.decimal_separator == amounts.thousands_separator {
            return Err(ParseError::invalid(
                key,
                "decimal and thousands separators are identical",
            ));
        }

        if self.date_format.patterns.is_empty() {
            return Err(ParseError::invalid(key, "no date patterns"));
        }
        if !self.date_format.year_optional {
            if let Some(p) = self
                .date_format
                .patterns
                .iter()
                .find(|p| !pattern_has_year(p))
            {
                return Err(ParseError::invalid(
                    key,
                    format!("date pattern {p:?} has no year but year_optional is off"),
                ));
            }
        }

        if !self.date_x_threshold.is_finite() {
            return Err(ParseError::invalid(key, "date_x_threshold is not finite"));
        }

        if let Some(order) = &self.output_order {
            for (i, f) in order.iter().enumerate() {
                if order[..i].contains(f) {
                    return Err(ParseError::invalid(
                        key,
                        format!("output_order lists {} twice", f.header()),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// A (bank, account type) keyword pair. Both must appear on the first page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    pub bank: String,
    pub account_type: String,
    /// Overrides the derived `BANK_ACCOUNT_TYPE` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Detector {
    pub fn new(bank: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self {
            bank: bank.into(),
            account_type: account_type.into(),
            key: None,
        }
    }

    /// Explicit key, or `BANK_ACCOUNT_TYPE` upper-cased with `_` for spaces.
    pub fn key(&self) -> String {
        match &self.key {
            Some(k) => k.clone(),
            None => format!("{}_{}", self.bank, self.account_type)
                .to_uppercase()
                .replace(' ', "_"),
        }
    }

    /// `text` must already be lower-cased.
    pub fn matches(&self, text: &str) -> bool {
        text.contains(&self.bank.to_lowercase()) && text.contains(&self.account_type.to_lowercase())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    detectors: Vec<Detector>,
    #[serde(default)]
    rulesets: BTreeMap<String, Ruleset>,
}

/// Read-only lookup of detectors and rulesets.
#[derive(Debug, Clone, Default)]
pub struct RulesetRegistry {
    detectors: Vec<Detector>,
    rulesets: BTreeMap<String, Ruleset>,
}

impl RulesetRegistry {
    /// Build a registry, validating every detector and ruleset. Ruleset keys
    /// are taken from the map.
    pub fn new(detectors: Vec<Detector>, rulesets: BTreeMap<String, Ruleset>) -> Result<Self> {
        // an empty keyword matches every page
        if let Some(d) = detectors
            .iter()
            .find(|d| d.bank.trim().is_empty() || d.account_type.trim().is_empty())
        {
            return Err(ParseError::invalid(&d.key(), "detector keywords must not be empty"));
        }
        let rulesets = rulesets
            .into_iter()
            .map(|(key, mut rs)| {
                rs.key = key.clone();
                rs.validate()?;
                Ok((key, rs))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            detectors,
            rulesets,
        })
    }

    /// Layouts shipped with the crate.
    pub fn builtin() -> Self {
        let detectors = vec![
            Detector::new("absa", "cheque account statement"),
            Detector::new("standard bank", "business current account"),
        ];

        let mut rulesets = BTreeMap::new();
        rulesets.insert(
            "ABSA_CHEQUE_ACCOUNT_STATEMENT".to_string(),
            Ruleset {
                key: "ABSA_CHEQUE_ACCOUNT_STATEMENT".to_string(),
                zones: ColumnZones {
                    description: Zone::new(95.0, 305.0),
                    debit: Zone::new(310.0, 390.0),
                    credit: Zone::new(395.0, 470.0),
                    balance: Zone::new(475.0, 999.0),
                    date: None,
                },
                amount_format: AmountFormat {
                    thousands_separator: " ".to_string(),
                    decimal_separator: ".".to_string(),
                    negative_trailing: false,
                },
                date_format: DateFormat {
                    patterns: vec!["%d/%m/%Y".to_string()],
                    year_optional: false,
                },
                date_x_threshold: 95.0,
                anchor: AnchorRule::Date,
                multiline_description: true,
                output_order: None,
            },
        );
        // "Details / Service Fee / Debits / Credits / Balance" layout. The
        // service fee column (260-300) is deliberately unzoned. Dates print
        // as "MM DD"; the year comes from the statement period header.
        rulesets.insert(
            "STANDARD_BANK_BUSINESS_CURRENT_ACCOUNT".to_string(),
            Ruleset {
                key: "STANDARD_BANK_BUSINESS_CURRENT_ACCOUNT".to_string(),
                zones: ColumnZones {
                    description: Zone::new(60.0, 260.0),
                    debit: Zone::new(300.0, 420.0),
                    credit: Zone::new(420.0, 520.0),
                    balance: Zone::new(520.0, 999.0),
                    date: None,
                },
                amount_format: AmountFormat {
                    thousands_separator: ".".to_string(),
                    decimal_separator: ",".to_string(),
                    negative_trailing: true,
                },
                date_format: DateFormat {
                    patterns: vec!["%m %d %Y".to_string(), "%m %d".to_string()],
                    year_optional: true,
                },
                date_x_threshold: 60.0,
                anchor: AnchorRule::DateLeftOfThreshold,
                multiline_description: true,
                output_order: None,
            },
        );

        Self {
            detectors,
            rulesets,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(s)?;
        Self::new(file.detectors, file.rulesets)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&s)
    }

    /// Overlay `other` on top of `self`: its detectors are tried first and
    /// its rulesets replace ones with the same key.
    pub fn merged(self, other: RulesetRegistry) -> Self {
        let mut detectors = other.detectors;
        detectors.extend(self.detectors);
        let mut rulesets = self.rulesets;
        rulesets.extend(other.rulesets);
        Self {
            detectors,
            rulesets,
        }
    }

    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    pub fn get(&self, key: &str) -> Option<&Ruleset> {
        self.rulesets.get(key)
    }

    pub fn rulesets(&self) -> impl Iterator<Item = &Ruleset> {
        self.rulesets.values()
    }

    /// Detector keys with no registered ruleset.
    pub fn unresolved_detectors(&self) -> Vec<String> {
        self.detectors
            .iter()
            .map(Detector::key)
            .filter(|k| !self.rulesets.contains_key(k))
            .collect()
    }
}
