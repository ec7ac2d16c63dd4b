//! Statement templates: data-driven rules for one statement format.
//!
//! A template says how to recognise a format (keywords), how to bind table
//! columns to canonical fields (header aliases and positions), how to read
//! amounts and dates, how to tell debits from credits, and which columns to
//! emit. Templates are plain serde data so new formats can be loaded from
//! JSON without code changes.

mod builtin;
mod registry;

pub use builtin::builtin_templates;
pub use registry::TemplateRegistry;

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::record::{Field, FieldType};
use crate::text::fold;

/// Family of statement a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    #[default]
    BankStatement,
    Pos,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::BankStatement => "bank_statement",
            StatementKind::Pos => "pos",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "bank_statement" | "bank" | "statement" => Ok(StatementKind::BankStatement),
            "pos" | "pos_settlement" => Ok(StatementKind::Pos),
            other => Err(format!("unknown statement kind '{}'", other)),
        }
    }
}

/// Binding of a canonical field to a table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: Field,
    /// Header labels that identify the column (matched folded).
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Column index used when no header label matches.
    #[serde(default)]
    pub position: Option<usize>,
    /// Overrides the field's default value type.
    #[serde(default)]
    pub field_type: Option<FieldType>,
    /// A row whose value for this field does not coerce is dropped.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(field: Field, aliases: &[&str]) -> Self {
        Self {
            field,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            position: None,
            field_type: None,
            required: false,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn value_type(&self) -> FieldType {
        self.field_type.unwrap_or_else(|| self.field.default_type())
    }
}

/// One CSV output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub field: Field,
    pub header: String,
}

impl OutputColumn {
    pub fn new(field: Field, header: &str) -> Self {
        Self {
            field,
            header: header.to_string(),
        }
    }
}

/// Number formatting of amounts on the statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locale {
    pub thousands_separator: Option<char>,
    pub decimal_separator: char,
    /// Stripped before parsing.
    pub currency_symbols: Vec<String>,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            thousands_separator: Some(','),
            decimal_separator: '.',
            currency_symbols: vec![
                "ALL".to_string(),
                "LEK".to_string(),
                "EUR".to_string(),
                "USD".to_string(),
                "€".to_string(),
                "$".to_string(),
            ],
        }
    }
}

/// How a row's movement is split into debit and credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Separate debit and credit columns.
    #[default]
    Columns,
    /// One signed amount column; negative is a debit.
    Signed,
    /// Transaction-type keywords decide, the sign otherwise.
    Keywords,
    /// The balance movement decides when it matches the amount.
    BalanceDelta,
}

/// Sign of the derived `Amount` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Debits negative, credits positive.
    #[default]
    DebitNegative,
    /// Debits positive, credits negative.
    DebitPositive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    Debit,
    Credit,
}

/// Transaction type recognised from the row text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxTypeRule {
    /// All keywords must appear in the folded row text.
    pub keywords: Vec<String>,
    pub label: String,
    pub movement: Movement,
}

impl TxTypeRule {
    pub fn new(keywords: &[&str], label: &str, movement: Movement) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            label: label.to_string(),
            movement,
        }
    }

    /// Every keyword appears in `folded`, which must already be folded.
    pub fn matches(&self, folded: &str) -> bool {
        self.keywords.iter().all(|k| folded.contains(&fold(k)))
    }
}

/// Statement-level value captured from the preamble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRule {
    pub key: String,
    /// Regex applied to each preamble row; capture group 1 is the value.
    pub pattern: String,
    /// Fixed value stored on match instead of the capture.
    #[serde(default)]
    pub value: Option<String>,
}

impl MetadataRule {
    pub fn new(key: &str, pattern: &str) -> Self {
        Self {
            key: key.to_string(),
            pattern: pattern.to_string(),
            value: None,
        }
    }

    pub fn constant(key: &str, pattern: &str, value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(key, pattern)
        }
    }
}

/// A named ruleset describing one statement format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    pub name: String,
    pub kind: StatementKind,
    pub description: String,

    /// Phrases looked for in the header region.
    pub keywords: Vec<String>,
    /// Keywords that must match for the template to qualify.
    pub min_matches: usize,

    pub fields: Vec<FieldSpec>,
    pub columns: Vec<OutputColumn>,

    pub locale: Locale,
    /// chrono formats tried in order. Two-digit year formats must come
    /// before their four-digit forms, since `%Y` also accepts "24".
    pub date_formats: Vec<String>,

    pub direction: Direction,
    pub sign_convention: SignConvention,
    pub tx_types: Vec<TxTypeRule>,

    /// Regexes for body rows that are not transactions (totals, footers).
    pub skip_patterns: Vec<String>,
    pub opening_balance_label: Option<String>,
    pub emit_opening_balance: bool,
    pub extract_parties: bool,
    pub metadata: Vec<MetadataRule>,

    pub min_valid_rows: usize,
    pub min_valid_ratio: f64,
    /// Decimal places of emitted amounts.
    pub scale: u32,
    pub ascii_only: bool,
    /// Drop rows on which no amount parses.
    pub amount_required: bool,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: StatementKind::BankStatement,
            description: String::new(),
            keywords: Vec::new(),
            min_matches: 1,
            fields: Vec::new(),
            columns: Vec::new(),
            locale: Locale::default(),
            date_formats: vec![
                "%d-%b-%y".to_string(),
                "%d-%b-%Y".to_string(),
                "%d.%m.%y".to_string(),
                "%d.%m.%Y".to_string(),
                "%d/%m/%y".to_string(),
                "%d/%m/%Y".to_string(),
                "%Y-%m-%d".to_string(),
            ],
            direction: Direction::Columns,
            sign_convention: SignConvention::DebitNegative,
            tx_types: Vec::new(),
            skip_patterns: Vec::new(),
            opening_balance_label: None,
            emit_opening_balance: false,
            extract_parties: false,
            metadata: Vec::new(),
            min_valid_rows: 1,
            min_valid_ratio: 0.5,
            scale: 2,
            ascii_only: false,
            amount_required: true,
        }
    }
}

impl Template {
    /// Fields emitted, in output order.
    pub fn schema(&self) -> Vec<Field> {
        self.columns.iter().map(|c| c.field).collect()
    }

    /// First transaction type rule matching the row text.
    pub fn tx_type(&self, text: &str) -> Option<&TxTypeRule> {
        let folded = fold(text);
        self.tx_types.iter().find(|rule| rule.matches(&folded))
    }

    /// Check the template is usable: it has a name, output columns, and
    /// every regex compiles.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("template has no name".to_string());
        }
        if self.columns.is_empty() {
            return Err(format!("template '{}' declares no output columns", self.name));
        }
        if self.keywords.is_empty() {
            return Err(format!("template '{}' declares no keywords", self.name));
        }
        if self.min_matches == 0 || self.min_matches > self.keywords.len() {
            return Err(format!(
                "template '{}': min_matches {} must be between 1 and {}",
                self.name,
                self.min_matches,
                self.keywords.len()
            ));
        }
        if !(0.0..=1.0).contains(&self.min_valid_ratio) {
            return Err(format!(
                "template '{}': min_valid_ratio {} is outside 0..1",
                self.name, self.min_valid_ratio
            ));
        }

        let patterns = self
            .skip_patterns
            .iter()
            .chain(self.metadata.iter().map(|m| &m.pattern));
        for pattern in patterns {
            Regex::new(pattern)
                .map_err(|e| format!("template '{}': bad pattern '{}': {}", self.name, pattern, e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_kind_from_str() {
        assert_eq!("bank".parse::<StatementKind>().unwrap(), StatementKind::BankStatement);
        assert_eq!("Bank-Statement".parse::<StatementKind>().unwrap(), StatementKind::BankStatement);
        assert_eq!("POS".parse::<StatementKind>().unwrap(), StatementKind::Pos);
        assert!("invoice".parse::<StatementKind>().is_err());
    }

    #[test]
    fn test_template_json_defaults() {
        let json = r#"{
            "name": "minimal",
            "keywords": ["account statement"],
            "columns": [{"field": "date", "header": "Date"}]
        }"#;
        let template: Template = serde_json::from_str(json).unwrap();

        assert_eq!(template.kind, StatementKind::BankStatement);
        assert_eq!(template.min_matches, 1);
        assert_eq!(template.scale, 2);
        assert!(template.amount_required);
        assert_eq!(template.schema(), vec![Field::Date]);
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_patterns() {
        let template = Template {
            name: "broken".to_string(),
            keywords: vec!["x".to_string()],
            columns: vec![OutputColumn::new(Field::Date, "Date")],
            skip_patterns: vec!["(unclosed".to_string()],
            ..Template::default()
        };
        let err = template.validate().unwrap_err();
        assert!(err.contains("bad pattern"));
    }

    #[test]
    fn test_validate_rejects_impossible_min_matches() {
        let template = Template {
            name: "greedy".to_string(),
            keywords: vec!["x".to_string()],
            min_matches: 2,
            columns: vec![OutputColumn::new(Field::Date, "Date")],
            ..Template::default()
        };
        assert!(template.validate().is_err());
    }
}
