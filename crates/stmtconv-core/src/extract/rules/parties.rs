//! "By Order Of" and beneficiary extraction from transaction narratives.

use regex::Regex;

use super::patterns::{
    BEN, BENEFICIARY, BEN_DASH, BY_ORDER_OF, FT_BEN, FT_BEN_DASH, FT_BY_ORDER_OF, ORDER_OF,
};
use super::FieldExtractor;

/// First non-empty capture of the first matching pattern.
fn first_capture(line: &str, patterns: &[&Regex]) -> Option<String> {
    patterns.iter().find_map(|re| {
        let caps = re.captures(line)?;
        let value = caps[1].trim().trim_start_matches(['-', ':']).trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Ordering party named on one narrative line.
pub fn extract_by_order_of(line: &str) -> Option<String> {
    let lower = line.to_lowercase();
    if let Some(value) = first_capture(line, &[&FT_BY_ORDER_OF, &BY_ORDER_OF]) {
        return Some(value);
    }
    if !lower.contains("by order of") {
        return first_capture(line, &[&ORDER_OF]);
    }
    None
}

/// Beneficiary named on one narrative line.
pub fn extract_beneficiary(line: &str) -> Option<String> {
    let lower = line.to_lowercase();
    if let Some(value) = first_capture(line, &[&FT_BEN_DASH, &FT_BEN, &BENEFICIARY]) {
        return Some(value);
    }
    if !lower.contains("beneficiary") {
        return first_capture(line, &[&BEN_DASH, &BEN]);
    }
    None
}

/// Which party a [`PartyExtractor`] looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyRole {
    ByOrderOf,
    Beneficiary,
}

/// Scans narrative lines in order; the first line naming the party wins.
pub struct PartyExtractor {
    role: PartyRole,
}

impl PartyExtractor {
    pub fn new(role: PartyRole) -> Self {
        Self { role }
    }

    fn extract_line(&self, line: &str) -> Option<String> {
        match self.role {
            PartyRole::ByOrderOf => extract_by_order_of(line),
            PartyRole::Beneficiary => extract_beneficiary(line),
        }
    }

    /// First party found across the given lines.
    pub fn from_lines<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> Option<String> {
        lines.into_iter().find_map(|line| self.extract_line(line))
    }
}

impl FieldExtractor for PartyExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.from_lines(text.lines())
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        text.lines().filter_map(|line| self.extract_line(line)).collect()
    }
}
