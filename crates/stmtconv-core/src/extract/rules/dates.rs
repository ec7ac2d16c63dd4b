//! Date parsing against a template's chrono formats.

use chrono::NaiveDate;

use super::patterns::DATE_TOKEN;
use super::FieldExtractor;

/// Date field parser.
///
/// Two-digit years (`%y`) follow chrono's pivot: 00-68 map to 20xx and
/// 69-99 to 19xx.
pub struct DateParser {
    formats: Vec<String>,
}

impl DateParser {
    pub fn new(formats: &[String]) -> Self {
        Self {
            formats: formats.to_vec(),
        }
    }

    /// Parse text that is exactly a date in one of the formats.
    pub fn parse_exact(&self, text: &str) -> Option<NaiveDate> {
        let text = text.trim();
        self.formats
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
    }
}

impl FieldExtractor for DateParser {
    type Output = NaiveDate;

    /// The whole cell, then its first word, then any embedded date.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.parse_exact(text)
            .or_else(|| text.split_whitespace().next().and_then(|w| self.parse_exact(w)))
            .or_else(|| self.extract_all(text).into_iter().next())
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        DATE_TOKEN
            .find_iter(text)
            .filter_map(|m| self.parse_exact(m.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Template;

    fn parser() -> DateParser {
        DateParser::new(&Template::default().date_formats)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bkt_short_dates() {
        let parser = parser();
        assert_eq!(parser.extract("01-Jan-24"), Some(date(2024, 1, 1)));
        assert_eq!(parser.extract("15-OCT-25"), Some(date(2025, 10, 15)));
        assert_eq!(parser.extract("31-Dec-1999"), Some(date(1999, 12, 31)));
    }

    #[test]
    fn test_numeric_dates() {
        let parser = parser();
        assert_eq!(parser.extract("15.01.2024"), Some(date(2024, 1, 15)));
        assert_eq!(parser.extract("15/01/2024"), Some(date(2024, 1, 15)));
        assert_eq!(parser.extract("2024-01-15"), Some(date(2024, 1, 15)));
    }

    #[test]
    fn test_date_followed_by_value_date() {
        let parser = parser();
        assert_eq!(parser.extract("02-Jan-24 03-Jan-24"), Some(date(2024, 1, 2)));
    }

    #[test]
    fn test_embedded_date() {
        let parser = parser();
        assert_eq!(parser.extract("Booked on 05-Feb-24"), Some(date(2024, 2, 5)));
    }

    #[test]
    fn test_rejects_invalid_dates() {
        let parser = parser();
        assert_eq!(parser.extract("31-Feb-24"), None);
        assert_eq!(parser.extract("Coffee"), None);
        assert_eq!(parser.extract(""), None);
    }
}
