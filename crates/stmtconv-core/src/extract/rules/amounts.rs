//! Amount parsing with locale-aware separators and sign markers.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::patterns::{AMOUNT_TOKEN, SPLIT_DECIMALS, SPLIT_DIGITS};
use super::FieldExtractor;
use crate::templates::Locale;

/// Parses amounts written with the template's locale.
///
/// Accepted negative forms: `-x`, `x-`, `(x)` and `x DR`. A trailing `CR`
/// marks a positive amount.
pub struct AmountParser {
    locale: Locale,
}

impl AmountParser {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    /// Parse a whole cell as one amount.
    pub fn parse(&self, text: &str) -> Option<Decimal> {
        let mut s: String = text.trim().to_string();
        for symbol in &self.locale.currency_symbols {
            s = strip_symbol(&s, symbol);
        }
        let mut s = s.trim().to_string();
        if s.is_empty() {
            return None;
        }

        let mut negative = false;
        let upper = s.to_uppercase();
        if upper.ends_with("DR") {
            negative = true;
            s.truncate(s.len() - 2);
        } else if upper.ends_with("CR") {
            s.truncate(s.len() - 2);
        }
        let mut s = s.trim().to_string();

        if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
            negative = true;
            s = s[1..s.len() - 1].trim().to_string();
        }
        if let Some(rest) = s.strip_prefix(['-', '\u{2212}']) {
            negative = true;
            s = rest.trim().to_string();
        } else if let Some(rest) = s.strip_prefix('+') {
            s = rest.trim().to_string();
        }
        if let Some(rest) = s.strip_suffix('-') {
            negative = true;
            s = rest.trim().to_string();
        }

        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let value = self.parse_digits(&compact)?;
        Some(if negative { -value } else { value })
    }

    fn parse_digits(&self, s: &str) -> Option<Decimal> {
        let decimal = self.locale.decimal_separator;
        let thousands = self.locale.thousands_separator;

        if !s.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        if s.chars().any(|c| !(c.is_ascii_digit() || c == decimal || Some(c) == thousands)) {
            return None;
        }

        let (integer, fraction) = match s.rsplit_once(decimal) {
            Some((i, f)) => (i, Some(f)),
            None => (s, None),
        };
        if integer.contains(decimal) {
            return None;
        }

        let integer: String = match thousands {
            Some(sep) => {
                let groups: Vec<&str> = integer.split(sep).collect();
                let well_grouped = groups.len() == 1
                    || (!groups[0].is_empty()
                        && groups[0].len() <= 3
                        && groups[1..].iter().all(|g| g.len() == 3));
                if !well_grouped {
                    return None;
                }
                groups.concat()
            }
            None => integer.to_string(),
        };

        let normalized = match fraction {
            Some(f) if f.is_empty() || f.chars().any(|c| !c.is_ascii_digit()) => return None,
            Some(f) if integer.is_empty() => format!("0.{}", f),
            Some(f) => format!("{}.{}", integer, f),
            None => integer,
        };

        Decimal::from_str(&normalized).ok()
    }
}

impl Default for AmountParser {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

impl FieldExtractor for AmountParser {
    type Output = Decimal;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.parse(text)
            .or_else(|| self.extract_all(text).into_iter().next())
    }

    /// Amounts embedded in free text, after rejoining digits split by spacing.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let joined = SPLIT_DIGITS.replace_all(text, "$1$2");
        let joined = SPLIT_DECIMALS.replace_all(&joined, "$1$2");
        AMOUNT_TOKEN
            .find_iter(&joined)
            .filter_map(|m| self.parse(m.as_str()))
            .collect()
    }
}

/// Remove a currency symbol; alphabetic codes only as whole words.
fn strip_symbol(text: &str, symbol: &str) -> String {
    if symbol.is_empty() {
        return text.to_string();
    }
    if !symbol.chars().all(char::is_alphabetic) {
        return text.replace(symbol, " ");
    }

    text.split_whitespace()
        .filter(|word| !word.eq_ignore_ascii_case(symbol))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain_and_grouped() {
        let parser = AmountParser::default();
        assert_eq!(parser.parse("1,234.56"), Some(d("1234.56")));
        assert_eq!(parser.parse("700.00"), Some(d("700.00")));
        assert_eq!(parser.parse("12"), Some(d("12")));
        assert_eq!(parser.parse(".50"), Some(d("0.50")));
    }

    #[test]
    fn test_parse_negative_forms() {
        let parser = AmountParser::default();
        assert_eq!(parser.parse("-25.00"), Some(d("-25.00")));
        assert_eq!(parser.parse("25.00-"), Some(d("-25.00")));
        assert_eq!(parser.parse("(1,000.00)"), Some(d("-1000.00")));
        assert_eq!(parser.parse("25.00 DR"), Some(d("-25.00")));
        assert_eq!(parser.parse("25.00 CR"), Some(d("25.00")));
    }

    #[test]
    fn test_parse_split_digits_and_currency() {
        let parser = AmountParser::default();
        assert_eq!(parser.parse("37 567 . 82"), Some(d("37567.82")));
        assert_eq!(parser.parse("ALL 1,200.00"), Some(d("1200.00")));
        assert_eq!(parser.parse("€9.99"), Some(d("9.99")));
    }

    #[test]
    fn test_parse_rejects_non_amounts() {
        let parser = AmountParser::default();
        assert_eq!(parser.parse(""), None);
        assert_eq!(parser.parse("01-Jan-24"), None);
        assert_eq!(parser.parse("Ref 42"), None);
        assert_eq!(parser.parse("25.00 1,000.00"), None);
        assert_eq!(parser.parse("12,34.00"), None);
        assert_eq!(parser.parse("EUR"), None);
    }

    #[test]
    fn test_comma_decimal_locale() {
        let parser = AmountParser::new(Locale {
            thousands_separator: Some('.'),
            decimal_separator: ',',
            currency_symbols: vec!["zł".to_string()],
        });
        assert_eq!(parser.parse("1.234,56 zł"), Some(d("1234.56")));
        assert_eq!(parser.parse("-0,99"), Some(d("-0.99")));
    }

    #[test]
    fn test_extract_all_from_text() {
        let parser = AmountParser::default();
        let found = parser.extract_all("OPENING BALANCE: 37 567 . 82");
        assert_eq!(found, vec![d("37567.82")]);
        assert_eq!(parser.extract("Opening balance 1,000.00"), Some(d("1000.00")));
    }
}
