//! Common regex patterns for statement row extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Amounts as printed on BKT statements: 14,700.00 / -700.00
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"[-(]?\d{1,3}(?:,\d{3})+\.\d{2}\)?|[-(]?\d+\.\d{2}\)?"
    ).unwrap();

    // Digits split by layout spacing: "37 567 . 82"
    pub static ref SPLIT_DIGITS: Regex = Regex::new(
        r"(\d)\s+([\d.,])"
    ).unwrap();

    pub static ref SPLIT_DECIMALS: Regex = Regex::new(
        r"([\d.,])\s+(\d)"
    ).unwrap();

    // Dates embedded in longer text
    pub static ref DATE_TOKEN: Regex = Regex::new(
        r"\b\d{1,2}[-./ ][A-Za-z]{3}[-./ ]\d{2,4}\b|\b\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4}\b|\b\d{4}-\d{2}-\d{2}\b"
    ).unwrap();

    // By order of
    pub static ref FT_BY_ORDER_OF: Regex = Regex::new(
        r"(?i)ft\s*-\s*by\s+order\s+of\s*[:-]?\s*(.+)"
    ).unwrap();

    pub static ref BY_ORDER_OF: Regex = Regex::new(
        r"(?i)by\s+order\s+of\s*[:-]?\s*(.+)"
    ).unwrap();

    pub static ref ORDER_OF: Regex = Regex::new(
        r"(?i)order\s+of\s*[:-]?\s*(.+)"
    ).unwrap();

    // Beneficiary
    pub static ref FT_BEN_DASH: Regex = Regex::new(
        r"(?i)ft\s*-\s*ben\s*-\s*(.+)"
    ).unwrap();

    pub static ref FT_BEN: Regex = Regex::new(
        r"(?i)ft\s*-\s*ben\s+[:-]?\s*(.+)"
    ).unwrap();

    pub static ref BENEFICIARY: Regex = Regex::new(
        r"(?i)beneficiary\s*[:-]?\s*(.+)"
    ).unwrap();

    pub static ref BEN_DASH: Regex = Regex::new(
        r"(?i)\bben\s*-\s*(.+)"
    ).unwrap();

    pub static ref BEN: Regex = Regex::new(
        r"(?i)\bben\b\s*[:-]?\s*(.+)"
    ).unwrap();
}
