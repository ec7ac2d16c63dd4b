//! CSV serialization of normalized records.

use std::fmt::Write;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use rust_decimal::RoundingStrategy;
use tracing::debug;

use crate::error::EmitError;
use crate::models::config::{LineTerminator, OutputConfig};
use crate::models::record::{FieldValue, Record};
use crate::templates::Template;

/// Writes records in the template's column order.
pub struct CsvEmitter {
    config: OutputConfig,
}

impl CsvEmitter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    fn format_value(&self, value: &FieldValue, scale: u32) -> Result<String, EmitError> {
        let formatted = match value {
            FieldValue::Date(date) => {
                let mut out = String::new();
                write!(out, "{}", date.format(&self.config.date_format))
                    .map_err(|_| EmitError::DateFormat(self.config.date_format.clone()))?;
                out
            }
            FieldValue::Amount(amount) => {
                let mut amount = amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
                amount.rescale(scale);
                amount.to_string()
            }
            FieldValue::Text(text) => text.clone(),
            FieldValue::Empty => String::new(),
        };
        Ok(formatted)
    }

    /// Serialize records to a UTF-8 CSV string. The header row is always written.
    pub fn emit(&self, records: &[Record], template: &Template) -> Result<String, EmitError> {
        let delimiter = self.config.delimiter;
        if !delimiter.is_ascii() {
            return Err(EmitError::Delimiter(delimiter));
        }
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter as u8)
            .quote_style(if self.config.quote_all {
                QuoteStyle::Always
            } else {
                QuoteStyle::Necessary
            })
            .terminator(match self.config.line_terminator {
                LineTerminator::Crlf => Terminator::CRLF,
                LineTerminator::Lf => Terminator::Any(b'\n'),
            })
            .from_writer(Vec::new());

        writer.write_record(template.columns.iter().map(|c| c.header.as_str()))?;
        for record in records {
            let row = template
                .columns
                .iter()
                .map(|c| self.format_value(record.get(c.field), template.scale))
                .collect::<Result<Vec<_>, _>>()?;
            writer.write_record(&row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| EmitError::Flush(e.to_string()))?;
        let csv = String::from_utf8(bytes).map_err(|e| EmitError::Flush(e.to_string()))?;
        debug!("Wrote {} CSV rows", records.len() + 1);
        Ok(csv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Field;
    use crate::templates::TemplateRegistry;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn generic() -> Template {
        TemplateRegistry::builtin().get("generic_bank_statement").unwrap().clone()
    }

    fn record(template: &Template, description: &str) -> Record {
        let mut record = Record::with_schema(1, 0, &template.schema());
        record.set(Field::Date, FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
        record.set(Field::Description, FieldValue::Text(description.to_string()));
        record.set(Field::Debit, FieldValue::Amount(Decimal::from_str("4.5").unwrap()));
        record.set(Field::Balance, FieldValue::Amount(Decimal::from_str("95.5").unwrap()));
        record
    }

    #[test]
    fn test_header_and_crlf() {
        let template = generic();
        let csv = CsvEmitter::new(OutputConfig::default())
            .emit(&[record(&template, "Coffee")], &template)
            .unwrap();
        assert_eq!(
            csv,
            "date,description,debit,credit,balance\r\n2024-01-05,Coffee,4.50,,95.50\r\n"
        );
    }

    #[test]
    fn test_rfc4180_quoting() {
        let template = generic();
        let csv = CsvEmitter::new(OutputConfig::default())
            .emit(&[record(&template, "Lunch, \"deluxe\"\nsecond line")], &template)
            .unwrap();
        assert!(csv.contains("\"Lunch, \"\"deluxe\"\"\nsecond line\""));
    }

    #[test]
    fn test_quote_all_and_lf() {
        let template = generic();
        let config = OutputConfig {
            quote_all: true,
            line_terminator: LineTerminator::Lf,
            ..OutputConfig::default()
        };
        let csv = CsvEmitter::new(config).emit(&[], &template).unwrap();
        assert_eq!(csv, "\"date\",\"description\",\"debit\",\"credit\",\"balance\"\n");
    }

    #[test]
    fn test_non_ascii_delimiter_is_rejected() {
        let template = generic();
        let config = OutputConfig {
            delimiter: '€',
            ..OutputConfig::default()
        };
        assert!(matches!(
            CsvEmitter::new(config).emit(&[], &template),
            Err(EmitError::Delimiter('€'))
        ));
    }

    #[test]
    fn test_custom_date_format() {
        let template = generic();
        let config = OutputConfig {
            date_format: "%d.%m.%Y".to_string(),
            ..OutputConfig::default()
        };
        let csv = CsvEmitter::new(config)
            .emit(&[record(&template, "Coffee")], &template)
            .unwrap();
        assert!(csv.contains("05.01.2024,Coffee"));
    }
}
