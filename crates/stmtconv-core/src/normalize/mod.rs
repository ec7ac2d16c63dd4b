//! Canonical value forms for extracted records.

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::error::NormalizeError;
use crate::models::record::{Field, FieldValue, Record};
use crate::templates::{SignConvention, Template};
use crate::text::{ascii_fold, clean};

/// Rewrites record values in place without changing count or order.
pub struct Normalizer<'t> {
    template: &'t Template,
    schema: Vec<Field>,
}

impl<'t> Normalizer<'t> {
    pub fn new(template: &'t Template) -> Self {
        Self {
            template,
            schema: template.schema(),
        }
    }

    pub fn normalize(&self, records: &mut [Record]) -> Result<(), NormalizeError> {
        for record in records.iter_mut() {
            self.check_schema(record)?;
            self.normalize_record(record);
        }
        debug!("Normalized {} records", records.len());
        Ok(())
    }

    fn check_schema(&self, record: &Record) -> Result<(), NormalizeError> {
        let fields: Vec<Field> = record.fields.keys().copied().collect();
        let mut expected = self.schema.clone();
        expected.sort();
        expected.dedup();
        if fields != expected {
            return Err(NormalizeError::SchemaMismatch {
                row: record.source_row,
                reason: format!("expected {:?}, found {:?}", expected, fields),
            });
        }
        Ok(())
    }

    fn normalize_record(&self, record: &mut Record) {
        let debit = record.get(Field::Debit).as_amount();
        let credit = record.get(Field::Credit).as_amount();

        for (field, value) in record.fields.iter_mut() {
            match value {
                FieldValue::Amount(amount) => {
                    let mut rounded = self.round(*amount);
                    if matches!(field, Field::Debit | Field::Credit) {
                        rounded = rounded.abs();
                    }
                    *amount = rounded;
                }
                FieldValue::Text(text) => {
                    let mut normalized = if self.template.ascii_only {
                        ascii_fold(text)
                    } else {
                        clean(text)
                    };
                    if *field == Field::TxType {
                        normalized = normalized.to_uppercase();
                    }
                    *text = normalized;
                }
                FieldValue::Date(_) | FieldValue::Empty => {}
            }
        }

        if record.has(Field::Amount) && (debit.is_some() || credit.is_some()) {
            let debit = self.round(debit.unwrap_or_default().abs());
            let credit = self.round(credit.unwrap_or_default().abs());
            let signed = match self.template.sign_convention {
                SignConvention::DebitNegative => credit - debit,
                SignConvention::DebitPositive => debit - credit,
            };
            record.set(Field::Amount, FieldValue::Amount(self.round(signed)));
        } else if let FieldValue::Amount(amount) = record.get(Field::Amount).clone() {
            if self.template.sign_convention == SignConvention::DebitPositive {
                record.set(Field::Amount, FieldValue::Amount(self.round(-amount)));
            }
        }
    }

    /// Round half away from zero and drop the sign of zero.
    fn round(&self, amount: Decimal) -> Decimal {
        let mut rounded =
            amount.round_dp_with_strategy(self.template.scale, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(self.template.scale);
        if rounded.is_zero() {
            rounded.set_sign_positive(true);
        }
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateRegistry;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn template() -> Template {
        TemplateRegistry::builtin().get("bkt_bank_statement").unwrap().clone()
    }

    #[test]
    fn test_rounding_and_negative_zero() {
        let template = template();
        let mut record = Record::with_schema(1, 0, &template.schema());
        record.set(Field::Debit, FieldValue::Amount(d("10.005")));
        record.set(Field::BalanceDifference, FieldValue::Amount(d("-0.001")));
        record.set(Field::RunningBalance, FieldValue::Amount(d("7")));

        let mut records = vec![record];
        Normalizer::new(&template).normalize(&mut records).unwrap();

        let record = &records[0];
        assert_eq!(record.get(Field::Debit).as_amount().unwrap().to_string(), "10.01");
        let difference = record.get(Field::BalanceDifference).as_amount().unwrap();
        assert!(!difference.is_sign_negative());
        assert_eq!(difference.to_string(), "0.00");
        assert_eq!(record.get(Field::RunningBalance).as_amount().unwrap().to_string(), "7.00");
    }

    #[test]
    fn test_text_is_folded_for_ascii_templates() {
        let template = template();
        let mut record = Record::with_schema(1, 0, &template.schema());
        record.set(Field::Description, FieldValue::Text("Pagesë\u{00a0} qiraje\n".into()));
        record.set(Field::TxType, FieldValue::Text("settlement".into()));

        let mut records = vec![record];
        Normalizer::new(&template).normalize(&mut records).unwrap();

        assert_eq!(records[0].get(Field::Description).as_text(), Some("Pagese qiraje"));
        assert_eq!(records[0].get(Field::TxType).as_text(), Some("SETTLEMENT"));
    }

    #[test]
    fn test_sign_convention() {
        let mut template = template();
        template.columns.push(crate::templates::OutputColumn::new(Field::Amount, "Amount"));
        let mut record = Record::with_schema(1, 0, &template.schema());
        record.set(Field::Debit, FieldValue::Amount(d("-12.5")));
        record.set(Field::Amount, FieldValue::Amount(d("-12.5")));

        let mut records = vec![record.clone()];
        Normalizer::new(&template).normalize(&mut records).unwrap();
        assert_eq!(records[0].get(Field::Debit).as_amount().unwrap().to_string(), "12.50");
        assert_eq!(records[0].get(Field::Amount).as_amount().unwrap().to_string(), "-12.50");

        template.sign_convention = SignConvention::DebitPositive;
        let mut records = vec![record];
        Normalizer::new(&template).normalize(&mut records).unwrap();
        assert_eq!(records[0].get(Field::Amount).as_amount().unwrap().to_string(), "12.50");
    }

    #[test]
    fn test_schema_mismatch_is_an_error() {
        let template = template();
        let mut records = vec![Record::with_schema(4, 0, &[Field::Date])];
        let err = Normalizer::new(&template).normalize(&mut records).unwrap_err();
        assert!(matches!(err, NormalizeError::SchemaMismatch { row: 4, .. }));
    }
}
