//! Canonical transaction records and warnings.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Stage;

/// Canonical field names a template can bind and emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Booking or transaction date.
    Date,
    /// Value date.
    ValueDate,
    Description,
    Reference,
    /// Transaction type label (SETTLEMENT, COMMISSION, ...).
    TxType,
    ByOrderOf,
    Beneficiary,
    Debit,
    Credit,
    /// Signed amount, sign per the template's convention.
    Amount,
    /// Balance as printed on the statement.
    Balance,
    /// Balance computed from the previous balance and this row's movement.
    RunningBalance,
    /// `RunningBalance - Balance`.
    BalanceDifference,
}

impl Field {
    /// The value type a field carries unless a template says otherwise.
    pub fn default_type(&self) -> FieldType {
        match self {
            Field::Date | Field::ValueDate => FieldType::Date,
            Field::Debit
            | Field::Credit
            | Field::Amount
            | Field::Balance
            | Field::RunningBalance
            | Field::BalanceDifference => FieldType::Amount,
            Field::Description
            | Field::Reference
            | Field::TxType
            | Field::ByOrderOf
            | Field::Beneficiary => FieldType::Text,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Date => "date",
            Field::ValueDate => "value_date",
            Field::Description => "description",
            Field::Reference => "reference",
            Field::TxType => "tx_type",
            Field::ByOrderOf => "by_order_of",
            Field::Beneficiary => "beneficiary",
            Field::Debit => "debit",
            Field::Credit => "credit",
            Field::Amount => "amount",
            Field::Balance => "balance",
            Field::RunningBalance => "running_balance",
            Field::BalanceDifference => "balance_difference",
        };
        f.write_str(name)
    }
}

/// Declared type of a bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Date,
    Amount,
    Text,
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Date(NaiveDate),
    Amount(Decimal),
    Text(String),
    #[default]
    Empty,
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            FieldValue::Amount(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One canonical transaction or line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Index of the source row in the tokenizer output.
    pub source_row: usize,
    /// Page of the source row (0-based).
    pub page: usize,
    /// Field values keyed by canonical field.
    pub fields: BTreeMap<Field, FieldValue>,
}

static EMPTY: FieldValue = FieldValue::Empty;

impl Record {
    /// Create a record with every schema field present and empty.
    pub fn with_schema(source_row: usize, page: usize, schema: &[Field]) -> Self {
        Self {
            source_row,
            page,
            fields: schema.iter().map(|f| (*f, FieldValue::Empty)).collect(),
        }
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        self.fields.get(&field).unwrap_or(&EMPTY)
    }

    /// Set a value if the field is part of this record's schema.
    pub fn set(&mut self, field: Field, value: FieldValue) {
        if let Some(slot) = self.fields.get_mut(&field) {
            *slot = value;
        }
    }

    pub fn has(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }
}

/// A non-fatal data-quality issue surfaced alongside a successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub stage: Stage,
    /// Source row index, when the warning concerns a row.
    pub row: Option<usize>,
    /// Page of that row (0-based).
    pub page: Option<usize>,
    pub message: String,
}

impl Warning {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            row: None,
            page: None,
            message: message.into(),
        }
    }

    pub fn at_row(mut self, row: usize, page: usize) -> Self {
        self.row = Some(row);
        self.page = Some(page);
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.row, self.page) {
            (Some(row), Some(page)) => write!(
                f,
                "[{}] page {} row {}: {}",
                self.stage,
                page + 1,
                row,
                self.message
            ),
            _ => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}
