//! Row-to-record extraction driven by a template.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, Stage};
use crate::layout::{Row, RowKind, TokenizedDocument};
use crate::models::config::ExtractionConfig;
use crate::models::record::{Field, FieldType, FieldValue, Record, Warning};
use crate::templates::{Direction, Movement, Template, TxTypeRule};
use crate::text::fold;

use super::balance::BalanceTracker;
use super::rules::{AmountParser, DateParser, FieldExtractor, PartyExtractor, PartyRole};
use super::{extract_metadata, Result, StatementExtractor};

/// Tolerance when comparing a balance movement with a row amount.
const DELTA_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Result of field extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Validated records in row order, the opening balance record first.
    pub records: Vec<Record>,
    pub warnings: Vec<Warning>,
    /// Statement-level values captured from the preamble.
    pub metadata: BTreeMap<String, String>,
    pub opening_balance: Option<Decimal>,
    /// Body rows considered as transactions.
    pub candidates: usize,
    /// Candidates that produced a record.
    pub valid: usize,
}

/// Table column of each bound field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnBinding {
    columns: BTreeMap<Field, usize>,
}

impl ColumnBinding {
    /// Bind template fields to header cells: exact alias matches first, then
    /// alias substrings, then declared positions. A column binds once.
    pub fn bind(template: &Template, header: Option<&[String]>) -> Self {
        let header: Vec<String> = header
            .unwrap_or_default()
            .iter()
            .map(|h| fold(h))
            .collect();
        let mut columns: BTreeMap<Field, usize> = BTreeMap::new();
        let mut used = vec![false; header.len()];

        let passes: [fn(&str, &str) -> bool; 2] = [|cell, alias| cell == alias, |cell, alias| cell.contains(alias)];
        for matches in passes {
            for def in &template.fields {
                if columns.contains_key(&def.field) {
                    continue;
                }
                let found = def.aliases.iter().map(|a| fold(a)).find_map(|alias| {
                    header
                        .iter()
                        .enumerate()
                        .find(|(i, cell)| !used[*i] && !alias.is_empty() && matches(cell, &alias))
                        .map(|(i, _)| i)
                });
                if let Some(i) = found {
                    used[i] = true;
                    columns.insert(def.field, i);
                }
            }
        }

        for def in &template.fields {
            if columns.contains_key(&def.field) {
                continue;
            }
            if let Some(position) = def.position {
                if !used.get(position).copied().unwrap_or(false) {
                    if position < used.len() {
                        used[position] = true;
                    }
                    columns.insert(def.field, position);
                }
            }
        }

        Self { columns }
    }

    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, usize)> + '_ {
        self.columns.iter().map(|(f, c)| (*f, *c))
    }
}

/// Amount-typed cell values of one row before direction is resolved.
#[derive(Debug, Default)]
struct RowAmounts {
    values: HashMap<Field, Decimal>,
}

impl RowAmounts {
    fn get(&self, field: Field) -> Option<Decimal> {
        self.values.get(&field).copied()
    }

    fn has_columns(&self) -> bool {
        self.values.contains_key(&Field::Debit) || self.values.contains_key(&Field::Credit)
    }

    /// Signed movement: the amount column, else credit minus debit.
    fn signed(&self) -> Option<Decimal> {
        self.get(Field::Amount).or_else(|| {
            self.has_columns().then(|| {
                self.get(Field::Credit).unwrap_or_default().abs()
                    - self.get(Field::Debit).unwrap_or_default().abs()
            })
        })
    }

    fn columns(&self) -> (Decimal, Decimal) {
        (
            self.get(Field::Debit).unwrap_or_default().abs(),
            self.get(Field::Credit).unwrap_or_default().abs(),
        )
    }
}

fn from_signed(amount: Decimal) -> (Decimal, Decimal) {
    if amount.is_sign_negative() {
        (amount.abs(), Decimal::ZERO)
    } else {
        (Decimal::ZERO, amount)
    }
}

fn from_movement(movement: Movement, magnitude: Decimal) -> (Decimal, Decimal) {
    match movement {
        Movement::Debit => (magnitude, Decimal::ZERO),
        Movement::Credit => (Decimal::ZERO, magnitude),
    }
}

/// Split a row's movement into `(debit, credit)` magnitudes.
fn resolve_movement(
    direction: Direction,
    amounts: &RowAmounts,
    rule: Option<&TxTypeRule>,
    delta: Option<Decimal>,
) -> Option<(Decimal, Decimal)> {
    let signed = amounts.signed()?;
    let magnitude = signed.abs();

    let resolved = match direction {
        Direction::Columns if amounts.has_columns() => amounts.columns(),
        Direction::Columns | Direction::Signed => from_signed(signed),
        Direction::Keywords => match rule {
            Some(rule) => from_movement(rule.movement, magnitude),
            None => from_signed(signed),
        },
        Direction::BalanceDelta => match delta {
            Some(delta) if (delta.abs() - magnitude).abs() < DELTA_EPSILON => {
                if delta.is_sign_negative() {
                    (magnitude, Decimal::ZERO)
                } else {
                    (Decimal::ZERO, magnitude)
                }
            }
            _ if amounts.has_columns() => amounts.columns(),
            _ => from_signed(signed),
        },
    };
    Some(resolved)
}

/// Extracts typed records from tokenized rows.
pub struct RecordExtractor {
    config: ExtractionConfig,
}

/// Per-document state shared by all rows.
struct RowContext<'t> {
    template: &'t Template,
    binding: ColumnBinding,
    schema: Vec<Field>,
    amounts: AmountParser,
    dates: DateParser,
}

impl RecordExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    fn compile_skip_patterns(template: &Template) -> Result<Vec<Regex>> {
        template
            .skip_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ExtractionError::Pattern {
                    template: template.name.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// First row carrying the opening balance label, with its amount.
    fn find_opening_balance<'d>(
        document: &'d TokenizedDocument,
        template: &Template,
        amounts: &AmountParser,
    ) -> Option<(&'d Row, Option<Decimal>)> {
        let label = fold(template.opening_balance_label.as_deref()?);
        if label.is_empty() {
            return None;
        }

        let row = document
            .rows
            .iter()
            .filter(|r| r.kind != RowKind::Header)
            .find(|r| fold(&r.text()).contains(&label))?;

        let value = row
            .cells
            .iter()
            .rev()
            .find_map(|c| amounts.parse(&c.text))
            .or_else(|| amounts.extract_all(&row.text()).pop());
        Some((row, value))
    }

    fn opening_record(row: &Row, balance: Decimal, schema: &[Field]) -> Record {
        let mut record = Record::with_schema(row.index, row.page, schema);
        record.set(Field::Description, FieldValue::Text("Opening Balance".to_string()));
        record.set(Field::Balance, FieldValue::Amount(balance));
        record.set(Field::RunningBalance, FieldValue::Amount(balance));
        record.set(Field::BalanceDifference, FieldValue::Amount(Decimal::ZERO));
        record
    }

    /// Build one record, or say why the row was dropped.
    fn extract_row(
        &self,
        row: &Row,
        ctx: &RowContext<'_>,
        tracker: &mut BalanceTracker,
    ) -> std::result::Result<(Record, Option<String>), String> {
        let template = ctx.template;
        let mut record = Record::with_schema(row.index, row.page, &ctx.schema);
        let mut amounts = RowAmounts::default();

        for def in &template.fields {
            let cell = ctx.binding.column(def.field).and_then(|c| row.cells.get(c));
            let Some(cell) = cell.filter(|c| !c.is_empty()) else {
                if def.required {
                    return Err(format!("missing {}", def.field));
                }
                continue;
            };

            match def.value_type() {
                FieldType::Date => match cell.lines.iter().find_map(|l| ctx.dates.extract(l)) {
                    Some(date) => record.set(def.field, FieldValue::Date(date)),
                    None if def.required => {
                        return Err(format!("unparsable {} '{}'", def.field, cell.text));
                    }
                    None => debug!("Row {}: ignoring unparsable {} '{}'", row.index, def.field, cell.text),
                },
                FieldType::Amount => match cell.lines.iter().find_map(|l| ctx.amounts.parse(l)) {
                    Some(value) => {
                        amounts.values.insert(def.field, value);
                    }
                    None if def.required => {
                        return Err(format!("unparsable {} '{}'", def.field, cell.text));
                    }
                    None => debug!("Row {}: ignoring unparsable {} '{}'", row.index, def.field, cell.text),
                },
                FieldType::Text => record.set(def.field, FieldValue::Text(cell.text.clone())),
            }
        }

        let rule = template.tx_type(&row.text());

        let statement = amounts.get(Field::Balance);
        let delta = tracker.delta_to(statement);
        let (debit, credit) = match resolve_movement(template.direction, &amounts, rule, delta) {
            Some(movement) => movement,
            None if template.amount_required => return Err("no amount".to_string()),
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        if !debit.is_zero() {
            record.set(Field::Debit, FieldValue::Amount(debit));
        }
        if !credit.is_zero() {
            record.set(Field::Credit, FieldValue::Amount(credit));
        }
        if amounts.signed().is_some() {
            record.set(Field::Amount, FieldValue::Amount(credit - debit));
        }
        if let Some(rule) = rule {
            record.set(Field::TxType, FieldValue::Text(rule.label.clone()));
        }

        if template.extract_parties {
            let lines: Vec<&str> = match ctx.binding.column(Field::Description).and_then(|c| row.cells.get(c)) {
                Some(cell) => cell.lines.iter().map(String::as_str).collect(),
                None => row.cells.iter().flat_map(|c| c.lines.iter().map(String::as_str)).collect(),
            };
            if let Some(party) = PartyExtractor::new(PartyRole::ByOrderOf).from_lines(lines.iter().copied()) {
                record.set(Field::ByOrderOf, FieldValue::Text(party));
            }
            if let Some(party) = PartyExtractor::new(PartyRole::Beneficiary).from_lines(lines.iter().copied()) {
                record.set(Field::Beneficiary, FieldValue::Text(party));
            }
        }

        if let Some(balance) = statement {
            record.set(Field::Balance, FieldValue::Amount(balance));
        }
        let step = tracker.apply(debit, credit, statement);
        if let Some(running) = step.running {
            record.set(Field::RunningBalance, FieldValue::Amount(running));
        }
        if let Some(difference) = step.difference {
            record.set(Field::BalanceDifference, FieldValue::Amount(difference));
        }

        let mismatch = match (step.mismatch, step.expected, statement) {
            (true, Some(expected), Some(statement)) => Some(format!(
                "balance mismatch: expected {} but statement shows {} (difference {})",
                expected,
                statement,
                expected - statement
            )),
            _ => None,
        };

        Ok((record, mismatch))
    }
}

impl StatementExtractor for RecordExtractor {
    fn extract(&self, document: &TokenizedDocument, template: &Template) -> Result<Extraction> {
        let skip = Self::compile_skip_patterns(template)?;
        let metadata = extract_metadata(document.preamble(), template)?;

        let ctx = RowContext {
            template,
            binding: ColumnBinding::bind(template, document.header.as_deref()),
            schema: template.schema(),
            amounts: AmountParser::new(template.locale.clone()),
            dates: DateParser::new(&template.date_formats),
        };
        for (field, column) in ctx.binding.fields() {
            debug!("Bound {} to column {}", field, column);
        }

        let mut warnings = Vec::new();
        let opening = Self::find_opening_balance(document, template, &ctx.amounts);
        let opening_row = opening.map(|(row, _)| row.index);
        let opening_balance = opening.and_then(|(_, value)| value);
        if let Some((row, None)) = opening {
            warnings.push(
                Warning::new(Stage::Extract, "opening balance row has no readable amount")
                    .at_row(row.index, row.page),
            );
        }

        let mut tracker = BalanceTracker::new(opening_balance, self.config.balance_tolerance);
        let mut records = Vec::new();
        let mut candidates = 0;

        for row in document.body() {
            if Some(row.index) == opening_row || row.is_blank() {
                continue;
            }
            let text = row.text();
            if skip.iter().any(|re| re.is_match(&text)) {
                debug!("Row {}: skipped '{}'", row.index, text);
                continue;
            }

            candidates += 1;
            match self.extract_row(row, &ctx, &mut tracker) {
                Ok((record, mismatch)) => {
                    if let Some(message) = mismatch {
                        warnings.push(Warning::new(Stage::Extract, message).at_row(row.index, row.page));
                    }
                    records.push(record);
                }
                Err(reason) => {
                    debug!("Row {}: dropped ({})", row.index, reason);
                    warnings.push(
                        Warning::new(Stage::Extract, format!("row dropped: {}", reason))
                            .at_row(row.index, row.page),
                    );
                }
            }
        }

        let valid = records.len();
        let ratio = if candidates == 0 {
            0.0
        } else {
            valid as f64 / candidates as f64
        };
        if valid == 0 || valid < template.min_valid_rows || ratio < template.min_valid_ratio {
            warn!("Only {} of {} rows are valid", valid, candidates);
            return Err(ExtractionError::InsufficientValidRows {
                valid,
                candidates,
                min_rows: template.min_valid_rows,
                min_ratio: template.min_valid_ratio,
            });
        }

        if template.emit_opening_balance {
            if let (Some((row, _)), Some(balance)) = (opening, opening_balance) {
                records.insert(0, Self::opening_record(row, balance, &ctx.schema));
            }
        }

        info!(
            "Extracted {} records from {} candidate rows ({} warnings)",
            valid,
            candidates,
            warnings.len()
        );

        Ok(Extraction {
            records,
            warnings,
            metadata,
            opening_balance,
            candidates,
            valid,
        })
    }
}
