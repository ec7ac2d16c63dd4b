//! Templates shipped with the library.

use super::{
    Direction, FieldSpec, MetadataRule, Movement, OutputColumn, StatementKind, Template,
    TxTypeRule,
};
use crate::models::record::Field;

/// Built-in templates in registry order.
pub fn builtin_templates() -> Vec<Template> {
    vec![bkt_bank_statement(), bkt_pos_settlement(), generic_bank_statement()]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Output layout shared by the BKT formats.
fn bkt_columns() -> Vec<OutputColumn> {
    vec![
        OutputColumn::new(Field::Date, "SDate"),
        OutputColumn::new(Field::Description, "Pershkrimi"),
        OutputColumn::new(Field::TxType, "TYPE"),
        OutputColumn::new(Field::ByOrderOf, "ByOrderOf"),
        OutputColumn::new(Field::Beneficiary, "Beneficiary"),
        OutputColumn::new(Field::Debit, "Debit"),
        OutputColumn::new(Field::Credit, "Kredi"),
        OutputColumn::new(Field::RunningBalance, "Balance"),
        OutputColumn::new(Field::Balance, "Closing Balance"),
        OutputColumn::new(Field::BalanceDifference, "Difference"),
    ]
}

fn bkt_tx_types() -> Vec<TxTypeRule> {
    vec![
        TxTypeRule::new(&["settlement"], "SETTLEMENT", Movement::Credit),
        TxTypeRule::new(&["commission"], "COMMISSION", Movement::Debit),
        TxTypeRule::new(&["withdrawal"], "CASH WITHDRAWAL", Movement::Debit),
        TxTypeRule::new(&["cash", "deposit"], "CASH DEPOSIT", Movement::Credit),
    ]
}

fn common_skip_patterns() -> Vec<String> {
    strings(&[
        r"(?i)^\s*page\s+\d+(\s+(of|/)\s+\d+)?\s*$",
        r"(?i)^\s*(total|totali|turnover|closing balance)\b",
    ])
}

fn bkt_bank_statement() -> Template {
    Template {
        name: "bkt_bank_statement".to_string(),
        kind: StatementKind::BankStatement,
        description: "BKT current account statement with IBAN and period header".to_string(),
        keywords: strings(&[
            "IBAN",
            "BIC/Swift code",
            "DATE OF STATEMENT",
            "FROM(NGA DATA)",
            "OPENING BALANCE",
        ]),
        min_matches: 3,
        fields: vec![
            FieldSpec::new(Field::Date, &["date", "data", "transaction date", "booking date"])
                .at(0)
                .required(),
            FieldSpec::new(Field::ValueDate, &["value date", "data valute"]),
            FieldSpec::new(Field::Description, &["description", "pershkrimi", "details"]).at(1),
            FieldSpec::new(Field::Reference, &["reference", "referenca"]),
            FieldSpec::new(Field::Debit, &["debit"]),
            FieldSpec::new(Field::Credit, &["credit", "kredi"]),
            FieldSpec::new(Field::Amount, &["amount", "shuma"]),
            FieldSpec::new(Field::Balance, &["balance", "gjendja", "teprica"]),
        ],
        columns: bkt_columns(),
        direction: Direction::BalanceDelta,
        tx_types: bkt_tx_types(),
        skip_patterns: common_skip_patterns(),
        opening_balance_label: Some("opening balance".to_string()),
        emit_opening_balance: true,
        extract_parties: true,
        metadata: vec![
            MetadataRule::new("iban", r"(?i)\bIBAN\s*:\s*(.+)$"),
            MetadataRule::new("bic", r"(?i)BIC/Swift\s+code\s*:\s*(\S+)"),
            MetadataRule::new("statement_date", r"(?i)DATE\s+OF\s+STATEMENT\s*:?\s*(\S+)"),
            MetadataRule::new("period_from", r"(?i)FROM\s*\(NGA\s+DATA\)\s*:?\s*(\S+)"),
            MetadataRule::new("period_to", r"(?i)TO\s*\(NE\s+DATEN\)\s*:?\s*(\S+)"),
            MetadataRule::new("account", r"^\s*(433\S*)"),
            MetadataRule::constant("currency", r"^\s*433", "ALL"),
            MetadataRule::new("holder", r"^(.*\bPF\b.*)$"),
        ],
        ascii_only: true,
        ..Template::default()
    }
}

fn bkt_pos_settlement() -> Template {
    Template {
        name: "bkt_pos_settlement".to_string(),
        kind: StatementKind::Pos,
        description: "BKT merchant POS settlement report".to_string(),
        keywords: strings(&["merchant", "booking date", "settlement", "commission"]),
        min_matches: 2,
        fields: vec![
            FieldSpec::new(Field::Date, &["booking date", "date"]).at(0).required(),
            FieldSpec::new(Field::ValueDate, &["value date"]),
            FieldSpec::new(Field::Description, &["description", "details", "narrative"]).at(1),
            FieldSpec::new(Field::Amount, &["amount"]).at(2),
            FieldSpec::new(Field::Balance, &["balance"]).at(3),
        ],
        columns: bkt_columns(),
        direction: Direction::Keywords,
        tx_types: bkt_tx_types(),
        skip_patterns: common_skip_patterns(),
        opening_balance_label: Some("opening balance".to_string()),
        emit_opening_balance: true,
        extract_parties: true,
        metadata: vec![
            MetadataRule::new("merchant", r"(?i)merchant(?:\s+name)?\s*:\s*(.+)$"),
            MetadataRule::new("terminal", r"(?i)terminal(?:\s+id)?\s*:\s*(\S+)"),
            MetadataRule::new("period_from", r"(?i)\bfrom\s*:?\s*(\d{1,2}-[A-Za-z]{3}-\d{2,4})"),
            MetadataRule::new("period_to", r"(?i)\bto\s*:?\s*(\d{1,2}-[A-Za-z]{3}-\d{2,4})"),
        ],
        ascii_only: true,
        ..Template::default()
    }
}

fn generic_bank_statement() -> Template {
    Template {
        name: "generic_bank_statement".to_string(),
        kind: StatementKind::BankStatement,
        description: "Any tabular statement with date, description and balance columns"
            .to_string(),
        keywords: strings(&["statement", "date", "description", "balance"]),
        min_matches: 2,
        fields: vec![
            FieldSpec::new(Field::Date, &["date", "booking date", "transaction date"])
                .at(0)
                .required(),
            FieldSpec::new(Field::ValueDate, &["value date"]),
            FieldSpec::new(Field::Description, &["description", "details", "narrative", "particulars"])
                .at(1),
            FieldSpec::new(Field::Reference, &["reference", "ref"]),
            FieldSpec::new(Field::Debit, &["debit", "withdrawal", "paid out"]),
            FieldSpec::new(Field::Credit, &["credit", "deposit", "paid in"]),
            FieldSpec::new(Field::Amount, &["amount"]),
            FieldSpec::new(Field::Balance, &["balance"]),
        ],
        columns: vec![
            OutputColumn::new(Field::Date, "date"),
            OutputColumn::new(Field::Description, "description"),
            OutputColumn::new(Field::Debit, "debit"),
            OutputColumn::new(Field::Credit, "credit"),
            OutputColumn::new(Field::Balance, "balance"),
        ],
        direction: Direction::BalanceDelta,
        skip_patterns: common_skip_patterns(),
        opening_balance_label: Some("opening balance".to_string()),
        ..Template::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_validate() {
        for template in builtin_templates() {
            assert!(template.validate().is_ok(), "{}", template.name);
        }
    }

    #[test]
    fn test_bkt_output_columns() {
        let headers: Vec<String> = bkt_bank_statement()
            .columns
            .into_iter()
            .map(|c| c.header)
            .collect();
        assert_eq!(
            headers,
            vec![
                "SDate",
                "Pershkrimi",
                "TYPE",
                "ByOrderOf",
                "Beneficiary",
                "Debit",
                "Kredi",
                "Balance",
                "Closing Balance",
                "Difference"
            ]
        );
    }

    #[test]
    fn test_bkt_is_most_specific() {
        let templates = builtin_templates();
        let bkt = &templates[0];
        assert!(templates[1..].iter().all(|t| t.min_matches < bkt.min_matches));
    }

    #[test]
    fn test_bkt_transaction_types() {
        let template = bkt_pos_settlement();
        let cases = [
            ("POS SETTLEMENT 01-Oct-25", Some(("SETTLEMENT", Movement::Credit))),
            ("Commission on settlement", Some(("SETTLEMENT", Movement::Credit))),
            ("Commission", Some(("COMMISSION", Movement::Debit))),
            ("CASH WITHDRAWAL ATM 0042", Some(("CASH WITHDRAWAL", Movement::Debit))),
            ("Cash Withdrawal", Some(("CASH WITHDRAWAL", Movement::Debit))),
            ("CASH DEPOSIT branch Tirana", Some(("CASH DEPOSIT", Movement::Credit))),
            ("Deposit cheque", None),
            ("Transfer", None),
        ];

        for (text, expected) in cases {
            let found = template.tx_type(text).map(|rule| (rule.label.as_str(), rule.movement));
            assert_eq!(found, expected, "{}", text);
        }
    }
}
