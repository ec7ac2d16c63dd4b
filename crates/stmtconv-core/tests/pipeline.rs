use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use std::str::FromStr;
use stmtconv_core::pdf::PdfBuilder;
use stmtconv_core::{convert, ErrorKind, Field, Stage};

const DATE_X: f32 = 50.0;
const DESC_X: f32 = 130.0;
const AMOUNT_X: f32 = 330.0;
const BALANCE_X: f32 = 420.0;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// One-page statement with a `Date | Description | Amount | Balance` table.
fn generic_statement(rows: &[(&str, &str, &str, &str)]) -> Vec<u8> {
    let mut builder = PdfBuilder::new()
        .page()
        .text(DATE_X, 50.0, "ACCOUNT STATEMENT")
        .text(DATE_X, 64.0, "Account holder: Jane Roe")
        .row(
            90.0,
            &[(DATE_X, "Date"), (DESC_X, "Description"), (AMOUNT_X, "Amount"), (BALANCE_X, "Balance")],
        );
    let mut y = 90.0;
    for &(date, description, amount, balance) in rows {
        y += 14.0;
        builder = builder.row(
            y,
            &[(DATE_X, date), (DESC_X, description), (AMOUNT_X, amount), (BALANCE_X, balance)],
        );
    }
    builder.build().unwrap()
}

const BKT_COLUMNS: [f32; 5] = [DATE_X, DESC_X, 300.0, 370.0, 440.0];
const BKT_HEADER_Y: f32 = 136.0;

/// A new page carrying the BKT letterhead and the table header.
fn bkt_page(builder: PdfBuilder) -> PdfBuilder {
    builder
        .page()
        .text(DATE_X, 40.0, "ARBEN KOKA PF")
        .text(DATE_X, 54.0, "IBAN: AL47 2121 1009 0000 0002 3569 8741")
        .text(DATE_X, 68.0, "BIC/Swift code: NCBAALTX")
        .text(DATE_X, 82.0, "DATE OF STATEMENT 31-Oct-25")
        .text(DATE_X, 96.0, "FROM(NGA DATA): 01-Oct-25 TO(NE DATEN): 31-Oct-25")
        .text(DATE_X, 110.0, "433101234567")
        .row(
            BKT_HEADER_Y,
            &[
                (BKT_COLUMNS[0], "Date"),
                (BKT_COLUMNS[1], "Description"),
                (BKT_COLUMNS[2], "Debit"),
                (BKT_COLUMNS[3], "Credit"),
                (BKT_COLUMNS[4], "Balance"),
            ],
        )
}

/// Table rows under the header, 14pt apart. Returns the last baseline.
fn bkt_rows(mut builder: PdfBuilder, table: &[[&str; 5]]) -> (PdfBuilder, f32) {
    let mut y = BKT_HEADER_Y;
    for cells in table {
        y += 14.0;
        let placed: Vec<(f32, &str)> = BKT_COLUMNS.iter().copied().zip(cells.iter().copied()).collect();
        builder = builder.row(y, &placed);
    }
    (builder, y)
}

/// Statement in the BKT layout, with a wrapped narrative on the last row.
fn bkt_statement() -> Vec<u8> {
    let table: [[&str; 5]; 4] = [
        ["", "OPENING BALANCE", "", "", "1,000.00"],
        ["01-Oct-25", "POS SETTLEMENT", "", "200.00", "1,200.00"],
        ["02-Oct-25", "Commission", "2.00", "", "1,198.00"],
        ["03-Oct-25", "Transfer", "50.00", "", "1,148.00"],
    ];

    let (builder, y) = bkt_rows(bkt_page(PdfBuilder::new()), &table);
    builder
        .text(DESC_X, y + 12.0, "Ft - Ben -MC DONALD S SHPK")
        .build()
        .unwrap()
}

#[test]
fn test_missing_amount_row_becomes_warning() {
    let bytes = generic_statement(&[
        ("01-Jan-24", "Coffee", "-4.50", ""),
        ("02-Jan-24", "Card hold", "", ""),
        ("03-Jan-24", "Salary", "1,200.00", ""),
    ]);
    let conversion = convert(&bytes, None).unwrap();

    assert_eq!(conversion.template, "generic_bank_statement");
    assert_eq!(conversion.records.len(), 2);
    assert_eq!(conversion.warnings.len(), 1);
    assert_eq!(conversion.warnings[0].stage, Stage::Extract);
    assert_eq!(conversion.csv.lines().count(), 3);
    assert_eq!(
        conversion.csv,
        "date,description,debit,credit,balance\r\n\
         2024-01-01,Coffee,4.50,,\r\n\
         2024-01-03,Salary,,1200.00,\r\n"
    );
}

#[test]
fn test_one_cent_balance_mismatch_keeps_row() {
    let bytes = generic_statement(&[
        ("", "Opening balance", "", "1,000.00"),
        ("01-Jan-24", "Coffee", "-25.00", "975.01"),
        ("02-Jan-24", "Salary", "100.00", "1,075.01"),
    ]);
    let conversion = convert(&bytes, None).unwrap();

    assert_eq!(conversion.opening_balance, Some(d("1000.00")));
    assert_eq!(conversion.records.len(), 2);
    assert_eq!(conversion.warnings.len(), 1);
    assert!(conversion.warning_messages()[0].contains("balance mismatch"));
    assert_eq!(conversion.records[0].get(Field::Debit).as_amount(), Some(d("25.00")));
}

#[test]
fn test_zero_pages_is_empty_document() {
    let bytes = PdfBuilder::new().build().unwrap();
    let failure = convert(&bytes, None).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::EmptyDocument);
    assert_eq!(failure.stage, Stage::Load);
}

#[test]
fn test_pages_without_text_is_empty_document() {
    let bytes = PdfBuilder::new().blank_page().blank_page().build().unwrap();
    let failure = convert(&bytes, None).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::EmptyDocument);
}

#[test]
fn test_unmatched_document_is_unknown_format() {
    let bytes = PdfBuilder::new()
        .page()
        .text(DATE_X, 50.0, "PACKING LIST")
        .row(90.0, &[(DATE_X, "Item"), (DESC_X, "Quantity"), (AMOUNT_X, "Price")])
        .row(104.0, &[(DATE_X, "Widget"), (DESC_X, "4"), (AMOUNT_X, "12.00")])
        .build()
        .unwrap();
    let failure = convert(&bytes, None).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::UnknownFormat);
    assert_eq!(failure.stage, Stage::Classify);
}

#[test]
fn test_unknown_kind_hint_is_unknown_format() {
    let bytes = generic_statement(&[("01-Jan-24", "Coffee", "-4.50", "")]);
    let failure = convert(&bytes, Some("credit_card")).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::UnknownFormat);
}

#[test]
fn test_unstructured_text_is_unparsable_layout() {
    let bytes = PdfBuilder::new()
        .page()
        .text(DATE_X, 50.0, "Dear customer,")
        .text(DATE_X, 64.0, "your statement is attached.")
        .build()
        .unwrap();
    let failure = convert(&bytes, None).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::UnparsableLayout);
    assert_eq!(failure.stage, Stage::Tokenize);
}

#[test]
fn test_all_rows_invalid_is_insufficient() {
    let bytes = generic_statement(&[
        ("01-Jan-24", "Card hold", "", ""),
        ("02-Jan-24", "Card hold", "", ""),
    ]);
    let failure = convert(&bytes, None).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::InsufficientValidRows);
    assert_eq!(failure.stage, Stage::Extract);
}

#[test]
fn test_most_specific_template_wins() {
    let conversion = convert(&bkt_statement(), None).unwrap();
    assert_eq!(conversion.template, "bkt_bank_statement");

    let hinted = convert(&bkt_statement(), Some("bank_statement")).unwrap();
    assert_eq!(hinted.template, "bkt_bank_statement");
}

#[test]
fn test_bkt_statement_records() {
    let conversion = convert(&bkt_statement(), None).unwrap();

    assert!(conversion.warnings.is_empty(), "{:?}", conversion.warning_messages());
    assert_eq!(conversion.records.len(), 4);
    assert_eq!(conversion.transaction_count(), 3);
    assert_eq!(conversion.metadata["iban"], "AL47 2121 1009 0000 0002 3569 8741");
    assert_eq!(conversion.metadata["holder"], "ARBEN KOKA PF");
    assert_eq!(conversion.metadata["period_to"], "31-Oct-25");

    let lines: Vec<&str> = conversion.csv.lines().collect();
    assert_eq!(
        lines[0],
        "SDate,Pershkrimi,TYPE,ByOrderOf,Beneficiary,Debit,Kredi,Balance,Closing Balance,Difference"
    );
    assert_eq!(lines[1], ",Opening Balance,,,,,,1000.00,1000.00,0.00");
    assert_eq!(lines[2], "2025-10-01,POS SETTLEMENT,SETTLEMENT,,,,200.00,1200.00,1200.00,0.00");
    assert_eq!(lines[3], "2025-10-02,Commission,COMMISSION,,,2.00,,1198.00,1198.00,0.00");
}

#[test]
fn test_wrapped_narrative_is_merged() {
    let conversion = convert(&bkt_statement(), None).unwrap();
    let transfer = conversion.records.last().unwrap();

    assert_eq!(
        transfer.get(Field::Description).as_text(),
        Some("Transfer | Ft - Ben -MC DONALD S SHPK")
    );
    assert_eq!(transfer.get(Field::Beneficiary).as_text(), Some("MC DONALD S SHPK"));
    assert_eq!(transfer.get(Field::Debit).as_amount(), Some(d("50.00")));
}

#[test]
fn test_conversion_is_idempotent() {
    let bytes = bkt_statement();
    let first = convert(&bytes, None).unwrap();
    let second = convert(&bytes, None).unwrap();
    assert_eq!(first.csv, second.csv);
    assert_eq!(first.records, second.records);
}

#[test]
fn test_csv_round_trips_through_reader() {
    let conversion = convert(&bkt_statement(), None).unwrap();
    let mut reader = csv::Reader::from_reader(conversion.csv.as_bytes());

    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers.len(), 10);
    assert_eq!(headers[6], "Kredi");

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), conversion.records.len());
    assert_eq!(&rows[3][1], "Transfer | Ft - Ben -MC DONALD S SHPK");
    assert_eq!(&rows[3][5], "50.00");
}

#[test]
fn test_letterhead_repeated_on_every_page() {
    let (builder, _) = bkt_rows(
        bkt_page(PdfBuilder::new()),
        &[
            ["", "OPENING BALANCE", "", "", "1,000.00"],
            ["01-Oct-25", "POS SETTLEMENT", "", "200.00", "1,200.00"],
            ["02-Oct-25", "Commission", "2.00", "", "1,198.00"],
        ],
    );
    let (builder, _) = bkt_rows(bkt_page(builder), &[["03-Oct-25", "Transfer", "50.00", "", "1,148.00"]]);
    let conversion = convert(&builder.build().unwrap(), None).unwrap();

    assert_eq!(conversion.pages, 2);
    assert_eq!(conversion.template, "bkt_bank_statement");
    assert!(conversion.warnings.is_empty(), "{:?}", conversion.warning_messages());
    assert_eq!(conversion.transaction_count(), 3);
    assert_eq!(conversion.metadata["holder"], "ARBEN KOKA PF");

    let transfer = conversion.records.last().unwrap();
    assert_eq!(transfer.page, 1);
    assert_eq!(transfer.get(Field::Description).as_text(), Some("Transfer"));
    assert_eq!(transfer.get(Field::RunningBalance).as_amount(), Some(d("1148.00")));
    assert!(conversion
        .records
        .iter()
        .all(|r| r.get(Field::Description).as_text().is_some_and(|t| !t.contains("ARBEN"))));
}

#[test]
fn test_running_balance_keeps_printed_error() {
    let (builder, _) = bkt_rows(
        bkt_page(PdfBuilder::new()),
        &[
            ["", "OPENING BALANCE", "", "", "1,000.00"],
            ["01-Oct-25", "POS SETTLEMENT", "", "200.00", "1,200.01"],
            ["02-Oct-25", "Commission", "2.00", "", "1,198.01"],
        ],
    );
    let conversion = convert(&builder.build().unwrap(), None).unwrap();

    // only the row that introduced the cent is reported
    assert_eq!(conversion.warnings.len(), 1);
    assert!(conversion.warnings[0].message.contains("expected 1200.00 but statement shows 1200.01"));

    let lines: Vec<&str> = conversion.csv.lines().collect();
    assert_eq!(lines[2], "2025-10-01,POS SETTLEMENT,SETTLEMENT,,,,200.00,1200.00,1200.01,-0.01");
    assert_eq!(lines[3], "2025-10-02,Commission,COMMISSION,,,2.00,,1198.00,1198.01,-0.01");
}
