use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use stmtconv_core::pdf::PdfBuilder;
use tempfile::TempDir;

fn statement_pdf() -> Vec<u8> {
    PdfBuilder::new()
        .page()
        .text(50.0, 50.0, "ACCOUNT STATEMENT")
        .row(90.0, &[(50.0, "Date"), (130.0, "Description"), (330.0, "Amount"), (420.0, "Balance")])
        .row(104.0, &[(50.0, "01-Jan-24"), (130.0, "Coffee, large"), (330.0, "-4.50")])
        .row(118.0, &[(50.0, "02-Jan-24"), (130.0, "Card hold")])
        .row(132.0, &[(50.0, "03-Jan-24"), (130.0, "Salary"), (330.0, "1,200.00")])
        .build()
        .unwrap()
}

/// A command isolated from the user's config directory.
fn stmtconv(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stmtconv").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("HOME", home)
        .current_dir(home);
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    stmtconv(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("templates"));
}

#[test]
fn test_convert_to_explicit_output() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("jan.pdf"), statement_pdf()).unwrap();

    stmtconv(dir.path())
        .args(["convert", "jan.pdf", "-o", "out.csv", "--show-warnings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 records"))
        .stderr(predicate::str::contains("row dropped"));

    let csv = fs::read_to_string(dir.path().join("out.csv")).unwrap();
    assert_eq!(
        csv,
        "date,description,debit,credit,balance\r\n\
         2024-01-01,\"Coffee, large\",4.50,,\r\n\
         2024-01-03,Salary,,1200.00,\r\n"
    );
}

#[test]
fn test_convert_default_output_name() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("My Statement (1).pdf"), statement_pdf()).unwrap();

    stmtconv(dir.path())
        .args(["convert", "My Statement (1).pdf"])
        .assert()
        .success();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".csv"))
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("My_Statement_1_"), "{}", names[0]);
}

#[test]
fn test_convert_json_to_stdout() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("jan.pdf"), statement_pdf()).unwrap();

    stmtconv(dir.path())
        .args(["convert", "jan.pdf", "-o", "-", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"template\": \"generic_bank_statement\""));
}

#[test]
fn test_convert_reports_failure_kind() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.pdf"), b"not a pdf").unwrap();

    stmtconv(dir.path())
        .args(["convert", "broken.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MalformedDocument"));
}

#[test]
fn test_convert_missing_input() {
    let dir = TempDir::new().unwrap();
    stmtconv(dir.path())
        .args(["convert", "nope.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_batch_with_summary() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.pdf"), statement_pdf()).unwrap();
    fs::write(dir.path().join("b.pdf"), b"garbage").unwrap();

    stmtconv(dir.path())
        .args(["batch", "*.pdf", "-o", "out", "--summary", "--continue-on-error"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 successful, 1 failed"));

    let summary = fs::read_to_string(dir.path().join("out").join("summary.csv")).unwrap();
    assert!(summary.starts_with("filename,status,template"));
    assert!(summary.contains("a.pdf,success,generic_bank_statement,2,1"));
    assert!(summary.contains("b.pdf,error"));
}

#[test]
fn test_batch_keeps_outputs_with_same_name() {
    let dir = TempDir::new().unwrap();
    for branch in ["north", "south"] {
        fs::create_dir(dir.path().join(branch)).unwrap();
        fs::write(dir.path().join(branch).join("jan.pdf"), statement_pdf()).unwrap();
    }

    stmtconv(dir.path())
        .args(["batch", "*/jan.pdf", "-o", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful, 0 failed"));

    let mut names: Vec<String> = fs::read_dir(dir.path().join("out"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| n.starts_with("jan_") && n.ends_with(".csv")));
    assert!(names[1].ends_with("_2.csv"), "{:?}", names);
}

#[test]
fn test_batch_stops_on_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("b.pdf"), b"garbage").unwrap();

    stmtconv(dir.path())
        .args(["batch", "*.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed"));
}

#[test]
fn test_templates_list_and_show() {
    let dir = TempDir::new().unwrap();
    stmtconv(dir.path())
        .args(["templates", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bkt_bank_statement"))
        .stdout(predicate::str::contains("bkt_pos_settlement"));

    stmtconv(dir.path())
        .args(["templates", "show", "bkt_pos_settlement"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\": \"pos\""));

    stmtconv(dir.path())
        .args(["templates", "show", "nope"])
        .assert()
        .failure();
}

#[test]
fn test_inspect_rows_and_scores() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("jan.pdf"), statement_pdf()).unwrap();

    stmtconv(dir.path())
        .args(["inspect", "jan.pdf", "--rows"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Header: Date | Description | Amount | Balance"))
        .stdout(predicate::str::contains("generic_bank_statement"))
        .stdout(predicate::str::contains("qualified"));
}

#[test]
fn test_config_set_and_get() {
    let dir = TempDir::new().unwrap();

    stmtconv(dir.path())
        .args(["config", "set", "output.quote_all", "true"])
        .assert()
        .success();

    stmtconv(dir.path())
        .args(["config", "get", "output.quote_all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));

    fs::write(dir.path().join("jan.pdf"), statement_pdf()).unwrap();
    stmtconv(dir.path())
        .args(["convert", "jan.pdf", "-o", "-"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("\"date\",\"description\""));
}

#[test]
fn test_config_show_and_path_follow_explicit_file() {
    let dir = TempDir::new().unwrap();

    stmtconv(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    stmtconv(dir.path())
        .args(["config", "init", "-o", "stmt.json", "--templates", "missing.json"])
        .assert()
        .failure();
    assert!(!dir.path().join("stmt.json").exists());

    stmtconv(dir.path())
        .args(["config", "init", "-o", "stmt.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("templates available"));

    stmtconv(dir.path())
        .args(["--config", "stmt.json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config: stmt.json"))
        .stdout(predicate::str::contains("Timeout"))
        .stdout(predicate::str::contains("Balance tolerance"))
        .stdout(predicate::str::contains("built-in templates"));

    stmtconv(dir.path())
        .args(["--config", "stmt.json", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Templates: built-in only"));
}
