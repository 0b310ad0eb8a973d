use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const SAMPLE: &str = "\
Date,Transaction Name,Amount
2024-01-05,STARBUCKS #123,-4.50
2024-01-06,RENT PAYMENT,-1500.00
2024-01-07,??,abc
";

fn spendlens(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("spendlens").unwrap();
    cmd.env("HOME", home).env_remove("RUST_LOG").current_dir(home);
    cmd
}

fn init(home: &Path) -> std::path::PathBuf {
    let data_dir = home.join("data");
    spendlens(home)
        .args(["init", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote starter category map"));
    data_dir
}

#[test]
fn init_prompts_for_data_dir_on_first_run() {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("picked");
    spendlens(home.path())
        .arg("init")
        .write_stdin(format!("{}\n", data_dir.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Data directory"));
    assert!(data_dir.join("categories.json").is_file());
    assert!(data_dir.join("spendlens.db").is_file());
}

#[test]
fn init_fails_when_prompt_input_is_unreadable() {
    let home = tempfile::tempdir().unwrap();
    spendlens(home.path())
        .arg("init")
        .write_stdin(vec![0xff, 0xfe, b'\n'])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
    assert!(!home.path().join(".local/share/spendlens").exists());
}

#[test]
fn run_without_input_file_fails() {
    let home = tempfile::tempdir().unwrap();
    spendlens(home.path())
        .arg("run")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Input file not found: Transactions.csv"));
}

#[test]
fn run_before_init_asks_for_category_map() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(home.path().join("Transactions.csv"), SAMPLE).unwrap();
    spendlens(home.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("spendlens init"));
}

#[test]
fn init_run_and_report() {
    let home = tempfile::tempdir().unwrap();
    let data_dir = init(home.path());
    assert!(data_dir.join("categories.json").is_file());
    assert!(data_dir.join("uploads").is_dir());

    std::fs::write(home.path().join("Transactions.csv"), SAMPLE).unwrap();
    spendlens(home.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 rows read, 2 kept, 1 dropped"))
        .stdout(predicate::str::contains("line 4"))
        .stdout(predicate::str::contains("Coffee"));
    assert!(data_dir.join("spendlens.db").is_file());

    spendlens(home.path())
        .args(["report", "trend", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"2024-01\""))
        .stdout(predicate::str::contains("-1504.5"));

    spendlens(home.path())
        .args(["report", "breakdown", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Housing"))
        .stdout(predicate::str::contains("Coffee").not());

    spendlens(home.path())
        .args(["report", "transactions", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RENT PAYMENT"));

    spendlens(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions: 2"));
}

#[test]
fn rerun_with_bad_file_keeps_dataset() {
    let home = tempfile::tempdir().unwrap();
    init(home.path());
    std::fs::write(home.path().join("Transactions.csv"), SAMPLE).unwrap();
    spendlens(home.path()).arg("run").assert().success();

    std::fs::write(home.path().join("bad.csv"), "Date,Amount\n2024-01-01,5\n").unwrap();
    spendlens(home.path())
        .args(["run", "bad.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required column: Transaction Name"));

    spendlens(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions: 2"));
}

#[test]
fn rules_test_and_list() {
    let home = tempfile::tempdir().unwrap();
    init(home.path());

    spendlens(home.path())
        .args(["rules", "test", "Starbucks Store 42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Coffee"));

    spendlens(home.path())
        .args(["rules", "test", "Corner Bookshop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Miscellaneous"));

    spendlens(home.path())
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Income"))
        .stdout(predicate::str::contains("PAYROLL"));
}

#[test]
fn custom_category_map_override() {
    let home = tempfile::tempdir().unwrap();
    init(home.path());
    std::fs::write(home.path().join("Transactions.csv"), SAMPLE).unwrap();
    std::fs::write(home.path().join("cats.json"), r#"{"Caffeine": ["starbucks"]}"#).unwrap();

    spendlens(home.path())
        .args(["run", "--categories", "cats.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Caffeine"));
}
