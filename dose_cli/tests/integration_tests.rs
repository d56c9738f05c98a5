//! Integration tests for the dosekeeper binary.
//!
//! These tests verify end-to-end behavior including:
//! - Adding and listing medicines
//! - Toggling doses and reading today's summary
//! - One-off scans and resets
//! - Error reporting for unknown medicines

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dosekeeper").expect("Failed to find dosekeeper binary");
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

/// Add a medicine for user 1 and return its id as stored on disk
fn add_medicine(data_dir: &Path, name: &str, times: &[&str]) -> String {
    let mut cmd = cli(data_dir);
    cmd.args(["add", "--user", "1", "--name", name, "--dosage", "10mg"]);
    for (i, time) in times.iter().enumerate() {
        cmd.arg(format!("--time{}", i + 1)).arg(time);
    }
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(format!("Added {}", name)));

    let contents = fs::read_to_string(data_dir.join("medicines.json")).expect("store missing");
    let store: serde_json::Value = serde_json::from_str(&contents).expect("store not JSON");
    store["medicines"]
        .as_array()
        .expect("medicines array")
        .iter()
        .find(|m| m["name"] == name)
        .and_then(|m| m["id"].as_str())
        .expect("medicine not stored")
        .to_string()
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("dosekeeper")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Medicine dose reminders and adherence tracking",
        ));
}

#[test]
fn test_add_and_list() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    add_medicine(data_dir, "Losartan", &["08:00", "20:00"]);

    cli(data_dir)
        .args(["list", "--user", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Losartan (10mg)"))
        .stdout(predicate::str::contains("08:00, 20:00"));

    cli(data_dir)
        .args(["list", "--user", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No medicines for user 2"));
}

#[test]
fn test_add_without_times_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["add", "--user", "1", "--name", "Nothing"])
        .assert()
        .failure();

    assert!(!data_dir.join("medicines.json").exists());
}

#[test]
fn test_toggle_updates_summary_and_adherence() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = add_medicine(data_dir, "Sertraline", &["09:00", "21:00"]);

    cli(data_dir)
        .args(["toggle", id.as_str(), "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("slot 1 marked taken"));

    cli(data_dir)
        .args(["summary", "--user", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/2 taken, 1 remaining"))
        .stdout(predicate::str::contains("Completion: 50%"));

    cli(data_dir)
        .args(["adherence", "--user", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Adherence: 50.0% (1/2 doses)"));

    cli(data_dir)
        .args(["toggle", id.as_str(), "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("slot 1 marked not taken"));
}

#[test]
fn test_toggle_unknown_medicine_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["toggle", "6f1c1d2e-0000-4000-8000-000000000000", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
}

#[test]
fn test_adherence_without_medicines_is_full() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["adherence", "--user", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Adherence: 100.0% (0/0 doses)"));
}

#[test]
fn test_scan_reports_due_doses() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_medicine(data_dir, "Warfarin", &["18:00"]);
    add_medicine(data_dir, "Digoxin", &["08:00"]);

    cli(data_dir)
        .args(["scan", "--at", "18:03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 2 medicines, 1 due."))
        .stdout(predicate::str::contains("Time to take Warfarin (10mg)"));

    cli(data_dir)
        .args(["scan", "--at", "18:06"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 2 medicines, 0 due."));
}

#[test]
fn test_reset_clears_taken_doses() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = add_medicine(data_dir, "Insulin", &["07:00", "12:00", "19:00"]);

    for slot in ["1", "2", "3"] {
        cli(data_dir).args(["toggle", id.as_str(), slot]).assert().success();
    }

    cli(data_dir)
        .args(["reminders", "--user", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All doses taken for today."));

    cli(data_dir)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reset 1 medicines"));

    cli(data_dir)
        .args(["reminders", "--user", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("07:00  Insulin"))
        .stdout(predicate::str::contains("19:00  Insulin"));
}

#[test]
fn test_delete_removes_medicine() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let id = add_medicine(data_dir, "Cetirizine", &["22:00"]);

    cli(data_dir).args(["delete", id.as_str()]).assert().success();

    cli(data_dir)
        .args(["today", "--user", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No doses scheduled today."));
}
