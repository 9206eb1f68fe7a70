mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::command_file;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_hold_at_exact_available_boundary() {
    let input = command_file(&[
        "deposit,1,,30.00",
        "order,1,1,30.01,2030-01-01T12:00:00Z",
        "order,1,2,30.00,2030-01-01T12:00:00Z",
        "place,1,1",
        "place,1,2",
    ]);

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(input.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("insufficient_funds"))
        .stdout(predicate::str::contains("1,30.00,30.00,0.00"));
}

#[test]
fn test_amounts_round_half_away_from_zero() {
    let input = command_file(&["deposit,1,,0.005", "deposit,1,,1.004", "deposit,2,,0.004"]);

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(input.path());

    // 0.005 -> 0.01 and 1.004 -> 1.00; 0.004 rounds to zero and is rejected
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("invalid_amount"))
        .stdout(predicate::str::contains("1,1.01,0.00,1.01"))
        .stdout(predicate::str::contains("2,").not());
}

#[test]
fn test_deposit_limit() {
    let input = command_file(&["deposit,1,,10000.00", "deposit,2,,10000.01"]);

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(input.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,10000.00,0.00,10000.00"))
        .stdout(predicate::str::contains("\n2,").not());
}

#[test]
fn test_deposit_limit_is_configurable() {
    let input = command_file(&["deposit,1,,150.00"]);

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(input.path()).arg("--max-deposit").arg("100");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("invalid_amount"))
        .stdout(predicate::str::contains("1,").not());
}

#[test]
fn test_cancel_after_cutoff_is_rejected() {
    let input = command_file(&[
        "deposit,1,,20.00",
        "order,1,1,10.00,2030-01-01T12:00:00Z",
        "place,1,1",
        "cancel,1,1,,2030-01-01T11:50:00Z",
    ]);

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(input.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("deadline_passed"))
        .stdout(predicate::str::contains("1,20.00,10.00,10.00"));
}

#[test]
fn test_negative_cancel_cutoff_is_rejected() {
    let input = command_file(&["deposit,1,,5.00"]);

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(input.path()).arg("--cancel-cutoff-minutes=-5");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cancellation cutoff must not be negative"));
}

#[test]
fn test_out_of_range_cancel_cutoff_is_rejected() {
    let input = command_file(&["deposit,1,,5.00"]);

    let mut cmd = Command::new(cargo_bin!("canteen-ledger"));
    cmd.arg(input.path())
        .arg("--cancel-cutoff-minutes")
        .arg(i64::MAX.to_string());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}
