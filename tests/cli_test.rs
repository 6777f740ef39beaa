mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("studio-credits"));
    cmd.arg("tests/fixtures/commands.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "package,user,plan,credits,amount,status,payment,version,attempts",
        ))
        // approved once (the retry is a replay), then one class booked
        .stdout(predicate::str::contains("1,10,3,9,120,active,confirmed,3,1"))
        // rejected by an admin
        .stdout(predicate::str::contains("2,11,3,10,120,active,rejected,2,1"))
        // never approved, rejected by the deadline sweep
        .stdout(predicate::str::contains("3,12,4,5,60.5,active,rejected,2,0"));

    Ok(())
}

#[test]
fn test_double_approval_is_reported() {
    let file = common::command_file(&[
        "purchase,1,10,3,10,120,,,,,2026-01-05T09:00:00Z",
        "approve,1,,,,,2,1,,,2026-01-05T10:00:00Z",
        "approve,1,,,,,2,2,,,2026-01-05T10:01:00Z",
    ]);

    let mut cmd = Command::new(cargo_bin!("studio-credits"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error processing command"))
        .stderr(predicate::str::contains(
            "cannot approve a package whose payment is confirmed",
        ))
        .stdout(predicate::str::contains("1,10,3,10,120,active,confirmed,2,1"));
}

#[test]
fn test_late_approval_rejects_package() {
    let file = common::command_file(&[
        "purchase,1,10,3,10,120,,,,,2026-01-05T09:00:00Z",
        "approve,1,,,,,2,1,,,2026-01-08T09:00:00Z",
    ]);

    let mut cmd = Command::new(cargo_bin!("studio-credits"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("approval window closed"))
        .stdout(predicate::str::contains("1,10,3,10,120,active,rejected,2,1"));
}

#[test]
fn test_approval_window_flag_disables_deadline() {
    let file = common::command_file(&[
        "purchase,1,10,3,10,120,,,,,2026-01-05T09:00:00Z",
        "approve,1,,,,,2,1,,,2026-01-08T09:00:00Z",
    ]);

    let mut cmd = Command::new(cargo_bin!("studio-credits"));
    cmd.arg(file.path()).arg("--approval-window-hours").arg("0");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,10,3,10,120,active,confirmed,2,1"));
}

#[test]
fn test_booking_after_validity_is_refused() {
    let file = common::command_file(&[
        "purchase,1,10,3,10,120,,,,,2026-01-05T09:00:00Z",
        "approve,1,,,,,2,1,,,2026-01-05T10:00:00Z",
        "consume,1,,,,,,2,,,2026-01-20T10:00:00Z",
    ]);

    let mut cmd = Command::new(cargo_bin!("studio-credits"));
    cmd.arg(file.path()).arg("--validity-days").arg("7");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("cannot consume a credit of a package that is expired"))
        .stdout(predicate::str::contains("1,10,3,10,120,active,confirmed,2,1"));
}
