mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_rows_are_skipped() {
    let file = common::command_file(&[
        "purchase,1,10,3,10,120,,,,,2026-01-05T09:00:00Z",
        // unknown command type
        "refund,1,,,,,2,1,,,2026-01-05T10:00:00Z",
        // not a timestamp
        "approve,1,,,,,2,1,,,yesterday",
        // text where a version belongs
        "approve,1,,,,,2,one,,,2026-01-05T10:00:00Z",
        "approve,1,,,,,2,1,,,2026-01-05T11:00:00Z",
    ]);

    let mut cmd = Command::new(cargo_bin!("studio-credits"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains("1,10,3,10,120,active,confirmed,2,1"));
}

#[test]
fn test_invalid_commands_do_not_write() {
    let file = common::command_file(&[
        // no credits
        "purchase,1,10,3,0,120,,,,,2026-01-05T09:00:00Z",
        // negative price
        "purchase,2,10,3,5,-1,,,,,2026-01-05T09:00:00Z",
        "purchase,3,10,3,5,40,,,,,2026-01-05T09:00:00Z",
        // reject without a reason
        "reject,3,,,,,2,1,,,2026-01-05T10:00:00Z",
        // approve without an actor
        "approve,3,,,,,,1,,,2026-01-05T10:00:00Z",
        // unknown package
        "approve,9,,,,,2,1,,,2026-01-05T10:00:00Z",
    ]);

    let mut cmd = Command::new(cargo_bin!("studio-credits"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error processing command"))
        .stderr(predicate::str::contains("Package 9 not found"))
        .stdout(predicate::str::contains("3,10,3,5,40,active,pending,1,0"))
        .stdout(predicate::str::contains("1,10,3").not())
        .stdout(predicate::str::contains("2,10,3").not());
}
