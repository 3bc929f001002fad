use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_seed_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.args(["seed", "--count", "3", "--success-rate", "1.0"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Created PAY-"))
        .stdout(predicate::str::contains("Total payments: 3"))
        .stdout(predicate::str::contains("completed: 3"));

    Ok(())
}

#[test]
fn test_unknown_command_fails() {
    Command::new(cargo_bin!("payflow"))
        .arg("launch")
        .assert()
        .failure();
}
