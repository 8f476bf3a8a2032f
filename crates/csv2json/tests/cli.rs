use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_flag_prints_version_and_exits_zero() {
    Command::cargo_bin("csv2json")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("csv2json v"));
}

#[test]
fn single_dash_version_flag_is_recognized() {
    Command::cargo_bin("csv2json")
        .unwrap()
        .arg("-version")
        .assert()
        .success()
        .stdout(predicate::str::contains("csv2json v"));
}

#[test]
fn single_dash_help_flag_is_recognized() {
    Command::cargo_bin("csv2json")
        .unwrap()
        .arg("-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("USAGE"));
}
