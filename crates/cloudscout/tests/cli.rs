use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("cloudscout")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("instances")
                .and(predicate::str::contains("volumes"))
                .and(predicate::str::contains("security-groups"))
                .and(predicate::str::contains("addresses")),
        );
}

#[test]
fn instances_help_shows_filter_flag() {
    Command::cargo_bin("cloudscout")
        .unwrap()
        .args(["instances", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--filter").and(predicate::str::contains("--id")));
}

#[test]
fn rejects_unknown_subcommand() {
    Command::cargo_bin("cloudscout")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}

#[test]
fn requires_a_subcommand() {
    Command::cargo_bin("cloudscout").unwrap().assert().failure();
}
