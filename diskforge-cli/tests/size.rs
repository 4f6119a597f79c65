use predicates::prelude::*;

mod common;

#[test]
fn test_size_decimal() {
    let mut ctx = common::diskforge();
    ctx.cmd
        .args(["size", "1GB"])
        .assert()
        .success()
        .stdout("1000000000\n");
}

#[test]
fn test_size_binary_spelling_is_decimal() {
    let mut ctx = common::diskforge();
    ctx.cmd
        .args(["size", "1GiB"])
        .assert()
        .success()
        .stdout("1000000000\n");
}

#[test]
fn test_size_plain_bytes() {
    let mut ctx = common::diskforge();
    ctx.cmd
        .args(["size", "4096"])
        .assert()
        .success()
        .stdout("4096\n");
}

#[test]
fn test_size_invalid() {
    let mut ctx = common::diskforge();
    ctx.cmd
        .args(["size", "lots"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:").and(predicate::str::contains("lots")));
}
