use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn jshost_eval_snippet() {
    let mut cmd = Command::cargo_bin("jshost").expect("binary exists");
    cmd.arg("eval").arg(r#"print("sum", 1 + 2 + 3)"#);
    cmd.assert().success().stdout("sum 6\n");
}

#[test]
fn jshost_run_shares_globals_across_files() {
    let dir = tempdir().expect("create temp dir");
    let first = dir.path().join("first.js");
    let second = dir.path().join("second.js");
    fs::write(&first, "var greeting = \"Hello from jshost!\";\n").expect("write first script");
    fs::write(&second, "print(greeting)\n").expect("write second script");

    let mut cmd = Command::cargo_bin("jshost").expect("binary exists");
    cmd.arg("run").arg(&first).arg(&second);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello from jshost!"));
}

#[test]
fn jshost_run_missing_file_fails() {
    let dir = tempdir().expect("create temp dir");
    let missing = dir.path().join("missing.js");

    let mut cmd = Command::cargo_bin("jshost").expect("binary exists");
    cmd.arg("run").arg(&missing);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error: cannot open file:"))
        .stderr(predicate::str::contains("missing.js"));
}

#[test]
fn jshost_eval_fault_exits_with_failure() {
    let mut cmd = Command::cargo_bin("jshost").expect("binary exists");
    cmd.arg("eval").arg(r#"print("partial"); nope()"#);
    cmd.assert()
        .failure()
        .stdout("partial\n")
        .stderr(predicate::str::contains(
            "error: ReferenceError: nope is not defined",
        ));
}

#[test]
fn jshost_respects_max_call_depth_flag() {
    let mut cmd = Command::cargo_bin("jshost").expect("binary exists");
    cmd.arg("--max-call-depth")
        .arg("4")
        .arg("eval")
        .arg("function f(n) { return f(n + 1); } f(0)");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("RangeError"));
}
