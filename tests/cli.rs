use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn command() -> Command {
    Command::cargo_bin("async-to-promises").unwrap()
}

#[test]
fn test_transform_prints_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("load.js");
    fs::write(&input, "async function load() { return await fetch(url); }\n").unwrap();

    command()
        .arg("transform")
        .arg(&input)
        .arg("--external-helpers")
        .assert()
        .success()
        .stdout(predicate::str::contains("function load()"))
        .stdout(predicate::str::contains("_await(fetch(url))"));
}

#[test]
fn test_transform_writes_out_dir() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.js");
    let second = dir.path().join("b.js");
    fs::write(&first, "async function a() { await x; }\n").unwrap();
    fs::write(&second, "function b() { return 1; }\n").unwrap();
    let out = dir.path().join("out");

    command()
        .arg("transform")
        .arg(&first)
        .arg(&second)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success();

    let a = fs::read_to_string(out.join("a.js")).unwrap();
    assert!(a.contains("function _await("), "{}", a);
    let b = fs::read_to_string(out.join("b.js")).unwrap();
    assert!(b.contains("function b()"), "{}", b);
}

#[test]
fn test_transform_reports_eval() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.js");
    fs::write(&input, "async function f() { eval(code); }\n").unwrap();

    command()
        .arg("transform")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("eval"));
}

#[test]
fn test_analyze_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("load.js");
    fs::write(&input, "async function load() { return await fetch(url); }\n").unwrap();

    command()
        .arg("analyze")
        .arg(&input)
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"load\""))
        .stdout(predicate::str::contains("\"_await\""));
}

#[test]
fn test_helpers_resolve_dependencies() {
    command()
        .arg("helpers")
        .arg("--names")
        .arg("_forOf")
        .assert()
        .success()
        .stdout(predicate::str::contains("_forTo"))
        .stdout(predicate::str::contains("_forOf"));
}

#[test]
fn test_unknown_helper_fails() {
    command().arg("helpers").arg("_nope").assert().failure();
}
