//! Black-box tests of the `preprocess` and `runtime` binaries.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn preprocess() -> Command {
    Command::cargo_bin("preprocess").expect("binary exists")
}

fn runtime() -> Command {
    Command::cargo_bin("runtime").expect("binary exists")
}

const DOCUMENT: &str = r#"[{
    "name": "cooling",
    "conditions": {"all": [
        {"fact": "temperature", "operator": "greaterThan", "value": 30}
    ]},
    "event": {"eventType": "climate", "actions": [
        {"type": "updateFact", "target": "ac_status", "value": true}
    ]}
}]"#;

#[test]
fn preprocess_help_exits_0() {
    preprocess()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Compile a JSON rule document"));
}

#[test]
fn runtime_help_exits_0() {
    runtime()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Execute a REX bytecode artifact"));
}

#[test]
fn preprocess_writes_artifact() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("rules.json");
    let out = dir.path().join("bytecode.bin");
    fs::write(&input, DOCUMENT).unwrap();

    preprocess()
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let artifact = fs::read(&out).unwrap();
    let header = rex::bytecode::Header::parse(&artifact).unwrap();
    assert_eq!(header.num_rules, 1);
}

#[test]
fn preprocess_rejects_invalid_document() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("rules.json");
    // lessThan on a string fails validation.
    fs::write(
        &input,
        r#"[{
            "name": "bad",
            "conditions": {"all": [{"fact": "name", "operator": "lessThan", "value": "John"}]},
            "event": {"eventType": "e", "actions": []}
        }]"#,
    )
    .unwrap();

    preprocess()
        .arg(&input)
        .arg("--out")
        .arg(dir.path().join("out.bin"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("lessThan"));
}

#[test]
fn preprocess_rejects_missing_input() {
    let dir = TempDir::new().unwrap();
    preprocess()
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure();
}

#[test]
fn runtime_executes_empty_unit() {
    // An empty rule document compiles to an empty body, which the runtime
    // executes successfully against its empty fact store.
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("rules.json");
    let out = dir.path().join("bytecode.bin");
    fs::write(&input, "[]").unwrap();

    preprocess().arg(&input).arg("--out").arg(&out).assert().success();
    runtime().arg(&out).assert().success();
}

#[test]
fn runtime_fails_on_unresolved_fact() {
    // A real unit needs preloaded facts; the CLI starts empty, so the first
    // LOAD_FACT halts the run with a non-zero exit.
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("rules.json");
    let out = dir.path().join("bytecode.bin");
    fs::write(&input, DOCUMENT).unwrap();

    preprocess().arg(&input).arg("--out").arg(&out).assert().success();
    runtime().arg(&out).assert().failure();
}

#[test]
fn runtime_rejects_corrupt_artifact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.bin");
    fs::write(&path, b"not bytecode").unwrap();

    runtime().arg(&path).assert().failure();
}

#[test]
fn preprocess_log_file_mode() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("rules.json");
    fs::write(&input, "[]").unwrap();

    preprocess()
        .current_dir(dir.path())
        .arg(&input)
        .arg("--log")
        .arg("debug")
        .arg("--log-output")
        .arg("file")
        .assert()
        .success();
    assert!(dir.path().join("rex.log").exists());
}
