//! End-to-end tests for the datalogs CLI.

use assert_cmd::Command;
use datalogs::{Coord, DataVar, Logger};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn populated_root() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let logger = Logger::new(tmp.path()).unwrap();
    logger
        .log_data(
            "rabi",
            [Coord::new("amplitude", vec![0.0, 0.5, 1.0]).units("V")],
            [DataVar::new("signal", "amplitude", vec![1.0, 0.2, 0.9])],
        )
        .unwrap();
    let sub = logger.sub_logger("fits", false).unwrap();
    sub.log_dict("params", json!({"pi_amp": 0.5})).unwrap();
    tmp
}

fn datalogs() -> Command {
    Command::cargo_bin("datalogs").unwrap()
}

#[test]
fn test_list_shows_all_logs() {
    let tmp = populated_root();
    datalogs()
        .arg("list")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("rabi.parquet"))
        .stdout(predicate::str::contains("params.json"))
        .stdout(predicate::str::contains("dict"));
}

#[test]
fn test_list_empty_directory() {
    let tmp = TempDir::new().unwrap();
    datalogs()
        .arg("list")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No logs found"));
}

#[test]
fn test_inspect_prints_log() {
    let tmp = populated_root();
    datalogs()
        .arg("inspect")
        .arg(tmp.path().join("rabi.parquet"))
        .assert()
        .success()
        .stdout(predicate::str::contains("<DataLog"))
        .stdout(predicate::str::contains("signal"))
        .stdout(predicate::str::contains("description    rabi"));
}

#[test]
fn test_inspect_unsupported_extension_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();
    datalogs()
        .arg("inspect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("'.txt' file extension is not supported"));
}

#[test]
fn test_export_writes_json() {
    let tmp = populated_root();
    let out = tmp.path().join("export.out");
    datalogs()
        .arg("export")
        .arg(tmp.path().join("fits").join("params.json"))
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(exported["kind"], json!("dict"));
    assert_eq!(exported["data"], json!({"pi_amp": 0.5}));
    assert_eq!(exported["metadata"]["description"], json!("params"));
}

#[test]
fn test_export_data_log_to_stdout() {
    let tmp = populated_root();
    datalogs()
        .arg("export")
        .arg(tmp.path().join("rabi.parquet"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"data_vars\""))
        .stdout(predicate::str::contains("\"amplitude\""));
}
