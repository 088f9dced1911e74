use assert_cmd::Command;
use predicates::prelude::*;
use runtests_core::{ConduitKind, ResultConduit, ResultSink, RunTests, WorkerCommand};
use serde_json::Value;
use std::collections::BTreeMap;

const WORKER: &str = env!("CARGO_BIN_EXE_runtests-worker");

fn records(ndjson: &str) -> Vec<Value> {
    ndjson
        .lines()
        .map(|line| serde_json::from_str(line).expect("worker wrote invalid JSON"))
        .collect()
}

fn test_names(records: &[Value]) -> Vec<&str> {
    records
        .iter()
        .map(|r| r["test_name"].as_str().expect("test_name must be a string"))
        .collect()
}

#[test]
fn test_path_conduit_receives_records() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let results = dir.path().join("results.json");
    let mut dict = BTreeMap::new();
    dict.insert("test_sys".to_string(), vec!["TestSysModule.*".to_string()]);

    let rt = RunTests::builder(["test_os", "test_sys"])
        .match_tests_dict(Some(dict))
        .json_file(Some(ResultConduit::path(&results)))
        .build()?;

    Command::new(WORKER)
        .arg("--worker-json")
        .arg(rt.to_json()?)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let records = records(&std::fs::read_to_string(&results)?);
    assert_eq!(test_names(&records), ["test_os", "test_sys"]);
    assert!(records[0]["match_tests"].is_null());
    assert_eq!(records[1]["match_tests"], serde_json::json!(["TestSysModule.*"]));
    Ok(())
}

#[test]
fn test_without_conduit_writes_stdout() -> anyhow::Result<()> {
    let rt = RunTests::builder(["test_os"]).build()?;

    Command::new(WORKER)
        .arg("--worker-json")
        .arg(rt.to_json()?)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""test_name":"test_os""#));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_descriptor_conduit_reaches_worker() -> anyhow::Result<()> {
    let sink = ResultSink::create(ConduitKind::Descriptor)?;
    let rt = RunTests::builder(["test_os", "test_sys", "test_io"])
        .json_file(Some(sink.conduit().clone()))
        .build()?;

    let status = WorkerCommand::new(WORKER, rt).spawn()?.wait()?;
    assert!(status.success());

    let records = records(&sink.read_to_string()?);
    assert_eq!(test_names(&records), ["test_os", "test_sys", "test_io"]);
    let pid = records[0]["worker_pid"].as_u64().unwrap_or_default();
    assert_ne!(u64::from(std::process::id()), pid);
    Ok(())
}

#[test]
fn test_alternate_command_uses_filename() -> anyhow::Result<()> {
    let sink = ResultSink::create(ConduitKind::Path)?;
    let rt = RunTests::builder(["test_os"])
        .python_cmd(Some(vec![WORKER.to_string()]))
        .json_file(Some(sink.conduit().clone()))
        .build()?;
    assert!(rt.json_file_use_filename());

    let status = WorkerCommand::new("/nonexistent/coordinator-default", rt)
        .spawn()?
        .wait()?;
    assert!(status.success());
    assert_eq!(test_names(&records(&sink.read_to_string()?)), ["test_os"]);
    Ok(())
}

#[test]
fn test_forever_bounded_by_max_units() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let results = dir.path().join("results.json");
    let rt = RunTests::builder(["t1", "t2"])
        .forever(true)
        .json_file(Some(ResultConduit::path(&results)))
        .build()?;

    Command::new(WORKER)
        .arg("--max-units")
        .arg("5")
        .arg("--worker-json")
        .arg(rt.to_json()?)
        .assert()
        .success();

    let records = records(&std::fs::read_to_string(&results)?);
    assert_eq!(test_names(&records), ["t1", "t2", "t1", "t2", "t1"]);
    Ok(())
}

#[test]
fn test_forever_without_bound_fails() -> anyhow::Result<()> {
    let rt = RunTests::builder(["t1"]).forever(true).build()?;

    Command::new(WORKER)
        .arg("--worker-json")
        .arg(rt.to_json()?)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--max-units"));
    Ok(())
}

#[test]
fn test_malformed_configuration_exit_code() -> anyhow::Result<()> {
    Command::new(WORKER)
        .arg("--worker-json")
        .arg(r#"{"tests": ["t1"]}"#)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("__runtests__"));
    Ok(())
}

#[test]
fn test_unopenable_conduit_exit_code() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = RunTests::builder(["t1"])
        .json_file(Some(ResultConduit::path(dir.path().join("missing/results.json"))))
        .build()?;

    Command::new(WORKER)
        .arg("--worker-json")
        .arg(rt.to_json()?)
        .assert()
        .code(4);
    Ok(())
}

#[test]
fn test_missing_argument_is_usage_error() -> anyhow::Result<()> {
    Command::new(WORKER).assert().code(2);
    Ok(())
}
