use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn nexusmatch(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nexusmatch"))
        .current_dir(dir)
        .env_remove("NEXUSMATCH_CONFIG")
        .args(args)
        .output()
        .expect("failed to spawn nexusmatch")
}

fn write_data(dir: &Path) -> String {
    let path = dir.join("not2.jsonl");
    let mut f = fs::File::create(&path).unwrap();
    writeln!(f, "{{\"i\":\"a\"}}\n\n{{\"i\":\"b\"}}").unwrap();
    path.display().to_string()
}

fn stdout(o: &Output) -> String {
    String::from_utf8_lossy(&o.stdout).trim().to_string()
}

#[test]
fn check_reports_clauses_and_rejects_bad_not() {
    let dir = tempdir().unwrap();
    let ok = nexusmatch(dir.path(), &["check", "--query", r#"{"i":{"$not":{"$gt":"c","$lt":"b"}}}"#]);
    assert!(ok.status.success());
    assert!(stdout(&ok).contains("2 clause(s)"), "{}", stdout(&ok));

    let bad = nexusmatch(dir.path(), &["check", "--query", r#"{"i":{"$not":{}}}"#]);
    assert!(!bad.status.success());
    assert!(String::from_utf8_lossy(&bad.stderr).contains("$not"));
}

#[test]
fn count_and_find_over_ndjson() {
    let dir = tempdir().unwrap();
    let data = write_data(dir.path());
    let count = nexusmatch(dir.path(), &["count", "--data", &data, "--query", r#"{"i":{"$not":{"$gte":"b"}}}"#]);
    assert!(count.status.success());
    assert_eq!(stdout(&count), "1");

    let found = nexusmatch(
        dir.path(),
        &["find", "--data", &data, "--query", r#"{"i":{"$exists":true}}"#, "--index", "i", "--limit", "1"],
    );
    assert!(found.status.success());
    let line: serde_json::Value = serde_json::from_str(&stdout(&found)).unwrap();
    assert_eq!(line["i"], "a");
}

#[test]
fn explain_prints_btree_bounds() {
    let dir = tempdir().unwrap();
    let data = write_data(dir.path());
    let out = nexusmatch(
        dir.path(),
        &["explain", "--data", &data, "--index", "i", "--query", r#"{"i":{"$not":{"$ne":"a"}}}"#],
    );
    assert!(out.status.success());
    let exp: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(exp["cursor"], "BtreeCursor i_1");
    assert_eq!(exp["startKey"]["i"], "a");
    assert_eq!(exp["endKey"]["i"], "a");
}

#[test]
fn config_file_limits_apply() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("nexusmatch.toml"), "[query]\nmax_set_size = 1\n").unwrap();
    let out = nexusmatch(dir.path(), &["check", "--query", r#"{"i":{"$in":["a","b"]}}"#]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("exceeds limit"));
}

#[test]
fn env_only_logging_persists_bench_and_metrics() {
    let dir = tempdir().unwrap();
    let data = write_data(dir.path());
    let logs = dir.path().join("logs");
    let out = Command::new(env!("CARGO_BIN_EXE_nexusmatch"))
        .current_dir(dir.path())
        .env_remove("NEXUSMATCH_CONFIG")
        .env("NEXUSMATCH_LOG_DIR", &logs)
        .env("NEXUSMATCH_LOG_LEVEL", "debug")
        .env("NEXUSMATCH_DEV6", "1")
        .args(["count", "--data", &data, "--index", "i", "--query", r#"{"i":"b"}"#])
        .output()
        .expect("failed to spawn nexusmatch");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout(&out), "1");
    let dev6 = fs::read_to_string(logs.join("dev6.log")).unwrap();
    assert!(dev6.contains(r#""op":"count""#), "{dev6}");
    assert!(dev6.contains(r#""used_index":true"#), "{dev6}");
    let metrics = fs::read_to_string(logs.join("metrics.log")).unwrap();
    assert!(metrics.contains("count collection=not2"), "{metrics}");
}
