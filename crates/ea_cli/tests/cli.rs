//! Binary-level tests: exit codes and written artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

fn write(dir: &Path, name: &str, v: &Value) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, serde_json::to_vec_pretty(v).unwrap()).unwrap();
    p
}

fn read(dir: &Path, name: &str) -> Value {
    serde_json::from_slice(&fs::read(dir.join(name)).unwrap()).unwrap()
}

fn fixture(dir: &Path) {
    write(dir, "students.json", &json!({"students": [
        {"id":"s1001","name":"Asha","registration_number":"1001"},
        {"id":"s1002","name":"Bo","registration_number":"1002"},
        {"id":"s1003","name":"Chen","registration_number":"1003"}
    ]}));
    write(dir, "preferences.json", &json!({"submissions": [
        {"student_id":"s1001","subject_id":"OE-1","choices":[
            {"rank":1,"offering":{"kind":"course","id":"A"}},
            {"rank":2,"offering":{"kind":"course","id":"B"}}
        ]},
        {"student_id":"s1002","subject_id":"OE-1","choices":[
            {"rank":1,"offering":{"kind":"course","id":"A"}}
        ]}
    ]}));
    write(dir, "offerings.json", &json!({"offerings": [
        {"kind":"course","id":"A","subject_id":"OE-1","code":"A100","name":"A","total_seats":1,"available_seats":1},
        {"kind":"course","id":"B","subject_id":"OE-1","code":"B100","name":"B","total_seats":1,"available_seats":1}
    ]}));
    write(dir, "manifest.json", &json!({
        "subject_id": "OE-1",
        "students_path": "students.json",
        "preferences_path": "preferences.json",
        "offerings_path": "offerings.json"
    }));
}

fn ea() -> Command {
    let mut cmd = Command::cargo_bin("ea").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn manifest_run_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let out = dir.path().join("out");

    ea().arg("--manifest")
        .arg(dir.path().join("manifest.json"))
        .arg("--out")
        .arg(&out)
        .args(["--timestamp", "2026-01-15T09:30:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 by preference, 1 by fallback, 1 unallottable"))
        .stdout(predicate::str::contains("result ALT:"));

    for name in ["result.json", "run_record.json", "allotments.json", "offerings_after.json", "report.json"] {
        assert!(out.join(name).is_file(), "missing {name}");
    }

    let allotments = read(&out, "allotments.json");
    assert_eq!(allotments["allotments"].as_array().unwrap().len(), 2);
    let after = read(&out, "offerings_after.json");
    assert!(after["offerings"].as_array().unwrap().iter().all(|o| o["available_seats"] == 0));

    let record = read(&out, "run_record.json");
    assert_eq!(record["timestamp_utc"], "2026-01-15T09:30:00Z");
    assert_eq!(record["outputs"]["result_id"], read(&out, "result.json")["id"]);
}

#[test]
fn result_is_byte_identical_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let (a, b) = (dir.path().join("a"), dir.path().join("b"));
    for out in [&a, &b] {
        ea().arg("--manifest")
            .arg(dir.path().join("manifest.json"))
            .arg("--out")
            .arg(out)
            .arg("--quiet")
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }
    assert_eq!(fs::read(a.join("result.json")).unwrap(), fs::read(b.join("result.json")).unwrap());
}

#[test]
fn explicit_pending_run_chains_on_prior_allotments() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let first = dir.path().join("first");
    ea().arg("--manifest")
        .arg(dir.path().join("manifest.json"))
        .arg("--out")
        .arg(&first)
        .arg("--quiet")
        .assert()
        .success();

    let second = dir.path().join("second");
    ea().args(["--subject", "OE-1", "--pending"])
        .arg("--students")
        .arg(dir.path().join("students.json"))
        .arg("--offerings")
        .arg(first.join("offerings_after.json"))
        .arg("--prior")
        .arg(first.join("allotments.json"))
        .arg("--out")
        .arg(&second)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 by fallback, 1 unallottable"));

    let result = read(&second, "result.json");
    assert_eq!(result["mode"], "pending");
    assert_eq!(result["unallottable"], json!(["s1003"]));
}

#[test]
fn chained_pending_runs_allot_each_student_once() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let d = dir.path();
    let first_students = write(d, "first_students.json", &json!({"students": [
        {"id":"s1001","name":"Asha","registration_number":"1001"}
    ]}));
    let first_prefs = write(d, "first_preferences.json", &json!({"submissions": [
        {"student_id":"s1001","subject_id":"OE-1","choices":[{"rank":1,"offering":{"kind":"course","id":"A"}}]}
    ]}));
    let roomy = write(d, "roomy.json", &json!({"offerings": [
        {"kind":"course","id":"A","subject_id":"OE-1","code":"A100","name":"A","total_seats":3,"available_seats":3},
        {"kind":"course","id":"B","subject_id":"OE-1","code":"B100","name":"B","total_seats":3,"available_seats":3}
    ]}));

    let o1 = d.join("o1");
    ea().args(["--subject", "OE-1"])
        .arg("--students")
        .arg(&first_students)
        .arg("--preferences")
        .arg(&first_prefs)
        .arg("--offerings")
        .arg(&roomy)
        .arg("--out")
        .arg(&o1)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 by preference, 0 by fallback"));

    let pending = |prev: &Path, out: &Path| {
        ea().args(["--subject", "OE-1", "--pending"])
            .arg("--students")
            .arg(d.join("students.json"))
            .arg("--offerings")
            .arg(prev.join("offerings_after.json"))
            .arg("--prior")
            .arg(prev.join("allotments.json"))
            .arg("--out")
            .arg(out)
            .assert()
    };

    let o2 = d.join("o2");
    pending(&o1, &o2)
        .success()
        .stdout(predicate::str::contains("2 by fallback, 0 unallottable"));
    let held = read(&o2, "allotments.json");
    assert_eq!(held["allotments"].as_array().unwrap().len(), 3);

    let o3 = d.join("o3");
    pending(&o2, &o3)
        .success()
        .stdout(predicate::str::contains("0 by fallback, 0 unallottable"));
    assert_eq!(read(&o3, "result.json")["allotments"], json!([]));

    let held = read(&o3, "allotments.json");
    let mut ids: Vec<&str> = held["allotments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["student_id"].as_str().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, ["s1001", "s1002", "s1003"]);
}

#[test]
fn validate_only_accepts_good_inputs() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    ea().arg("--manifest")
        .arg(dir.path().join("manifest.json"))
        .arg("--validate-only")
        .arg("--out")
        .arg(dir.path().join("never"))
        .assert()
        .success()
        .stdout(predicate::str::contains("inputs OK"));
    assert!(!dir.path().join("never").exists());
}

#[test]
fn schema_violation_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(dir.path(), "offerings.json", &json!({"offerings": [{"kind":"course","id":"A"}]}));
    ea().arg("--manifest")
        .arg(dir.path().join("manifest.json"))
        .arg("--validate-only")
        .assert()
        .code(2);
}

#[test]
fn digest_mismatch_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(dir.path(), "manifest.json", &json!({
        "subject_id": "OE-1",
        "students_path": "students.json",
        "preferences_path": "preferences.json",
        "offerings_path": "offerings.json",
        "inputs_sha256": {"offerings": "f".repeat(64)}
    }));
    ea().arg("--manifest")
        .arg(dir.path().join("manifest.json"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("offerings"));
}

#[test]
fn inconsistent_snapshot_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(dir.path(), "preferences.json", &json!({"submissions": [
        {"student_id":"s1001","subject_id":"OE-1","choices":[{"rank":1,"offering":{"kind":"course","id":"GONE"}}]}
    ]}));
    ea().arg("--manifest")
        .arg(dir.path().join("manifest.json"))
        .arg("--out")
        .arg(dir.path().join("out"))
        .assert()
        .code(5)
        .stderr(predicate::str::contains("GONE"));
}

#[test]
fn missing_flags_exit_2() {
    ea().args(["--subject", "OE-1"]).assert().code(2);
}
