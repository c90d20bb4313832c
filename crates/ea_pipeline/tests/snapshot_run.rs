//! Manifest → load → run → artifacts, over files on disk.

use std::fs;

use assert_json_diff::assert_json_include;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{json, Value};

use ea_io::loader::load_from_manifest;
use ea_pipeline::{build_result, build_run_record, engine_identifiers, run_snapshot};

fn write(dir: &Utf8Path, name: &str, v: &Value) {
    fs::write(dir.join(name), serde_json::to_vec_pretty(v).unwrap()).unwrap();
}

fn fixture() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    write(&root, "students.json", &json!({"students": [
        {"id":"s1002","name":"Bo","registration_number":"1002"},
        {"id":"s1001","name":"Asha","registration_number":"1001"}
    ]}));
    write(&root, "preferences.json", &json!({"submissions": [
        {"student_id":"s1001","subject_id":"OE-1","choices":[
            {"rank":1,"offering":{"kind":"course","id":"A"}},
            {"rank":2,"offering":{"kind":"course","id":"B"}}
        ]},
        {"student_id":"s1002","subject_id":"OE-1","choices":[
            {"rank":1,"offering":{"kind":"course","id":"A"}}
        ]}
    ]}));
    write(&root, "offerings.json", &json!({"offerings": [
        {"kind":"course","id":"A","subject_id":"OE-1","code":"A100","name":"A","total_seats":1,"available_seats":1},
        {"kind":"course","id":"B","subject_id":"OE-1","code":"B100","name":"B","total_seats":1,"available_seats":1}
    ]}));
    write(&root, "manifest.json", &json!({
        "subject_id": "OE-1",
        "students_path": "students.json",
        "preferences_path": "preferences.json",
        "offerings_path": "offerings.json"
    }));
    (dir, root)
}

#[test]
fn full_run_from_manifest_produces_expected_artifacts() {
    let (_guard, root) = fixture();
    let engine = engine_identifiers();
    let snap = load_from_manifest(&root.join("manifest.json"), &engine.version).unwrap();

    let outcome = run_snapshot(&snap).unwrap();
    let result = build_result(&outcome).unwrap();
    let record = build_run_record("2026-01-15T09:30:00Z", &engine, &snap.digests, &result).unwrap();

    let result_json = serde_json::to_value(&result).unwrap();
    assert_json_include!(
        actual: result_json,
        expected: json!({
            "subject_id": "OE-1",
            "mode": "full",
            "allotments": [
                {"student_id":"s1001","subject_id":"OE-1","offering":{"kind":"course","id":"A"},"rank":1},
                {"student_id":"s1002","subject_id":"OE-1","offering":{"kind":"course","id":"B"},"rank":null}
            ],
            "unallottable": [],
            "summary": {"students": 2, "by_preference": 1, "by_fallback": 1, "unallottable": 0}
        })
    );

    let record_json = serde_json::to_value(&record).unwrap();
    assert_json_include!(
        actual: record_json,
        expected: json!({
            "timestamp_utc": "2026-01-15T09:30:00Z",
            "mode": "full",
            "outputs": {"result_id": result.id, "allotted": 2, "unallottable": 0}
        })
    );
    assert_eq!(record_json["inputs"]["students_sha256"], json!(snap.digests.students_sha256));
}

#[test]
fn pending_manifest_skips_already_allotted_students() {
    let (_guard, root) = fixture();
    write(&root, "prior.json", &json!({"allotments": [
        {"student_id":"s1001","subject_id":"OE-1","offering":{"kind":"course","id":"A"},"rank":1}
    ]}));
    write(&root, "offerings.json", &json!({"offerings": [
        {"kind":"course","id":"A","subject_id":"OE-1","code":"A100","name":"A","total_seats":1,"available_seats":0},
        {"kind":"course","id":"B","subject_id":"OE-1","code":"B100","name":"B","total_seats":1,"available_seats":1}
    ]}));
    write(&root, "pending.json", &json!({
        "subject_id": "OE-1",
        "mode": "pending",
        "students_path": "students.json",
        "offerings_path": "offerings.json",
        "prior_allotments_path": "prior.json"
    }));

    let snap = load_from_manifest(&root.join("pending.json"), &engine_identifiers().version).unwrap();
    let outcome = run_snapshot(&snap).unwrap();

    assert_eq!(outcome.outcomes.len(), 1);
    assert_eq!(outcome.allotments.len(), 1);
    assert_eq!(outcome.allotments[0].student_id.as_str(), "s1002");
    assert_eq!(outcome.allotments[0].offering.id_str(), "B");
}

#[test]
fn result_id_ignores_file_formatting_and_order() {
    let (_guard, root) = fixture();
    let version = engine_identifiers().version;
    let first = {
        let snap = load_from_manifest(&root.join("manifest.json"), &version).unwrap();
        build_result(&run_snapshot(&snap).unwrap()).unwrap().id
    };

    write(&root, "students.json", &json!({"students": [
        {"id":"s1001","name":"Asha","registration_number":"1001"},
        {"id":"s1002","name":"Bo","registration_number":"1002"}
    ]}));
    let second = {
        let snap = load_from_manifest(&root.join("manifest.json"), &version).unwrap();
        build_result(&run_snapshot(&snap).unwrap()).unwrap().id
    };

    assert_eq!(first, second);
}
