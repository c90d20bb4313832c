//! Loader: read local snapshot files (students, preferences, offerings,
//! params, prior allotments), check each against its embedded schema, and
//! return typed values plus canonical digests. No network I/O, no semantic
//! checks beyond shape; the pipeline owns consistency rules.

use std::fs::File;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ea_core::entities::{Allotment, Offering, PreferenceSubmission, Student};
use ea_core::ids::SubjectId;
use ea_core::variables::AllotmentParams;

use crate::hasher::sha256_canonical;
use crate::manifest::{self, ResolvedManifest, RunMode};
use crate::schema::{self, SchemaKind};
use crate::IoError;

/// Per-file cap; snapshots for one subject stay far below this.
const MAX_SNAPSHOT_BYTES: u64 = 64 * 1024 * 1024;

// ----------------------------- Wire wrappers -----------------------------

#[derive(Debug, Deserialize)]
struct StudentsDoc {
    #[allow(dead_code)]
    #[serde(default)]
    schema_version: Option<String>,
    students: Vec<Student>,
}

#[derive(Debug, Deserialize)]
struct PreferencesDoc {
    #[allow(dead_code)]
    #[serde(default)]
    schema_version: Option<String>,
    submissions: Vec<PreferenceSubmission>,
}

#[derive(Debug, Deserialize)]
struct OfferingsDoc {
    #[allow(dead_code)]
    #[serde(default)]
    schema_version: Option<String>,
    offerings: Vec<Offering>,
}

#[derive(Debug, Deserialize)]
struct AllotmentsDoc {
    #[allow(dead_code)]
    #[serde(default)]
    schema_version: Option<String>,
    allotments: Vec<Allotment>,
}

// ----------------------------- Loaded context -----------------------------

/// sha256 (canonical JSON) of each input actually used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDigests {
    pub students_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences_sha256: Option<String>,
    pub offerings_sha256: String,
    /// Digest of the effective params (defaults included when no file was given).
    pub params_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_allotments_sha256: Option<String>,
}

/// Everything one run needs, in input order (the pipeline canonicalizes).
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub subject_id: SubjectId,
    pub mode: RunMode,
    pub students: Vec<Student>,
    pub submissions: Vec<PreferenceSubmission>,
    pub offerings: Vec<Offering>,
    pub params: AllotmentParams,
    pub prior_allotments: Vec<Allotment>,
    pub digests: SnapshotDigests,
}

// ----------------------------- Orchestration -----------------------------

/// Manifest → resolve → verify digests → enforce expectations → load.
pub fn load_from_manifest(path: &Utf8Path, engine_version: &str) -> Result<LoadedSnapshot, IoError> {
    let resolved = manifest::load_and_resolve(path)?;
    manifest::verify_digests(&resolved)?;
    manifest::enforce_expectations(&resolved, engine_version)?;
    load_resolved(&resolved)
}

/// Load every input named by an already-resolved manifest.
pub fn load_resolved(r: &ResolvedManifest) -> Result<LoadedSnapshot, IoError> {
    let (students, students_sha256) = load_students(&r.students_path)?;
    let (offerings, offerings_sha256) = load_offerings(&r.offerings_path)?;

    let (submissions, preferences_sha256) = match (&r.mode, &r.preferences_path) {
        (RunMode::Full, Some(p)) => {
            let (subs, h) = load_preferences(p)?;
            (subs, Some(h))
        }
        (RunMode::Full, None) => {
            return Err(IoError::Manifest("full mode requires preferences_path".into()))
        }
        (RunMode::Pending, _) => (Vec::new(), None),
    };

    let (prior_allotments, prior_allotments_sha256) = match &r.prior_allotments_path {
        Some(p) => {
            let (a, h) = load_prior_allotments(p)?;
            (a, Some(h))
        }
        None => (Vec::new(), None),
    };

    let params = match &r.params_path {
        Some(p) => load_params(p)?.0,
        None => AllotmentParams::default(),
    };
    let params_sha256 = sha256_canonical(&params)?;

    Ok(LoadedSnapshot {
        subject_id: r.subject_id.clone(),
        mode: r.mode,
        students,
        submissions,
        offerings,
        params,
        prior_allotments,
        digests: SnapshotDigests {
            students_sha256,
            preferences_sha256,
            offerings_sha256,
            params_sha256,
            prior_allotments_sha256,
        },
    })
}

// ----------------------------- Targeted loaders -----------------------------
// Each returns the typed value and the canonical sha256 of the file.

pub fn load_students(path: &Utf8Path) -> Result<(Vec<Student>, String), IoError> {
    let (doc, h): (StudentsDoc, _) = load_doc(path, SchemaKind::Students)?;
    Ok((doc.students, h))
}

pub fn load_preferences(path: &Utf8Path) -> Result<(Vec<PreferenceSubmission>, String), IoError> {
    let (doc, h): (PreferencesDoc, _) = load_doc(path, SchemaKind::Preferences)?;
    Ok((doc.submissions, h))
}

pub fn load_offerings(path: &Utf8Path) -> Result<(Vec<Offering>, String), IoError> {
    let (doc, h): (OfferingsDoc, _) = load_doc(path, SchemaKind::Offerings)?;
    Ok((doc.offerings, h))
}

pub fn load_params(path: &Utf8Path) -> Result<(AllotmentParams, String), IoError> {
    load_doc(path, SchemaKind::Params)
}

pub fn load_prior_allotments(path: &Utf8Path) -> Result<(Vec<Allotment>, String), IoError> {
    let (doc, h): (AllotmentsDoc, _) = load_doc(path, SchemaKind::PriorAllotments)?;
    Ok((doc.allotments, h))
}

fn load_doc<T: DeserializeOwned>(path: &Utf8Path, kind: SchemaKind) -> Result<(T, String), IoError> {
    let v = read_json_value(path)?;
    schema::validate_value(kind, &v)?;
    let digest = sha256_canonical(&v)?;
    let typed = serde_json::from_value(v).map_err(|e| IoError::Json {
        pointer: "/".into(),
        msg: format!("{path}: {e}"),
    })?;
    Ok((typed, digest))
}

/// Read a JSON file with a size cap.
pub fn read_json_value(path: &Utf8Path) -> Result<Value, IoError> {
    let f = File::open(path).map_err(|e| IoError::Path(format!("{path}: {e}")))?;
    let mut buf = Vec::new();
    f.take(MAX_SNAPSHOT_BYTES + 1).read_to_end(&mut buf)?;
    if buf.len() as u64 > MAX_SNAPSHOT_BYTES {
        return Err(IoError::Invalid(format!("{path} exceeds {MAX_SNAPSHOT_BYTES} bytes")));
    }
    serde_json::from_slice(&buf).map_err(|e| IoError::Json {
        pointer: "/".into(),
        msg: format!("{path}: {e}"),
    })
}

/// Build a `ResolvedManifest` from explicit paths (CLI without a manifest file).
#[allow(clippy::too_many_arguments)]
pub fn resolve_explicit(
    subject_id: &str,
    mode: RunMode,
    students: &Utf8Path,
    preferences: Option<&Utf8Path>,
    offerings: &Utf8Path,
    params: Option<&Utf8Path>,
    prior_allotments: Option<&Utf8Path>,
) -> Result<ResolvedManifest, IoError> {
    let man = manifest::RunManifest {
        subject_id: subject_id.to_string(),
        mode,
        students_path: students.to_string(),
        preferences_path: preferences.map(|p| p.to_string()),
        offerings_path: offerings.to_string(),
        params_path: params.map(|p| p.to_string()),
        prior_allotments_path: prior_allotments.map(|p| p.to_string()),
        inputs_sha256: None,
        expect: None,
    };
    manifest::validate_manifest(&man)?;
    manifest::resolve_paths(&Utf8PathBuf::from("."), &man)
}
