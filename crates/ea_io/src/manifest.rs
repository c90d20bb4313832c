// crates/ea_io/src/manifest.rs
//
// Run manifest: which snapshot files make up one run, plus optional digests
// and engine expectations.
//
// • Inputs are paths only, resolved relative to the manifest's directory.
// • Offline-only: any path with a scheme is rejected.
// • `full` runs need preferences; `pending` runs take prior allotments instead.
// • Digests (if provided) must be 64-lower-hex, only for present inputs, and
//   are verified over canonical JSON bytes of each file.

use std::fs;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ea_core::ids::SubjectId;

use crate::hasher::{is_lower_hex_64, sha256_canonical};
use crate::schema::{self, SchemaKind};
use crate::{looks_like_url, IoError};

const MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Preference resolution followed by fallback.
    #[default]
    Full,
    /// Fallback only, over students without a prior allotment.
    Pending,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Pending => "pending",
        }
    }
}

/// External manifest as written by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunManifest {
    pub subject_id: String,
    #[serde(default)]
    pub mode: RunMode,
    pub students_path: String,
    #[serde(default)]
    pub preferences_path: Option<String>,
    pub offerings_path: String,
    #[serde(default)]
    pub params_path: Option<String>,
    #[serde(default)]
    pub prior_allotments_path: Option<String>,
    #[serde(default)]
    pub inputs_sha256: Option<InputDigests>,
    #[serde(default)]
    pub expect: Option<Expectations>,
}

/// Expected sha256 (canonical JSON) per input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDigests {
    #[serde(default)]
    pub students: Option<String>,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub offerings: Option<String>,
    #[serde(default)]
    pub params: Option<String>,
    #[serde(default)]
    pub prior_allotments: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectations {
    /// Exact engine version this manifest was prepared for.
    #[serde(default)]
    pub engine_version: Option<String>,
}

/// Manifest with paths resolved and checked to be existing files.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub subject_id: SubjectId,
    pub mode: RunMode,
    pub students_path: Utf8PathBuf,
    pub preferences_path: Option<Utf8PathBuf>,
    pub offerings_path: Utf8PathBuf,
    pub params_path: Option<Utf8PathBuf>,
    pub prior_allotments_path: Option<Utf8PathBuf>,
    pub digests: Option<InputDigests>,
    pub expect: Option<Expectations>,
}

// ---------- validation (shape, offline, mode, digests) ----------

/// Validate manifest shape and offline policy. No filesystem access.
pub fn validate_manifest(man: &RunManifest) -> Result<(), IoError> {
    man.subject_id
        .parse::<SubjectId>()
        .map_err(|e| IoError::Manifest(format!("subject_id {:?}: {e}", man.subject_id)))?;

    check_path("students_path", Some(&man.students_path))?;
    check_path("offerings_path", Some(&man.offerings_path))?;
    check_path("preferences_path", man.preferences_path.as_ref())?;
    check_path("params_path", man.params_path.as_ref())?;
    check_path("prior_allotments_path", man.prior_allotments_path.as_ref())?;

    match man.mode {
        RunMode::Full => {
            if man.preferences_path.is_none() {
                return Err(IoError::Manifest("full mode requires preferences_path".into()));
            }
            if man.prior_allotments_path.is_some() {
                return Err(IoError::Manifest(
                    "prior_allotments_path is only valid in pending mode".into(),
                ));
            }
        }
        RunMode::Pending => {
            if man.preferences_path.is_some() {
                return Err(IoError::Manifest(
                    "preferences_path is not used in pending mode".into(),
                ));
            }
        }
    }

    if let Some(d) = &man.inputs_sha256 {
        check_digest("students", d.students.as_ref(), true)?;
        check_digest("offerings", d.offerings.as_ref(), true)?;
        check_digest("preferences", d.preferences.as_ref(), man.preferences_path.is_some())?;
        check_digest("params", d.params.as_ref(), man.params_path.is_some())?;
        check_digest(
            "prior_allotments",
            d.prior_allotments.as_ref(),
            man.prior_allotments_path.is_some(),
        )?;
    }

    Ok(())
}

fn check_path(label: &'static str, path: Option<&String>) -> Result<(), IoError> {
    let Some(p) = path else { return Ok(()) };
    if p.trim().is_empty() {
        return Err(IoError::Manifest(format!("{label} must not be empty")));
    }
    if looks_like_url(p) {
        return Err(IoError::Manifest(format!("{label} must be a local path (no URLs): {p}")));
    }
    Ok(())
}

fn check_digest(label: &'static str, hex: Option<&String>, input_present: bool) -> Result<(), IoError> {
    let Some(h) = hex else { return Ok(()) };
    if !input_present {
        return Err(IoError::Manifest(format!("digest supplied for missing input: {label}")));
    }
    if !is_lower_hex_64(h) {
        return Err(IoError::Manifest(format!("invalid sha256 for {label}: {h}")));
    }
    Ok(())
}

// ---------- resolution ----------

/// Resolve paths under `base_dir` and check that each input is an existing file.
pub fn resolve_paths(base_dir: &Utf8Path, man: &RunManifest) -> Result<ResolvedManifest, IoError> {
    let subject_id = man
        .subject_id
        .parse::<SubjectId>()
        .map_err(|e| IoError::Manifest(format!("subject_id {:?}: {e}", man.subject_id)))?;

    let students_path = join_under(base_dir, &man.students_path);
    let offerings_path = join_under(base_dir, &man.offerings_path);
    let preferences_path = man.preferences_path.as_deref().map(|s| join_under(base_dir, s));
    let params_path = man.params_path.as_deref().map(|s| join_under(base_dir, s));
    let prior_allotments_path = man.prior_allotments_path.as_deref().map(|s| join_under(base_dir, s));

    must_exist_file("students_path", &students_path)?;
    must_exist_file("offerings_path", &offerings_path)?;
    for (label, p) in [
        ("preferences_path", &preferences_path),
        ("params_path", &params_path),
        ("prior_allotments_path", &prior_allotments_path),
    ] {
        if let Some(p) = p {
            must_exist_file(label, p)?;
        }
    }

    Ok(ResolvedManifest {
        subject_id,
        mode: man.mode,
        students_path,
        preferences_path,
        offerings_path,
        params_path,
        prior_allotments_path,
        digests: man.inputs_sha256.clone(),
        expect: man.expect.clone(),
    })
}

fn join_under(base: &Utf8Path, rel: &str) -> Utf8PathBuf {
    let p = Utf8Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn must_exist_file(label: &'static str, p: &Utf8Path) -> Result<(), IoError> {
    let md = fs::metadata(p).map_err(|e| IoError::Path(format!("{label}: cannot access {p} ({e})")))?;
    if !md.is_file() {
        return Err(IoError::Path(format!("{label}: not a file: {p}")));
    }
    Ok(())
}

// ---------- load ----------

/// Read, schema-check, parse and validate a manifest file (paths not yet resolved).
pub fn load_manifest(path: &Utf8Path) -> Result<RunManifest, IoError> {
    let f = fs::File::open(path).map_err(|e| IoError::Path(format!("{path}: {e}")))?;
    let mut buf = Vec::new();
    f.take(MAX_MANIFEST_BYTES + 1).read_to_end(&mut buf)?;
    if buf.len() as u64 > MAX_MANIFEST_BYTES {
        return Err(IoError::Manifest(format!("{path} exceeds {MAX_MANIFEST_BYTES} bytes")));
    }

    let raw: Value = serde_json::from_slice(&buf)?;
    schema::validate_value(SchemaKind::Manifest, &raw)?;
    let man: RunManifest = serde_json::from_value(raw)?;
    validate_manifest(&man)?;
    Ok(man)
}

/// Load a manifest and resolve it under its own directory.
pub fn load_and_resolve(path: &Utf8Path) -> Result<ResolvedManifest, IoError> {
    let man = load_manifest(path)?;
    let base = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    resolve_paths(&base, &man)
}

// ---------- digests & expectations ----------

/// Canonical-JSON sha256 of a JSON file.
pub fn canonical_file_digest(path: &Utf8Path) -> Result<String, IoError> {
    let bytes = fs::read(path).map_err(|e| IoError::Path(format!("{path}: {e}")))?;
    let v: Value = serde_json::from_slice(&bytes)?;
    sha256_canonical(&v)
}

/// Verify every declared digest. No digests declared is a pass.
pub fn verify_digests(resolved: &ResolvedManifest) -> Result<(), IoError> {
    let Some(d) = &resolved.digests else { return Ok(()) };

    let pairs: [(&'static str, Option<&Utf8PathBuf>, Option<&String>); 5] = [
        ("students", Some(&resolved.students_path), d.students.as_ref()),
        ("preferences", resolved.preferences_path.as_ref(), d.preferences.as_ref()),
        ("offerings", Some(&resolved.offerings_path), d.offerings.as_ref()),
        ("params", resolved.params_path.as_ref(), d.params.as_ref()),
        ("prior_allotments", resolved.prior_allotments_path.as_ref(), d.prior_allotments.as_ref()),
    ];

    for (label, path, expected) in pairs {
        match (path, expected) {
            (Some(p), Some(want)) => {
                let got = canonical_file_digest(p)?;
                if &got != want {
                    return Err(IoError::DigestMismatch {
                        label,
                        expected: want.clone(),
                        got,
                    });
                }
            }
            (None, Some(_)) => {
                return Err(IoError::Manifest(format!("digest supplied for missing input: {label}")))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Enforce `expect.engine_version` if present.
pub fn enforce_expectations(resolved: &ResolvedManifest, engine_version: &str) -> Result<(), IoError> {
    let Some(exp) = &resolved.expect else { return Ok(()) };
    if let Some(want) = &exp.engine_version {
        if want != engine_version {
            return Err(IoError::Expectation(
                "engine_version",
                format!("expected={want} got={engine_version}"),
            ));
        }
    }
    Ok(())
}
