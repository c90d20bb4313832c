// crates/ea_cli/src/main.rs
//
// Exit codes, typed error mapping, logging setup, the validate-only
// short-circuit and the full run path
// (engine meta → load → run → result → run record → artifacts → report).

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    pub const VALIDATION: i32 = 2;
    pub const SELF_VERIFY: i32 = 3;
    pub const IO: i32 = 4;
    pub const RUN: i32 = 5;
}

use std::path::Path;
use std::process::ExitCode;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use args::{parse_and_validate as parse_cli, utf8, Args, CliError};

use ea_core::entities::{Allotment, Offering};
use ea_io::loader::{self, LoadedSnapshot};
use ea_io::manifest::RunMode;
use ea_io::{canonical_json, IoError};
use ea_pipeline::{
    build_result, build_run_record, cumulative_allotments, engine_identifiers, pending_students, run_snapshot, validate, RunError,
    RunOutcome,
};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    /// Arguments, schema, JSON shape, manifest or params failures
    Validation(String),
    /// Declared digest or engine expectation mismatch
    SelfVerify(String),
    /// I/O errors (read/write/path/limits)
    Io(String),
    /// The snapshot is inconsistent; the run was aborted
    Run(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(m) => write!(f, "validation: {m}"),
            MainError::SelfVerify(m) => write!(f, "self-verify: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Run(m) => write!(f, "run: {m}"),
        }
    }
}

impl From<CliError> for MainError {
    fn from(e: CliError) -> Self {
        MainError::Validation(e.to_string())
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("ea: error: {e}");
            return ExitCode::from(exitcodes::VALIDATION as u8);
        }
    };
    init_logging(&args);

    let res = if args.validate_only { validate_only(&args) } else { run_once(&args) };
    let rc = match res {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("ea: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc as u8)
}

/// stderr logging; `--quiet` keeps errors only. `RUST_LOG` wins over `--log-level`.
fn init_logging(args: &Args) {
    let directive = if args.quiet { "error" } else { args.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// Map our typed errors to the exit-code table.
fn map_error(e: &MainError) -> i32 {
    use exitcodes::*;
    match e {
        MainError::Validation(_) => VALIDATION,
        MainError::SelfVerify(_) => SELF_VERIFY,
        MainError::Io(_) => IO,
        MainError::Run(_) => RUN,
    }
}

fn map_io_err(e: IoError) -> MainError {
    match e {
        IoError::Schema { .. } | IoError::Json { .. } | IoError::Manifest(_) | IoError::Invalid(_) => {
            MainError::Validation(e.to_string())
        }
        IoError::DigestMismatch { .. } | IoError::Expectation(..) | IoError::Hash(_) => {
            MainError::SelfVerify(e.to_string())
        }
        IoError::Path(_) => MainError::Io(e.to_string()),
    }
}

fn map_run_err(e: RunError) -> MainError {
    match e {
        RunError::Build(m) => MainError::SelfVerify(m),
        other => MainError::Run(other.to_string()),
    }
}

/* ---------------------------------- Loading ---------------------------------- */

fn load(args: &Args, engine_version: &str) -> Result<LoadedSnapshot, MainError> {
    if let Some(manifest) = &args.manifest {
        return loader::load_from_manifest(&utf8(manifest)?, engine_version).map_err(map_io_err);
    }

    let subject = args.subject.as_deref().ok_or(CliError::Missing("--subject"))?;
    let students = utf8(args.students.as_deref().ok_or(CliError::Missing("--students"))?)?;
    let offerings = utf8(args.offerings.as_deref().ok_or(CliError::Missing("--offerings"))?)?;
    let preferences = args.preferences.as_deref().map(utf8).transpose()?;
    let params = args.params.as_deref().map(utf8).transpose()?;
    let prior = args.prior.as_deref().map(utf8).transpose()?;
    let mode = if args.pending { RunMode::Pending } else { RunMode::Full };

    let resolved = loader::resolve_explicit(
        subject,
        mode,
        &students,
        preferences.as_deref(),
        &offerings,
        params.as_deref(),
        prior.as_deref(),
    )
    .map_err(map_io_err)?;
    loader::load_resolved(&resolved).map_err(map_io_err)
}

/* ------------------------------- Validate-only ------------------------------- */

/// Load + schema + snapshot consistency. No run, no artifacts.
fn validate_only(args: &Args) -> Result<(), MainError> {
    let engine = engine_identifiers();
    let snap = load(args, &engine.version)?;
    let checked = match snap.mode {
        RunMode::Full => validate::validate_full(
            &snap.subject_id,
            &snap.students,
            &snap.submissions,
            &snap.offerings,
            &snap.params,
        ),
        RunMode::Pending => {
            let pending = pending_students(&snap.students, &snap.subject_id, &snap.prior_allotments);
            validate::validate_pending(&snap.subject_id, &pending, &snap.offerings, &snap.params)
        }
    };
    checked.map_err(map_run_err)?;

    if !args.quiet {
        println!("validate-only: inputs OK ({} students, {} offerings)", snap.students.len(), snap.offerings.len());
    }
    Ok(())
}

/* --------------------------------- Full run ---------------------------------- */

#[derive(Serialize)]
struct AllotmentsDoc<'a> {
    allotments: &'a [Allotment],
}

#[derive(Serialize)]
struct OfferingsDoc {
    offerings: Vec<Offering>,
}

fn run_once(args: &Args) -> Result<(), MainError> {
    let engine = engine_identifiers();
    let snap = load(args, &engine.version)?;
    debug!(subject = %snap.subject_id, mode = snap.mode.as_str(), "snapshot loaded");

    let outcome = run_snapshot(&snap).map_err(map_run_err)?;
    let result = build_result(&outcome).map_err(map_run_err)?;

    let timestamp = args
        .timestamp
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    let record = build_run_record(&timestamp, &engine, &snap.digests, &result).map_err(map_run_err)?;

    write_artifacts(&args.out, &snap, &outcome, &result, &record)?;
    info!(result_id = %result.id, run_id = %record.id, out = %args.out.display(), "artifacts written");

    if !args.quiet {
        println!(
            "{} {}: {} by preference, {} by fallback, {} unallottable",
            snap.subject_id,
            outcome.mode.as_str(),
            outcome.count_by_preference(),
            outcome.count_by_fallback(),
            outcome.unallottable.len()
        );
        println!("result {}", result.id);
    }
    Ok(())
}

fn write_artifacts(
    out_dir: &Path,
    snap: &LoadedSnapshot,
    outcome: &RunOutcome,
    result: &ea_pipeline::ResultDoc,
    record: &ea_pipeline::RunRecordDoc,
) -> Result<(), MainError> {
    std::fs::create_dir_all(out_dir).map_err(|e| MainError::Io(format!("mkdir {}: {e}", out_dir.display())))?;

    write(out_dir, "result.json", result)?;
    write(out_dir, "run_record.json", record)?;
    // Prior plus new allotments, so a later pending run can chain on it.
    let allotments = cumulative_allotments(&snap.subject_id, &snap.prior_allotments, &outcome.allotments);
    write(out_dir, "allotments.json", &AllotmentsDoc { allotments: &allotments })?;
    // Offerings with this run's seats taken; seeds the next run.
    write(
        out_dir,
        "offerings_after.json",
        &OfferingsDoc { offerings: outcome.updated_offerings(&snap.offerings) },
    )?;

    render_json_report(out_dir, result, record)
}

fn write<T: Serialize>(out_dir: &Path, name: &str, value: &T) -> Result<(), MainError> {
    canonical_json::write_canonical_file(&out_dir.join(name), value)
        .map_err(|e| MainError::Io(format!("write {name}: {e}")))
}

#[cfg(feature = "report-json")]
fn render_json_report(
    out_dir: &Path,
    result: &ea_pipeline::ResultDoc,
    record: &ea_pipeline::RunRecordDoc,
) -> Result<(), MainError> {
    let result_val = serde_json::to_value(result).map_err(|e| MainError::Io(format!("result to JSON: {e}")))?;
    let run_val = serde_json::to_value(record).map_err(|e| MainError::Io(format!("run_record to JSON: {e}")))?;
    let model = ea_report::build_report_model(&result_val, Some(&run_val));
    write(out_dir, "report.json", &ea_report::render_report_json(&model))
}

#[cfg(not(feature = "report-json"))]
fn render_json_report(
    _out_dir: &Path,
    _result: &ea_pipeline::ResultDoc,
    _record: &ea_pipeline::RunRecordDoc,
) -> Result<(), MainError> {
    Ok(())
}
