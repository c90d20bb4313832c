// crates/ea_cli/src/args.rs
//
// Deterministic, offline CLI argument surface.
// - No networked paths (reject any scheme:// like http/https/file)
// - Exactly one of: --manifest  XOR  (--subject + --students + --offerings [+ --preferences | --pending])
// - Full explicit runs need --preferences; --pending forbids it and may take --prior
// - Output: --out dir; --timestamp pins the run record time (RFC 3339)
// - --validate-only loads and checks the snapshot without running the engine

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use camino::Utf8PathBuf;
use clap::Parser;

/// Parsed CLI arguments (raw).
#[derive(Debug, Parser, Clone)]
#[command(
    name = "ea",
    disable_help_subcommand = true,
    about = "Offline, deterministic elective allotment engine"
)]
pub struct Args {
    // --- Mode selection ---
    /// Path to a run manifest JSON (mutually exclusive with explicit snapshot flags).
    #[arg(
        long,
        conflicts_with_all = ["subject", "students", "preferences", "offerings", "params", "prior", "pending"]
    )]
    pub manifest: Option<PathBuf>,

    // --- Explicit mode (when --manifest is not used) ---
    /// Subject identifier the run is for.
    #[arg(long)]
    pub subject: Option<String>,
    /// Students snapshot JSON path.
    #[arg(long)]
    pub students: Option<PathBuf>,
    /// Preference submissions JSON path (full runs only).
    #[arg(long, conflicts_with = "pending")]
    pub preferences: Option<PathBuf>,
    /// Offerings snapshot JSON path.
    #[arg(long)]
    pub offerings: Option<PathBuf>,
    /// AllotmentParams JSON path (defaults apply when omitted).
    #[arg(long)]
    pub params: Option<PathBuf>,
    /// Prior allotments JSON path (pending runs only).
    #[arg(long, requires = "pending")]
    pub prior: Option<PathBuf>,
    /// Fallback-only run over students without a prior allotment.
    #[arg(long)]
    pub pending: bool,

    // --- Output & control ---
    /// Output directory (default: current directory).
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    /// RFC 3339 timestamp recorded in the run record (default: now).
    #[arg(long)]
    pub timestamp: Option<String>,
    /// Validate inputs only (load + schema + snapshot consistency), do not run the engine.
    #[arg(long)]
    pub validate_only: bool,
    /// Suppress the stdout summary and all logs below `error`.
    #[arg(long)]
    pub quiet: bool,
    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive).
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Errors surfaced by argument validation.
/// Keep messages short/stable (handy for scripts/tests).
#[derive(Debug)]
pub enum CliError {
    Missing(&'static str),
    NonLocalPath(String),
    NotFound(String),
    NonUtf8Path(String),
    BadTimestamp(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CliError::*;
        match self {
            Missing(s) => write!(f, "missing required flag: {s}"),
            NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            NotFound(p) => write!(f, "file not found: {p}"),
            NonUtf8Path(p) => write!(f, "path is not valid UTF-8: {p}"),
            BadTimestamp(s) => write!(f, "invalid --timestamp: {s}"),
        }
    }
}
impl std::error::Error for CliError {}

/// Entry point used by main.rs
pub fn parse_and_validate() -> Result<Args, CliError> {
    check(Args::parse())
}

/// Mode checks, existence checks and path normalization.
pub fn check(mut args: Args) -> Result<Args, CliError> {
    for p in iter_all_paths(&args) {
        ensure_local_path(p)?;
    }

    if args.manifest.is_some() {
        let m = args.manifest.as_ref().ok_or(CliError::Missing("--manifest"))?;
        ensure_local_exists(m, "--manifest")?;
        args.manifest = args.manifest.take().map(|p| normalize_path(&p));
    } else {
        validate_explicit_mode(&args)?;
        args.students = args.students.take().map(|p| normalize_path(&p));
        args.preferences = args.preferences.take().map(|p| normalize_path(&p));
        args.offerings = args.offerings.take().map(|p| normalize_path(&p));
        args.params = args.params.take().map(|p| normalize_path(&p));
        args.prior = args.prior.take().map(|p| normalize_path(&p));
    }

    if let Some(ts) = &args.timestamp {
        ea_io::hasher::normalize_timestamp_utc(ts).map_err(|e| CliError::BadTimestamp(e.to_string()))?;
    }

    // Normalize output directory even if it doesn't exist yet
    args.out = normalize_path(&args.out);
    Ok(args)
}

/// Explicit mode: subject, students and offerings always; preferences unless pending.
fn validate_explicit_mode(a: &Args) -> Result<(), CliError> {
    a.subject.as_ref().ok_or(CliError::Missing("--subject or --manifest"))?;
    let students = a.students.as_ref().ok_or(CliError::Missing("--students"))?;
    let offerings = a.offerings.as_ref().ok_or(CliError::Missing("--offerings"))?;

    ensure_local_exists(students, "--students")?;
    ensure_local_exists(offerings, "--offerings")?;
    match (&a.preferences, a.pending) {
        (Some(p), false) => ensure_local_exists(p, "--preferences")?,
        (None, false) => return Err(CliError::Missing("--preferences (or --pending)")),
        _ => {}
    }
    if let Some(p) = &a.params {
        ensure_local_exists(p, "--params")?;
    }
    if let Some(p) = &a.prior {
        ensure_local_exists(p, "--prior")?;
    }
    Ok(())
}

/// Reject any explicit URI scheme (e.g., http://, https://, file://).
#[inline]
fn has_scheme(s: &str) -> bool {
    ea_io::looks_like_url(s) || s.trim().to_ascii_lowercase().starts_with("file:")
}

#[inline]
fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    if let Some(s) = p.to_str() {
        if has_scheme(s) {
            return Err(CliError::NonLocalPath(s.to_string()));
        }
    }
    Ok(())
}

fn iter_all_paths(args: &Args) -> impl Iterator<Item = &Path> {
    [
        args.manifest.as_deref(),
        args.students.as_deref(),
        args.preferences.as_deref(),
        args.offerings.as_deref(),
        args.params.as_deref(),
        args.prior.as_deref(),
        Some(args.out.as_path()),
    ]
    .into_iter()
    .flatten()
}

/// Ensure a path is local (no scheme) and exists as a regular file.
fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    ensure_local_path(p)?;
    let meta = fs::metadata(p).map_err(|_| CliError::NotFound(format!("{label} {}", p.display())))?;
    if !meta.is_file() {
        return Err(CliError::NotFound(format!("{label} {}", p.display())));
    }
    Ok(())
}

/// Best-effort normalization to an absolute path.
/// If canonicalize fails (e.g., path doesn't exist yet), produce an absolute path relative to CWD.
fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}

/// `ea_io` works on UTF-8 paths.
pub fn utf8(p: &Path) -> Result<Utf8PathBuf, CliError> {
    Utf8PathBuf::from_path_buf(p.to_path_buf()).map_err(|p| CliError::NonUtf8Path(p.display().to_string()))
}
