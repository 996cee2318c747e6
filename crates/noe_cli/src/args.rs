// crates/noe_cli/src/args.rs
//
// Offline CLI argument surface for `noe`.
//
// - No networked paths (any scheme:// like http/https/file is refused)
// - Exactly one of: --manifest  XOR  (--candidates + --policy [+ --previous])
// - Output: --out dir, --render json|text
// - --timestamp pins the run record time (RFC3339 UTC) for reproducible runs
// - --validate-only loads and checks inputs without merging

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use noe_io::hasher::normalize_utc_seconds;
use noe_io::looks_like_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    Json,
    Text,
}

/// Parsed CLI arguments (raw).
#[derive(Debug, Parser, Clone)]
#[command(
    name = "noe",
    disable_help_subcommand = true,
    about = "Offline, deterministic nomination order engine"
)]
pub struct Args {
    // --- Mode selection ---
    /// Manifest JSON naming the inputs (mutually exclusive with explicit file flags).
    #[arg(long, conflicts_with_all = ["candidates", "policy", "previous"])]
    pub manifest: Option<PathBuf>,

    // --- Explicit mode ---
    /// Candidate snapshot JSON path.
    #[arg(long)]
    pub candidates: Option<PathBuf>,
    /// Reservation policy JSON path.
    #[arg(long)]
    pub policy: Option<PathBuf>,
    /// Previously published nomination order; enables the diff.
    #[arg(long)]
    pub previous: Option<PathBuf>,

    /// Requested seat count (overrides the policy file).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub seats: Option<u32>,

    // --- Output & rendering ---
    /// Output directory (default: current directory).
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    /// Report to emit next to the artifacts. Omit to skip rendering.
    #[arg(long, value_enum)]
    pub render: Option<RenderFormat>,

    /// Run record timestamp (RFC3339 UTC). Defaults to the current time.
    #[arg(long, value_parser = parse_timestamp)]
    pub timestamp: Option<String>,

    /// Load and check inputs only, do not merge.
    #[arg(long)]
    pub validate_only: bool,

    /// Only warnings and errors on stderr.
    #[arg(long)]
    pub quiet: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Errors surfaced by argument validation.
/// Keep messages short/stable (handy for scripts/tests).
#[derive(Debug)]
pub enum CliError {
    Missing(&'static str),
    NonLocalPath(String),
    NotFound(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CliError::*;
        match self {
            Missing(s) => write!(f, "missing required flag: {s}"),
            NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            NotFound(p) => write!(f, "file not found: {p}"),
        }
    }
}
impl std::error::Error for CliError {}

/// `--timestamp` parser: any RFC3339 UTC instant, stored at whole seconds.
pub fn parse_timestamp(s: &str) -> Result<String, String> {
    normalize_utc_seconds(s.trim()).map_err(|e| e.to_string())
}

/// Entry point used by main.rs
pub fn parse_and_validate() -> Result<Args, CliError> {
    validate(Args::parse())
}

/// Scheme checks, mode checks, existence checks, then path normalization.
pub fn validate(mut args: Args) -> Result<Args, CliError> {
    for p in iter_all_paths(&args) {
        ensure_local_path(p)?;
    }

    if let Some(m) = args.manifest.take() {
        ensure_local_exists(&m, "--manifest")?;
        args.manifest = Some(normalize_path(&m));
    } else {
        let cands = args.candidates.as_ref().ok_or(CliError::Missing("--candidates"))?;
        let policy = args.policy.as_ref().ok_or(CliError::Missing("--policy"))?;
        ensure_local_exists(cands, "--candidates")?;
        ensure_local_exists(policy, "--policy")?;
        if let Some(prev) = &args.previous {
            ensure_local_exists(prev, "--previous")?;
        }
        args.candidates = args.candidates.take().map(|p| normalize_path(&p));
        args.policy = args.policy.take().map(|p| normalize_path(&p));
        args.previous = args.previous.take().map(|p| normalize_path(&p));
    }

    // Normalize output directory even if it doesn't exist yet
    args.out = normalize_path(&args.out);
    Ok(args)
}

fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    if let Some(s) = p.to_str() {
        if looks_like_url(s) || s.trim().to_ascii_lowercase().starts_with("file:") {
            return Err(CliError::NonLocalPath(s.to_string()));
        }
    }
    Ok(())
}

fn iter_all_paths(args: &Args) -> impl Iterator<Item = &Path> {
    [
        args.manifest.as_deref(),
        args.candidates.as_deref(),
        args.policy.as_deref(),
        args.previous.as_deref(),
        Some(args.out.as_path()),
    ]
    .into_iter()
    .flatten()
}

/// Local, existing, regular file.
fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    ensure_local_path(p)?;
    let meta = fs::metadata(p).map_err(|_| CliError::NotFound(format!("{label} {}", p.display())))?;
    if !meta.is_file() {
        return Err(CliError::NotFound(format!("{label} {}", p.display())));
    }
    Ok(())
}

/// Best-effort absolute path; falls back to CWD-joining when the path does not exist yet.
fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}
