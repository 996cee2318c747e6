// crates/noe_cli/src/main.rs
//
// `noe`: load inputs → validate → merge (through the recomputation
// controller) → write canonical artifacts → self-verify → optional report.
//
// Exit codes: 0 ok, 2 validation/policy/rank, 3 self-verify (digest or id
// mismatch), 4 I/O.

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    pub const VALIDATION: i32 = 2;
    pub const SELF_VERIFY: i32 = 3;
    pub const IO: i32 = 4;
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{SecondsFormat, Utc};
use tracing_subscriber::EnvFilter;

use args::{parse_and_validate as parse_cli, Args, RenderFormat};

use noe_algo::PolicyConfig;
use noe_core::{Candidate, NominationOrder};
use noe_io::canonical_json::write_canonical;
use noe_io::hasher::order_id_for;
use noe_io::{loader, manifest, IoError};
use noe_pipeline::{
    engine_identifiers, run_batch, validate::validate, BatchInputs, EngineSettings, PipelineError, PipelineOutputs,
    RunInputs, SourceError,
};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    /// JSON shape, manifest, policy, rank and validation failures
    Validation(String),
    /// Digest or id mismatch on inputs or written artifacts
    SelfVerify(String),
    /// Read/write/path/limit errors
    Io(String),
    /// Report build or output
    Render(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(m) => write!(f, "validation: {m}"),
            MainError::SelfVerify(m) => write!(f, "self-verify: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Render(m) => write!(f, "render: {m}"),
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("noe: error: {e}");
            let rc = match e {
                args::CliError::NotFound(_) => exitcodes::IO,
                _ => exitcodes::VALIDATION,
            };
            return ExitCode::from(rc as u8);
        }
    };
    init_tracing(&args);

    let res = if args.validate_only { validate_only(&args) } else { run_once(&args) };
    let rc = match res {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("noe: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc as u8)
}

/// stderr logging; `RUST_LOG` wins over `--log-level`, `--quiet` caps at warn.
fn init_tracing(args: &Args) {
    let level = if args.quiet { "warn" } else { args.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn map_error(e: &MainError) -> i32 {
    use exitcodes::*;
    match e {
        MainError::Validation(_) => VALIDATION,
        MainError::SelfVerify(_) => SELF_VERIFY,
        MainError::Io(_) | MainError::Render(_) => IO,
    }
}

/// Translate noe_io::IoError into MainError buckets.
fn map_io_err(e: IoError) -> MainError {
    match e {
        IoError::DigestMismatch { .. } => MainError::SelfVerify(e.to_string()),
        IoError::Path(_) | IoError::Limit(_) => MainError::Io(e.to_string()),
        IoError::Json { .. } | IoError::Canon(_) | IoError::Hash(_) | IoError::Manifest(_) | IoError::Invalid(_) => {
            MainError::Validation(e.to_string())
        }
    }
}

fn map_pipeline_err(e: PipelineError) -> MainError {
    match e {
        PipelineError::Io(e) | PipelineError::Source(SourceError::Io(e)) => map_io_err(e),
        PipelineError::Source(e @ SourceError::Unavailable(_)) => MainError::Io(e.to_string()),
        PipelineError::Policy(_)
        | PipelineError::QuotaList(_)
        | PipelineError::Validation(_)
        | PipelineError::VersionOverflow(_) => {
            MainError::Validation(e.to_string())
        }
    }
}

// ----- Loading -----

struct Loaded {
    round: Option<String>,
    candidates: Vec<Candidate>,
    policy: PolicyConfig,
    previous: Option<NominationOrder>,
    digests: RunInputs,
}

fn load_inputs(args: &Args) -> Result<Loaded, MainError> {
    let (round, cands_path, policy_path, previous_path) = if let Some(m) = &args.manifest {
        // Digests, when the manifest carries them, are verified here.
        let resolved = manifest::load_manifest(m).map_err(map_io_err)?;
        (resolved.round, resolved.candidates_path, resolved.policy_path, resolved.previous_order_path)
    } else {
        let (Some(c), Some(p)) = (args.candidates.clone(), args.policy.clone()) else {
            return Err(MainError::Validation("--candidates and --policy are required".into()));
        };
        (None, c, p, args.previous.clone())
    };

    let snapshot = loader::load_candidates(&cands_path).map_err(map_io_err)?;
    for w in &snapshot.warnings {
        tracing::warn!("{w}");
    }
    let policy = loader::load_policy(&policy_path).map_err(map_io_err)?;
    let previous = previous_path.as_deref().map(load_previous).transpose()?;

    let digests = RunInputs {
        candidates_sha256: manifest::canonical_file_sha256(&cands_path).map_err(map_io_err)?,
        policy_sha256: manifest::canonical_file_sha256(&policy_path).map_err(map_io_err)?,
        previous_order_id: None,
    };

    Ok(Loaded { round: round.or(snapshot.round), candidates: snapshot.candidates, policy, previous, digests })
}

/// A previous order whose id does not match its entries was edited by hand.
fn load_previous(path: &Path) -> Result<NominationOrder, MainError> {
    let order = loader::load_order(path).map_err(map_io_err)?;
    let expected = order_id_for(&order.entries).map_err(map_io_err)?;
    if expected != order.order_id {
        return Err(MainError::SelfVerify(format!(
            "{}: order_id {} does not match its entries ({expected})",
            path.display(),
            order.order_id
        )));
    }
    Ok(order)
}

// ----- Validate-only -----

fn validate_only(args: &Args) -> Result<(), MainError> {
    let loaded = load_inputs(args)?;
    let report = validate(&loaded.candidates, &loaded.policy, args.seats);
    for issue in &report.issues {
        eprintln!("{:?} {} at {:?}: {}", issue.severity, issue.code, issue.where_, issue.message);
    }
    if !report.pass {
        return Err(map_pipeline_err(PipelineError::Validation(report)));
    }
    if !args.quiet {
        eprintln!("validate-only: inputs OK ({} candidates)", loaded.candidates.len());
    }
    Ok(())
}

// ----- Full run -----

fn run_once(args: &Args) -> Result<(), MainError> {
    let loaded = load_inputs(args)?;
    let timestamp_utc =
        args.timestamp.clone().unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

    let outs = run_batch(BatchInputs {
        candidates: loaded.candidates,
        policy: &loaded.policy,
        previous: loaded.previous,
        settings: EngineSettings { seats: args.seats, ..EngineSettings::default() },
        round: loaded.round,
        input_digests: loaded.digests,
        timestamp_utc,
        engine_meta: engine_identifiers(),
    })
    .map_err(map_pipeline_err)?;

    let written = write_artifacts(&args.out, &outs)?;
    self_verify(&written, &outs)?;

    if let Some(format) = args.render {
        render_report(format, &args.out, &outs)?;
    }

    if !args.quiet {
        eprintln!(
            "run: order v{} ({} seats, {}) written to {}",
            outs.order.version,
            outs.order.len(),
            outs.order.order_id,
            args.out.display()
        );
    }
    Ok(())
}

struct Written {
    order: PathBuf,
    diff: Option<PathBuf>,
}

fn write_artifacts(out_dir: &Path, outs: &PipelineOutputs) -> Result<Written, MainError> {
    fs::create_dir_all(out_dir).map_err(|e| MainError::Io(format!("mkdir {}: {e}", out_dir.display())))?;

    let order = out_dir.join("nomination_order.json");
    write_canonical(&order, outs.order.as_ref()).map_err(map_io_err)?;

    let diff = match &outs.diff {
        Some(d) => {
            let p = out_dir.join("order_diff.json");
            write_canonical(&p, d).map_err(map_io_err)?;
            Some(p)
        }
        None => None,
    };

    write_canonical(&out_dir.join("run_record.json"), &outs.run_record).map_err(map_io_err)?;
    Ok(Written { order, diff })
}

/// Re-read what landed on disk and check it against the run record.
fn self_verify(written: &Written, outs: &PipelineOutputs) -> Result<(), MainError> {
    let rec = &outs.run_record.outputs;
    let check = |label: &str, path: &Path, expected: &str| -> Result<(), MainError> {
        let got = manifest::canonical_file_sha256(path).map_err(map_io_err)?;
        if got != expected {
            return Err(MainError::SelfVerify(format!("{label}: expected={expected} got={got}")));
        }
        Ok(())
    };

    check("nomination_order.json", &written.order, &rec.order_sha256)?;
    if let (Some(path), Some(expected)) = (&written.diff, &rec.diff_sha256) {
        check("order_diff.json", path, expected)?;
    }

    let reread = loader::load_order(&written.order).map_err(map_io_err)?;
    let id = order_id_for(&reread.entries).map_err(map_io_err)?;
    if id != rec.order_id {
        return Err(MainError::SelfVerify(format!("order_id: expected={} got={id}", rec.order_id)));
    }
    Ok(())
}

fn render_report(format: RenderFormat, out_dir: &Path, outs: &PipelineOutputs) -> Result<(), MainError> {
    let model = noe_report::build_model(&outs.order, &outs.candidates, outs.diff.as_ref(), &outs.run_record)
        .map_err(|e| MainError::Render(e.to_string()))?;

    let (name, body) = match format {
        #[cfg(feature = "report-json")]
        RenderFormat::Json => {
            ("report.json", noe_report::render_json(&model).map_err(|e| MainError::Render(e.to_string()))?)
        }
        #[cfg(feature = "report-text")]
        RenderFormat::Text => ("report.txt", noe_report::render_text(&model)),
        #[allow(unreachable_patterns)]
        other => return Err(MainError::Render(format!("{other:?} renderer not built in"))),
    };

    let path = out_dir.join(name);
    fs::write(&path, body).map_err(|e| MainError::Io(format!("write {}: {e}", path.display())))?;
    Ok(())
}
