//! noe_pipeline: recomputation controller and batch orchestration
//! (snapshot → validate → lists → merge → publish → diff → run record).
//!
//! This crate stays free of file-format details: JSON, hashing and path
//! handling go through `noe_io`; list building and merging live in `noe_algo`.
//! Long-running embedders hold a [`RecomputationController`]; one-shot callers
//! (the CLI) use [`run_batch`].

#![forbid(unsafe_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use noe_algo::{InvalidPolicyError, PolicyConfig, QuotaListError};
use noe_core::{Candidate, NominationOrder};
use noe_io::IoError;

pub mod build_order;
pub mod build_run_record;
pub mod changes;
pub mod controller;
pub mod diff;
pub mod source;
pub mod validate;

pub use build_order::{build_order, BuiltOrder, MergeSettings};
pub use build_run_record::{build_run_record, RunInputs, RunOutputs, RunRecordDoc};
pub use changes::{derive_changes, ChangeNotice, InputChange};
pub use controller::{ControllerState, RecomputationController, RefreshOutcome};
pub use diff::{diff_orders, OrderDiff, SeatMove};
pub use source::{CandidateSource, FileSource, InMemorySource, SourceError};
pub use validate::{Severity, ValidationIssue, ValidationReport};

/// Single error surface for the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("invalid policy: {0}")]
    Policy(#[from] InvalidPolicyError),
    #[error(transparent)]
    QuotaList(#[from] QuotaListError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("validation failed: {}", summarize(.0))]
    Validation(ValidationReport),
    /// The previous order already carries the last representable version.
    #[error("order version {0} cannot be advanced")]
    VersionOverflow(u64),
}

fn summarize(report: &ValidationReport) -> String {
    let mut errors = report.errors();
    match errors.next() {
        None => "no errors".into(),
        Some(first) => {
            let more = errors.count();
            if more == 0 {
                format!("{}: {}", first.code, first.message)
            } else {
                format!("{}: {} (and {more} more)", first.code, first.message)
            }
        }
    }
}

/// Engine identifiers recorded in every run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMeta {
    pub vendor: String,
    pub name: String,
    pub version: String,
    pub build: String,
}

pub fn engine_identifiers() -> EngineMeta {
    EngineMeta {
        vendor: "noe".to_string(),
        name: "noe_engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: option_env!("NOE_BUILD").unwrap_or("dev").to_string(),
    }
}

/// Engine-level settings (not part of the policy file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Published snapshots retained by the controller.
    pub history_limit: usize,
    /// Build the per-quota lists on separate threads.
    pub parallel_lists: bool,
    /// Requested seat count; overrides the policy file's `seats`.
    pub seats: Option<u32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { history_limit: 16, parallel_lists: true, seats: None }
    }
}

// -------------------------------------- Batch run --------------------------------------

/// Everything a one-shot run needs; inputs are already loaded.
pub struct BatchInputs<'a> {
    pub candidates: Vec<Candidate>,
    pub policy: &'a PolicyConfig,
    pub previous: Option<NominationOrder>,
    pub settings: EngineSettings,
    pub round: Option<String>,
    /// Digests of the input files, echoed into the run record.
    pub input_digests: RunInputs,
    /// RFC3339 UTC; supplied by the caller so runs stay reproducible.
    pub timestamp_utc: String,
    pub engine_meta: EngineMeta,
}

#[derive(Debug)]
pub struct PipelineOutputs {
    pub order: Arc<NominationOrder>,
    /// Present iff a previous order was supplied.
    pub diff: Option<OrderDiff>,
    pub run_record: RunRecordDoc,
    /// Findings that did not block the run.
    pub validation: ValidationReport,
    /// The snapshot the order was computed from, sorted by id.
    pub candidates: Vec<Candidate>,
}

/// Validate, merge once through a fresh controller, and assemble the record.
pub fn run_batch(inputs: BatchInputs<'_>) -> Result<PipelineOutputs, PipelineError> {
    let BatchInputs { mut candidates, policy, previous, settings, round, mut input_digests, timestamp_utc, engine_meta } =
        inputs;
    noe_core::determinism::sort_candidates_canonical(&mut candidates);

    let report = validate::validate(&candidates, policy, settings.seats);
    for w in report.warnings() {
        tracing::warn!(code = w.code, where_ = ?w.where_, "{}", w.message);
    }
    if !report.pass {
        return Err(PipelineError::Validation(report));
    }

    let controller = RecomputationController::from_config(policy, settings)?;
    let had_previous = previous.is_some();
    if let Some(prev) = previous {
        input_digests.previous_order_id = Some(prev.order_id.clone());
        controller.resume_from(prev)?;
    }

    let source = InMemorySource::new(candidates.clone());
    let (order, diff) = match controller.refresh(&source)? {
        RefreshOutcome::Recomputed { order, diff } => (order, diff),
        RefreshOutcome::UpToDate(order) => {
            let diff = diff_orders(Some(&order), &order);
            (order, diff)
        }
    };
    let diff = had_previous.then_some(diff);

    let run_record =
        build_run_record(&timestamp_utc, &engine_meta, round.as_deref(), input_digests, &order, diff.as_ref())?;

    Ok(PipelineOutputs { order, diff, run_record, validation: report, candidates })
}
