//! noe_report/src/lib.rs: Display model + renderers (JSON/text) for a
//! published nomination order.
//!
//! Determinism rules:
//! - No I/O and no recomputation. Callers hand in artifacts already in memory.
//! - Rows follow seat order; leavers follow previous-seat order.
//! - Stable section order and field names.

#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use noe_core::{Candidate, CandidateId, NominationOrder};
use noe_pipeline::{OrderDiff, RunRecordDoc};

#[cfg(feature = "render_json")]
pub mod render_json;
#[cfg(feature = "render_text")]
pub mod render_text;

#[cfg(feature = "render_json")]
pub use render_json::render_json;
#[cfg(feature = "render_text")]
pub use render_text::render_text;

// ===== Errors =====
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// A seated or leaving candidate has no record in the snapshot.
    MissingCandidate(String),
    /// The run record does not describe this order.
    Inconsistent(&'static str),
    Render(&'static str),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::MissingCandidate(id) => write!(f, "no candidate record for {id}"),
            ReportError::Inconsistent(what) => write!(f, "inconsistent artifacts: {what}"),
            ReportError::Render(what) => write!(f, "render failed: {what}"),
        }
    }
}

impl std::error::Error for ReportError {}

// ===== Model =====
#[cfg_attr(feature = "render_json", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportModel {
    pub cover: SectionCover,
    pub seats: Vec<SeatRow>,
    pub quotas: Vec<QuotaCount>,
    pub leavers: Vec<LeaverRow>,
    pub warning: Option<String>,
    pub integrity: SectionIntegrity,
}

#[cfg_attr(feature = "render_json", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionCover {
    pub title: String,
    pub round: Option<String>,
    pub version: u64,
    pub previous_version: Option<u64>,
    pub seats_filled: u32,
    pub requested_seats: Option<u32>,
}

/// Seat movement against the previous order.
#[cfg_attr(feature = "render_json", derive(serde::Serialize))]
#[cfg_attr(feature = "render_json", serde(tag = "kind", content = "by", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Movement {
    New,
    Same,
    Up(u32),
    Down(u32),
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Movement::New => f.write_str("new"),
            Movement::Same => f.write_str("="),
            Movement::Up(n) => write!(f, "up {n}"),
            Movement::Down(n) => write!(f, "down {n}"),
        }
    }
}

#[cfg_attr(feature = "render_json", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatRow {
    pub seat: u32,
    pub candidate_id: String,
    pub display_name: String,
    pub quota: String,
    pub rank_in_quota: u32,
    /// `None` when there is no previous order to compare with.
    pub movement: Option<Movement>,
}

#[cfg_attr(feature = "render_json", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaCount {
    pub quota: String,
    pub seats: u32,
}

#[cfg_attr(feature = "render_json", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaverRow {
    pub candidate_id: String,
    pub display_name: String,
    pub previous_seat: u32,
}

#[cfg_attr(feature = "render_json", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionIntegrity {
    pub order_id: String,
    pub input_fingerprint: String,
    pub run_id: String,
    pub timestamp_utc: String,
    pub engine: String,
    pub candidates_sha256: String,
    pub policy_sha256: String,
}

// ===== API =====

/// Build the display model from a published order, the snapshot it was
/// computed from, the optional diff and the run record.
pub fn build_model(
    order: &NominationOrder,
    candidates: &[Candidate],
    diff: Option<&OrderDiff>,
    run: &RunRecordDoc,
) -> Result<ReportModel, ReportError> {
    if run.outputs.order_id != order.order_id {
        return Err(ReportError::Inconsistent("run record names a different order_id"));
    }
    let names: BTreeMap<&CandidateId, &str> = candidates.iter().map(|c| (&c.id, c.display_name.as_str())).collect();
    let name_of = |id: &CandidateId| {
        names.get(id).map(|n| n.to_string()).ok_or_else(|| ReportError::MissingCandidate(id.to_string()))
    };

    let mut seats = Vec::with_capacity(order.entries.len());
    for e in &order.entries {
        let movement = diff.map(|d| match d.move_of(&e.candidate_id) {
            None => Movement::Same,
            Some(m) => match m.previous_seat {
                None => Movement::New,
                Some(p) if p > e.seat => Movement::Up(p - e.seat),
                Some(p) if p < e.seat => Movement::Down(e.seat - p),
                Some(_) => Movement::Same,
            },
        });
        seats.push(SeatRow {
            seat: e.seat,
            candidate_id: e.candidate_id.to_string(),
            display_name: name_of(&e.candidate_id)?,
            quota: e.quota_of_appointment.to_string(),
            rank_in_quota: e.rank_in_quota,
            movement,
        });
    }

    let mut leavers = Vec::new();
    for m in diff.into_iter().flat_map(|d| d.moves.iter()).filter(|m| m.left()) {
        // Leavers may be missing from the new snapshot (removed records).
        let display_name = names.get(&m.candidate_id).map_or_else(String::new, |n| n.to_string());
        leavers.push(LeaverRow {
            candidate_id: m.candidate_id.to_string(),
            display_name,
            previous_seat: m.previous_seat.unwrap_or_default(),
        });
    }

    let quotas = order
        .seats_per_quota()
        .into_iter()
        .map(|(q, n)| QuotaCount { quota: q.to_string(), seats: n })
        .collect();

    let warning = order
        .warning
        .map(|w| format!("{} seats requested, only {} candidates available", w.requested, w.filled));

    let cover = SectionCover {
        title: "Nomination Order".to_string(),
        round: run.round.clone(),
        version: order.version,
        previous_version: diff.and_then(|d| d.from_version),
        seats_filled: order.entries.len() as u32,
        requested_seats: order.requested_seats,
    };

    let e = &run.engine;
    let integrity = SectionIntegrity {
        order_id: order.order_id.to_string(),
        input_fingerprint: order.input_fingerprint.to_string(),
        run_id: run.id.to_string(),
        timestamp_utc: run.timestamp_utc.clone(),
        engine: format!("{}/{} v{} ({})", e.vendor, e.name, e.version, e.build),
        candidates_sha256: run.inputs.candidates_sha256.clone(),
        policy_sha256: run.inputs.policy_sha256.clone(),
    };

    Ok(ReportModel { cover, seats, quotas, leavers, warning, integrity })
}
