//! crates/noe_pipeline/src/build_order.rs
//! One full merge: candidate snapshot → quota lists → seat assignments →
//! stamped `NominationOrder`.
//!
//! Never patches a previous order; every call recomputes from scratch. IDs:
//! - `order_id` hashes the seat sequence only (see `noe_io::hasher`);
//! - `input_fingerprint` hashes the sorted snapshot plus the effective policy
//!   (including the seat limit actually applied).

use noe_algo::{build_quota_lists, merge, MergeOutcome, PolicyConfig, ReservationPolicy};
use noe_core::{Candidate, NominationOrder, NominationOrderEntry, Sha256};
use noe_io::hasher::{input_fingerprint, order_id_for};

use crate::PipelineError;

/// Knobs for one merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeSettings {
    pub seat_limit: Option<u32>,
    pub parallel_lists: bool,
}

/// A stamped order plus the merge detail behind it (sources, claimants).
#[derive(Clone, Debug)]
pub struct BuiltOrder {
    pub order: NominationOrder,
    pub outcome: MergeOutcome,
}

/// Fingerprint of `candidates` under `policy` with the effective seat limit.
pub fn fingerprint_inputs(
    candidates: &[Candidate],
    policy: &ReservationPolicy,
    seat_limit: Option<u32>,
) -> Result<Sha256, PipelineError> {
    let cfg = PolicyConfig { seats: seat_limit, ..policy.to_config() };
    Ok(input_fingerprint(candidates, &cfg)?)
}

/// Stamp merge assignments with `version`.
pub fn to_entries(outcome: &MergeOutcome, version: u64) -> Vec<NominationOrderEntry> {
    outcome
        .assignments
        .iter()
        .map(|a| NominationOrderEntry {
            seat: a.seat,
            candidate_id: a.candidate_id.clone(),
            quota_of_appointment: a.quota,
            rank_in_quota: a.rank_in_quota,
            order_version: version,
        })
        .collect()
}

/// Run one merge and stamp it as `version`.
pub fn build_order(
    candidates: &[Candidate],
    policy: &ReservationPolicy,
    settings: MergeSettings,
    version: u64,
) -> Result<BuiltOrder, PipelineError> {
    let lists = build_quota_lists(candidates, settings.parallel_lists)?;
    let outcome = merge(&lists, policy, settings.seat_limit);

    let entries = to_entries(&outcome, version);
    let order = NominationOrder {
        version,
        order_id: order_id_for(&entries)?,
        input_fingerprint: fingerprint_inputs(candidates, policy, settings.seat_limit)?,
        requested_seats: outcome.requested_seats,
        warning: outcome.warning,
        entries,
    };
    Ok(BuiltOrder { order, outcome })
}
