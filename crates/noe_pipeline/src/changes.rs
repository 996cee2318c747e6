//! crates/noe_pipeline/src/changes.rs
//! Input changes that make a published order stale.
//!
//! Changes either arrive as explicit notices (`RecomputationController::notify`)
//! or are derived by comparing two candidate snapshots. Derived lists are
//! ordered by candidate id, then by the variant order below.

use std::collections::BTreeMap;
use std::fmt;

use noe_core::{Candidate, CandidateId, CandidateStatus, QuotaKind, QuotaSet};

/// One relevant difference between two candidate snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputChange {
    Added(CandidateId),
    Removed(CandidateId),
    /// Withdrawal, elimination, reactivation or appointment.
    StatusChanged { id: CandidateId, from: CandidateStatus, to: CandidateStatus },
    /// `None` on either side means the rank was absent.
    RankCorrected { id: CandidateId, quota: QuotaKind, from: Option<u32>, to: Option<u32> },
    EligibilityChanged { id: CandidateId, gained: QuotaSet, lost: QuotaSet },
    /// Does not move any seat, but changes the input fingerprint.
    DisplayNameChanged(CandidateId),
}

/// A caller-pushed notice has the same shape as a derived change.
pub type ChangeNotice = InputChange;

impl InputChange {
    pub fn candidate_id(&self) -> &CandidateId {
        match self {
            InputChange::Added(id)
            | InputChange::Removed(id)
            | InputChange::DisplayNameChanged(id)
            | InputChange::StatusChanged { id, .. }
            | InputChange::RankCorrected { id, .. }
            | InputChange::EligibilityChanged { id, .. } => id,
        }
    }

    /// Whether the change can alter seating (display names cannot).
    pub fn affects_seating(&self) -> bool {
        !matches!(self, InputChange::DisplayNameChanged(_))
    }
}

impl fmt::Display for InputChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputChange::Added(id) => write!(f, "{id}: added"),
            InputChange::Removed(id) => write!(f, "{id}: removed"),
            InputChange::StatusChanged { id, from, to } => write!(f, "{id}: status {from} -> {to}"),
            InputChange::RankCorrected { id, quota, from, to } => {
                let show = |r: &Option<u32>| r.map_or_else(|| "none".to_string(), |r| r.to_string());
                write!(f, "{id}: {quota} rank {} -> {}", show(from), show(to))
            }
            InputChange::EligibilityChanged { id, gained, lost } => {
                write!(f, "{id}: eligibility +{gained:?} -{lost:?}")
            }
            InputChange::DisplayNameChanged(id) => write!(f, "{id}: display name changed"),
        }
    }
}

/// Differences going from `prev` to `next`. Input order does not matter.
pub fn derive_changes(prev: &[Candidate], next: &[Candidate]) -> Vec<InputChange> {
    let before: BTreeMap<&CandidateId, &Candidate> = prev.iter().map(|c| (&c.id, c)).collect();
    let after: BTreeMap<&CandidateId, &Candidate> = next.iter().map(|c| (&c.id, c)).collect();

    let mut ids: Vec<&CandidateId> = before.keys().chain(after.keys()).copied().collect();
    ids.sort();
    ids.dedup();

    let mut out = Vec::new();
    for id in ids {
        match (before.get(id), after.get(id)) {
            (None, Some(_)) => out.push(InputChange::Added(id.clone())),
            (Some(_), None) => out.push(InputChange::Removed(id.clone())),
            (Some(a), Some(b)) => compare(a, b, &mut out),
            (None, None) => {}
        }
    }
    out
}

fn compare(a: &Candidate, b: &Candidate, out: &mut Vec<InputChange>) {
    let id = &a.id;
    if a.status != b.status {
        out.push(InputChange::StatusChanged { id: id.clone(), from: a.status, to: b.status });
    }
    for q in QuotaKind::ALL {
        let (from, to) = (a.rank_for(q), b.rank_for(q));
        if from != to {
            out.push(InputChange::RankCorrected { id: id.clone(), quota: q, from, to });
        }
    }
    if a.quota_eligibility != b.quota_eligibility {
        let gained = b.quota_eligibility.iter().filter(|q| !a.quota_eligibility.contains(*q)).collect();
        let lost = a.quota_eligibility.iter().filter(|q| !b.quota_eligibility.contains(*q)).collect();
        out.push(InputChange::EligibilityChanged { id: id.clone(), gained, lost });
    }
    if a.display_name != b.display_name {
        out.push(InputChange::DisplayNameChanged(id.clone()));
    }
}
