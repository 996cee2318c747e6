//! crates/noe_core/src/order.rs
//! Published nomination order snapshots.
//!
//! A `NominationOrder` is created by one merge and superseded (never mutated)
//! by the next. Consumers share it behind an `Arc`; the controller owns the
//! "current version" reference.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::entities::QuotaKind;
use crate::ids::{CandidateId, OrderId, Sha256};

/// One seat of the nomination order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NominationOrderEntry {
    /// 1-based, dense.
    pub seat: u32,
    pub candidate_id: CandidateId,
    /// Quota whose seat claim the candidate filled (or `general`).
    pub quota_of_appointment: QuotaKind,
    /// Candidate's rank within `quota_of_appointment`.
    pub rank_in_quota: u32,
    pub order_version: u64,
}

/// The merge ran out of candidates before the requested seat count.
/// Not a failure: the order is complete for the candidates that exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EmptyResultWarning {
    pub requested: u32,
    pub filled: u32,
}

/// Immutable snapshot of a full nomination order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NominationOrder {
    pub version: u64,
    /// Digest of the seat sequence; identical for identical seat sequences
    /// regardless of `version`.
    pub order_id: OrderId,
    /// Digest of the candidate snapshot and policy that produced this order.
    pub input_fingerprint: Sha256,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub requested_seats: Option<u32>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub warning: Option<EmptyResultWarning>,
    pub entries: Vec<NominationOrderEntry>,
}

impl NominationOrder {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a 1-based seat number.
    pub fn entry_at(&self, seat: u32) -> Option<&NominationOrderEntry> {
        let idx = usize::try_from(seat).ok()?.checked_sub(1)?;
        self.entries.get(idx)
    }

    /// Seat held by `id`, if any. Linear scan; use `seat_index` for bulk lookups.
    pub fn seat_of(&self, id: &CandidateId) -> Option<u32> {
        self.entries.iter().find(|e| &e.candidate_id == id).map(|e| e.seat)
    }

    /// Candidate → seat map.
    pub fn seat_index(&self) -> BTreeMap<&CandidateId, u32> {
        self.entries.iter().map(|e| (&e.candidate_id, e.seat)).collect()
    }

    /// Seats filled through each quota.
    pub fn seats_per_quota(&self) -> BTreeMap<QuotaKind, u32> {
        let mut out = BTreeMap::new();
        for e in &self.entries {
            *out.entry(e.quota_of_appointment).or_insert(0) += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const HEX: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn entry(seat: u32, id: &str, q: QuotaKind, version: u64) -> NominationOrderEntry {
        NominationOrderEntry {
            seat,
            candidate_id: id.parse().unwrap(),
            quota_of_appointment: q,
            rank_in_quota: seat,
            order_version: version,
        }
    }

    fn order(version: u64) -> NominationOrder {
        NominationOrder {
            version,
            order_id: alloc::format!("ORD:{HEX}").parse().unwrap(),
            input_fingerprint: HEX.parse().unwrap(),
            requested_seats: None,
            warning: None,
            entries: vec![
                entry(1, "G1", QuotaKind::General, version),
                entry(2, "D1", QuotaKind::Disability, version),
            ],
        }
    }

    #[test]
    fn seat_lookups() {
        let o = order(1);
        assert_eq!(o.entry_at(0), None);
        assert_eq!(o.entry_at(2).unwrap().candidate_id.as_str(), "D1");
        assert_eq!(o.entry_at(3), None);
        assert_eq!(o.seat_of(&"G1".parse().unwrap()), Some(1));
        assert_eq!(o.seat_of(&"X".parse().unwrap()), None);
        assert_eq!(o.seats_per_quota()[&QuotaKind::Disability], 1);
    }
}
