//! Nomination order merger.
//!
//! Seat by seat (N = 1, 2, …):
//! 1) claimants of N come from the policy, in priority order; in carry-forward
//!    mode quotas holding carried claims follow the direct claimants;
//! 2) the first claimant whose list still has an unappointed head fills N;
//! 3) otherwise the direct claimants' fallback quotas are tried, then the
//!    general list;
//! 4) an exhausted general list ends the merge.
//!
//! An appointed candidate is skipped in every list afterwards, so nobody is
//! seated twice. The merge is a pure function of its inputs.

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use noe_core::{CandidateId, EmptyResultWarning, QuotaKind};

use crate::policy::{ReservationPolicy, UnfilledSeatRule};
use crate::quota_list::{QuotaListEntry, QuotaLists};

/// How a seat was filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SeatSource {
    /// A direct claimant of the seat.
    Reserved,
    /// A claim lost at an earlier contested seat (carry-forward mode).
    Carried,
    /// A claimant's configured fallback quota.
    Fallback,
    /// The general list.
    General,
}

impl SeatSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            SeatSource::Reserved => "reserved",
            SeatSource::Carried => "carried",
            SeatSource::Fallback => "fallback",
            SeatSource::General => "general",
        }
    }
}

/// One filled seat, with what the policy asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatAssignment {
    pub seat: u32,
    pub candidate_id: CandidateId,
    /// Quota of appointment.
    pub quota: QuotaKind,
    pub rank_in_quota: u32,
    pub source: SeatSource,
    /// Direct claimants of the seat, priority order.
    pub claimants: Vec<QuotaKind>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    pub assignments: Vec<SeatAssignment>,
    pub requested_seats: Option<u32>,
    pub warning: Option<EmptyResultWarning>,
}

impl MergeOutcome {
    #[inline]
    pub fn filled(&self) -> u32 {
        // Seat numbers are u32, so the count fits.
        self.assignments.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

// ----------------------------- List cursors -----------------------------

/// Per-quota read positions plus the set of appointed candidates.
struct Cursors<'a> {
    lists: &'a QuotaLists,
    pos: [usize; 4],
    appointed: BTreeSet<&'a CandidateId>,
}

impl<'a> Cursors<'a> {
    fn new(lists: &'a QuotaLists) -> Self {
        Cursors { lists, pos: [0; 4], appointed: BTreeSet::new() }
    }

    /// First unappointed entry of `quota`'s list.
    fn head(&mut self, quota: QuotaKind) -> Option<&'a QuotaListEntry> {
        let entries = self.lists.get(quota).entries();
        let p = &mut self.pos[quota as usize];
        while let Some(e) = entries.get(*p) {
            if !self.appointed.contains(&e.candidate_id) {
                return Some(e);
            }
            *p += 1;
        }
        None
    }

    fn take(&mut self, quota: QuotaKind) -> Option<&'a QuotaListEntry> {
        let e = self.head(quota)?;
        self.appointed.insert(&e.candidate_id);
        self.pos[quota as usize] += 1;
        Some(e)
    }
}

// ----------------------------- Merge -----------------------------

/// Merge quota lists into one seat sequence.
///
/// Stops when the general list is exhausted or after `seat_limit` seats.
/// A shortfall against `seat_limit` is reported as a warning, not an error.
#[tracing::instrument(level = "debug", skip_all, fields(seat_limit = ?seat_limit))]
pub fn merge(lists: &QuotaLists, policy: &ReservationPolicy, seat_limit: Option<u32>) -> MergeOutcome {
    let carry = policy.unfilled_seats() == UnfilledSeatRule::CarryForward;
    let mut cur = Cursors::new(lists);
    let mut carried = [0u32; 4];
    let mut assignments: Vec<SeatAssignment> = Vec::new();
    let mut seat: u32 = 0;

    loop {
        if seat_limit.is_some_and(|limit| seat >= limit) {
            break;
        }
        let Some(next) = seat.checked_add(1) else { break };
        seat = next;

        let direct = policy.claimants(seat);
        let mut pick: Option<(QuotaKind, SeatSource)> =
            direct.iter().copied().find(|&q| cur.head(q).is_some()).map(|q| (q, SeatSource::Reserved));

        if pick.is_none() && carry {
            pick = policy
                .rules()
                .iter()
                .map(|r| r.quota)
                .filter(|q| carried[*q as usize] > 0 && !direct.contains(q))
                .find(|&q| cur.head(q).is_some())
                .map(|q| (q, SeatSource::Carried));
        }

        if pick.is_none() {
            pick = direct
                .iter()
                .filter_map(|&q| policy.rule(q).and_then(|r| r.fallback))
                .filter(|f| f.is_reserved())
                .find(|&f| cur.head(f).is_some())
                .map(|f| (f, SeatSource::Fallback));
        }

        if pick.is_none() && cur.head(QuotaKind::General).is_some() {
            pick = Some((QuotaKind::General, SeatSource::General));
        }

        let Some((quota, source)) = pick else {
            tracing::debug!(seat, "general list exhausted");
            break;
        };
        let Some(entry) = cur.take(quota) else { break };

        if carry {
            match source {
                SeatSource::Carried => carried[quota as usize] -= 1,
                SeatSource::Reserved => {
                    // Lower-priority claimants that could still fill a seat lost it.
                    for &q in direct.iter().skip_while(|q| **q != quota).skip(1) {
                        if cur.head(q).is_some() {
                            carried[q as usize] += 1;
                        }
                    }
                }
                SeatSource::Fallback | SeatSource::General => {}
            }
            for q in QuotaKind::ALL {
                if carried[q as usize] > 0 && cur.head(q).is_none() {
                    carried[q as usize] = 0;
                }
            }
        }

        assignments.push(SeatAssignment {
            seat,
            candidate_id: entry.candidate_id.clone(),
            quota,
            rank_in_quota: entry.rank,
            source,
            claimants: direct,
        });
    }

    let filled = assignments.len() as u32;
    let warning = seat_limit
        .filter(|requested| filled < *requested)
        .map(|requested| EmptyResultWarning { requested, filled });
    if let Some(w) = warning {
        tracing::debug!(requested = w.requested, filled = w.filled, "fewer candidates than requested seats");
    }

    MergeOutcome { assignments, requested_seats: seat_limit, warning }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::QuotaRule;
    use crate::quota_list::build_quota_lists;
    use noe_core::Candidate;
    use QuotaKind::*;

    fn cid(s: &str) -> CandidateId {
        s.parse().unwrap()
    }

    fn seated(o: &MergeOutcome) -> Vec<&str> {
        o.assignments.iter().map(|a| a.candidate_id.as_str()).collect()
    }

    fn generals(n: u32) -> Vec<Candidate> {
        (1..=n).map(|i| Candidate::new(cid(&format!("G{i}")), "g", i)).collect()
    }

    #[test]
    fn general_only_follows_general_rank() {
        let lists = build_quota_lists(&generals(3), false).unwrap();
        let o = merge(&lists, &ReservationPolicy::general_only(), None);
        assert_eq!(seated(&o), ["G1", "G2", "G3"]);
        assert!(o.assignments.iter().all(|a| a.source == SeatSource::General && a.claimants.is_empty()));
        assert_eq!(o.warning, None);
    }

    #[test]
    fn seat_limit_truncates_and_shortfall_warns() {
        let lists = build_quota_lists(&generals(3), false).unwrap();
        let p = ReservationPolicy::general_only();
        assert_eq!(merge(&lists, &p, Some(2)).filled(), 2);
        assert_eq!(merge(&lists, &p, Some(2)).warning, None);
        let o = merge(&lists, &p, Some(5));
        assert_eq!(o.filled(), 3);
        assert_eq!(o.warning, Some(EmptyResultWarning { requested: 5, filled: 3 }));
        assert!(merge(&lists, &p, Some(0)).is_empty());
    }

    #[test]
    fn empty_input_yields_empty_order() {
        let lists = build_quota_lists(&[], false).unwrap();
        let p = ReservationPolicy::new(vec![QuotaRule::new(Disability, 2, 1)], vec![Disability], UnfilledSeatRule::Skip)
            .unwrap();
        assert!(merge(&lists, &p, None).is_empty());
    }

    #[test]
    fn multi_eligible_candidate_is_seated_once() {
        let mut cs = generals(10);
        cs.push(Candidate::new(cid("X"), "x", 50).with_quota(Disability, 1).with_quota(Ethnicity, 1));
        cs.push(Candidate::new(cid("E2"), "e", 51).with_quota(Ethnicity, 2));
        let lists = build_quota_lists(&cs, false).unwrap();
        let p = ReservationPolicy::new(
            vec![QuotaRule::new(Disability, 4, 4), QuotaRule::new(Ethnicity, 6, 6)],
            vec![Disability, Ethnicity],
            UnfilledSeatRule::Skip,
        )
        .unwrap();
        let o = merge(&lists, &p, None);
        let s = seated(&o);
        assert_eq!(s[3], "X");
        assert_eq!(s[5], "E2");
        assert_eq!(s.iter().filter(|id| **id == "X").count(), 1);
        assert_eq!(o.filled(), 12);
    }

    #[test]
    fn exhausted_quota_falls_back_then_releases_to_general() {
        let mut cs = generals(4);
        cs.push(Candidate::new(cid("D1"), "d", 10).with_quota(Disability, 1));
        let lists = build_quota_lists(&cs, false).unwrap();
        let p = ReservationPolicy::new(
            vec![QuotaRule::new(Indigenous, 3, 3).with_fallback(Disability)],
            vec![],
            UnfilledSeatRule::Skip,
        )
        .unwrap();
        let o = merge(&lists, &p, None);
        assert_eq!(seated(&o), ["G1", "G2", "D1", "G3", "G4"]);
        let third = &o.assignments[2];
        assert_eq!((third.quota, third.source), (Disability, SeatSource::Fallback));
        assert_eq!(third.claimants, [Indigenous]);
        assert_eq!(o.assignments[4].source, SeatSource::General);
    }

    fn contested_fixture() -> (QuotaLists, Vec<QuotaRule>) {
        let mut cs = generals(6);
        for i in 1..=3u32 {
            cs.push(Candidate::new(cid(&format!("E{i}")), "e", 10 + i).with_quota(Ethnicity, i));
        }
        for i in 1..=2u32 {
            cs.push(Candidate::new(cid(&format!("D{i}")), "d", 20 + i).with_quota(Disability, i));
        }
        let lists = build_quota_lists(&cs, false).unwrap();
        (lists, vec![QuotaRule::new(Ethnicity, 2, 2), QuotaRule::new(Disability, 4, 4)])
    }

    #[test]
    fn skip_mode_drops_lost_claims() {
        let (lists, rules) = contested_fixture();
        let p = ReservationPolicy::new(rules, vec![Ethnicity, Disability], UnfilledSeatRule::Skip).unwrap();
        let o = merge(&lists, &p, None);
        assert_eq!(seated(&o), ["G1", "E1", "G2", "E2", "G3", "E3", "G4", "D1", "G5", "G6", "D2"]);
        assert_eq!(o.assignments[3].claimants, [Ethnicity, Disability]);
        assert_eq!((o.assignments[10].quota, o.assignments[10].source), (General, SeatSource::General));
    }

    #[test]
    fn carry_forward_honours_lost_claims_next() {
        let (lists, rules) = contested_fixture();
        let p = ReservationPolicy::new(rules, vec![Ethnicity, Disability], UnfilledSeatRule::CarryForward).unwrap();
        let o = merge(&lists, &p, None);
        assert_eq!(seated(&o), ["G1", "E1", "G2", "E2", "D1", "E3", "G3", "D2", "G4", "G5", "G6"]);
        assert_eq!(o.assignments[4].source, SeatSource::Carried);
        assert_eq!(o.assignments[4].quota, Disability);
        assert_eq!(o.assignments[7].source, SeatSource::Reserved);
    }
}
