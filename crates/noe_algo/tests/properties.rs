//! Merge properties over random candidate sets and policies.

use std::collections::BTreeSet;

use noe_algo::{
    build_quota_lists, merge, MergeOutcome, QuotaLists, QuotaRule, ReservationPolicy, SeatSource, UnfilledSeatRule,
};
use noe_core::determinism::is_strictly_increasing;
use noe_core::{Candidate, CandidateId, CandidateStatus, QuotaKind};
use proptest::prelude::*;

const RESERVED: [QuotaKind; 3] = [QuotaKind::Disability, QuotaKind::Ethnicity, QuotaKind::Indigenous];

// ----------------------------- Strategies -----------------------------

/// Candidates with unique ranks per quota; about a quarter are inactive.
fn arb_candidates() -> impl Strategy<Value = Vec<Candidate>> {
    (0usize..30)
        .prop_flat_map(|n| {
            (
                Just((1..=n as u32).collect::<Vec<_>>()).prop_shuffle(),
                prop::collection::vec(0u8..8, n),
                prop::collection::vec(0u8..4, n),
            )
        })
        .prop_map(|(general, masks, status)| {
            let n = general.len() as u32;
            general
                .iter()
                .enumerate()
                .map(|(i, &g)| {
                    let mut c = Candidate::new(format!("C{i:03}").parse().unwrap(), "c", g);
                    for (bit, q) in RESERVED.into_iter().enumerate() {
                        if masks[i] & (1 << bit) != 0 {
                            let rank = match q {
                                QuotaKind::Disability => n + 1 - g,
                                QuotaKind::Ethnicity => i as u32 + 1,
                                _ => g * 2,
                            };
                            c = c.with_quota(q, rank);
                        }
                    }
                    if status[i] == 0 {
                        c = c.with_status(CandidateStatus::Withdrawn);
                    }
                    c
                })
                .collect()
        })
}

/// Valid policies: every ruled quota is prioritised, so any overlap resolves.
fn arb_policy() -> impl Strategy<Value = ReservationPolicy> {
    (
        prop::collection::vec(prop::option::of((1u32..8, 1u32..8, prop::option::of(0usize..4))), 3),
        any::<bool>(),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(specs, carry, rot)| {
            let mut rules = Vec::new();
            for (q, rule) in RESERVED.into_iter().zip(specs) {
                if let Some((period, offset, fb)) = rule {
                    let mut r = QuotaRule::new(q, period, offset);
                    if let Some(f) = fb.map(|i| QuotaKind::ALL[i]).filter(|f| *f != q) {
                        r = r.with_fallback(f);
                    }
                    rules.push(r);
                }
            }
            let mut priority: Vec<QuotaKind> = rules.iter().map(|r| r.quota).collect();
            if !priority.is_empty() {
                let k = rot.index(priority.len());
                priority.rotate_left(k);
            }
            let mode = if carry { UnfilledSeatRule::CarryForward } else { UnfilledSeatRule::Skip };
            ReservationPolicy::new(rules, priority, mode).unwrap()
        })
}

// ----------------------------- Helpers -----------------------------

fn remaining(lists: &QuotaLists, q: QuotaKind, appointed: &BTreeSet<&CandidateId>) -> bool {
    lists.get(q).entries().iter().any(|e| !appointed.contains(&e.candidate_id))
}

fn check_seats(lists: &QuotaLists, policy: &ReservationPolicy, o: &MergeOutcome) -> Result<(), TestCaseError> {
    let carry = policy.unfilled_seats() == UnfilledSeatRule::CarryForward;
    let mut appointed: BTreeSet<&CandidateId> = BTreeSet::new();
    for (i, a) in o.assignments.iter().enumerate() {
        prop_assert_eq!(a.seat as usize, i + 1, "seats are dense from 1");
        prop_assert_eq!(&a.claimants, &policy.claimants(a.seat));

        let open: Vec<QuotaKind> =
            a.claimants.iter().copied().filter(|q| remaining(lists, *q, &appointed)).collect();
        if !open.is_empty() {
            prop_assert_eq!(a.quota, open[0], "seat {} goes to its first open claimant", a.seat);
            prop_assert_eq!(a.source, SeatSource::Reserved);
        } else if !a.claimants.is_empty() {
            let fallbacks: Vec<QuotaKind> =
                a.claimants.iter().filter_map(|q| policy.rule(*q).and_then(|r| r.fallback)).collect();
            prop_assert!(
                a.quota == QuotaKind::General
                    || fallbacks.contains(&a.quota)
                    || (carry && a.source == SeatSource::Carried),
                "exhausted claimants fall through: seat {} went to {}",
                a.seat,
                a.quota
            );
        }
        if !carry {
            prop_assert_ne!(a.source, SeatSource::Carried);
        }
        prop_assert!(appointed.insert(&a.candidate_id), "double appointment of {}", a.candidate_id);
    }
    Ok(())
}

// ----------------------------- Properties -----------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn merge_is_deterministic_and_order_free(
        cs in arb_candidates(),
        policy in arb_policy(),
        limit in prop::option::of(0u32..40),
    ) {
        let lists = build_quota_lists(&cs, false).unwrap();
        let a = merge(&lists, &policy, limit);
        let b = merge(&lists, &policy, limit);
        prop_assert_eq!(&a, &b);

        let mut rev = cs.clone();
        rev.reverse();
        let lists_rev = build_quota_lists(&rev, true).unwrap();
        prop_assert_eq!(&lists_rev, &lists);
        prop_assert_eq!(merge(&lists_rev, &policy, limit), a);
    }

    #[test]
    fn seats_respect_reservations_and_never_repeat(
        cs in arb_candidates(),
        policy in arb_policy(),
    ) {
        let lists = build_quota_lists(&cs, false).unwrap();
        let o = merge(&lists, &policy, None);
        check_seats(&lists, &policy, &o)?;

        // Every active candidate is seated when no limit applies.
        let active = cs.iter().filter(|c| c.is_active()).count();
        prop_assert_eq!(o.assignments.len(), active);
        prop_assert_eq!(o.warning, None);
    }

    #[test]
    fn ranks_increase_within_each_quota_of_appointment(
        cs in arb_candidates(),
        policy in arb_policy(),
    ) {
        let lists = build_quota_lists(&cs, false).unwrap();
        let o = merge(&lists, &policy, None);
        for q in QuotaKind::ALL {
            let ranks: Vec<u32> =
                o.assignments.iter().filter(|a| a.quota == q).map(|a| a.rank_in_quota).collect();
            prop_assert!(is_strictly_increasing(ranks.iter()), "quota {} ranks {:?}", q, ranks);
        }
    }

    #[test]
    fn seat_limit_bounds_length_and_warns_on_shortfall(
        cs in arb_candidates(),
        policy in arb_policy(),
        limit in 0u32..40,
    ) {
        let lists = build_quota_lists(&cs, false).unwrap();
        let o = merge(&lists, &policy, Some(limit));
        let active = cs.iter().filter(|c| c.is_active()).count() as u32;
        prop_assert_eq!(o.filled(), limit.min(active));
        prop_assert_eq!(o.warning.is_some(), active < limit);

        // A limited merge is a prefix of the unlimited one.
        let full = merge(&lists, &policy, None);
        prop_assert_eq!(&o.assignments[..], &full.assignments[..o.assignments.len()]);
    }
}
