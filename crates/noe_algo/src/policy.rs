//! Reservation policy: which quotas claim which seats.
//!
//! A rule "period P, offset O" reserves seats O, O+P, O+2P, … for its quota
//! (seats are 1-based). Two rules collide on some seat iff
//! `O1 ≡ O2 (mod gcd(P1, P2))`; every colliding pair must be ordered by the
//! declared priority, otherwise the policy is rejected at construction.
//!
//! `ReservationPolicy` can only be obtained through validation, so the merge
//! never sees an unresolvable seat.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use noe_core::QuotaKind;

/// Configuration defects. Fatal for the configuration; fix before merging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPolicyError {
    #[error("quota {quota}: period must be a positive integer (got {period})")]
    InvalidPeriod { quota: QuotaKind, period: i64 },
    #[error("quota {quota}: offset must be a positive seat number (got {offset})")]
    InvalidOffset { quota: QuotaKind, offset: i64 },
    #[error("the general list cannot hold a reservation rule")]
    GeneralRule,
    #[error("more than one rule for quota {0}")]
    DuplicateRule(QuotaKind),
    #[error("priority names quota {0}, which has no rule")]
    PriorityWithoutRule(QuotaKind),
    #[error("quota {0} appears more than once in priority")]
    DuplicatePriority(QuotaKind),
    #[error("quota {0} cannot fall back to itself")]
    SelfFallback(QuotaKind),
    #[error("quotas {first} and {second} both claim seat {seat} but priority does not order them")]
    UnresolvedContest { first: QuotaKind, second: QuotaKind, seat: u64 },
}

/// What happens to a reserved claim that loses a contested seat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnfilledSeatRule {
    /// The lost claim vanishes.
    #[default]
    Skip,
    /// The lost claim is honoured at the next seats, after direct claimants.
    CarryForward,
}

impl UnfilledSeatRule {
    pub const fn as_str(self) -> &'static str {
        match self {
            UnfilledSeatRule::Skip => "skip",
            UnfilledSeatRule::CarryForward => "carry_forward",
        }
    }
}

impl fmt::Display for UnfilledSeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "Every `period`-th seat starting at seat `offset` is reserved for `quota`."
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaRule {
    pub quota: QuotaKind,
    pub period: u32,
    pub offset: u32,
    /// Quota that receives the seat when `quota` is exhausted. `None` releases
    /// it to the general list.
    pub fallback: Option<QuotaKind>,
}

impl QuotaRule {
    pub fn new(quota: QuotaKind, period: u32, offset: u32) -> Self {
        QuotaRule { quota, period, offset, fallback: None }
    }

    pub fn with_fallback(mut self, fallback: QuotaKind) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Total for every seat; seat 0 is never claimed.
    #[inline]
    pub fn claims(&self, seat: u32) -> bool {
        self.period > 0 && self.offset > 0 && seat >= self.offset && (seat - self.offset) % self.period == 0
    }
}

/// Validated reservation policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// Claim order: prioritised rules first, then the rest in canonical order.
    rules: Vec<QuotaRule>,
    priority: Vec<QuotaKind>,
    unfilled_seats: UnfilledSeatRule,
}

impl ReservationPolicy {
    /// Validate and build a policy.
    pub fn new(
        rules: Vec<QuotaRule>,
        priority: Vec<QuotaKind>,
        unfilled_seats: UnfilledSeatRule,
    ) -> Result<Self, InvalidPolicyError> {
        let mut seen = noe_core::QuotaSet::empty();
        for r in &rules {
            if !r.quota.is_reserved() {
                return Err(InvalidPolicyError::GeneralRule);
            }
            if r.period == 0 {
                return Err(InvalidPolicyError::InvalidPeriod { quota: r.quota, period: 0 });
            }
            if r.offset == 0 {
                return Err(InvalidPolicyError::InvalidOffset { quota: r.quota, offset: 0 });
            }
            if r.fallback == Some(r.quota) {
                return Err(InvalidPolicyError::SelfFallback(r.quota));
            }
            if !seen.insert(r.quota) {
                return Err(InvalidPolicyError::DuplicateRule(r.quota));
            }
        }

        let mut prioritised = noe_core::QuotaSet::empty();
        for &q in &priority {
            if !seen.contains(q) {
                return Err(InvalidPolicyError::PriorityWithoutRule(q));
            }
            if !prioritised.insert(q) {
                return Err(InvalidPolicyError::DuplicatePriority(q));
            }
        }

        let mut ordered: Vec<QuotaRule> = Vec::with_capacity(rules.len());
        for &q in &priority {
            ordered.extend(rules.iter().filter(|r| r.quota == q).copied());
        }
        let mut rest: Vec<QuotaRule> = rules.iter().filter(|r| !prioritised.contains(r.quota)).copied().collect();
        rest.sort_by_key(|r| r.quota);
        ordered.extend(rest);

        let policy = ReservationPolicy { rules: ordered, priority, unfilled_seats };
        for (a, b, seat) in policy.contested_pairs() {
            if !(prioritised.contains(a) && prioritised.contains(b)) {
                return Err(InvalidPolicyError::UnresolvedContest { first: a, second: b, seat });
            }
        }
        Ok(policy)
    }

    /// No reservations: every seat goes to the general list.
    pub fn general_only() -> Self {
        ReservationPolicy { rules: Vec::new(), priority: Vec::new(), unfilled_seats: UnfilledSeatRule::Skip }
    }

    /// Quotas claiming `seat`, in priority order. Empty for unreserved seats
    /// and for seat 0.
    pub fn claimants(&self, seat: u32) -> Vec<QuotaKind> {
        self.rules.iter().filter(|r| r.claims(seat)).map(|r| r.quota).collect()
    }

    /// Every pair of rules sharing at least one seat, with the first shared
    /// seat. Pairs follow claim order.
    pub fn contested_pairs(&self) -> Vec<(QuotaKind, QuotaKind, u64)> {
        let mut out = Vec::new();
        for (i, a) in self.rules.iter().enumerate() {
            for b in &self.rules[i + 1..] {
                if let Some(seat) = first_common_seat(a, b) {
                    out.push((a.quota, b.quota, seat));
                }
            }
        }
        out
    }

    /// Rules in claim order.
    #[inline]
    pub fn rules(&self) -> &[QuotaRule] {
        &self.rules
    }

    pub fn rule(&self, quota: QuotaKind) -> Option<&QuotaRule> {
        self.rules.iter().find(|r| r.quota == quota)
    }

    #[inline]
    pub fn priority(&self) -> &[QuotaKind] {
        &self.priority
    }

    #[inline]
    pub fn unfilled_seats(&self) -> UnfilledSeatRule {
        self.unfilled_seats
    }

    /// Wire form of this policy (rules in claim order, no seat count).
    pub fn to_config(&self) -> PolicyConfig {
        PolicyConfig {
            rules: self
                .rules
                .iter()
                .map(|r| QuotaRuleConfig {
                    quota: r.quota,
                    period: i64::from(r.period),
                    offset: i64::from(r.offset),
                    fallback: r.fallback,
                })
                .collect(),
            priority: self.priority.clone(),
            unfilled_seats: self.unfilled_seats,
            seats: None,
        }
    }
}

// ----------------------------- Seat arithmetic -----------------------------

fn ext_gcd(a: i128, b: i128) -> (i128, i128, i128) {
    if b == 0 {
        (a, 1, 0)
    } else {
        let (g, x, y) = ext_gcd(b, a % b);
        (g, y, x - (a / b) * y)
    }
}

/// Smallest seat claimed by both rules (CRT on the two progressions).
fn first_common_seat(a: &QuotaRule, b: &QuotaRule) -> Option<u64> {
    let (pa, oa) = (i128::from(a.period), i128::from(a.offset));
    let (pb, ob) = (i128::from(b.period), i128::from(b.offset));
    let (g, x, _) = ext_gcd(pa, pb);
    let delta = ob - oa;
    if delta.rem_euclid(g) != 0 {
        return None;
    }
    // oa + pa * t ≡ ob (mod pb)
    let m = pb / g;
    let t = ((delta / g) * x).rem_euclid(m);
    let lcm = pa / g * pb;
    let mut seat = oa + pa * t;
    let floor = oa.max(ob);
    if seat < floor {
        seat += (floor - seat + lcm - 1) / lcm * lcm;
    }
    u64::try_from(seat).ok()
}

// ----------------------------- Wire configuration -----------------------------

/// Rule as written in a policy file. Integers are signed so that negative
/// values surface as `InvalidPolicyError`, not as parse failures.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuotaRuleConfig {
    pub quota: QuotaKind,
    pub period: i64,
    pub offset: i64,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub fallback: Option<QuotaKind>,
}

/// Policy file contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolicyConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub rules: Vec<QuotaRuleConfig>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: Vec<QuotaKind>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub unfilled_seats: UnfilledSeatRule,
    /// Requested seat count; `None` seats every active candidate.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub seats: Option<u32>,
}

impl PolicyConfig {
    pub fn build(&self) -> Result<ReservationPolicy, InvalidPolicyError> {
        let mut rules = Vec::with_capacity(self.rules.len());
        for r in &self.rules {
            let period = u32::try_from(r.period)
                .ok()
                .filter(|p| *p > 0)
                .ok_or(InvalidPolicyError::InvalidPeriod { quota: r.quota, period: r.period })?;
            let offset = u32::try_from(r.offset)
                .ok()
                .filter(|o| *o > 0)
                .ok_or(InvalidPolicyError::InvalidOffset { quota: r.quota, offset: r.offset })?;
            rules.push(QuotaRule { quota: r.quota, period, offset, fallback: r.fallback });
        }
        ReservationPolicy::new(rules, self.priority.clone(), self.unfilled_seats)
    }

    #[inline]
    pub fn seat_limit(&self) -> Option<u32> {
        self.seats
    }
}
