//! crates/noe_core/src/entities.rs
//! Quota vocabulary and candidate records (as delivered by the candidate store).
//!
//! The quota set is **closed**: every category the engine can reason about is a
//! `QuotaKind` variant, and a candidate's eligibility is a `QuotaSet` over those
//! variants. Nothing here is keyed by free-form strings.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::ids::CandidateId;

/* -------------------------------------------------------------------------- */
/*                                   Quotas                                   */
/* -------------------------------------------------------------------------- */

/// Competition system a candidate may be ranked under.
///
/// Declaration order is the canonical order used wherever quotas are iterated
/// without an explicit priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum QuotaKind {
    General,
    Disability,
    Ethnicity,
    Indigenous,
}

impl QuotaKind {
    /// All quotas in canonical order.
    pub const ALL: [QuotaKind; 4] = [
        QuotaKind::General,
        QuotaKind::Disability,
        QuotaKind::Ethnicity,
        QuotaKind::Indigenous,
    ];

    /// Wire token.
    pub const fn as_str(self) -> &'static str {
        match self {
            QuotaKind::General => "general",
            QuotaKind::Disability => "disability",
            QuotaKind::Ethnicity => "ethnicity",
            QuotaKind::Indigenous => "indigenous",
        }
    }

    /// True for every quota that can hold reserved seats.
    #[inline]
    pub const fn is_reserved(self) -> bool {
        !matches!(self, QuotaKind::General)
    }

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotaKind {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuotaKind::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| CoreError::UnknownQuota(s.to_string()))
    }
}

/// Set of quotas, stored as a bitset. Iteration follows canonical order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QuotaSet(u8);

impl QuotaSet {
    pub const fn empty() -> Self {
        QuotaSet(0)
    }

    pub fn insert(&mut self, q: QuotaKind) -> bool {
        let had = self.contains(q);
        self.0 |= q.bit();
        !had
    }

    pub fn remove(&mut self, q: QuotaKind) -> bool {
        let had = self.contains(q);
        self.0 &= !q.bit();
        had
    }

    #[inline]
    pub const fn contains(&self, q: QuotaKind) -> bool {
        self.0 & q.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = QuotaKind> + '_ {
        QuotaKind::ALL.into_iter().filter(move |q| self.contains(*q))
    }
}

impl fmt::Debug for QuotaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<QuotaKind> for QuotaSet {
    fn from_iter<I: IntoIterator<Item = QuotaKind>>(iter: I) -> Self {
        let mut s = QuotaSet::empty();
        for q in iter {
            s.insert(q);
        }
        s
    }
}

impl<const N: usize> From<[QuotaKind; N]> for QuotaSet {
    fn from(qs: [QuotaKind; N]) -> Self {
        qs.into_iter().collect()
    }
}

// Wire shape is a list of quota tokens in canonical order.
#[cfg(feature = "serde")]
impl Serialize for QuotaSet {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(self.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for QuotaSet {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = alloc::vec::Vec::<QuotaKind>::deserialize(d)?;
        Ok(v.into_iter().collect())
    }
}

/* -------------------------------------------------------------------------- */
/*                                 Candidates                                 */
/* -------------------------------------------------------------------------- */

/// Lifecycle status of a candidate. Only `Active` candidates occupy seats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CandidateStatus {
    #[default]
    Active,
    Withdrawn,
    Eliminated,
    Appointed,
}

impl CandidateStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            CandidateStatus::Active => "active",
            CandidateStatus::Withdrawn => "withdrawn",
            CandidateStatus::Eliminated => "eliminated",
            CandidateStatus::Appointed => "appointed",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CandidateStatus::Active),
            "withdrawn" => Ok(CandidateStatus::Withdrawn),
            "eliminated" => Ok(CandidateStatus::Eliminated),
            "appointed" => Ok(CandidateStatus::Appointed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// One candidate record, immutable per store snapshot.
///
/// `general` eligibility is implied for every candidate; `quota_eligibility`
/// lists the reserved quotas the candidate additionally competes in.
/// `rank_by_quota` must hold a rank for `general` and for each listed quota.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Candidate {
    pub id: CandidateId,
    pub display_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub quota_eligibility: QuotaSet,
    pub rank_by_quota: BTreeMap<QuotaKind, u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub status: CandidateStatus,
}

impl Candidate {
    /// Active candidate competing on the general list only.
    pub fn new(id: CandidateId, display_name: impl Into<String>, general_rank: u32) -> Self {
        let mut rank_by_quota = BTreeMap::new();
        rank_by_quota.insert(QuotaKind::General, general_rank);
        Candidate {
            id,
            display_name: display_name.into(),
            quota_eligibility: QuotaSet::empty(),
            rank_by_quota,
            status: CandidateStatus::Active,
        }
    }

    /// Add eligibility for `quota` with the given rank within that quota.
    pub fn with_quota(mut self, quota: QuotaKind, rank: u32) -> Self {
        if quota.is_reserved() {
            self.quota_eligibility.insert(quota);
        }
        self.rank_by_quota.insert(quota, rank);
        self
    }

    pub fn with_status(mut self, status: CandidateStatus) -> Self {
        self.status = status;
        self
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == CandidateStatus::Active
    }

    /// Eligibility check; `general` is always eligible.
    #[inline]
    pub fn is_eligible(&self, quota: QuotaKind) -> bool {
        !quota.is_reserved() || self.quota_eligibility.contains(quota)
    }

    #[inline]
    pub fn rank_for(&self, quota: QuotaKind) -> Option<u32> {
        self.rank_by_quota.get(&quota).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> CandidateId {
        s.parse().unwrap()
    }

    #[test]
    fn quota_tokens_round_trip_through_from_str() {
        for q in QuotaKind::ALL {
            assert_eq!(q.as_str().parse::<QuotaKind>().unwrap(), q);
        }
        assert!(matches!("veterans".parse::<QuotaKind>(), Err(CoreError::UnknownQuota(_))));
    }

    #[test]
    fn quota_set_iterates_in_canonical_order() {
        let s = QuotaSet::from([QuotaKind::Indigenous, QuotaKind::Disability]);
        let v: alloc::vec::Vec<_> = s.iter().collect();
        assert_eq!(v, [QuotaKind::Disability, QuotaKind::Indigenous]);
        assert_eq!(s.len(), 2);
        assert!(!s.contains(QuotaKind::Ethnicity));
    }

    #[test]
    fn general_is_always_eligible() {
        let c = Candidate::new(cid("C1"), "Ana", 3).with_quota(QuotaKind::Ethnicity, 1);
        assert!(c.is_eligible(QuotaKind::General));
        assert!(c.is_eligible(QuotaKind::Ethnicity));
        assert!(!c.is_eligible(QuotaKind::Disability));
        assert_eq!(c.rank_for(QuotaKind::General), Some(3));
        assert_eq!(c.rank_for(QuotaKind::Ethnicity), Some(1));
        assert!(!c.quota_eligibility.contains(QuotaKind::General));
    }

    #[test]
    fn only_active_is_active() {
        let c = Candidate::new(cid("C1"), "Ana", 1);
        assert!(c.is_active());
        for s in [CandidateStatus::Withdrawn, CandidateStatus::Eliminated, CandidateStatus::Appointed] {
            assert!(!c.clone().with_status(s).is_active());
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn candidate_wire_shape() {
        let raw = r#"{
            "id": "C7",
            "display_name": "Bruno",
            "quota_eligibility": ["indigenous", "disability"],
            "rank_by_quota": {"general": 12, "disability": 2, "indigenous": 1},
            "status": "withdrawn"
        }"#;
        let c: Candidate = serde_json::from_str(raw).unwrap();
        assert_eq!(c.status, CandidateStatus::Withdrawn);
        assert!(c.is_eligible(QuotaKind::Indigenous));
        assert_eq!(c.rank_for(QuotaKind::Disability), Some(2));

        let back = serde_json::to_value(&c).unwrap();
        assert_eq!(back["quota_eligibility"], serde_json::json!(["disability", "indigenous"]));
    }
}
