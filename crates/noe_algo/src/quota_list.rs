//! Quota list builder.
//!
//! Contract:
//! - A list holds the *active* candidates eligible for one quota, ascending by
//!   that quota's rank. `general` holds every active candidate.
//! - Arrival order of candidate records never matters: entries are sorted
//!   explicitly by `(rank, id)` and any rank tie is refused, never broken.
//! - Multi-listing across quotas is expected.
//!
//! Errors are reported deterministically: the failing pair is the first one in
//! canonical order, independent of how the input slice was arranged.

use std::collections::BTreeMap;
use std::thread;

use noe_core::determinism::{first_adjacent_duplicate, sort_candidates_canonical};
use noe_core::{Candidate, CandidateId, QuotaKind};

/// Data-quality problems found while building a list. The builder refuses to
/// proceed rather than guess.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaListError {
    #[error("inconsistent rank: {first} and {second} both hold rank {rank} in quota {quota}")]
    InconsistentRank {
        quota: QuotaKind,
        rank: u32,
        first: CandidateId,
        second: CandidateId,
    },
    #[error("missing rank: candidate {candidate} is eligible for quota {quota} but has no rank there")]
    MissingRank { quota: QuotaKind, candidate: CandidateId },
    #[error("duplicate candidate record: {0}")]
    DuplicateCandidate(CandidateId),
}

/// One ranked position in a quota list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaListEntry {
    pub candidate_id: CandidateId,
    pub rank: u32,
}

/// Eligible active candidates of one quota, strictly increasing by rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaList {
    quota: QuotaKind,
    entries: Vec<QuotaListEntry>,
}

impl QuotaList {
    pub fn empty(quota: QuotaKind) -> Self {
        QuotaList { quota, entries: Vec::new() }
    }

    /// Build a list from `(candidate, rank)` pairs in any order.
    pub fn from_ranked<I>(quota: QuotaKind, ranked: I) -> Result<Self, QuotaListError>
    where
        I: IntoIterator<Item = (CandidateId, u32)>,
    {
        let mut entries: Vec<QuotaListEntry> = ranked
            .into_iter()
            .map(|(candidate_id, rank)| QuotaListEntry { candidate_id, rank })
            .collect();

        entries.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id));
        if let Some((i, _)) = first_adjacent_duplicate(&entries, |a, b| a.candidate_id == b.candidate_id) {
            return Err(QuotaListError::DuplicateCandidate(entries[i].candidate_id.clone()));
        }

        entries.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.candidate_id.cmp(&b.candidate_id)));
        if let Some((i, j)) = first_adjacent_duplicate(&entries, |a, b| a.rank == b.rank) {
            return Err(QuotaListError::InconsistentRank {
                quota,
                rank: entries[i].rank,
                first: entries[i].candidate_id.clone(),
                second: entries[j].candidate_id.clone(),
            });
        }

        Ok(QuotaList { quota, entries })
    }

    #[inline]
    pub fn quota(&self) -> QuotaKind {
        self.quota
    }

    #[inline]
    pub fn entries(&self) -> &[QuotaListEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank held by `id` in this list, if listed.
    pub fn rank_of(&self, id: &CandidateId) -> Option<u32> {
        self.entries.iter().find(|e| &e.candidate_id == id).map(|e| e.rank)
    }
}

/// One list per quota; lists nobody is eligible for are present and empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaLists {
    lists: BTreeMap<QuotaKind, QuotaList>,
}

impl QuotaLists {
    /// Bundle the given lists; missing quotas get an empty list. A later list
    /// for the same quota replaces an earlier one.
    pub fn from_lists<I: IntoIterator<Item = QuotaList>>(lists: I) -> Self {
        let mut map: BTreeMap<QuotaKind, QuotaList> =
            QuotaKind::ALL.into_iter().map(|q| (q, QuotaList::empty(q))).collect();
        for l in lists {
            map.insert(l.quota, l);
        }
        QuotaLists { lists: map }
    }

    pub fn get(&self, quota: QuotaKind) -> &QuotaList {
        // Every quota is inserted at construction.
        &self.lists[&quota]
    }

    #[inline]
    pub fn general(&self) -> &QuotaList {
        self.get(QuotaKind::General)
    }

    /// Lists in canonical quota order.
    pub fn iter(&self) -> impl Iterator<Item = &QuotaList> {
        self.lists.values()
    }
}

// ----------------------------- Builders -----------------------------

/// Build the list for `quota` from a full candidate snapshot.
pub fn build_quota_list(candidates: &[Candidate], quota: QuotaKind) -> Result<QuotaList, QuotaListError> {
    let mut pool: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.is_active() && c.is_eligible(quota))
        .collect();
    // Missing ranks are reported in id order.
    pool.sort_by(|a, b| a.id.cmp(&b.id));

    let mut ranked = Vec::with_capacity(pool.len());
    for c in pool {
        let rank = c.rank_for(quota).ok_or_else(|| QuotaListError::MissingRank {
            quota,
            candidate: c.id.clone(),
        })?;
        ranked.push((c.id.clone(), rank));
    }
    QuotaList::from_ranked(quota, ranked)
}

/// Build every quota list.
///
/// Records are checked for duplicate ids first (across all statuses). With
/// `parallel`, each quota is built on its own scoped thread; the result and
/// any error are identical to the sequential build (first failure in
/// canonical quota order wins).
pub fn build_quota_lists(candidates: &[Candidate], parallel: bool) -> Result<QuotaLists, QuotaListError> {
    let mut by_id: Vec<Candidate> = candidates.to_vec();
    sort_candidates_canonical(&mut by_id);
    if let Some((i, _)) = first_adjacent_duplicate(&by_id, |a, b| a.id == b.id) {
        return Err(QuotaListError::DuplicateCandidate(by_id[i].id.clone()));
    }

    let results: Vec<Result<QuotaList, QuotaListError>> = if parallel {
        thread::scope(|s| {
            let handles: Vec<_> = QuotaKind::ALL
                .into_iter()
                .map(|q| s.spawn(move || build_quota_list(candidates, q)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)))
                .collect()
        })
    } else {
        QuotaKind::ALL.into_iter().map(|q| build_quota_list(candidates, q)).collect()
    };

    let lists = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    Ok(QuotaLists::from_lists(lists))
}
