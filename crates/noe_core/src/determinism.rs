//! Determinism utilities: stable ordering for core tokens and candidate records.
//!
//! Nothing in the engine may depend on the arrival order of candidate records.
//! Callers sort through these helpers before hashing, building lists or
//! emitting artifacts.

use core::cmp::Ordering;

use crate::entities::{Candidate, QuotaKind};
use crate::ids::CandidateId;

/* -------------------------------------------------------------------------- */
/*                               Stable Ordering                              */
/* -------------------------------------------------------------------------- */

/// Provide a **total**, stable order for values that must sort canonically.
pub trait StableOrd {
    fn stable_cmp(&self, other: &Self) -> Ordering;
}

impl StableOrd for CandidateId {
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl StableOrd for QuotaKind {
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl StableOrd for Candidate {
    /// Canonical candidate order is by `id` only.
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.id.stable_cmp(&other.id)
    }
}

/* -------------------------------------------------------------------------- */
/*                            Canonical sort helpers                           */
/* -------------------------------------------------------------------------- */

/// Sort candidates **in place** by ascending id.
#[inline]
pub fn sort_candidates_canonical(xs: &mut [Candidate]) {
    xs.sort_by(|a, b| a.stable_cmp(b));
}

/// First adjacent pair (by index) that `same` reports as equal, in an already
/// sorted slice. Used to surface duplicates without guessing a tie-break.
pub fn first_adjacent_duplicate<T, F>(sorted: &[T], same: F) -> Option<(usize, usize)>
where
    F: Fn(&T, &T) -> bool,
{
    sorted.windows(2).position(|w| same(&w[0], &w[1])).map(|i| (i, i + 1))
}

/// `true` iff `keys` is strictly increasing.
pub fn is_strictly_increasing<K: Ord, I: IntoIterator<Item = K>>(keys: I) -> bool {
    let mut it = keys.into_iter();
    let Some(mut prev) = it.next() else { return true };
    for k in it {
        if k <= prev {
            return false;
        }
        prev = k;
    }
    true
}
