//! crates/noe_pipeline/src/source.rs
//! Read-only access to the candidate data the controller merges from.
//!
//! The engine never writes candidate records back; a source only hands out
//! point-in-time snapshots. Two implementations ship here: an in-memory store
//! (embedders and tests) and a file-backed source reading the JSON snapshot
//! format through `noe_io::loader`.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;

use noe_core::{Candidate, CandidateId, CandidateStatus, QuotaKind};
use noe_io::IoError;

/// Failure to produce a snapshot.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("candidate source unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Anything that can hand out a consistent candidate snapshot.
pub trait CandidateSource: Send + Sync {
    fn snapshot(&self) -> Result<Vec<Candidate>, SourceError>;
}

impl<S: CandidateSource + ?Sized> CandidateSource for &S {
    fn snapshot(&self) -> Result<Vec<Candidate>, SourceError> {
        (**self).snapshot()
    }
}

// ----------------------------- In-memory -----------------------------

/// Mutable in-process store. Edits are made by the caller (registry side);
/// the controller only ever calls [`CandidateSource::snapshot`].
#[derive(Debug, Default)]
pub struct InMemorySource {
    candidates: RwLock<Vec<Candidate>>,
}

impl InMemorySource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates: RwLock::new(candidates) }
    }

    /// Replace the whole record set.
    pub fn replace(&self, candidates: Vec<Candidate>) {
        *self.candidates.write() = candidates;
    }

    /// Insert or overwrite the record with the same id.
    pub fn upsert(&self, candidate: Candidate) {
        let mut all = self.candidates.write();
        match all.iter_mut().find(|c| c.id == candidate.id) {
            Some(slot) => *slot = candidate,
            None => all.push(candidate),
        }
    }

    /// Returns false when no record has this id.
    pub fn remove(&self, id: &CandidateId) -> bool {
        let mut all = self.candidates.write();
        let before = all.len();
        all.retain(|c| &c.id != id);
        all.len() != before
    }

    pub fn set_status(&self, id: &CandidateId, status: CandidateStatus) -> bool {
        self.edit(id, |c| c.status = status)
    }

    /// Correct (or clear, with `None`) the rank held in one quota list.
    pub fn set_rank(&self, id: &CandidateId, quota: QuotaKind, rank: Option<u32>) -> bool {
        self.edit(id, |c| match rank {
            Some(r) => {
                c.rank_by_quota.insert(quota, r);
            }
            None => {
                c.rank_by_quota.remove(&quota);
            }
        })
    }

    pub fn set_eligibility(&self, id: &CandidateId, quota: QuotaKind, eligible: bool) -> bool {
        self.edit(id, |c| {
            if eligible {
                c.quota_eligibility.insert(quota);
            } else {
                c.quota_eligibility.remove(quota);
            }
        })
    }

    fn edit(&self, id: &CandidateId, f: impl FnOnce(&mut Candidate)) -> bool {
        let mut all = self.candidates.write();
        match all.iter_mut().find(|c| &c.id == id) {
            Some(c) => {
                f(c);
                true
            }
            None => false,
        }
    }
}

impl CandidateSource for InMemorySource {
    fn snapshot(&self) -> Result<Vec<Candidate>, SourceError> {
        Ok(self.candidates.read().clone())
    }
}

// ----------------------------- File-backed -----------------------------

/// Reads `{ "candidates": [...] }` from disk on every snapshot.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CandidateSource for FileSource {
    fn snapshot(&self) -> Result<Vec<Candidate>, SourceError> {
        let snap = noe_io::loader::load_candidates(&self.path)?;
        for w in &snap.warnings {
            tracing::warn!(path = %self.path.display(), "{w}");
        }
        Ok(snap.candidates)
    }
}
