//! Loader: read local JSON inputs (candidate snapshot, policy, previous order),
//! check what serde cannot (duplicate ids, stray ranks) and hand typed values
//! to the pipeline. No network I/O.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use noe_algo::PolicyConfig;
use noe_core::{Candidate, CandidateId, NominationOrder, QuotaKind};

use crate::{IoError, IoResult};

/// Upper bound for any single input file.
pub const MAX_INPUT_BYTES: u64 = 32 * 1024 * 1024;

// ----------------------------- Wire-facing types -----------------------------

/// Candidate snapshot file: `{ "round": "...", "candidates": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<String>,
    pub candidates: Vec<Candidate>,
}

/// Non-fatal findings while loading a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A rank was recorded for a quota the candidate is not eligible for; the
    /// builder ignores it.
    RankWithoutEligibility { candidate: CandidateId, quota: QuotaKind },
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadWarning::RankWithoutEligibility { candidate, quota } => {
                write!(f, "candidate {candidate} has a {quota} rank but is not eligible for {quota}")
            }
        }
    }
}

/// Loaded, checked candidate snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSnapshot {
    pub round: Option<String>,
    pub candidates: Vec<Candidate>,
    pub warnings: Vec<LoadWarning>,
}

// ----------------------------- Reading -----------------------------

/// Read at most `limit` bytes of `path`; larger files are refused.
pub fn read_limited(path: &Path, limit: u64) -> IoResult<Vec<u8>> {
    let f = File::open(path).map_err(|e| IoError::Path(format!("{} ({e})", path.display())))?;
    let mut buf = Vec::new();
    f.take(limit + 1)
        .read_to_end(&mut buf)
        .map_err(|e| IoError::Path(format!("{} ({e})", path.display())))?;
    if buf.len() as u64 > limit {
        return Err(IoError::Limit(format!("{} exceeds {limit} bytes", path.display())));
    }
    Ok(buf)
}

/// Parse a JSON file into an untyped value (size-limited).
pub fn read_json_value(path: &Path) -> IoResult<Value> {
    let bytes = read_limited(path, MAX_INPUT_BYTES)?;
    serde_json::from_slice(&bytes).map_err(|e| json_err(path, e))
}

fn json_err(path: &Path, e: serde_json::Error) -> IoError {
    IoError::Json { pointer: "/".into(), msg: format!("{}: {e}", path.display()) }
}

fn read_typed<T: serde::de::DeserializeOwned>(path: &Path) -> IoResult<T> {
    let bytes = read_limited(path, MAX_INPUT_BYTES)?;
    serde_json::from_slice(&bytes).map_err(|e| json_err(path, e))
}

// ----------------------------- Candidates -----------------------------

/// Check a parsed snapshot: duplicate ids are an error; ranks for quotas the
/// candidate is not eligible for are warnings. Candidates come back sorted by id.
pub fn check_candidates(file: CandidateFile) -> IoResult<CandidateSnapshot> {
    let CandidateFile { round, mut candidates } = file;
    noe_core::determinism::sort_candidates_canonical(&mut candidates);

    let mut seen: BTreeSet<&CandidateId> = BTreeSet::new();
    let mut warnings = Vec::new();
    for c in &candidates {
        if !seen.insert(&c.id) {
            return Err(IoError::Invalid(format!("duplicate candidate id: {}", c.id)));
        }
        for &q in c.rank_by_quota.keys() {
            if !c.is_eligible(q) {
                warnings.push(LoadWarning::RankWithoutEligibility { candidate: c.id.clone(), quota: q });
            }
        }
    }
    Ok(CandidateSnapshot { round, candidates, warnings })
}

pub fn load_candidates(path: &Path) -> IoResult<CandidateSnapshot> {
    check_candidates(read_typed(path)?)
}

// ----------------------------- Policy / previous order -----------------------------

/// Load a policy file. Only the wire shape is checked here; semantic checks
/// happen in `PolicyConfig::build`.
pub fn load_policy(path: &Path) -> IoResult<PolicyConfig> {
    read_typed(path)
}

/// Load a previously published `nomination_order.json`.
pub fn load_order(path: &Path) -> IoResult<NominationOrder> {
    let order: NominationOrder = read_typed(path)?;
    let dense = order.entries.iter().enumerate().all(|(i, e)| e.seat as usize == i + 1);
    if !dense {
        return Err(IoError::Invalid(format!("{}: seats must be dense from 1", path.display())));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let p = dir.path().join(name);
        std::fs::File::create(&p).unwrap().write_all(body.as_bytes()).unwrap();
        p
    }

    #[test]
    fn snapshot_is_sorted_and_warns_on_stray_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(
            &dir,
            "c.json",
            r#"{"round":"2024-A","candidates":[
                {"id":"B","display_name":"Bea","rank_by_quota":{"general":2,"indigenous":1}},
                {"id":"A","display_name":"Ana","quota_eligibility":["disability"],
                 "rank_by_quota":{"general":1,"disability":1}}
            ]}"#,
        );
        let snap = load_candidates(&p).unwrap();
        assert_eq!(snap.round.as_deref(), Some("2024-A"));
        assert_eq!(snap.candidates[0].id.as_str(), "A");
        assert_eq!(
            snap.warnings,
            [LoadWarning::RankWithoutEligibility { candidate: "B".parse().unwrap(), quota: QuotaKind::Indigenous }]
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(
            &dir,
            "c.json",
            r#"{"candidates":[
                {"id":"A","display_name":"a","rank_by_quota":{"general":1}},
                {"id":"A","display_name":"a","rank_by_quota":{"general":2}}
            ]}"#,
        );
        assert!(matches!(load_candidates(&p), Err(IoError::Invalid(_))));
    }

    #[test]
    fn unknown_quota_and_bad_ids_are_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(&dir, "c.json", r#"{"candidates":[{"id":"A","display_name":"a","rank_by_quota":{"veterans":1}}]}"#);
        assert!(matches!(load_candidates(&p), Err(IoError::Json { .. })));
        let p = write_tmp(&dir, "d.json", r#"{"candidates":[{"id":"a b","display_name":"a","rank_by_quota":{"general":1}}]}"#);
        assert!(matches!(load_candidates(&p), Err(IoError::Json { .. })));
    }

    #[test]
    fn size_limit_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(&dir, "big.json", &"x".repeat(64));
        assert!(matches!(read_limited(&p, 16), Err(IoError::Limit(_))));
        assert_eq!(read_limited(&p, 64).unwrap().len(), 64);
    }

    #[test]
    fn policy_file_parses_into_config() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(
            &dir,
            "p.json",
            r#"{"rules":[{"quota":"disability","period":5,"offset":5}],"priority":["disability"],"seats":20}"#,
        );
        let cfg = load_policy(&p).unwrap();
        assert_eq!(cfg.seat_limit(), Some(20));
        assert!(cfg.build().is_ok());
    }
}
