//! crates/noe_pipeline/src/validate.rs
//! Structural & semantic checks on a candidate snapshot and policy, before
//! any merge. Unlike the builders (which stop at the first defect), this
//! collects every finding so an operator can fix a snapshot in one pass.
//! Deterministic output: issues are sorted by code, location, message.

use std::collections::{BTreeMap, BTreeSet};

use noe_algo::PolicyConfig;
use noe_core::{Candidate, CandidateId, QuotaKind};

/// Issue severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

/// Where the issue occurred.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityRef {
    Root,
    Policy(&'static str),
    Quota(QuotaKind),
    Candidate(CandidateId),
}

/// One validation finding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub where_: EntityRef,
}

/// pass = no `Error` issues.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub pass: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }
}

/// Validate a snapshot against a policy. `seats` overrides `policy.seats`.
pub fn validate(candidates: &[Candidate], policy: &PolicyConfig, seats: Option<u32>) -> ValidationReport {
    let mut issues = Vec::new();

    issues.extend(check_policy(policy));
    issues.extend(check_ids(candidates));
    issues.extend(check_ranks(candidates));
    issues.extend(check_rank_ties(candidates));
    issues.extend(check_coverage(candidates, policy, seats.or(policy.seats)));

    sort_issues_stably(&mut issues);
    ValidationReport { pass: !issues.iter().any(|i| i.severity == Severity::Error), issues }
}

// ------------------------------------------------------------------------------------------------
// Checks
// ------------------------------------------------------------------------------------------------

fn check_policy(policy: &PolicyConfig) -> Vec<ValidationIssue> {
    match policy.build() {
        Ok(_) => Vec::new(),
        Err(e) => vec![ValidationIssue {
            severity: Severity::Error,
            code: "Policy.Invalid",
            message: e.to_string(),
            where_: EntityRef::Policy("rules"),
        }],
    }
}

/// Errors:
/// - "Candidate.DuplicateId" for every repeated id
fn check_ids(candidates: &[Candidate]) -> Vec<ValidationIssue> {
    let mut seen = BTreeSet::new();
    candidates
        .iter()
        .filter(|c| !seen.insert(&c.id))
        .map(|c| ValidationIssue {
            severity: Severity::Error,
            code: "Candidate.DuplicateId",
            message: format!("candidate id {} appears more than once", c.id),
            where_: EntityRef::Candidate(c.id.clone()),
        })
        .collect()
}

/// Errors:
/// - "Candidate.MissingRank" when an active candidate lacks a rank for a list
///   it is eligible for (general included)
/// Warnings:
/// - "Candidate.StrayRank" for a rank in a quota the candidate is not eligible for
fn check_ranks(candidates: &[Candidate]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for c in candidates {
        for q in QuotaKind::ALL {
            let eligible = c.is_eligible(q);
            let ranked = c.rank_for(q).is_some();
            if eligible && !ranked && c.is_active() {
                issues.push(ValidationIssue {
                    severity: Severity::Error,
                    code: "Candidate.MissingRank",
                    message: format!("eligible for {q} but has no {q} rank"),
                    where_: EntityRef::Candidate(c.id.clone()),
                });
            }
            if ranked && !eligible {
                issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    code: "Candidate.StrayRank",
                    message: format!("has a {q} rank but is not eligible for {q}; ignored"),
                    where_: EntityRef::Candidate(c.id.clone()),
                });
            }
        }
    }
    issues
}

/// Errors:
/// - "Quota.RankTie" for every pair of active candidates sharing a rank
fn check_rank_ties(candidates: &[Candidate]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for q in QuotaKind::ALL {
        let mut ranked: Vec<(u32, &CandidateId)> = candidates
            .iter()
            .filter(|c| c.is_active() && c.is_eligible(q))
            .filter_map(|c| c.rank_for(q).map(|r| (r, &c.id)))
            .collect();
        ranked.sort();
        for w in ranked.windows(2) {
            let ((r1, a), (r2, b)) = (w[0], w[1]);
            if r1 == r2 && a != b {
                issues.push(ValidationIssue {
                    severity: Severity::Error,
                    code: "Quota.RankTie",
                    message: format!("{a} and {b} both hold rank {r1}"),
                    where_: EntityRef::Quota(q),
                });
            }
        }
    }
    issues
}

/// Warnings:
/// - "Snapshot.NoActive" when nobody can be seated
/// - "Seats.Shortfall" when more seats are requested than active candidates exist
/// - "Quota.Empty" when a reserved quota with a rule has no active candidate
fn check_coverage(candidates: &[Candidate], policy: &PolicyConfig, seats: Option<u32>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let active: Vec<&Candidate> = candidates.iter().filter(|c| c.is_active()).collect();

    if active.is_empty() {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "Snapshot.NoActive",
            message: "no active candidates; the order will be empty".into(),
            where_: EntityRef::Root,
        });
    }

    if let Some(requested) = seats {
        if requested as usize > active.len() {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                code: "Seats.Shortfall",
                message: format!("{requested} seats requested but only {} active candidates", active.len()),
                where_: EntityRef::Policy("seats"),
            });
        }
    }

    let mut per_quota: BTreeMap<QuotaKind, usize> = BTreeMap::new();
    for c in &active {
        for q in c.quota_eligibility.iter() {
            *per_quota.entry(q).or_default() += 1;
        }
    }
    for rule in &policy.rules {
        if rule.quota.is_reserved() && !per_quota.contains_key(&rule.quota) {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                code: "Quota.Empty",
                message: format!("{} has a reservation rule but no active candidates", rule.quota),
                where_: EntityRef::Quota(rule.quota),
            });
        }
    }
    issues
}

// ------------------------------------------------------------------------------------------------
// Utilities
// ------------------------------------------------------------------------------------------------

fn sort_issues_stably(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| {
        a.code
            .cmp(b.code)
            .then_with(|| a.where_.cmp(&b.where_))
            .then_with(|| a.message.cmp(&b.message))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use noe_algo::QuotaRuleConfig;
    use noe_core::CandidateStatus;

    fn id(s: &str) -> CandidateId {
        s.parse().unwrap()
    }

    fn disability_policy() -> PolicyConfig {
        PolicyConfig {
            rules: vec![QuotaRuleConfig { quota: QuotaKind::Disability, period: 5, offset: 5, fallback: None }],
            priority: vec![QuotaKind::Disability],
            ..PolicyConfig::default()
        }
    }

    #[test]
    fn clean_snapshot_passes() {
        let c = vec![
            Candidate::new(id("A"), "a", 1),
            Candidate::new(id("B"), "b", 2).with_quota(QuotaKind::Disability, 1),
        ];
        let r = validate(&c, &disability_policy(), None);
        assert!(r.pass, "{:?}", r.issues);
        assert!(r.issues.is_empty());
    }

    #[test]
    fn collects_every_tie_and_duplicate() {
        let c = vec![
            Candidate::new(id("A"), "a", 1),
            Candidate::new(id("B"), "b", 1),
            Candidate::new(id("C"), "c", 1),
            Candidate::new(id("A"), "again", 9),
        ];
        let r = validate(&c, &PolicyConfig::default(), None);
        assert!(!r.pass);
        let codes: Vec<&str> = r.errors().map(|i| i.code).collect();
        assert_eq!(codes, ["Candidate.DuplicateId", "Quota.RankTie", "Quota.RankTie"]);
    }

    #[test]
    fn withdrawn_candidates_do_not_tie() {
        let c = vec![
            Candidate::new(id("A"), "a", 1),
            Candidate::new(id("B"), "b", 1).with_status(CandidateStatus::Withdrawn),
        ];
        assert!(validate(&c, &PolicyConfig::default(), None).pass);
    }

    #[test]
    fn missing_and_stray_ranks() {
        let mut missing = Candidate::new(id("A"), "a", 1);
        missing.quota_eligibility.insert(QuotaKind::Ethnicity);
        let mut stray = Candidate::new(id("B"), "b", 2);
        stray.rank_by_quota.insert(QuotaKind::Indigenous, 1);

        let r = validate(&[missing, stray], &PolicyConfig::default(), None);
        assert_eq!(r.errors().map(|i| i.code).collect::<Vec<_>>(), ["Candidate.MissingRank"]);
        assert_eq!(r.warnings().map(|i| i.code).collect::<Vec<_>>(), ["Candidate.StrayRank"]);
    }

    #[test]
    fn bad_policy_and_coverage_warnings() {
        let mut p = disability_policy();
        p.rules[0].period = 0;
        p.seats = Some(4);
        let c = vec![Candidate::new(id("A"), "a", 1)];
        let r = validate(&c, &p, None);
        assert!(!r.pass);
        assert_eq!(r.errors().map(|i| i.code).collect::<Vec<_>>(), ["Policy.Invalid"]);
        assert_eq!(r.warnings().map(|i| i.code).collect::<Vec<_>>(), ["Quota.Empty", "Seats.Shortfall"]);

        // An explicit seat count wins over the policy's.
        let r = validate(&c, &disability_policy(), Some(1));
        assert_eq!(r.warnings().map(|i| i.code).collect::<Vec<_>>(), ["Quota.Empty"]);
    }
}
