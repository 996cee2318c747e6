// crates/noe_algo/src/lib.rs
//! Algorithm layer of the nomination order engine.
//!
//! - `quota_list`: per-quota ranked lists from a candidate snapshot
//! - `policy`: validated reservation policy and seat claimants
//! - `merge`: one deterministic seat sequence from lists + policy
//!
//! No I/O; everything here is a pure function of its inputs.

#![forbid(unsafe_code)]

pub mod merge;
pub mod policy;
pub mod quota_list;

// ----------------------------- Re-exports (pipeline imports these) -----------------------------

pub use merge::{merge, MergeOutcome, SeatAssignment, SeatSource};
pub use policy::{
    InvalidPolicyError, PolicyConfig, QuotaRule, QuotaRuleConfig, ReservationPolicy, UnfilledSeatRule,
};
pub use quota_list::{
    build_quota_list, build_quota_lists, QuotaList, QuotaListEntry, QuotaListError, QuotaLists,
};
