//! noe_core: Core types for the nomination order engine.
//!
//! This crate is **I/O-free**. It defines the stable types shared across the
//! workspace (`noe_algo`, `noe_io`, `noe_pipeline`, `noe_report`, `noe_cli`).
//!
//! - Registry tokens: `CandidateId`
//! - Output IDs: `ORD:` (order), `RUN:` (run record), 64-hex digests
//! - Closed quota vocabulary: `QuotaKind`, `QuotaSet`
//! - Candidate records as delivered by the candidate store
//! - Published nomination order snapshots
//! - Deterministic ordering helpers
//!
//! Serialization derives are gated behind the `serde` feature.

#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod determinism;
pub mod entities;
pub mod ids;
pub mod order;

pub mod errors {
    use alloc::string::String;
    use core::fmt;

    /// Minimal error set for core-domain validation & parsing.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub enum CoreError {
        InvalidId,
        InvalidToken,
        InvalidHex,
        UnknownQuota(String),
        UnknownStatus(String),
    }

    impl fmt::Display for CoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CoreError::InvalidId => write!(f, "invalid id"),
                CoreError::InvalidToken => write!(f, "invalid token"),
                CoreError::InvalidHex => write!(f, "invalid hex"),
                CoreError::UnknownQuota(q) => write!(f, "unknown quota: {q}"),
                CoreError::UnknownStatus(s) => write!(f, "unknown candidate status: {s}"),
            }
        }
    }

    #[cfg(feature = "std")]
    impl std::error::Error for CoreError {}
}

pub use entities::{Candidate, CandidateStatus, QuotaKind, QuotaSet};
pub use errors::CoreError;
pub use ids::{CandidateId, OrderId, RunId, Sha256};
pub use order::{EmptyResultWarning, NominationOrder, NominationOrderEntry};
