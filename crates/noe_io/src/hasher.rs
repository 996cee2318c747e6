//! crates/noe_io/src/hasher.rs
//!
//! Deterministic hashing and ID builders for canonical artifacts.
//!
//! - Canonical JSON hashing: sorted object keys, array order preserved.
//! - `ORD:<hex>` derives from the seat sequence only (no version stamps), so
//!   identical orders share an id across recomputations.
//! - `RUN:<ts>:<hex>` uses an RFC3339-UTC timestamp plus a hash of canonical
//!   run bytes.
//! - Input fingerprints cover the canonically sorted candidate snapshot and
//!   the policy.
//! - Hex digests are **lowercase**.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256 as Sha256Hasher};

use noe_algo::PolicyConfig;
use noe_core::determinism::sort_candidates_canonical;
use noe_core::{Candidate, NominationOrderEntry, OrderId, RunId, Sha256};

use crate::canonical_json::to_canonical_bytes;
use crate::{IoError, IoResult};

/* ------------------------------- Raw hashing ------------------------------- */

/// SHA-256 over raw bytes, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256Hasher::digest(bytes))
}

/// SHA-256 over a reader stream (raw, not canonicalized).
pub fn sha256_stream<R: Read>(reader: &mut R) -> IoResult<String> {
    let mut hasher = Sha256Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 over a file's raw bytes.
pub fn sha256_file(path: &Path) -> IoResult<String> {
    let f = File::open(path).map_err(|e| IoError::Path(format!("{} ({e})", path.display())))?;
    sha256_stream(&mut BufReader::new(f))
}

/* ---------------------------- Canonical hashing ---------------------------- */

/// SHA-256 over **canonical JSON bytes** of any serializable value.
pub fn sha256_canonical<T: Serialize + ?Sized>(value: &T) -> IoResult<Sha256> {
    digest_to_sha(&sha256_hex(&to_canonical_bytes(value)?))
}

fn digest_to_sha(hex: &str) -> IoResult<Sha256> {
    hex.parse().map_err(|e| IoError::Hash(format!("{e}: {hex}")))
}

/* ---------------------------- Artifact ID builders ---------------------------- */

/// `ORD:<hex>` over the canonical seat sequence `{seat, candidate_id,
/// quota_of_appointment, rank_in_quota}`; `order_version` is excluded.
pub fn order_id_for(entries: &[NominationOrderEntry]) -> IoResult<OrderId> {
    let seats: Vec<serde_json::Value> = entries
        .iter()
        .map(|e| {
            json!({
                "seat": e.seat,
                "candidate_id": e.candidate_id,
                "quota_of_appointment": e.quota_of_appointment,
                "rank_in_quota": e.rank_in_quota,
            })
        })
        .collect();
    Ok(OrderId::from_digest(&sha256_canonical(&seats)?))
}

/// Fingerprint of one merge input: candidates sorted by id, plus the policy.
/// Arrival order of the candidate records does not affect the result.
pub fn input_fingerprint(candidates: &[Candidate], policy: &PolicyConfig) -> IoResult<Sha256> {
    let mut sorted = candidates.to_vec();
    sort_candidates_canonical(&mut sorted);
    sha256_canonical(&json!({ "candidates": sorted, "policy": policy }))
}

/* --------------------------------- RUN IDs --------------------------------- */

/// Normalize `YYYY-MM-DDTHH:MM:SS[.frac](Z|+00:00|-00:00)` to seconds + `Z`.
pub fn normalize_utc_seconds(ts: &str) -> IoResult<String> {
    let bad = || IoError::Invalid(format!("timestamp must be RFC3339 UTC: {ts}"));
    let b = ts.as_bytes();
    if b.len() < 20 {
        return Err(bad());
    }
    let shape_ok = b[..19].iter().enumerate().all(|(i, c)| match i {
        4 | 7 => *c == b'-',
        10 => *c == b'T',
        13 | 16 => *c == b':',
        _ => c.is_ascii_digit(),
    });
    if !shape_ok {
        return Err(bad());
    }
    let num = |r: std::ops::Range<usize>| ts[r].parse::<u32>().map_err(|_| bad());
    let (m, d, hh, mm, ss) = (num(5..7)?, num(8..10)?, num(11..13)?, num(14..16)?, num(17..19)?);
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) || hh > 23 || mm > 59 || ss > 60 {
        return Err(bad());
    }

    let mut rest = &ts[19..];
    if let Some(frac) = rest.strip_prefix('.') {
        let digits = frac.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 || digits > 9 {
            return Err(bad());
        }
        rest = &frac[digits..];
    }
    if !matches!(rest, "Z" | "+00:00" | "-00:00") {
        return Err(bad());
    }
    Ok(format!("{}Z", &ts[..19]))
}

/// `RUN:<timestamp>:<hex>`, hashing canonical bytes of the run payload.
pub fn run_id_for<T: Serialize + ?Sized>(timestamp_utc: &str, run_payload: &T) -> IoResult<RunId> {
    let ts = normalize_utc_seconds(timestamp_utc)?;
    let hex = sha256_hex(&to_canonical_bytes(run_payload)?);
    format!("RUN:{ts}:{hex}").parse().map_err(|e| IoError::Hash(format!("run id: {e}")))
}
