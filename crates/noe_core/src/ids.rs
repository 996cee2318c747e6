//! crates/noe_core/src/ids.rs
//! Candidate tokens and canonical output IDs.
//! Deterministic, ASCII-only, strict shapes; no I/O.

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

const HEX64_LEN: usize = 64;
const TOKEN_MAX_LEN: usize = 64;

/// Lowercase hex (length must be exactly 64).
#[inline]
pub fn is_valid_sha256(s: &str) -> bool {
    s.len() == HEX64_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Token for CandidateId: ^[A-Za-z0-9_.:-]{1,64}$ (ASCII only)
#[inline]
pub fn is_valid_token(s: &str) -> bool {
    (1..=TOKEN_MAX_LEN).contains(&s.len())
        && s.bytes().all(|b| {
            matches!(b,
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' |
                b'_' | b'-' | b':' | b'.'
            )
        })
}

fn is_ts_utc_z(s: &str) -> bool {
    // Strict "YYYY-MM-DDTHH:MM:SSZ" (length 20)
    let b = s.as_bytes();
    if b.len() != 20 {
        return false;
    }
    b.iter().enumerate().all(|(i, c)| match i {
        4 | 7 => *c == b'-',
        10 => *c == b'T',
        13 | 16 => *c == b':',
        19 => *c == b'Z',
        _ => c.is_ascii_digit(),
    })
}

macro_rules! validated_string_newtype {
    ($(#[$m:meta])* $name:ident, $check:expr, $err:expr) => {
        $(#[$m])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            #[inline]
            pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl FromStr for $name {
            type Err = CoreError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let check: fn(&str) -> bool = $check;
                if check(s) { Ok(Self(s.to_string())) } else { Err($err) }
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                let check: fn(&str) -> bool = $check;
                if check(&s) { Ok(Self(s)) } else { Err($err) }
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(v: $name) -> String { v.0 }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str { &self.0 }
        }
    };
}

validated_string_newtype!(
    /// Candidate identifier as issued by the candidate store.
    CandidateId,
    is_valid_token,
    CoreError::InvalidToken
);

validated_string_newtype!(
    /// 64-hex lowercase digest (input fingerprints, artifact hashes).
    Sha256,
    is_valid_sha256,
    CoreError::InvalidHex
);

validated_string_newtype!(
    /// "ORD:" + 64-hex (lowercase), derived from the canonical seat sequence.
    OrderId,
    |s| s.strip_prefix("ORD:").map(is_valid_sha256).unwrap_or(false),
    CoreError::InvalidId
);

validated_string_newtype!(
    /// "RUN:" + "<YYYY-MM-DDTHH:MM:SSZ>" + ":" + 64-hex
    RunId,
    |s| {
        s.strip_prefix("RUN:")
            .and_then(|rest| rest.get(..20).zip(rest.get(20..)))
            .map(|(ts, tail)| {
                is_ts_utc_z(ts) && tail.strip_prefix(':').map(is_valid_sha256).unwrap_or(false)
            })
            .unwrap_or(false)
    },
    CoreError::InvalidId
);

impl OrderId {
    /// Build an order id from an already computed lowercase 64-hex digest.
    pub fn from_digest(hex: &Sha256) -> Self {
        let mut s = String::with_capacity(4 + HEX64_LEN);
        s.push_str("ORD:");
        s.push_str(hex.as_str());
        Self(s)
    }

    /// The digest part (without the `ORD:` prefix).
    pub fn digest_hex(&self) -> &str {
        &self.0[4..]
    }
}
