// crates/noe_io/src/manifest.rs
//
// Manifest: a small JSON file naming the inputs of one run.
//
// • Inputs are local paths only: candidates, policy, optional previous order.
// • Offline-only: any path with a scheme ("://", "http:", "https:") is refused.
// • Relative paths resolve against the manifest's own directory.
// • Optional digests (lowercase 64-hex) are verified over canonical JSON bytes
//   and may only be given for inputs that are present.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use noe_core::ids::is_valid_sha256;

use crate::canonical_json::to_canonical_json_bytes;
use crate::hasher::sha256_hex;
use crate::loader::read_json_value;
use crate::{looks_like_url, IoError, IoResult};

const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// External manifest accepted by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Optional label for the round (informative; not hashed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<String>,
    pub candidates_path: String,
    pub policy_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_order_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_sha256: Option<InputDigests>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDigests {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_order_path: Option<String>,
}

/// Paths resolved against the manifest's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    pub round: Option<String>,
    pub candidates_path: PathBuf,
    pub policy_path: PathBuf,
    pub previous_order_path: Option<PathBuf>,
    pub digests: InputDigests,
}

// ---------- validation (shape, offline, digests only for present paths) ----------

/// Validate manifest shape and offline path policy. Does not touch the disk.
pub fn validate_manifest(man: &Manifest) -> IoResult<()> {
    check_path("candidates_path", &man.candidates_path)?;
    check_path("policy_path", &man.policy_path)?;
    if let Some(p) = &man.previous_order_path {
        check_path("previous_order_path", p)?;
    }

    if let Some(d) = &man.inputs_sha256 {
        for (label, digest) in [
            ("candidates_path", &d.candidates_path),
            ("policy_path", &d.policy_path),
            ("previous_order_path", &d.previous_order_path),
        ] {
            if let Some(h) = digest {
                if !is_valid_sha256(h) {
                    return Err(IoError::Manifest(format!("invalid sha256 format for {label}: {h}")));
                }
            }
        }
        if d.previous_order_path.is_some() && man.previous_order_path.is_none() {
            return Err(IoError::Manifest("digest supplied for missing input: previous_order_path".into()));
        }
    }
    Ok(())
}

fn check_path(label: &str, path: &str) -> IoResult<()> {
    if path.trim().is_empty() {
        return Err(IoError::Manifest(format!("field must not be empty: {label}")));
    }
    if looks_like_url(path) {
        return Err(IoError::Manifest(format!("path must be offline (no scheme) for {label}: {path}")));
    }
    Ok(())
}

// ---------- resolution ----------

fn join_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn must_exist_file(label: &str, p: &Path) -> IoResult<()> {
    let md = fs::metadata(p).map_err(|e| IoError::Path(format!("{label}: {} ({e})", p.display())))?;
    if !md.is_file() {
        return Err(IoError::Path(format!("{label}: not a file: {}", p.display())));
    }
    Ok(())
}

/// Resolve paths under `base_dir` and check that each input is a file.
pub fn resolve_paths(base_dir: &Path, man: &Manifest) -> IoResult<ResolvedManifest> {
    let candidates_path = join_under(base_dir, &man.candidates_path);
    let policy_path = join_under(base_dir, &man.policy_path);
    let previous_order_path = man.previous_order_path.as_deref().map(|s| join_under(base_dir, s));

    must_exist_file("candidates_path", &candidates_path)?;
    must_exist_file("policy_path", &policy_path)?;
    if let Some(p) = &previous_order_path {
        must_exist_file("previous_order_path", p)?;
    }

    Ok(ResolvedManifest {
        round: man.round.clone(),
        candidates_path,
        policy_path,
        previous_order_path,
        digests: man.inputs_sha256.clone().unwrap_or_default(),
    })
}

// ---------- digests ----------

/// SHA-256 of a JSON file's canonical bytes.
pub fn canonical_file_sha256(path: &Path) -> IoResult<String> {
    let v = read_json_value(path)?;
    Ok(sha256_hex(&to_canonical_json_bytes(&v)?))
}

/// Verify supplied digests over canonical JSON bytes.
pub fn verify_digests(resolved: &ResolvedManifest) -> IoResult<()> {
    let d = &resolved.digests;
    let checks = [
        ("candidates_path", Some(&resolved.candidates_path), &d.candidates_path),
        ("policy_path", Some(&resolved.policy_path), &d.policy_path),
        ("previous_order_path", resolved.previous_order_path.as_ref(), &d.previous_order_path),
    ];
    for (label, path, expected) in checks {
        let (Some(path), Some(expected)) = (path, expected) else { continue };
        let got = canonical_file_sha256(path)?;
        if &got != expected {
            return Err(IoError::DigestMismatch { label, expected: expected.clone(), got });
        }
    }
    Ok(())
}

// ---------- top-level ----------

/// Load, validate, resolve, and verify a manifest file.
pub fn load_manifest(manifest_path: &Path) -> IoResult<ResolvedManifest> {
    let bytes = crate::loader::read_limited(manifest_path, MAX_MANIFEST_BYTES)?;
    let man: Manifest = serde_json::from_slice(&bytes)
        .map_err(|e| IoError::Manifest(format!("{} ({e})", manifest_path.display())))?;
    validate_manifest(&man)?;

    let base = manifest_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let resolved = resolve_paths(&base, &man)?;
    verify_digests(&resolved)?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn man(c: &str, p: &str) -> Manifest {
        Manifest {
            round: None,
            candidates_path: c.into(),
            policy_path: p.into(),
            previous_order_path: None,
            inputs_sha256: None,
        }
    }

    #[test]
    fn urls_and_empty_paths_are_refused() {
        assert!(validate_manifest(&man("c.json", "p.json")).is_ok());
        assert!(matches!(validate_manifest(&man("https://x/c.json", "p.json")), Err(IoError::Manifest(_))));
        assert!(matches!(validate_manifest(&man("c.json", "file:///p.json")), Err(IoError::Manifest(_))));
        assert!(matches!(validate_manifest(&man(" ", "p.json")), Err(IoError::Manifest(_))));
    }

    #[test]
    fn digests_must_be_hex_and_for_present_inputs() {
        let mut m = man("c.json", "p.json");
        m.inputs_sha256 = Some(InputDigests { candidates_path: Some("ABC".into()), ..Default::default() });
        assert!(validate_manifest(&m).is_err());

        m.inputs_sha256 = Some(InputDigests { previous_order_path: Some("a".repeat(64)), ..Default::default() });
        assert!(validate_manifest(&m).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"candidates_path":"c.json","policy_path":"p.json","seats":4}"#;
        assert!(serde_json::from_str::<Manifest>(raw).is_err());
    }
}
