//! Hashing System - Content Fingerprints and Manifest Digests
//!
//! Fingerprints name published files, so they must be stable across
//! runs and platforms: SHA-256 truncated to 128 bits, lowercase hex.

use sha2::{Digest, Sha256};
use serde::Serialize;
use serde_json::{to_string, Value};

/// Bytes of the SHA-256 digest kept in a fingerprint.
pub const FINGERPRINT_BYTES: usize = 16;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Content fingerprint: first 128 bits of SHA-256, 32 hex characters.
pub fn fingerprint(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(&digest[..FINGERPRINT_BYTES])
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Digest of a manifest snapshot, for build reports.
///
/// Array order is preserved, so two manifests with the same entries in a
/// different order hash differently (order drives generated output).
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}
