//! crates/ea_io/src/hasher.rs
//!
//! Deterministic hashing and ID builders for canonical artifacts.
//!
//! - Canonical hashing goes through `canonical_json` (sorted keys, compact).
//! - `ALT:<hex>` identifies an allotment result by its canonical bytes.
//! - `RUN:<ts>-<hex>` pairs a normalized UTC timestamp with the hash of the
//!   canonical run payload.
//! - Hex digests are lowercase.
//!
//! Use `sha256_canonical` for values/structs and `sha256_hex`/`sha256_file`
//! for raw bytes.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical_json::to_canonical_bytes;
use crate::IoError;

/// SHA-256 over raw bytes, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over the canonical JSON bytes of any serializable value.
pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, IoError> {
    let bytes = to_canonical_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// SHA-256 over a file's raw bytes (streamed).
pub fn sha256_file(path: &Path) -> Result<String, IoError> {
    let mut r = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// True for a lowercase 64-char hex string.
#[inline]
pub fn is_lower_hex_64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// `ALT:<hex>` for `result.json`.
pub fn alt_id<T: Serialize>(value: &T) -> Result<String, IoError> {
    Ok(format!("ALT:{}", sha256_canonical(value)?))
}

/// Normalize an RFC 3339 timestamp to UTC seconds with a trailing `Z`.
pub fn normalize_timestamp_utc(ts: &str) -> Result<String, IoError> {
    let parsed = DateTime::parse_from_rfc3339(ts.trim())
        .map_err(|e| IoError::Invalid(format!("timestamp {ts:?} is not RFC 3339: {e}")))?;
    Ok(parsed.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// `RUN:<YYYY-MM-DDTHH:MM:SSZ>-<hex>` for `run_record.json`.
pub fn run_id<T: Serialize>(timestamp_utc: &str, run_payload: &T) -> Result<String, IoError> {
    let ts = normalize_timestamp_utc(timestamp_utc)?;
    Ok(format!("RUN:{ts}-{}", sha256_canonical(run_payload)?))
}

/// Shorten a full digest for log lines.
pub fn short_hex(hex64: &str, n: usize) -> Result<&str, IoError> {
    if !is_lower_hex_64(hex64) {
        return Err(IoError::Hash(format!("expected lowercase 64-hex, got {hex64:?}")));
    }
    Ok(&hex64[..n.min(64)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_vector_and_lowercase() {
        let h = sha256_hex(b"abc");
        assert_eq!(h, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(short_hex(&h, 12).unwrap(), "ba7816bf8f01");
        assert!(short_hex("ABC", 3).is_err());
    }

    #[test]
    fn canonical_hash_ignores_key_order() {
        #[derive(Serialize)]
        struct T {
            b: u32,
            a: u32,
        }
        assert_eq!(
            sha256_canonical(&T { b: 2, a: 1 }).unwrap(),
            sha256_canonical(&json!({"a": 1, "b": 2})).unwrap()
        );
    }

    #[test]
    fn alt_id_shape() {
        let id = alt_id(&json!({"allotments": []})).unwrap();
        assert!(id.starts_with("ALT:"));
        assert!(is_lower_hex_64(&id[4..]));
    }

    #[test]
    fn run_id_normalizes_timestamp() {
        let p = json!({"x": 1});
        let a = run_id("2026-03-01T09:30:00Z", &p).unwrap();
        let b = run_id("2026-03-01T09:30:00.250Z", &p).unwrap();
        let c = run_id("2026-03-01T15:00:00+05:30", &p).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(a.starts_with("RUN:2026-03-01T09:30:00Z-"));
        assert!(run_id("yesterday", &p).is_err());
    }

    #[test]
    fn file_hash_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.bin");
        std::fs::write(&p, b"abc").unwrap();
        assert_eq!(sha256_file(&p).unwrap(), sha256_hex(b"abc"));
    }
}
