//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions to encode and decode keys for the primary,
//! index and claim column families. Index keys are designed to support
//! efficient prefix scans over one partition.

use serde_json::{Number, Value};

const SEPARATOR: u8 = 0x00;

/// Encode a primary item key.
#[must_use]
pub fn item_key(key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// The index token for an attribute value.
///
/// Only scalar values are indexed; `None` means the item has no entry in the
/// index (missing attribute, null, list or map). Index attributes should be
/// strings or bools: a number shares its token with the string of the same
/// digits, so both land in one partition and [`in_partition`] tells them apart.
#[must_use]
pub fn index_token(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(number_token(n)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Integral floats take the integer's token, so `1` and `1.0` share one.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number_token(n: &Number) -> String {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    match n.as_f64() {
        Some(f) if n.is_f64() && f.trunc() == f && f.abs() < EXACT => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// Whether a stored attribute value belongs to the `partition` an index
/// lookup asked for. Numbers compare by value.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn in_partition(value: Option<&Value>, partition: &Value) -> bool {
    match (value, partition) {
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(value), partition) => value == partition,
        (None, _) => false,
    }
}

/// Encode an index entry key: `token || 0x00 || item_key`.
#[must_use]
pub fn index_key(token: &str, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(token.len() + key.len() + 1);
    out.extend_from_slice(token.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Encode the prefix shared by every entry of one index partition.
#[must_use]
pub fn index_prefix(token: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(token.len() + 1);
    out.extend_from_slice(token.as_bytes());
    out.push(SEPARATOR);
    out
}

/// Extract the item key from an index entry key with the given prefix.
///
/// Returns `None` if the remainder is not valid UTF-8.
#[must_use]
pub fn extract_item_key(entry: &[u8], prefix_len: usize) -> Option<String> {
    entry
        .get(prefix_len..)
        .and_then(|rest| std::str::from_utf8(rest).ok())
        .map(str::to_string)
}

/// Encode a unique claim key: `namespace || 0x00 || claim`.
#[must_use]
pub fn claim_key(namespace: &str, claim: &str) -> Vec<u8> {
    index_key(namespace, claim)
}
