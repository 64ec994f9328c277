//! Stable user identifier derivation
//!
//! A stable ID is derived from the digits of a phone number so the same
//! subscriber always maps to the same identifier regardless of formatting.

use sha2::{Digest, Sha256};

/// Leading marker for user identifiers
const TYPE_TAG: char = 'u';

/// Number of hex characters of the digest kept in the identifier
const HASH_PREFIX_LEN: usize = 16;

/// Number of trailing phone digits kept for human traceability
const TRACE_DIGITS: usize = 4;

/// Strip everything but ASCII digits from a phone number
pub fn normalize_phone_number(phone_number: &str) -> String {
    phone_number.chars().filter(|ch| ch.is_ascii_digit()).collect()
}

/// Derive the stable identifier for a phone number
///
/// The output is the type tag, the last four digits of the normalized
/// number, then the first 16 hex characters of `sha256(digits)`.
pub fn derive_stable_id(phone_number: &str) -> String {
    let digits = normalize_phone_number(phone_number);
    let digest = hex::encode(Sha256::digest(digits.as_bytes()));
    let trace = &digits[digits.len().saturating_sub(TRACE_DIGITS)..];

    let mut stable_id = String::with_capacity(1 + trace.len() + HASH_PREFIX_LEN);
    stable_id.push(TYPE_TAG);
    stable_id.push_str(trace);
    stable_id.push_str(&digest[..HASH_PREFIX_LEN]);
    stable_id
}
