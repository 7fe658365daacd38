//! Webhook signature verification.
//!
//! Stripe signs each delivery with a header of the form
//! `t=<unix_seconds>,v1=<hex_hmac>` where the HMAC-SHA256 is computed over
//! `"{t}.{raw_body}"` with the endpoint's signing secret. Verification also
//! enforces a timestamp tolerance so captured deliveries cannot be replayed
//! long after the fact.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed skew between the signature timestamp and now.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Signature verification failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The header carried no `t=` element.
    #[error("signature header missing timestamp")]
    MissingTimestamp,

    /// The `t=` element was not a valid Unix timestamp.
    #[error("signature header timestamp is not a number")]
    InvalidTimestamp,

    /// The header carried no `v1=` element.
    #[error("signature header missing v1 signature")]
    MissingSignature,

    /// The timestamp fell outside the allowed tolerance.
    #[error("signature timestamp outside tolerance")]
    Expired,

    /// The computed HMAC did not match any `v1` element.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a webhook payload against its signature header.
///
/// # Errors
///
/// Returns a `SignatureError` describing the first check that failed.
pub fn verify(payload: &str, header: &str, secret: &str) -> Result<(), SignatureError> {
    verify_at(payload, header, secret, chrono::Utc::now().timestamp())
}

/// Verify with an explicit notion of "now" so expiry is testable.
fn verify_at(payload: &str, header: &str, secret: &str, now: i64) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for element in header.split(',') {
        match element.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    if (now - ts).abs() > DEFAULT_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let expected = compute_signature(timestamp, payload, secret);
    if signatures
        .iter()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Compute the hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
fn compute_signature(timestamp: &str, payload: &str, secret: &str) -> String {
    // `new_from_slice` only fails if the Hmac implementation is broken.
    // This is a library invariant, not a runtime condition.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
