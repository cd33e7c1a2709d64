//! Scalr webhook signature verification.
//!
//! Scalr signs every webhook with HMAC-SHA1 over the raw request body
//! followed by the value of the `Date` header. The hex digest travels in
//! the `X-Signature` header, and the `Date` header bounds how long a
//! captured request can be replayed.
//!
//! Requests can still be replayed freely inside the freshness window; only
//! the total exposure is bounded.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the hex-encoded signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Header carrying the signing time.
pub const DATE_HEADER: &str = "Date";

/// Verifies webhook authenticity and freshness.
///
/// Built once from the process configuration and shared by every request.
#[derive(Clone)]
pub struct SignatureVerifier {
    key: Vec<u8>,
    max_age_seconds: u64,
}

impl SignatureVerifier {
    pub fn new(signing_key: impl AsRef<[u8]>, max_age_seconds: u64) -> Self {
        Self {
            key: signing_key.as_ref().to_vec(),
            max_age_seconds,
        }
    }

    /// Verify a request's headers and raw body at time `now`.
    ///
    /// # Returns
    ///
    /// `true` if both headers are present, the signature matches and the
    /// `Date` is strictly less than the max age away from `now`, `false`
    /// otherwise.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8], now: DateTime<Utc>) -> bool {
        let (Some(date), Some(signature)) =
            (header_str(headers, DATE_HEADER), header_str(headers, SIGNATURE_HEADER))
        else {
            warn!(
                has_date = headers.contains_key(DATE_HEADER),
                has_signature = headers.contains_key(SIGNATURE_HEADER),
                "signature_headers_missing"
            );
            return false;
        };

        let expected = match sign(&self.key, body, date) {
            Ok(s) => s,
            Err(_) => {
                warn!("signature_invalid_key");
                return false;
            }
        };

        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            warn!(
                expected_length = expected.len(),
                actual_length = signature.len(),
                "signature_mismatch"
            );
            return false;
        }

        let signed_at = match parse_date(date) {
            Some(t) => t,
            None => {
                warn!(date = %date, "signature_date_invalid");
                return false;
            }
        };

        let age_ms = (now - signed_at).num_milliseconds().unsigned_abs();
        if age_ms >= self.max_age_seconds.saturating_mul(1000) {
            warn!(
                signed_at = %signed_at,
                now = %now,
                age_seconds = age_ms / 1000,
                max_age_seconds = self.max_age_seconds,
                "signature_stale"
            );
            return false;
        }

        true
    }
}

/// Compute the hex-encoded HMAC-SHA1 of `body` followed by `date`.
pub fn sign(key: &[u8], body: &[u8], date: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha1::new_from_slice(key)?;
    mac.update(body);
    mac.update(date.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parse a `Date` header. RFC 2822 / IMF-fixdate first, RFC 3339 as a fallback.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
