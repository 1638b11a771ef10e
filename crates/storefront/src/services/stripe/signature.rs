//! `Stripe-Signature` header verification.
//!
//! The header carries `t=<unix>` and one or more `v1=<hex>` entries; each `v1`
//! is HMAC-SHA256 over `"{t}.{body}"` keyed with the endpoint secret.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::error::StripeError;
use crate::services::constant_time_compare;

/// Maximum age of a signed payload.
pub const TOLERANCE_SECS: i64 = 300;

/// Verify a webhook body against its `Stripe-Signature` header.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` if the header is malformed, too
/// old, or no `v1` entry matches.
pub fn verify_signature(
    secret: &SecretString,
    payload: &[u8],
    header: &str,
) -> Result<(), StripeError> {
    verify_signature_at(secret, payload, header, chrono::Utc::now().timestamp())
}

/// [`verify_signature`] with an explicit clock.
///
/// # Errors
///
/// See [`verify_signature`].
pub fn verify_signature_at(
    secret: &SecretString,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature(
            "missing v1 signature".to_string(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature("invalid timestamp".to_string()))?;
    if (now - ts).abs() > TOLERANCE_SECS {
        return Err(StripeError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let expected = sign(secret, timestamp, payload)?;
    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature(
            "signature mismatch".to_string(),
        ))
    }
}

/// Hex HMAC of `"{timestamp}.{payload}"`.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` if the key is rejected.
pub fn sign(secret: &SecretString, timestamp: &str, payload: &[u8]) -> Result<String, StripeError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_800_000_000;

    fn secret() -> SecretString {
        SecretString::from("whsec_test_secret".to_string())
    }

    fn header_for(payload: &[u8], ts: i64) -> String {
        let sig = sign(&secret(), &ts.to_string(), payload).unwrap();
        format!("t={ts},v1={sig}")
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = header_for(payload, NOW);
        assert!(verify_signature_at(&secret(), payload, &header, NOW).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let payload = br#"{"id":"evt_1"}"#;
        let good = sign(&secret(), &NOW.to_string(), payload).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={good}");
        assert!(verify_signature_at(&secret(), payload, &header, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = header_for(br#"{"id":"evt_1"}"#, NOW);
        let result = verify_signature_at(&secret(), br#"{"id":"evt_2"}"#, &header, NOW);
        assert!(matches!(result, Err(StripeError::InvalidSignature(_))));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = header_for(payload, NOW - 600);
        let result = verify_signature_at(&secret(), payload, &header, NOW);
        assert!(matches!(result, Err(StripeError::InvalidSignature(_))));
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(verify_signature_at(&secret(), b"{}", "v1=abc", NOW).is_err());
        assert!(verify_signature_at(&secret(), b"{}", &format!("t={NOW}"), NOW).is_err());
        assert!(verify_signature_at(&secret(), b"{}", "t=soon,v1=abc", NOW).is_err());
    }
}
