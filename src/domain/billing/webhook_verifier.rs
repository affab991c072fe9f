//! Payment webhook signature verification.
//!
//! Signatures are HMAC-SHA256 over `"{t}.{body}"`, carried in a header of
//! the form `t=<unix>,v1=<hex>`. The signed timestamp must be recent.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;

use super::webhook_errors::WebhookError;
use super::PaymentOutcome;

/// Default maximum age for webhook events (5 minutes).
pub const DEFAULT_MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components of the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// HMAC-SHA256 signature bytes.
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<signature>`. Unknown keys are ignored.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        let v1_signature = v1_signature
            .ok_or_else(|| WebhookError::ParseError("missing v1 signature".to_string()))?;

        Ok(SignatureHeader {
            timestamp,
            v1_signature,
        })
    }
}

/// Verifier for payment processor webhooks.
pub struct WebhookVerifier {
    secret: SecretString,
    max_event_age_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            max_event_age_secs: DEFAULT_MAX_EVENT_AGE_SECS,
        }
    }

    /// Overrides how old a signed timestamp may be before it is rejected.
    pub fn with_max_event_age(mut self, secs: i64) -> Self {
        self.max_event_age_secs = secs;
        self
    }

    /// Verifies the signature, then decodes the payment outcome.
    ///
    /// The payload is only parsed after the signature checks out.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: Timestamp,
    ) -> Result<PaymentOutcome, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        validate_timestamp(header.timestamp, now, self.max_event_age_secs)?;

        let expected = self.compute_signature(header.timestamp, payload)?;
        if !constant_time_compare(&expected, &header.v1_signature) {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn validate_timestamp(timestamp: i64, now: Timestamp, max_age: i64) -> Result<(), WebhookError> {
    let age = now.as_unix_secs() - timestamp;

    if age > max_age {
        return Err(WebhookError::TimestampOutOfRange);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::InvalidTimestamp);
    }
    Ok(())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Signs a payload the way the processor does. Used by tests and local tooling.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::ChargeKind;

    const TEST_SECRET: &str = "whsec_test_secret_12345";

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::new(TEST_SECRET.to_string()))
    }

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_707_523_200).unwrap()
    }

    fn payload() -> String {
        serde_json::json!({
            "event_id": "evt_1",
            "subscription_id": "6f1c2a3e-8d1b-4c57-9a1e-3f0b2c4d5e6f",
            "success": true,
            "charge_kind": "renewal",
            "occurred_at": "2024-02-10T00:00:00Z"
        })
        .to_string()
    }

    #[test]
    fn parse_header_with_v1() {
        let header = SignatureHeader::parse(&format!("t=1234567890,v1={}", "a".repeat(64))).unwrap();
        assert_eq!(header.timestamp, 1234567890);
        assert_eq!(header.v1_signature.len(), 32);
    }

    #[test]
    fn parse_header_ignores_unknown_fields() {
        let header =
            SignatureHeader::parse(&format!("t=1,v1={},v0=legacy,scheme=hmac", "a".repeat(64)))
                .unwrap();
        assert_eq!(header.timestamp, 1);
    }

    #[test]
    fn parse_header_rejects_malformed_input() {
        assert!(matches!(SignatureHeader::parse("t=1"), Err(WebhookError::ParseError(_))));
        assert!(matches!(
            SignatureHeader::parse(&format!("v1={}", "a".repeat(64))),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("t=1,v1=not_hex"),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(SignatureHeader::parse("t1"), Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn valid_signature_yields_outcome() {
        let body = payload();
        let header = sign_payload(TEST_SECRET, now().as_unix_secs(), body.as_bytes()).unwrap();

        let outcome = verifier().verify_and_parse(body.as_bytes(), &header, now()).unwrap();

        assert_eq!(outcome.event_id.as_str(), "evt_1");
        assert_eq!(outcome.charge_kind, ChargeKind::Renewal);
        assert!(outcome.success);
    }

    #[test]
    fn wrong_secret_fails() {
        let body = payload();
        let header = sign_payload("other", now().as_unix_secs(), body.as_bytes()).unwrap();

        let result = verifier().verify_and_parse(body.as_bytes(), &header, now());
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn tampered_payload_fails() {
        let body = payload();
        let header = sign_payload(TEST_SECRET, now().as_unix_secs(), body.as_bytes()).unwrap();
        let tampered = body.replace("\"success\":true", "\"success\":false");

        let result = verifier().verify_and_parse(tampered.as_bytes(), &header, now());
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn stale_timestamp_fails() {
        let body = payload();
        let signed_at = now().as_unix_secs() - 301;
        let header = sign_payload(TEST_SECRET, signed_at, body.as_bytes()).unwrap();

        let result = verifier().verify_and_parse(body.as_bytes(), &header, now());
        assert!(matches!(result, Err(WebhookError::TimestampOutOfRange)));
    }

    #[test]
    fn timestamp_window_boundaries() {
        let now = now();
        let max = DEFAULT_MAX_EVENT_AGE_SECS;
        assert!(validate_timestamp(now.as_unix_secs() - 300, now, max).is_ok());
        assert!(validate_timestamp(now.as_unix_secs() + 30, now, max).is_ok());
        assert!(matches!(
            validate_timestamp(now.as_unix_secs() + 120, now, max),
            Err(WebhookError::InvalidTimestamp)
        ));
    }

    #[test]
    fn custom_event_age_widens_window() {
        let body = payload();
        let signed_at = now().as_unix_secs() - 900;
        let header = sign_payload(TEST_SECRET, signed_at, body.as_bytes()).unwrap();

        let strict = verifier().verify_and_parse(body.as_bytes(), &header, now());
        assert!(matches!(strict, Err(WebhookError::TimestampOutOfRange)));

        let relaxed = verifier()
            .with_max_event_age(1_800)
            .verify_and_parse(body.as_bytes(), &header, now());
        assert!(relaxed.is_ok());
    }

    #[test]
    fn signed_garbage_is_a_parse_error() {
        let body = b"not valid json";
        let header = sign_payload(TEST_SECRET, now().as_unix_secs(), body).unwrap();

        let result = verifier().verify_and_parse(body, &header, now());
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn constant_time_compare_checks_length_and_content() {
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_compare(&[1, 2], &[1, 2, 3]));
    }
}
