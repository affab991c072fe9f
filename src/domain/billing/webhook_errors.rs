//! Errors raised while authenticating and decoding payment webhooks.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur before a payment outcome reaches the coordinator.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing from the request.
    #[error("Missing signature header")]
    MissingSignature,

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is older than the accepted window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse the signature header or the JSON payload.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl WebhookError {
    /// Maps the error to the status returned to the processor.
    ///
    /// Every variant is a 4xx: redelivering the same bytes cannot succeed.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidTimestamp | WebhookError::ParseError(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                "INVALID_WEBHOOK_SIGNATURE"
            }
            WebhookError::TimestampOutOfRange | WebhookError::InvalidTimestamp => {
                "WEBHOOK_TIMESTAMP_REJECTED"
            }
            WebhookError::ParseError(_) => "BAD_REQUEST",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_displays_message() {
        let err = WebhookError::ParseError("invalid JSON".to_string());
        assert_eq!(format!("{}", err), "Parse error: invalid JSON");
    }

    #[test]
    fn signature_failures_return_unauthorized() {
        assert_eq!(WebhookError::InvalidSignature.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(WebhookError::MissingSignature.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(WebhookError::TimestampOutOfRange.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn malformed_requests_return_bad_request() {
        assert_eq!(WebhookError::InvalidTimestamp.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            WebhookError::ParseError("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn signature_failures_share_a_code() {
        assert_eq!(WebhookError::MissingSignature.code(), "INVALID_WEBHOOK_SIGNATURE");
        assert_eq!(WebhookError::InvalidSignature.code(), "INVALID_WEBHOOK_SIGNATURE");
    }
}
