//! Billing configuration: retry policy and webhook verification.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::billing::{RetryPolicy, WebhookVerifier, DEFAULT_MAX_EVENT_AGE_SECS};

use super::error::ValidationError;

/// Billing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Shared secret used to sign payment webhooks
    pub webhook_secret: SecretString,

    /// Failures in one episode before the subscription is canceled
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failure, in seconds
    #[serde(default = "default_base_delay")]
    pub retry_base_delay_secs: u64,

    /// Growth factor between successive retry delays
    #[serde(default = "default_multiplier")]
    pub retry_multiplier: u32,

    /// Upper bound on any single retry delay, in seconds
    #[serde(default = "default_max_delay")]
    pub retry_max_delay_secs: u64,

    /// Maximum age of a signed webhook timestamp, in seconds
    #[serde(default = "default_event_tolerance")]
    pub event_tolerance_secs: i64,
}

impl BillingConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy, ValidationError> {
        RetryPolicy::new(
            self.max_retries,
            self.retry_base_delay_secs,
            self.retry_multiplier,
            self.retry_max_delay_secs,
        )
        .map_err(|e| ValidationError::InvalidRetryPolicy(e.to_string()))
    }

    pub fn webhook_verifier(&self) -> WebhookVerifier {
        WebhookVerifier::new(self.webhook_secret.clone()).with_max_event_age(self.event_tolerance_secs)
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__WEBHOOK_SECRET"));
        }
        if self.event_tolerance_secs <= 0 || self.event_tolerance_secs > 86_400 {
            return Err(ValidationError::InvalidEventTolerance);
        }
        self.retry_policy()?;
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            webhook_secret: SecretString::new(String::new()),
            max_retries: policy.max_retries,
            retry_base_delay_secs: policy.base_delay_secs,
            retry_multiplier: policy.multiplier,
            retry_max_delay_secs: policy.max_delay_secs,
            event_tolerance_secs: default_event_tolerance(),
        }
    }
}

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_base_delay() -> u64 {
    RetryPolicy::default().base_delay_secs
}

fn default_multiplier() -> u32 {
    RetryPolicy::default().multiplier
}

fn default_max_delay() -> u64 {
    RetryPolicy::default().max_delay_secs
}

fn default_event_tolerance() -> i64 {
    DEFAULT_MAX_EVENT_AGE_SECS
}
