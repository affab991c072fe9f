//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Account identifier supplied by the upstream authentication layer.
///
/// The engine never mints account ids; it only trusts the verified value
/// handed to it, so the only rule enforced here is non-emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates a new AccountId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("account_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Creates a new random SubscriptionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a SubscriptionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Idempotency key of a payment processor event.
///
/// Processor ids are opaque strings, so this is not a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingEventId(String);

impl BillingEventId {
    /// Creates a new BillingEventId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("event_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BillingEventId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BillingEventId::new(value)
    }
}

impl From<BillingEventId> for String {
    fn from(id: BillingEventId) -> Self {
        id.0
    }
}

impl fmt::Display for BillingEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_accepts_non_empty_value() {
        let id = AccountId::new("acct-123").unwrap();
        assert_eq!(id.as_str(), "acct-123");
        assert_eq!(format!("{}", id), "acct-123");
    }

    #[test]
    fn account_id_rejects_blank_value() {
        match AccountId::new("   ") {
            Err(ValidationError::EmptyField { field }) => assert_eq!(field, "account_id"),
            other => panic!("Expected EmptyField error, got {:?}", other),
        }
    }

    #[test]
    fn subscription_id_roundtrips_through_string() {
        let id = SubscriptionId::new();
        let parsed: SubscriptionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn subscription_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<SubscriptionId>().is_err());
    }

    #[test]
    fn billing_event_id_rejects_empty_value() {
        assert!(BillingEventId::new("").is_err());
        assert_eq!(BillingEventId::new("evt_1").unwrap().as_str(), "evt_1");
    }

    #[test]
    fn ids_serialize_transparently() {
        let account = AccountId::new("acct-9").unwrap();
        assert_eq!(serde_json::to_string(&account).unwrap(), "\"acct-9\"");

        let event: BillingEventId = serde_json::from_str("\"evt_42\"").unwrap();
        assert_eq!(event.as_str(), "evt_42");
        assert!(serde_json::from_str::<BillingEventId>("\"\"").is_err());
    }
}
