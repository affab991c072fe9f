//! Subscription status state machine.
//!
//! The whole transition table lives here; every status change on the
//! aggregate goes through [`StateMachine::transition_to`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Billing state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Checkout started, first payment not yet confirmed. No access.
    Incomplete,

    /// Free trial running. Full access on the trial tier until it ends.
    Trialing,

    /// Paid (or free tier) and in good standing.
    Active,

    /// A charge failed and retries are pending. Access continues.
    PastDue,

    /// Ended. Terminal; the account must start a new subscription.
    Canceled,
}

impl SubscriptionStatus {
    /// Returns true if metered features may be used in this state.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::PastDue | SubscriptionStatus::Trialing
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From INCOMPLETE
            (Incomplete, Active)
                | (Incomplete, Canceled) // Abandoned checkout
            // From TRIALING
                | (Trialing, Active) // Converted
                | (Trialing, PastDue) // Conversion charge failed
                | (Trialing, Canceled)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, PastDue)
                | (Active, Canceled)
            // From PAST_DUE
                | (PastDue, PastDue) // Another failed retry
                | (PastDue, Active)
                | (PastDue, Canceled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Incomplete => vec![Active, Canceled],
            Trialing => vec![Active, PastDue, Canceled],
            Active => vec![Active, PastDue, Canceled],
            PastDue => vec![PastDue, Active, Canceled],
            Canceled => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubscriptionStatus::*;

    const ALL: [SubscriptionStatus; 5] = [Incomplete, Trialing, Active, PastDue, Canceled];

    #[test]
    fn incomplete_activates_on_first_payment() {
        assert_eq!(Incomplete.transition_to(Active), Ok(Active));
    }

    #[test]
    fn incomplete_cannot_go_past_due() {
        assert!(Incomplete.transition_to(PastDue).is_err());
    }

    #[test]
    fn active_can_renew_to_active() {
        assert_eq!(Active.transition_to(Active), Ok(Active));
    }

    #[test]
    fn past_due_recovers_or_cancels() {
        assert_eq!(PastDue.transition_to(Active), Ok(Active));
        assert_eq!(PastDue.transition_to(Canceled), Ok(Canceled));
    }

    #[test]
    fn canceled_is_terminal() {
        assert!(Canceled.is_terminal());
        for target in ALL {
            assert!(Canceled.transition_to(target).is_err());
        }
    }

    #[test]
    fn only_canceled_is_terminal() {
        for status in ALL {
            assert_eq!(status.is_terminal(), status == Canceled);
        }
    }

    #[test]
    fn access_follows_status() {
        assert!(Active.grants_access());
        assert!(PastDue.grants_access());
        assert!(Trialing.grants_access());
        assert!(!Incomplete.grants_access());
        assert!(!Canceled.grants_access());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(&to),
                    from.valid_transitions().contains(&to),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn status_parses_storage_names() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert!("expired".parse::<SubscriptionStatus>().is_err());
    }
}
