//! When a requested change takes effect.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTiming {
    /// Right away, inside the current period.
    #[default]
    Immediate,
    /// At the next period boundary.
    AtPeriodEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_parses_from_json() {
        let timing: ChangeTiming = serde_json::from_str("\"at_period_end\"").unwrap();
        assert_eq!(timing, ChangeTiming::AtPeriodEnd);
        assert_eq!(ChangeTiming::default(), ChangeTiming::Immediate);
    }
}
