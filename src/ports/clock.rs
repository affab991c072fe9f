//! Clock port - source of "now" for every time-dependent decision.

use crate::domain::foundation::Timestamp;

/// Supplies the current instant.
///
/// Handlers never call `Timestamp::now()` directly, so period arithmetic
/// and retry scheduling can be driven deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
