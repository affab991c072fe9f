//! HTTP adapter for the subscription engine.
//!
//! - `GET /api/subscription` - Current subscription
//! - `POST /api/subscription/{checkout,free,trial,tier,cancel,advance}` - Lifecycle commands
//! - `POST /api/access/:usage_type` - Check and consume quota
//! - `GET /api/usage` - Usage summary
//! - `GET /api/usage/:usage_type/history` - Usage history
//! - `POST /api/webhooks/payments` - Payment outcomes (signed)
//! - `POST /api/billing/retries/:subscription_id/:attempt/confirm` - Retry timer callback

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, SubscriptionAppState, VerifiedAccount};
pub use routes::subscription_router;
