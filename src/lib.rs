//! Subscription Engine - plan catalog, usage metering, subscription lifecycle
//! and billing retries for metered features.
//!
//! Feature modules ask one question, "may this account use this now?", through
//! [`application::handlers::CheckAccessHandler`]; the engine answers from the
//! account's subscription, its tier's quota and the current period's usage.

pub mod adapters;
pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
