//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `clock` - System and fixed clocks
//! - `http` - Axum REST API
//! - `memory` - In-process stores (tests, single-node deployments)
//! - `postgres` - PostgreSQL repositories and usage store
//! - `redis` - Redis usage counters (Lua compare-and-increment)

pub mod clock;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod redis;

pub use clock::{FixedClock, SystemClock};
