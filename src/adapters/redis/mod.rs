//! Redis adapters.
//!
//! - `RedisUsageStore` - Usage counters with Lua compare-and-increment

mod usage_store;

pub use usage_store::RedisUsageStore;
