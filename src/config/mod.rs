//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `METERING` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use subscription_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr().unwrap());
//! ```

mod billing;
mod catalog;
mod database;
mod error;
mod metering;
mod redis;
mod server;
mod trial;

pub use billing::BillingConfig;
pub use catalog::CatalogConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use metering::{MeteringBackend, MeteringConfig};
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};
pub use trial::TrialConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
/// Only `billing.webhook_secret` is always required; `database` and `redis`
/// are required by the metering backend that uses them.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection, used by the `postgres` backend
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Redis connection, used by the `redis` backend
    #[serde(default)]
    pub redis: RedisConfig,

    /// Retry policy and webhook verification
    pub billing: BillingConfig,

    #[serde(default)]
    pub metering: MeteringConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub trial: TrialConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `METERING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `METERING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `METERING__BILLING__MAX_RETRIES=5` -> `billing.max_retries = 5`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("METERING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Connection settings are only checked for the backend that needs them.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.billing.validate()?;
        self.metering.validate()?;
        self.catalog.validate()?;
        self.trial.validate()?;
        self.redis.validate()?;

        match self.metering.backend {
            MeteringBackend::Memory => {}
            MeteringBackend::Postgres => self.database.validate()?,
            MeteringBackend::Redis => {
                if !self.redis.is_configured() {
                    return Err(ValidationError::MissingRequired("REDIS__URL"));
                }
                // Subscriptions and the billing ledger still live in Postgres.
                self.database.validate()?;
            }
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
