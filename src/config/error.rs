//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Cannot bind to {0}")]
    InvalidBindAddress(String),

    #[error("Timeout must be positive (request timeout at most 300s)")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool needs max_connections >= min_connections and at least one connection")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("Webhook event tolerance must be between 1 and 86400 seconds")]
    InvalidEventTolerance,

    #[error("Conflict retry bound must be between 1 and 50")]
    InvalidConflictRetries,

    #[error("Invalid trial configuration: {0}")]
    InvalidTrial(String),

    #[error("Catalog file not found: {0}")]
    CatalogFileMissing(String),
}
