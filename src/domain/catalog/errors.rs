//! Catalog error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors raised while loading or querying the plan catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The tier is not configured. Never defaulted to a fallback tier.
    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    /// The catalog definition is inconsistent.
    #[error("Invalid catalog: {0}")]
    Invalid(String),

    /// The catalog file could not be read or parsed.
    #[error("Failed to load catalog: {0}")]
    Load(String),
}

impl From<CatalogError> for DomainError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::UnknownTier(tier) => {
                DomainError::new(ErrorCode::UnknownTier, err.to_string()).with_detail("tier", tier)
            }
            CatalogError::Invalid(_) => DomainError::validation("catalog", err.to_string()),
            CatalogError::Load(_) => DomainError::new(ErrorCode::InternalError, err.to_string()),
        }
    }
}
