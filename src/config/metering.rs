//! Metering backend selection.

use serde::Deserialize;

use super::error::ValidationError;

/// Where usage counters live.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeteringBackend {
    /// Process-local maps. Single instance only.
    #[default]
    Memory,
    Postgres,
    Redis,
}

/// Metering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MeteringConfig {
    #[serde(default)]
    pub backend: MeteringBackend,

    /// Internal retries on a lost compare-and-increment race
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

impl MeteringConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_conflict_retries == 0 || self.max_conflict_retries > 50 {
            return Err(ValidationError::InvalidConflictRetries);
        }
        Ok(())
    }
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            backend: MeteringBackend::default(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

fn default_max_conflict_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MeteringConfig::default();
        assert_eq!(config.backend, MeteringBackend::Memory);
        assert_eq!(config.max_conflict_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_parses_lowercase() {
        let backend: MeteringBackend = serde_json::from_str("\"redis\"").unwrap();
        assert_eq!(backend, MeteringBackend::Redis);
        assert!(serde_json::from_str::<MeteringBackend>("\"mysql\"").is_err());
    }

    #[test]
    fn test_conflict_retry_bounds() {
        let config = MeteringConfig {
            max_conflict_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
