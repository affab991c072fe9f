//! Plan catalog source.

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::catalog::{CatalogError, PlanCatalog};

use super::error::ValidationError;

/// Catalog configuration. Without a path the built-in catalog is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// YAML file describing the plans
    pub path: Option<PathBuf>,
}

impl CatalogConfig {
    pub fn load(&self) -> Result<PlanCatalog, CatalogError> {
        match &self.path {
            Some(path) => PlanCatalog::from_file(path),
            None => Ok(PlanCatalog::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(path) = &self.path {
            if !path.is_file() {
                return Err(ValidationError::CatalogFileMissing(path.display().to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_uses_builtin_catalog() {
        let config = CatalogConfig::default();
        assert!(config.validate().is_ok());
        let catalog = config.load().unwrap();
        assert!(!catalog.plans().is_empty());
    }

    #[test]
    fn test_missing_file_fails_validation() {
        let config = CatalogConfig {
            path: Some(PathBuf::from("/nonexistent/catalog.yaml")),
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::CatalogFileMissing(_))
        ));
    }

    #[test]
    fn test_loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
plans:
  - tier: free
    display_name: Free
    rank: 0
    monthly_price: 0
    yearly_price: 0
    quotas:
      ai_query: 5
"#,
        )
        .unwrap();

        let config = CatalogConfig {
            path: Some(file.path().to_path_buf()),
        };
        assert!(config.validate().is_ok());
        let catalog = config.load().unwrap();
        assert_eq!(catalog.plans().len(), 1);
    }
}
