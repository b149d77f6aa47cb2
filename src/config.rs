//! Typed configuration for a review session.
//!
//! ```yaml
//! labeller:
//!   db_username: reviewer
//!   db_password: secret
//!   db_host: db.example.org
//!   db_name: labeller
//! review:
//!   grid_half_width: 0.0025
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::geometry::DEFAULT_HALF_WIDTH;
use crate::imagery::wms::DEFAULT_WMS_BASE_URL;

const DEFAULT_DB_PORT: u16 = 5432;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub labeller: DatabaseConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

/// Credentials for the labeling database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub db_username: String,
    pub db_password: String,
    pub db_host: String,
    pub db_name: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
}

/// Site-specific display parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Half-width of the sampling grid cell, in degrees.
    pub grid_half_width: f64,
    pub wms_base_url: String,
    /// Maximum cloud coverage passed to the WMS service.
    pub maxcc: u8,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            grid_half_width: DEFAULT_HALF_WIDTH,
            wms_base_url: DEFAULT_WMS_BASE_URL.to_string(),
            maxcc: 100,
        }
    }
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        let db = &self.labeller;
        for (field, value) in [
            ("db_username", &db.db_username),
            ("db_host", &db.db_host),
            ("db_name", &db.db_name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("labeller.{field} is empty")));
            }
        }

        let w = self.review.grid_half_width;
        if !(w.is_finite() && w > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "review.grid_half_width must be positive, got {w}"
            )));
        }
        if self.review.maxcc > 100 {
            return Err(Error::InvalidConfig(format!(
                "review.maxcc must be within 0..=100, got {}",
                self.review.maxcc
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
labeller:
  db_username: reviewer
  db_password: secret
  db_host: localhost
  db_name: labeller
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.labeller.db_username, "reviewer");
        assert_eq!(config.labeller.db_port, 5432);
        assert_eq!(config.review.grid_half_width, 0.0025);
        assert_eq!(config.review.maxcc, 100);
        assert!(config.review.wms_base_url.starts_with("https://services.sentinel-hub.com"));
    }

    #[test]
    fn test_review_section_overrides() {
        let yaml = format!("{MINIMAL}review:\n  grid_half_width: 0.01\n  maxcc: 20\n");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.review.grid_half_width, 0.01);
        assert_eq!(config.review.maxcc, 20);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let yaml = "labeller:\n  db_username: reviewer\n  db_password: x\n  db_host: localhost\n";
        assert!(matches!(Config::from_yaml(yaml), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_empty_host_fails_validation() {
        let yaml = MINIMAL.replace("localhost", "\"\"");
        match Config::from_yaml(&yaml) {
            Err(Error::InvalidConfig(msg)) => assert!(msg.contains("db_host")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_half_width_fails_validation() {
        let yaml = format!("{MINIMAL}review:\n  grid_half_width: 0\n");
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, MINIMAL).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.labeller.db_name, "labeller");
    }
}
