//! Report configuration, read from an optional TOML file.

use crate::data::DEFAULT_GOOD_STATUSES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CSV_PATH: &str = "financial_loan.csv";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Loan CSV, relative to the working directory unless absolute.
    pub csv_path: PathBuf,
    /// Rows shown in the details table.
    pub details_row_limit: usize,
    /// Purposes shown in the top-purposes chart.
    pub top_purposes: usize,
    /// Statuses classified as good loans.
    pub good_statuses: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            details_row_limit: 200,
            top_purposes: 10,
            good_statuses: DEFAULT_GOOD_STATUSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ReportConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = ReportConfig::from_toml_str("top_purposes = 5\n").unwrap();
        assert_eq!(config.top_purposes, 5);
        assert_eq!(config.details_row_limit, 200);
        assert_eq!(config.csv_path, PathBuf::from(DEFAULT_CSV_PATH));
        assert_eq!(config.good_statuses.len(), 4);
    }

    #[test]
    fn overrides_good_statuses() {
        let config = ReportConfig::from_toml_str(
            "csv_path = \"data/loans.csv\"\ngood_statuses = [\"Fully Paid\"]\n",
        )
        .unwrap();
        assert_eq!(config.csv_path, PathBuf::from("data/loans.csv"));
        assert_eq!(config.good_statuses, vec!["Fully Paid".to_string()]);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(matches!(
            ReportConfig::from_toml_str("details_row_limit = \"many\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ReportConfig::from_file("/definitely/not/here.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
