//! Configuration module for Gradebook
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all optional values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GradebookError, Result};

/// Main configuration structure for Gradebook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Catalog query parameters
    pub catalog: CatalogConfig,

    /// Result shaping
    pub results: ResultsConfig,

    /// Dataset loaded by the binary
    pub dataset: DatasetConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GradebookError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| GradebookError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GradebookError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(GradebookError::Config(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        if !(0..=100).contains(&self.catalog.best_students_threshold) {
            return Err(GradebookError::Config(
                "best_students_threshold must be between 0 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

/// Parameters bound into catalog queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// A mark strictly above this score counts toward the best-students ranking
    pub best_students_threshold: i64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            best_students_threshold: 80,
        }
    }
}

/// Result shaping configuration, threaded into the result mapper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    /// How averaged scores become integers
    pub score_rounding: ScoreRounding,
}

/// Rounding applied to averaged scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreRounding {
    /// Truncate the fractional part
    #[default]
    TowardZero,
    /// Round to nearest, halves away from zero
    HalfUp,
}

/// Dataset location for the binary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// JSON file with the initial student collection
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.catalog.best_students_threshold, 80);
        assert_eq!(config.results.score_rounding, ScoreRounding::TowardZero);
        assert!(config.dataset.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::parse_str(
            r#"
            [logging]
            format = "json"

            [results]
            score_rounding = "half_up"
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.results.score_rounding, ScoreRounding::HalfUp);
        assert_eq!(config.catalog.best_students_threshold, 80);
    }

    #[test]
    fn test_parse_error() {
        let err = Config::parse_str("[catalog]\nbest_students_threshold = \"high\"").unwrap_err();
        assert!(matches!(err, GradebookError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.catalog.best_students_threshold = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut config = Config::default();
        config.catalog.best_students_threshold = 75;
        config.dataset.path = Some(PathBuf::from("students.json"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = Config::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/gradebook.toml")).unwrap_err();
        assert!(matches!(err, GradebookError::Config(_)));
    }
}
