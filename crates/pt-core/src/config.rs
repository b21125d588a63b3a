//! Configuration structures for the project tracker.
//!
//! - [`TrackerConfig`] - Registry and solution-session behaviour
//! - [`LoadConfig`] - Deferred-load settings (active build configuration, parallelism)
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with missing
//! fields falling back to those defaults.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the project tracker.
///
/// # Examples
///
/// ```
/// use pt_core::TrackerConfig;
///
/// let config = TrackerConfig::default();
/// assert!(config.deferred_load);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Whether solutions are populated through the deferred-load pipeline.
    ///
    /// When the last solution was loaded this way, closing it disconnects
    /// every project that is still registered.
    pub deferred_load: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { deferred_load: true }
    }
}

/// Configuration for deferred project loading.
///
/// # Examples
///
/// ```
/// use pt_core::LoadConfig;
///
/// let config = LoadConfig::default();
/// assert_eq!(config.configuration_key(), "Debug|Any CPU");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Active solution configuration name (e.g. `Debug`).
    pub configuration: String,

    /// Active solution platform name (e.g. `Any CPU`).
    pub platform: String,

    /// Number of threads used to parse descriptor command lines.
    /// `None` means use the global rayon pool.
    pub batch_parallelism: Option<usize>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            configuration: "Debug".to_owned(),
            platform: "Any CPU".to_owned(),
            batch_parallelism: None,
        }
    }
}

impl LoadConfig {
    /// Returns the key identifying the active build configuration.
    ///
    /// This is the value handed to a descriptor provider.
    #[must_use]
    pub fn configuration_key(&self) -> String {
        format!("{}|{}", self.configuration, self.platform)
    }
}

/// Root configuration for the project tracker.
///
/// # Examples
///
/// ```
/// use pt_core::Config;
///
/// let config = Config::default();
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// assert!(json.contains("deferred_load"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tracker configuration.
    pub tracker: TrackerConfig,

    /// Deferred-load configuration.
    pub load: LoadConfig,
}

impl Config {
    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] if the file does not exist,
    /// [`ConfigError::Io`]/[`ConfigError::Parse`] if it cannot be read, and
    /// [`ConfigError::InvalidOption`] if a value fails validation.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_owned()));
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks option values that the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load.batch_parallelism == Some(0) {
            return Err(ConfigError::invalid_option(
                "load.batch_parallelism",
                "must be positive",
            ));
        }
        if self.load.configuration.is_empty() {
            return Err(ConfigError::invalid_option(
                "load.configuration",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_config_defaults() {
        let config = TrackerConfig::default();
        assert!(config.deferred_load);
    }

    #[test]
    fn test_load_config_key() {
        let config = LoadConfig {
            configuration: "Release".to_owned(),
            platform: "x64".to_owned(),
            batch_parallelism: None,
        };
        assert_eq!(config.configuration_key(), "Release|x64");
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"load": {"configuration": "Release"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.load.configuration, "Release");
        assert_eq!(config.load.platform, "Any CPU");
        assert!(config.tracker.deferred_load);
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let mut config = Config::default();
        config.load.batch_parallelism = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_parallelism"));
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = Config::from_json_file(Utf8Path::new("/nonexistent/projtrack.json"));
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));
    }
}
