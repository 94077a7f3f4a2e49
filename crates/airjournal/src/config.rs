//! Configuration management for airjournal.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::aggregate::{DEFAULT_BEST_AIR_THRESHOLD, DEFAULT_WINDOW_DAYS};
use crate::aqi::Aqi;
use crate::error::{Error, Result};
use crate::record::RecordKind;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "airjournal";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "journal.db";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "AIRJOURNAL_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `AIRJOURNAL_`, sections split
///    by `__`, e.g. `AIRJOURNAL_STATS__WINDOW_DAYS`)
/// 2. TOML config file at `~/.config/airjournal/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store configuration.
    pub store: StoreConfig,
    /// Statistics configuration.
    pub stats: StatsConfig,
}

/// Where records live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/airjournal/journal.db`
    pub database_path: Option<PathBuf>,
    /// Collection holding activity entries.
    pub activity_collection: String,
    /// Collection holding place markers.
    pub place_collection: String,
}

/// How summaries are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Length of the recent-activity window in days.
    pub window_days: u32,
    /// AQI at or below which air counts as good.
    pub best_air_threshold: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved at runtime
            activity_collection: RecordKind::Activity.default_collection().to_string(),
            place_collection: RecordKind::Place.default_collection().to_string(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            best_air_threshold: DEFAULT_BEST_AIR_THRESHOLD,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults and the environment apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation
    /// fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load only defaults and one TOML file, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load_file(config_path: &Path) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path).nested())
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        for (key, name) in [
            ("activity_collection", &self.store.activity_collection),
            ("place_collection", &self.store.place_collection),
        ] {
            if name.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("{key} cannot be empty"),
                });
            }
            if name.contains('/') {
                return Err(Error::ConfigValidation {
                    message: format!("{key} cannot contain '/': {name}"),
                });
            }
        }

        if self.store.activity_collection == self.store.place_collection {
            return Err(Error::ConfigValidation {
                message: format!(
                    "activity_collection and place_collection must differ (both are '{}')",
                    self.store.activity_collection
                ),
            });
        }

        if self.stats.window_days == 0 {
            return Err(Error::ConfigValidation {
                message: "window_days must be greater than 0".to_string(),
            });
        }

        if self.stats.best_air_threshold > Aqi::MAX.value() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "best_air_threshold ({}) cannot exceed {}",
                    self.stats.best_air_threshold,
                    Aqi::MAX
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Collection configured for a record kind.
    #[must_use]
    pub fn collection(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Activity => &self.store.activity_collection,
            RecordKind::Place => &self.store.place_collection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_temp_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "airjournal_config_test_{}_{name}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.store.database_path.is_none());
        assert_eq!(config.store.activity_collection, "activity_entries");
        assert_eq!(config.store.place_collection, "place_markers");
        assert_eq!(config.stats.window_days, 7);
        assert_eq!(config.stats.best_air_threshold, 100);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_collection() {
        let mut config = Config::default();
        config.store.place_collection = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("place_collection"));
    }

    #[test]
    fn test_validate_nested_collection() {
        let mut config = Config::default();
        config.store.activity_collection = "users/activity".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("cannot contain '/'"));
    }

    #[test]
    fn test_validate_same_collection() {
        let mut config = Config::default();
        config.store.place_collection = "activity_entries".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must differ"));
    }

    #[test]
    fn test_validate_zero_window() {
        let mut config = Config::default();
        config.stats.window_days = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("window_days"));
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut config = Config::default();
        config.stats.best_air_threshold = 500;
        assert!(config.validate().is_ok());

        config.stats.best_air_threshold = 501;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("best_air_threshold"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("journal.db"));
        assert!(path.to_string_lossy().contains("airjournal"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.store.database_path = Some(PathBuf::from("/custom/path/journal.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/journal.sqlite")
        );
    }

    #[test]
    fn test_collection_by_kind() {
        let mut config = Config::default();
        config.store.place_collection = "lokasi".to_string();

        assert_eq!(config.collection(RecordKind::Activity), "activity_entries");
        assert_eq!(config.collection(RecordKind::Place), "lokasi");
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let path = write_temp_config(
            "overrides",
            r#"
            [stats]
            window_days = 30

            [store]
            place_collection = "locations"
            "#,
        );

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.stats.window_days, 30);
        assert_eq!(config.stats.best_air_threshold, 100);
        assert_eq!(config.store.place_collection, "locations");
        assert_eq!(config.store.activity_collection, "activity_entries");

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_file_rejects_invalid_values() {
        let path = write_temp_config("invalid", "[stats]\nwindow_days = 0\n");

        let err = Config::load_file(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_file_rejects_bad_types() {
        let path = write_temp_config("types", "[stats]\nwindow_days = \"weekly\"\n");

        let err = Config::load_file(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigLoad(_)));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("airjournal_no_such_dir/config.toml");
        let config = Config::load_file(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_serializes_to_toml_shape() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(value["stats"]["window_days"], 7);
        assert_eq!(value["store"]["activity_collection"], "activity_entries");
    }
}
