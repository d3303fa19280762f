//! Configuration file support for Vitals.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/vitals/config.toml`,
//! or from the file named by `VITALS_CONFIG` when that variable is set.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV_VAR: &str = "VITALS_CONFIG";

/// Largest accepted `default_range_days` (roughly a century)
pub const MAX_RANGE_DAYS: u32 = 36_600;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Rendering defaults for the range view
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Days before the end date covered when no start date is given
    #[serde(default = "default_range_days")]
    pub default_range_days: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_range_days: default_range_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("vitals")
}

fn default_range_days() -> u32 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the config file path, honouring `VITALS_CONFIG`
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }

        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("vitals").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.data.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("data_dir cannot be empty".into()));
        }
        if self.display.default_range_days > MAX_RANGE_DAYS {
            return Err(Error::Config(format!(
                "default_range_days must be at most {}, got {}",
                MAX_RANGE_DAYS, self.display.default_range_days
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.data.data_dir.ends_with("vitals"));
        assert_eq!(config.display.default_range_days, 30);
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().join("data");
        config.display.default_range_days = 14;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.data.data_dir, temp_dir.path().join("data"));
        assert_eq!(loaded.display.default_range_days, 14);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[display]
default_range_days = 7
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.display.default_range_days, 7);
        assert!(config.data.data_dir.ends_with("vitals")); // default
    }

    #[test]
    fn test_empty_data_dir_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[data]\ndata_dir = \"\"\n").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_oversized_range_window_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[display]\ndefault_range_days = 4000000000\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, format!("[display]\ndefault_range_days = {}\n", MAX_RANGE_DAYS))
            .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.display.default_range_days, MAX_RANGE_DAYS);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[display\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Toml(_))));
    }
}
