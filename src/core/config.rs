//! Farmhand configuration: recipe root, cache directory and timeouts.
//!
//! Loaded from YAML; `FARMHAND_RECIPE_DIR` and `FARMHAND_CACHE_DIR` override
//! the file so a farmer can be pointed elsewhere without editing it.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `recipe_dir`.
pub const ENV_RECIPE_DIR: &str = "FARMHAND_RECIPE_DIR";

/// Environment variable overriding `cache_dir`.
pub const ENV_CACHE_DIR: &str = "FARMHAND_CACHE_DIR";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmhandConfig {
    /// Root of the recipe tree
    #[serde(default = "default_recipe_dir")]
    pub recipe_dir: PathBuf,

    /// Flat content-addressed cache for fetched artifacts
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Per-request HTTP timeout
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Optional deadline for each Test/Apply
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
}

fn default_recipe_dir() -> PathBuf {
    PathBuf::from("/srv/farmhand/recipes")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("/var/cache/farmhand")
}

fn default_http_timeout() -> u64 {
    30
}

impl Default for FarmhandConfig {
    fn default() -> Self {
        Self {
            recipe_dir: default_recipe_dir(),
            cache_dir: default_cache_dir(),
            http_timeout_secs: default_http_timeout(),
            step_timeout_secs: None,
        }
    }
}

impl FarmhandConfig {
    /// HTTP timeout as a `Duration`.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Step deadline as a `Duration`, if configured.
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_RECIPE_DIR) {
            self.recipe_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recipe_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("recipe_dir must not be empty".to_string()));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("cache_dir must not be empty".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a config from a YAML string.
pub fn parse_config(yaml: &str, origin: &Path) -> Result<FarmhandConfig, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(FarmhandConfig::default());
    }
    serde_yaml_ng::from_str(yaml).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })
}

/// Load a config file, apply environment overrides and validate.
///
/// A missing file is only an error when `required` is set.
pub fn load_config(path: &Path, required: bool) -> Result<FarmhandConfig, ConfigError> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content, path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            FarmhandConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
