//! Configuration file loading.
//!
//! Reads and writes [`DepthLensConfig`] as TOML or JSON, picking the format
//! from the file extension.

use super::{ConfigValidatorExt, DepthLensConfig};
use crate::core::{DepthError, DepthResult};
use std::path::Path;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn format_for(path: &Path) -> DepthResult<ConfigFormat> {
    ConfigFormat::from_extension(path).ok_or_else(|| {
        DepthError::config_error(format!(
            "Unsupported config file extension: {:?}",
            path.extension()
        ))
    })
}

/// Configuration loader for the depth pipeline
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a file, auto-detecting the format from the extension
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use depthlens::core::config::ConfigLoader;
    /// use std::path::Path;
    ///
    /// let config = ConfigLoader::load_from_file(Path::new("depthlens.toml"))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_file(path: &Path) -> DepthResult<DepthLensConfig> {
        let format = format_for(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            DepthError::config_error(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::load_from_string(&content, format)?;
        tracing::debug!(path = %path.display(), ?format, "Loaded configuration");
        config.validate_and_wrap()
    }

    /// Load configuration from a string with specified format
    pub fn load_from_string(content: &str, format: ConfigFormat) -> DepthResult<DepthLensConfig> {
        match format {
            ConfigFormat::Toml => Self::load_from_toml(content),
            ConfigFormat::Json => Self::load_from_json(content),
        }
    }

    /// Load configuration from TOML string
    pub fn load_from_toml(content: &str) -> DepthResult<DepthLensConfig> {
        toml::from_str(content)
            .map_err(|e| DepthError::config_error(format!("Failed to parse TOML config: {e}")))
    }

    /// Load configuration from JSON string
    pub fn load_from_json(content: &str) -> DepthResult<DepthLensConfig> {
        serde_json::from_str(content)
            .map_err(|e| DepthError::config_error(format!("Failed to parse JSON config: {e}")))
    }

    /// Save configuration to a file, auto-detecting the format from the extension
    pub fn save_to_file(config: &DepthLensConfig, path: &Path) -> DepthResult<()> {
        let format = format_for(path)?;
        let content = Self::save_to_string(config, format)?;
        std::fs::write(path, content).map_err(|e| {
            DepthError::config_error(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Save configuration to string with specified format
    pub fn save_to_string(config: &DepthLensConfig, format: ConfigFormat) -> DepthResult<String> {
        match format {
            ConfigFormat::Toml => Self::save_to_toml(config),
            ConfigFormat::Json => Self::save_to_json(config),
        }
    }

    /// Save configuration to TOML string
    pub fn save_to_toml(config: &DepthLensConfig) -> DepthResult<String> {
        toml::to_string_pretty(config).map_err(|e| {
            DepthError::config_error(format!("Failed to serialize config to TOML: {e}"))
        })
    }

    /// Save configuration to JSON string
    pub fn save_to_json(config: &DepthLensConfig) -> DepthResult<String> {
        serde_json::to_string_pretty(config).map_err(|e| {
            DepthError::config_error(format!("Failed to serialize config to JSON: {e}"))
        })
    }
}
