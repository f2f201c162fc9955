//! Configuration management for the depth pipeline.
//!
//! [`DepthLensConfig`] groups one section per component. Every section is
//! serde-(de)serialisable with defaults for missing fields, so partial TOML or
//! JSON files are accepted; [`ConfigLoader`] reads and writes both formats.

pub mod loader;
pub mod onnx;

pub use depthlens_core::core::config::{ConfigError, ConfigValidator, ConfigValidatorExt};
pub use loader::{ConfigFormat, ConfigLoader};
pub use onnx::{OrtEngineConfig, OrtGraphOptimizationLevel};

use crate::domain::{
    ComputeBackend, DEFAULT_MODEL_ID, PrecisionLevel, VisualizationSettings, can_model_be_loaded,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of the model lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Pause between installing a handle and reporting the model as loaded.
    pub finalize_delay_ms: u64,
    /// How long load progress stays visible after completion.
    pub progress_clear_delay_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            finalize_delay_ms: 200,
            progress_clear_delay_ms: 2000,
        }
    }
}

impl LifecycleConfig {
    pub fn finalize_delay(&self) -> Duration {
        Duration::from_millis(self.finalize_delay_ms)
    }

    pub fn progress_clear_delay(&self) -> Duration {
        Duration::from_millis(self.progress_clear_delay_ms)
    }
}

/// Timing of the inference orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// How long estimation progress stays visible after a call finishes.
    pub progress_clear_delay_ms: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            progress_clear_delay_ms: 1000,
        }
    }
}

impl EstimatorConfig {
    pub fn progress_clear_delay(&self) -> Duration {
        Duration::from_millis(self.progress_clear_delay_ms)
    }
}

/// Initial selection of the session controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub model_id: String,
    pub backend: ComputeBackend,
    pub precision: PrecisionLevel,
    /// Load the selection automatically whenever it changes.
    pub auto_load: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            backend: ComputeBackend::Wasm,
            precision: PrecisionLevel::Fp16,
            auto_load: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthLensConfig {
    pub lifecycle: LifecycleConfig,
    pub estimator: EstimatorConfig,
    pub visualization: VisualizationSettings,
    pub engine: OrtEngineConfig,
    pub session: SessionConfig,
}

impl ConfigValidator for DepthLensConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !can_model_be_loaded(&self.session.model_id) {
            return Err(ConfigError::InvalidConfig {
                message: format!("unknown model id '{}'", self.session.model_id),
            });
        }
        self.visualization.validate()?;
        self.engine.validate()?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DepthLensConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lifecycle.finalize_delay(), Duration::from_millis(200));
        assert_eq!(config.lifecycle.progress_clear_delay(), Duration::from_secs(2));
        assert_eq!(config.estimator.progress_clear_delay(), Duration::from_secs(1));
        assert_eq!(config.session.backend, ComputeBackend::Wasm);
        assert_eq!(config.session.precision, PrecisionLevel::Fp16);
        assert!(!config.session.auto_load);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let mut config = DepthLensConfig::default();
        config.session.model_id = "zoedepth".to_string();
        assert!(config.validate().is_err());
    }
}
