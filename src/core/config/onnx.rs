//! ONNX Runtime engine configuration.

use crate::core::config::{ConfigError, ConfigValidator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default square input resolution for Depth Anything style models.
pub const DEFAULT_INPUT_SIZE: u32 = 518;

/// Default number of bytes read per progress tick while loading model files.
pub const DEFAULT_READ_CHUNK_BYTES: usize = 1 << 20;

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
}

/// Configuration for the ONNX Runtime engine adapter.
///
/// Model files are resolved as `<model_root>/<source_path>/onnx/<file>`, where
/// the file name depends on the requested dtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrtEngineConfig {
    /// Directory containing one sub-directory per model source path.
    pub model_root: PathBuf,
    /// Square side length images are resized to before inference.
    pub input_size: u32,
    /// Bytes read per progress tick while loading a model file.
    pub read_chunk_bytes: usize,
    /// Number of threads used to parallelize execution within nodes.
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes.
    pub inter_threads: Option<usize>,
    /// Graph optimization level.
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Device index for GPU execution providers.
    pub device_id: Option<i32>,
}

impl Default for OrtEngineConfig {
    fn default() -> Self {
        Self {
            model_root: PathBuf::from("models"),
            input_size: DEFAULT_INPUT_SIZE,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            intra_threads: None,
            inter_threads: None,
            optimization_level: None,
            device_id: None,
        }
    }
}

impl OrtEngineConfig {
    pub fn new(model_root: impl Into<PathBuf>) -> Self {
        Self {
            model_root: model_root.into(),
            ..Self::default()
        }
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the graph optimization level.
    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    /// Sets the square model input size.
    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }
}

impl ConfigValidator for OrtEngineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_positive_usize(self.input_size as usize, "engine.input_size")?;
        self.validate_positive_usize(self.read_chunk_bytes, "engine.read_chunk_bytes")?;
        if let Some(threads) = self.intra_threads {
            self.validate_positive_usize(threads, "engine.intra_threads")?;
        }
        if let Some(threads) = self.inter_threads {
            self.validate_positive_usize(threads, "engine.inter_threads")?;
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
