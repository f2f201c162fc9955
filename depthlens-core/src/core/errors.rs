//! Error types for the depth pipeline.
//!
//! This module defines the errors that can occur while loading models, running
//! depth inference, post-processing depth maps and exporting rendered images.
//! Runtime-data edge cases (flat depth ranges, out-of-bounds pointer queries,
//! dimension rescaling) are absorbed by the processors and never reach this type;
//! what remains are user-visible failures and programming-contract violations.
//!
//! # Usage
//!
//! ```rust
//! use depthlens_core::core::errors::{DepthError, ProcessingStage};
//!
//! let error = DepthError::shape_mismatch(12, 11);
//! assert!(error.to_string().contains("12"));
//!
//! let config_error = DepthError::config_error("exposure must be non-negative");
//! assert!(matches!(config_error, DepthError::ConfigError { .. }));
//! ```

use thiserror::Error;

/// Convenient result alias for depth pipeline operations.
pub type DepthResult<T> = Result<T, DepthError>;

/// Enum representing different stages of processing in the depth pipeline.
///
/// Used to identify which stage a [`DepthError::Processing`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred while resampling a depth map.
    Resample,
    /// Error occurred while decoding a persisted image.
    Encoding,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Resample => write!(f, "resample"),
            ProcessingStage::Encoding => write!(f, "encoding"),
        }
    }
}

/// A plain message error used as the source of wrapped errors.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SimpleError(pub String);

impl SimpleError {
    /// Creates a new opaque error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Enum representing the errors that can occur in the depth pipeline.
#[derive(Error, Debug)]
pub enum DepthError {
    /// Error occurred while loading or decoding an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred while encoding an image for export.
    #[error("image encode: {context}")]
    ImageEncode {
        /// What was being encoded.
        context: String,
        /// The underlying encoder error.
        #[source]
        source: image::ImageError,
    },

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A depth buffer does not match the dimensions it claims to have.
    #[error("shape mismatch: expected {expected} depth values, got {actual}")]
    ShapeMismatch {
        /// `width * height` of the claimed shape.
        expected: usize,
        /// The actual buffer length.
        actual: usize,
    },

    /// Estimation was requested while no model handle exists.
    #[error("no model loaded")]
    NotReady,

    /// Estimation was requested while a handle exists but loading has not finished.
    #[error("model is not ready")]
    ModelNotLoaded,

    /// The inference engine failed to acquire a model.
    #[error("failed to load model '{model}' on {backend}: {message}")]
    ModelLoad {
        /// Source path of the model that failed to load.
        model: String,
        /// Backend identifier the load targeted.
        backend: String,
        /// Human-readable failure description.
        message: String,
        /// The underlying engine error, when there is one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A load was requested while another configuration is still loaded.
    #[error("model '{current}' is still loaded; release it before loading another configuration")]
    ModelAlreadyLoaded {
        /// Description of the configuration that is currently loaded.
        current: String,
    },

    /// A load completed after it had been superseded by a release or a newer load.
    #[error("model load for '{model}' was superseded")]
    LoadSuperseded {
        /// Source path of the superseded load.
        model: String,
    },

    /// Error occurred during inference.
    #[error("inference failed for model '{model_name}': {context}")]
    Inference {
        /// Name of the model that was running.
        model_name: String,
        /// Additional context about the failure.
        context: String,
        /// The underlying engine error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An image reference could not be resolved.
    #[error("unsupported image source: {source_ref}")]
    UnsupportedSource {
        /// The URL or path that could not be resolved.
        source_ref: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// Error occurred while serializing or deserializing persisted state.
    #[error("serialization: {message}")]
    Serialization {
        /// A message describing the serialization failure.
        message: String,
    },
}

impl DepthError {
    /// Internal helper to build a Processing error with minimal boilerplate.
    #[inline]
    fn processing_with_context(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a DepthError for processing operations.
    ///
    /// # Arguments
    ///
    /// * `kind` - The stage of processing where the error occurred.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    ///
    /// # Returns
    ///
    /// A DepthError instance.
    pub fn processing_error(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(kind, context, error)
    }

    /// Creates a DepthError for resampling operations.
    pub fn resample_error(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Resample, context, error)
    }

    /// Creates a DepthError for encoding failures.
    ///
    /// # Arguments
    ///
    /// * `context` - What was being encoded.
    /// * `error` - The underlying image crate error.
    ///
    /// # Returns
    ///
    /// A DepthError instance.
    pub fn image_encode(context: impl Into<String>, error: image::ImageError) -> Self {
        Self::ImageEncode {
            context: context.into(),
            source: error,
        }
    }

    /// Creates a DepthError for serialization failures.
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a shape mismatch error for a depth buffer.
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { expected, actual }
    }

    /// Creates a DepthError for a failed model acquisition.
    ///
    /// # Arguments
    ///
    /// * `model` - Source path of the model.
    /// * `backend` - Backend identifier.
    /// * `message` - Human-readable failure description.
    /// * `source` - The underlying engine error, when there is one.
    ///
    /// # Returns
    ///
    /// A DepthError instance.
    pub fn model_load_error(
        model: impl Into<String>,
        backend: impl Into<String>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ModelLoad {
            model: model.into(),
            backend: backend.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a DepthError for inference operations.
    ///
    /// # Arguments
    ///
    /// * `model_name` - The model that was running.
    /// * `context` - Additional context about the failure.
    /// * `error` - The underlying error that caused this error.
    ///
    /// # Returns
    ///
    /// A DepthError instance.
    pub fn inference_error(
        model_name: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a DepthError for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a DepthError for configuration errors.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Returns the message shown to users for this error.
    ///
    /// Readiness errors carry guidance on what to do next; everything else
    /// falls back to the display chain.
    pub fn user_message(&self) -> String {
        match self {
            DepthError::NotReady => "No model loaded. Please load a model first.".to_string(),
            DepthError::ModelNotLoaded => {
                "Model is not ready. Please wait for model to load.".to_string()
            }
            other => {
                let mut message = other.to_string();
                let mut source = std::error::Error::source(other);
                while let Some(cause) = source {
                    message.push_str(": ");
                    message.push_str(&cause.to_string());
                    source = cause.source();
                }
                message
            }
        }
    }
}

impl From<image::ImageError> for DepthError {
    fn from(error: image::ImageError) -> Self {
        DepthError::ImageLoad(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_stage_display() {
        assert_eq!(ProcessingStage::Resample.to_string(), "resample");
        assert_eq!(ProcessingStage::Encoding.to_string(), "encoding");
    }

    #[test]
    fn test_readiness_errors_are_distinct() {
        assert!(!matches!(DepthError::NotReady, DepthError::ModelNotLoaded));
        assert_ne!(
            DepthError::NotReady.user_message(),
            DepthError::ModelNotLoaded.user_message()
        );
        assert!(DepthError::NotReady.user_message().contains("load a model first"));
    }

    #[test]
    fn test_user_message_includes_source_chain() {
        let error = DepthError::inference_error(
            "depth-anything-v2-small",
            "forward pass",
            SimpleError::new("out of memory"),
        );
        let message = error.user_message();
        assert!(message.contains("forward pass"));
        assert!(message.contains("out of memory"));
    }

    #[test]
    fn test_model_load_error_display() {
        let error = DepthError::model_load_error(
            "onnx-community/depth-anything-v2-small",
            "webgpu",
            "adapter not found",
            None,
        );
        let text = error.to_string();
        assert!(text.contains("depth-anything-v2-small"));
        assert!(text.contains("webgpu"));
        assert!(text.contains("adapter not found"));
    }
}
