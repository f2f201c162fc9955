//! Core building blocks shared by the depth pipeline.
//!
//! - Error handling ([`DepthError`], [`DepthResult`], [`ProcessingStage`])
//! - Configuration validation ([`ConfigError`], [`ConfigValidator`])

pub mod config;
pub mod errors;

pub use config::{ConfigError, ConfigValidator, ConfigValidatorExt};
pub use errors::{DepthError, DepthResult, ProcessingStage, SimpleError};
