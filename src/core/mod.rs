//! The core module of the depth pipeline.
//!
//! This module contains the fundamental components of the pipeline:
//! - Capability detection for compute backends
//! - Configuration management
//! - Error handling (re-exported from `depthlens-core`)
//! - Inference engine integration
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod capability;
pub mod config;
pub mod inference;

pub use capability::{CapabilityDetector, CapabilityMap, Probe, ProbeResult};
pub use config::{ConfigError, ConfigLoader, ConfigValidator, ConfigValidatorExt, DepthLensConfig};
pub use depthlens_core::core::errors;
pub use depthlens_core::core::{DepthError, DepthResult, ProcessingStage, SimpleError};
pub use inference::{
    AcquireOptions, DepthModel, Disposable, ImageInput, ImageStore, InferenceEngine,
    LoadProgress, OrtDepthEngine, RawDepthTensor,
};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
