//! # depthlens
//!
//! Monocular depth estimation for still images using ONNX models.
//!
//! ## Features
//!
//! - Model catalog with per-backend and per-precision loading
//! - Model lifecycle management with byte-level load progress
//! - Inference orchestration that returns depth at the image's own resolution
//! - Grayscale and colormap rendering with tonal adjustments
//! - Pointer depth lookups, point-cloud projection and PNG export
//! - ONNX Runtime integration with optional GPU execution providers
//!
//! ## Modules
//!
//! * [`core`] - Error handling, configuration, capability detection and inference engines
//! * [`domain`] - Model, backend and precision catalogs plus depth map types
//! * [`pipeline`] - Lifecycle manager, estimator, visualization state and the session controller
//! * [`processors`] - Depth post-processing (normalization, colormaps, resampling, export)
//! * [`utils`] - Progress formatting and canvas persistence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use depthlens::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = DepthSession::with_ort(DepthLensConfig::default())?;
//! session.select_model("depth-anything-v2-small")?;
//! session.load_selected()?;
//!
//! let depth = session.estimate(std::path::PathBuf::from("photo.jpg"))?;
//! println!("{}x{} depth map", depth.width(), depth.height());
//!
//! session.export(ImageVariant::Colored, std::path::Path::new("out"), 0)?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod pipeline;
pub mod utils;

pub use depthlens_core::processors;

/// Prelude module for convenient imports.
///
/// ```rust
/// use depthlens::prelude::*;
/// ```
///
/// For engine integration and lower-level processing, import directly from
/// `depthlens::core::inference` and `depthlens::processors`.
pub mod prelude {
    // Session
    pub use crate::pipeline::{
        DepthSession, ImageVariant, LoadState, PipelineEvent, PipelineState, RenderOutcome,
    };

    // Configuration
    pub use crate::core::config::{ConfigLoader, DepthLensConfig};

    // Error Handling
    pub use crate::core::{DepthError, DepthResult};

    // Domain types
    pub use crate::domain::{
        Colormap, ComputeBackend, DepthMap, PrecisionLevel, VisualizationSettings,
    };
}
