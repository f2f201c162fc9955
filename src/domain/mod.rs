//! Domain types for the depth pipeline.
//!
//! The depth map and visualization settings live in `depthlens-core`; this
//! module adds the model, backend and precision catalogs.

pub mod catalog;

pub use catalog::{
    AVAILABLE_MODELS, BackendClass, ComputeBackend, DEFAULT_MODEL_ID, Dtype, ModelDescriptor,
    PrecisionLevel, can_model_be_loaded, find_model,
};
pub use depthlens_core::domain::{Adjustments, Colormap, DepthMap, VisualizationSettings};
