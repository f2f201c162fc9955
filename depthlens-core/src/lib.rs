//! # depthlens core
//!
//! Core types and depth post-processing for the depthlens pipeline.
//!
//! This crate provides:
//! - Error handling types
//! - Domain types (depth maps, visualization settings)
//! - Depth processors (normalization, colormaps, resampling, projection, export)
//!
//! ## Modules
//!
//! * [`core`] - Error handling and configuration validation
//! * [`domain`] - The depth map and its rendering settings
//! * [`processors`] - Pure numeric processing of depth maps

pub mod core;
pub mod domain;
pub mod processors;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error Handling
    pub use crate::core::{DepthError, DepthResult};

    // Domain types
    pub use crate::domain::{Adjustments, Colormap, DepthMap, VisualizationSettings};

    // Processors
    pub use crate::processors::{
        Point3, PointCloudOptions, depth_at, encode_png, enhance, normalize, to_colored_image,
        to_grayscale_image, to_point_cloud, upscale,
    };
}
