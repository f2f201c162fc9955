//! Domain types: the depth map and the settings that drive its rendering.

pub mod depth_map;
pub mod settings;

pub use depth_map::DepthMap;
pub use settings::{Adjustments, Colormap, VisualizationSettings};
