//! Depth post-processing.
//!
//! Pure numeric functions over [`DepthMap`](crate::domain::DepthMap):
//!
//! * [`normalize`] - min/max normalization into `[0, 1]`
//! * [`colormap`] - polynomial colormaps
//! * [`adjust`] - brightness, exposure, contrast and sharpen passes
//! * [`render`] - grayscale and colored RGBA rendering
//! * [`resample`] - bilinear upscaling, edge-aware enhancement and general resizing
//! * [`geometry`] - pointer lookups and point-cloud projection
//! * [`encode`] - PNG encoding, data URLs and file export

pub mod adjust;
pub mod colormap;
pub mod encode;
pub mod geometry;
pub mod normalize;
pub mod render;
pub mod resample;

pub use colormap::colormap_color;
pub use encode::{
    decode_data_url, download_depth_map, encode_png, export_filename, to_data_url,
    trigger_download,
};
pub use geometry::{DEFAULT_FOCAL_LENGTH, Point3, PointCloudOptions, depth_at, to_point_cloud};
pub use normalize::{normalize, normalize_values};
pub use render::{render_visualization, to_colored_image, to_grayscale_image};
pub use resample::{enhance, resize_to, upscale};
