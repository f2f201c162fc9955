//! Pointer lookups and pinhole back-projection.

use crate::domain::DepthMap;
use serde::{Deserialize, Serialize};

/// Default focal length, in pixels, for point-cloud projection.
pub const DEFAULT_FOCAL_LENGTH: f32 = 500.0;

/// A point in camera space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Returns the depth at pixel `(x, y)`, or `None` outside the map.
///
/// Coordinates are signed so callers can pass raw pointer positions.
pub fn depth_at(map: &DepthMap, x: i64, y: i64) -> Option<f32> {
    if x < 0 || y < 0 || x >= map.width() as i64 || y >= map.height() as i64 {
        return None;
    }
    let index = y as usize * map.width() as usize + x as usize;
    map.values().get(index).copied()
}

/// Options for [`to_point_cloud`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointCloudOptions {
    pub focal_length: f32,
    /// Sample every n-th pixel in both axes; `0` behaves like `1`.
    pub downsample: u32,
}

impl Default for PointCloudOptions {
    fn default() -> Self {
        Self {
            focal_length: DEFAULT_FOCAL_LENGTH,
            downsample: 1,
        }
    }
}

/// Back-projects every sampled pixel with positive depth into camera space.
///
/// The principal point is the image centre; `x' = (x - cx) * d / f`,
/// `y' = (y - cy) * d / f` and `z' = d`.
pub fn to_point_cloud(map: &DepthMap, options: PointCloudOptions) -> Vec<Point3> {
    let (width, height) = map.dimensions();
    let step = options.downsample.max(1) as usize;
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let f = options.focal_length;

    let mut points = Vec::new();
    for y in (0..height).step_by(step) {
        for x in (0..width).step_by(step) {
            let d = map.at(x, y);
            if d > 0.0 {
                points.push(Point3 {
                    x: (x as f32 - cx) * d / f,
                    y: (y as f32 - cy) * d / f,
                    z: d,
                });
            }
        }
    }
    points
}
