//! The depth map produced by an estimation call.

use crate::core::errors::{DepthError, DepthResult};

/// A dense, row-major grid of relative depth values.
///
/// The buffer always holds exactly `width * height` finite values. A depth map is
/// never mutated after construction; processors build new maps instead, and
/// callers share it through `Arc<DepthMap>`.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl DepthMap {
    /// Creates a depth map, validating its shape and contents.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::ShapeMismatch`] when `values.len() != width * height`
    /// and [`DepthError::InvalidInput`] when a value is NaN or infinite.
    pub fn new(values: Vec<f32>, width: u32, height: u32) -> DepthResult<Self> {
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(DepthError::shape_mismatch(expected, values.len()));
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DepthError::invalid_input(format!(
                "depth value at index {index} is not finite"
            )));
        }
        Ok(Self {
            values,
            width,
            height,
        })
    }

    /// Builds a depth map by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> DepthResult<Self> {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self::new(values, width, height)
    }

    /// Constructs a map from processor output whose shape is already known to be valid.
    pub(crate) fn from_parts(values: Vec<f32>, width: u32, height: u32) -> Self {
        debug_assert_eq!(values.len(), width as usize * height as usize);
        Self {
            values,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major depth values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `(x, y)` without bounds checks beyond the slice's own.
    #[inline]
    pub(crate) fn at(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Minimum and maximum depth, or `None` for an empty map.
    pub fn range(&self) -> Option<(f32, f32)> {
        let mut iter = self.values.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Consumes the map and returns its buffer.
    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}
