//! Resampling and refinement of depth maps.

use crate::core::errors::{DepthError, DepthResult, SimpleError};
use crate::domain::DepthMap;
use image::{ImageBuffer, Luma, imageops};
use rayon::prelude::*;

/// Variance below which an interior pixel is replaced by its neighbourhood mean.
const SMOOTH_VARIANCE_THRESHOLD: f32 = 0.01;
/// Gain applied to a pixel's deviation from its neighbourhood mean.
const EDGE_GAIN: f32 = 0.1;

/// `(width * factor, height * factor, buffer length)`, or an error on overflow.
fn scaled_dimensions(width: u32, height: u32, factor: u32) -> DepthResult<(u32, u32, usize)> {
    let overflow = || {
        DepthError::invalid_input(format!(
            "upscaling {width}x{height} by {factor} exceeds the supported size"
        ))
    };
    let out_w = width.checked_mul(factor).ok_or_else(overflow)?;
    let out_h = height.checked_mul(factor).ok_or_else(overflow)?;
    let len = (out_w as usize)
        .checked_mul(out_h as usize)
        .ok_or_else(overflow)?;
    Ok((out_w, out_h, len))
}

/// Enlarges a depth map by an integer factor with bilinear interpolation.
///
/// Destination pixel `(x, y)` samples the source at `(x / factor, y / factor)`;
/// the right and bottom neighbours are clamped to the last row and column.
///
/// # Errors
///
/// Returns [`DepthError::InvalidInput`] when `factor` is zero or the enlarged
/// size does not fit in `u32` dimensions.
pub fn upscale(map: &DepthMap, factor: u32) -> DepthResult<DepthMap> {
    if factor == 0 {
        return Err(DepthError::invalid_input("upscale factor must be at least 1"));
    }
    let (width, height) = map.dimensions();
    let (out_w, out_h, len) = scaled_dimensions(width, height, factor)?;
    if factor == 1 || map.is_empty() {
        return Ok(DepthMap::from_parts(map.values().to_vec(), out_w, out_h));
    }

    let scale = factor as f32;
    let mut values = vec![0.0f32; len];

    values
        .par_chunks_mut(out_w as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let src_y = y as f32 / scale;
            let y0 = (src_y.floor() as u32).min(height - 1);
            let y1 = (y0 + 1).min(height - 1);
            let fy = src_y - y0 as f32;
            for (x, out) in row.iter_mut().enumerate() {
                let src_x = x as f32 / scale;
                let x0 = (src_x.floor() as u32).min(width - 1);
                let x1 = (x0 + 1).min(width - 1);
                let fx = src_x - x0 as f32;
                *out = map.at(x0, y0) * (1.0 - fx) * (1.0 - fy)
                    + map.at(x1, y0) * fx * (1.0 - fy)
                    + map.at(x0, y1) * (1.0 - fx) * fy
                    + map.at(x1, y1) * fx * fy;
            }
        });

    Ok(DepthMap::from_parts(values, out_w, out_h))
}

/// Edge-aware refinement over the 4-neighbourhood.
///
/// Interior pixels in low-variance regions are smoothed to the local mean;
/// elsewhere their deviation from the mean is amplified slightly. Border
/// pixels are copied unchanged.
pub fn enhance(map: &DepthMap) -> DepthMap {
    let (width, height) = map.dimensions();
    let mut values = map.values().to_vec();
    if width < 3 || height < 3 {
        return DepthMap::from_parts(values, width, height);
    }

    values
        .par_chunks_mut(width as usize)
        .enumerate()
        .skip(1)
        .take(height as usize - 2)
        .for_each(|(y, row)| {
            let y = y as u32;
            for x in 1..width - 1 {
                let center = map.at(x, y);
                let window = [
                    center,
                    map.at(x, y - 1),
                    map.at(x, y + 1),
                    map.at(x - 1, y),
                    map.at(x + 1, y),
                ];
                let mean = window.iter().sum::<f32>() / window.len() as f32;
                let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f32>()
                    / window.len() as f32;
                row[x as usize] = if variance < SMOOTH_VARIANCE_THRESHOLD {
                    mean
                } else {
                    center + (center - mean) * EDGE_GAIN
                };
            }
        });

    DepthMap::from_parts(values, width, height)
}

/// Resamples a depth map to an arbitrary size.
///
/// Equal sizes return a copy. A uniform integer enlargement reuses [`upscale`];
/// anything else goes through a single-channel `f32` bitmap and
/// `imageops::resize` with a triangle filter. The resize clamps samples to
/// `[0, 1]`, so values are packed relative to the map's range and unpacked
/// afterwards.
///
/// # Errors
///
/// Returns [`DepthError::InvalidInput`] for a zero-sized target and a
/// resample [`DepthError::Processing`] error when the source cannot be packed
/// into a bitmap.
pub fn resize_to(map: &DepthMap, width: u32, height: u32) -> DepthResult<DepthMap> {
    if width == 0 || height == 0 {
        return Err(DepthError::invalid_input(format!(
            "cannot resize depth map to {width}x{height}"
        )));
    }
    let (src_w, src_h) = map.dimensions();
    if (src_w, src_h) == (width, height) {
        return Ok(map.clone());
    }
    if src_w == 0 || src_h == 0 {
        return Err(DepthError::resample_error(
            "source depth map is empty",
            SimpleError::new(format!("{src_w}x{src_h}")),
        ));
    }

    if width % src_w == 0 && height % src_h == 0 {
        let factor = width / src_w;
        if factor == height / src_h {
            return upscale(map, factor);
        }
    }

    let target_len = width as usize * height as usize;
    let (min, max) = map.range().unwrap_or((0.0, 0.0));
    let span = max - min;
    if span <= 0.0 {
        return Ok(DepthMap::from_parts(vec![min; target_len], width, height));
    }

    let packed = map.values().iter().map(|v| (v - min) / span).collect();
    let bitmap: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(src_w, src_h, packed)
        .ok_or_else(|| {
            DepthError::resample_error(
                "failed to pack depth values into a bitmap",
                SimpleError::new(format!("{} values for {src_w}x{src_h}", map.len())),
            )
        })?;
    let resized = imageops::resize(&bitmap, width, height, imageops::FilterType::Triangle);
    let values = resized
        .into_raw()
        .into_iter()
        .map(|v| min + v.clamp(0.0, 1.0) * span)
        .collect();
    Ok(DepthMap::from_parts(values, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> DepthMap {
        DepthMap::from_fn(width, height, |x, y| (x + 10 * y) as f32).expect("valid map")
    }

    #[test]
    fn test_upscale_by_one_is_identity() {
        let map = ramp(5, 3);
        let upscaled = upscale(&map, 1).expect("upscale");
        assert_eq!(upscaled, map);
    }

    #[test]
    fn test_upscale_zero_factor_rejected() {
        assert!(matches!(
            upscale(&ramp(2, 2), 0),
            Err(DepthError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_upscale_interpolates_and_clamps_edges() {
        let map = DepthMap::new(vec![0.0, 4.0, 8.0, 12.0], 2, 2).expect("valid map");
        let upscaled = upscale(&map, 2).expect("upscale");
        assert_eq!(upscaled.dimensions(), (4, 4));
        // Row 0: 0, 2, 4, 4 (right edge clamps to the last column)
        assert_eq!(&upscaled.values()[..4], &[0.0, 2.0, 4.0, 4.0]);
        // (1, 1) averages all four source samples
        assert_eq!(upscaled.values()[5], 6.0);
        assert_eq!(upscaled.values()[15], 12.0);
    }

    #[test]
    fn test_enhance_smooths_low_variance_interior() {
        let mut values = vec![1.0; 9];
        values[4] = 1.05;
        let map = DepthMap::new(values, 3, 3).expect("valid map");
        let enhanced = enhance(&map);
        let expected_mean = (1.05 + 4.0) / 5.0;
        assert!((enhanced.values()[4] - expected_mean).abs() < 1e-6);
        assert_eq!(enhanced.values()[0], 1.0);
    }

    #[test]
    fn test_enhance_sharpens_edges() {
        let mut values = vec![0.0; 9];
        values[4] = 1.0;
        let map = DepthMap::new(values, 3, 3).expect("valid map");
        let enhanced = enhance(&map);
        // mean = 0.2, variance = 0.16 -> 1.0 + 0.8 * 0.1
        assert!((enhanced.values()[4] - 1.08).abs() < 1e-6);
    }

    #[test]
    fn test_enhance_keeps_small_maps() {
        let map = ramp(2, 5);
        assert_eq!(enhance(&map), map);
    }

    #[test]
    fn test_resize_to_integer_multiple_matches_upscale() {
        let map = ramp(3, 2);
        let resized = resize_to(&map, 6, 4).expect("resize");
        assert_eq!(resized, upscale(&map, 2).expect("upscale"));
    }

    #[test]
    fn test_resize_to_arbitrary_size() {
        let map = ramp(4, 4);
        let resized = resize_to(&map, 7, 3).expect("resize");
        assert_eq!(resized.dimensions(), (7, 3));
        assert_eq!(resized.len(), 21);
        assert!(resized.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_upscale_rejects_overflowing_factor() {
        let map = ramp(3, 3);
        assert!(matches!(
            upscale(&map, u32::MAX / 2),
            Err(DepthError::InvalidInput { .. })
        ));
        let empty = DepthMap::new(Vec::new(), 0, 4).expect("empty map");
        assert!(matches!(
            upscale(&empty, u32::MAX),
            Err(DepthError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_resize_to_keeps_values_outside_unit_range() {
        let map = DepthMap::from_fn(4, 4, |x, y| (2 + x + 4 * y) as f32).expect("valid map");
        let resized = resize_to(&map, 6, 6).expect("resize");
        let (min, max) = resized.range().expect("non-empty");
        assert!(min >= 2.0 - 1e-4 && max <= 17.0 + 1e-4);
        assert!(max - min > 10.0, "range collapsed to ({min}, {max})");
        // Depth still increases down the first column
        let column: Vec<f32> = (0..6).map(|y| resized.values()[y * 6]).collect();
        assert!(column.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(column[5] > column[0]);
    }

    #[test]
    fn test_resize_to_flat_map_stays_flat() {
        let map = DepthMap::new(vec![42.5; 6], 3, 2).expect("valid map");
        let resized = resize_to(&map, 5, 5).expect("resize");
        assert!(resized.values().iter().all(|&v| v == 42.5));
    }

    #[test]
    fn test_resize_to_rejects_empty_source_and_target() {
        let map = ramp(4, 4);
        assert!(resize_to(&map, 0, 3).is_err());
        let empty = DepthMap::new(Vec::new(), 0, 4).expect("empty map");
        assert!(matches!(
            resize_to(&empty, 2, 2),
            Err(DepthError::Processing { .. })
        ));
    }
}
