//! Rendering depth maps into RGBA images.

use super::adjust::{adjust_level, apply_post_adjustments, level_to_u8};
use super::colormap::colormap_color;
use super::normalize::normalize;
use crate::core::errors::{DepthError, DepthResult};
use crate::domain::{Adjustments, Colormap, DepthMap};
use image::{RgbaImage, imageops};
use rayon::prelude::*;

/// Renders a depth map as a gray image (R = G = B, opaque alpha).
pub fn to_grayscale_image(map: &DepthMap, adjustments: &Adjustments) -> RgbaImage {
    render_with(map, adjustments, |level| {
        let gray = level_to_u8(level);
        [gray, gray, gray]
    })
}

/// Renders a depth map through a colormap.
pub fn to_colored_image(
    map: &DepthMap,
    colormap: Colormap,
    adjustments: &Adjustments,
) -> RgbaImage {
    render_with(map, adjustments, |level| colormap_color(colormap, level))
}

fn render_with(
    map: &DepthMap,
    adjustments: &Adjustments,
    shade: impl Fn(f32) -> [u8; 3] + Sync,
) -> RgbaImage {
    let (width, height) = map.dimensions();
    let normalized = normalize(map);
    let mut image = RgbaImage::new(width, height);
    let row_len = width as usize;

    if row_len > 0 {
        let buffer: &mut [u8] = &mut image;
        buffer
            .par_chunks_mut(row_len * 4)
            .zip(normalized.par_chunks(row_len))
            .for_each(|(row, levels)| {
                for (px, &n) in row.chunks_exact_mut(4).zip(levels) {
                    let [r, g, b] = shade(adjust_level(n, adjustments));
                    px.copy_from_slice(&[r, g, b, 255]);
                }
            });
    }

    apply_post_adjustments(&mut image, adjustments);
    image
}

/// Renders with neutral adjustments and enlarges by an integer factor.
///
/// Scaling is nearest-neighbour so every depth sample stays a crisp block.
///
/// # Errors
///
/// Returns [`DepthError::InvalidInput`] when `scale` is zero.
pub fn render_visualization(
    map: &DepthMap,
    colored: bool,
    colormap: Colormap,
    scale: u32,
) -> DepthResult<RgbaImage> {
    if scale == 0 {
        return Err(DepthError::invalid_input("visualization scale must be at least 1"));
    }
    let image = if colored {
        to_colored_image(map, colormap, &Adjustments::IDENTITY)
    } else {
        to_grayscale_image(map, &Adjustments::IDENTITY)
    };
    if scale == 1 || image.width() == 0 || image.height() == 0 {
        return Ok(image);
    }
    Ok(imageops::resize(
        &image,
        image.width() * scale,
        image.height() * scale,
        imageops::FilterType::Nearest,
    ))
}
