//! Tonal adjustments applied to rendered depth images.

use crate::domain::Adjustments;
use image::RgbaImage;
use rayon::prelude::*;

/// Applies brightness then exposure to a normalized depth value and clamps to `[0, 1]`.
#[inline]
pub fn adjust_level(normalized: f32, adjustments: &Adjustments) -> f32 {
    ((normalized + (adjustments.brightness - 1.0)) * adjustments.exposure).clamp(0.0, 1.0)
}

/// Quantizes a `[0, 1]` level to an 8-bit gray value.
#[inline]
pub fn level_to_u8(level: f32) -> u8 {
    (level.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn clamp_to_u8(value: f32) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 255.0) as u8
    }
}

/// Runs the contrast and sharpen passes requested by `adjustments`.
///
/// Contrast runs only when `contrast != 1`; sharpen only when `sharpness > 0`.
pub fn apply_post_adjustments(image: &mut RgbaImage, adjustments: &Adjustments) {
    if adjustments.contrast != 1.0 {
        apply_contrast(image, adjustments.contrast);
    }
    if adjustments.sharpness > 0.0 {
        apply_sharpness(image, adjustments.sharpness);
    }
}

/// Stretches the color channels around mid-gray.
///
/// Uses `factor = 259 * (c*255 + 255) / (255 * (259 - c*255))` and
/// `v' = factor * (v - 128) + 128`, clamped to `[0, 255]`. Alpha is untouched.
pub fn apply_contrast(image: &mut RgbaImage, contrast: f32) {
    let c = contrast * 255.0;
    let factor = (259.0 * (c + 255.0)) / (255.0 * (259.0 - c));
    let buffer: &mut [u8] = image;
    buffer.par_chunks_mut(4).for_each(|px| {
        for channel in &mut px[..3] {
            *channel = clamp_to_u8(factor * (*channel as f32 - 128.0) + 128.0);
        }
    });
}

/// Blends each interior pixel with a 3x3 sharpen convolution.
///
/// Kernel `[[0,-1,0],[-1,5,-1],[0,-1,0]]`; `result = original*(1-s) + convolved*s`.
/// Border pixels and the alpha channel keep their original values.
pub fn apply_sharpness(image: &mut RgbaImage, sharpness: f32) {
    if sharpness <= 0.0 {
        return;
    }
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width < 3 || height < 3 {
        return;
    }
    let src = image.as_raw().clone();
    let stride = width * 4;
    let buffer: &mut [u8] = image;

    buffer
        .par_chunks_mut(stride)
        .enumerate()
        .skip(1)
        .take(height - 2)
        .for_each(|(y, row)| {
            for x in 1..width - 1 {
                let i = y * stride + x * 4;
                for c in 0..3 {
                    let center = src[i + c] as f32;
                    let convolved = 5.0 * center
                        - src[i - stride + c] as f32
                        - src[i + stride + c] as f32
                        - src[i - 4 + c] as f32
                        - src[i + 4 + c] as f32;
                    row[x * 4 + c] =
                        clamp_to_u8(center * (1.0 - sharpness) + convolved * sharpness);
                }
            }
        });
}
