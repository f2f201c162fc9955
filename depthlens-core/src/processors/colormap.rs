//! Polynomial approximations of the perceptual colormaps.
//!
//! Each channel is a cubic `c0 + c1*t + c2*t^2 + c3*t^3` evaluated on a value
//! already clamped to `[0, 1]`; the result is clamped again before quantizing.

use crate::domain::Colormap;

/// Cubic coefficients `[c0, c1, c2, c3]` for the red, green and blue channels.
type ChannelCurves = [[f32; 4]; 3];

const VIRIDIS: ChannelCurves = [
    [0.267, 0.742, -0.855, 0.318],
    [0.005, 1.404, -1.384, 0.448],
    [0.329, 2.137, -5.532, 2.78],
];

const PLASMA: ChannelCurves = [
    [0.063, 2.81, -3.342, 1.437],
    [0.012, 1.358, 0.0, -0.528],
    [0.615, 2.666, -5.191, 2.72],
];

const INFERNO: ChannelCurves = [
    [0.001, 1.777, -0.037, -0.342],
    [0.0, 0.542, 1.92, -1.617],
    [0.014, 1.775, -2.945, 1.16],
];

const MAGMA: ChannelCurves = [
    [0.001, 1.596, 0.112, -0.71],
    [0.0, 0.639, 1.729, -1.355],
    [0.014, 1.657, -2.25, 0.581],
];

fn curves(colormap: Colormap) -> &'static ChannelCurves {
    match colormap {
        Colormap::Viridis => &VIRIDIS,
        Colormap::Plasma => &PLASMA,
        Colormap::Inferno => &INFERNO,
        Colormap::Magma => &MAGMA,
    }
}

#[inline]
fn eval_channel([c0, c1, c2, c3]: [f32; 4], t: f32) -> u8 {
    let value = c0 + c1 * t + c2 * t * t + c3 * t * t * t;
    (255.0 * value.clamp(0.0, 1.0)).round() as u8
}

/// Maps a scalar in `[0, 1]` to an RGB triple. Out-of-range input is clamped.
pub fn colormap_color(colormap: Colormap, value: f32) -> [u8; 3] {
    let t = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    let [r, g, b] = *curves(colormap);
    [eval_channel(r, t), eval_channel(g, t), eval_channel(b, t)]
}
