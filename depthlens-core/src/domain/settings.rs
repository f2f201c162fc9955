//! User-selected rendering settings.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::core::errors::DepthError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Perceptual colormaps available for colored depth rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Viridis,
    Plasma,
    Inferno,
    Magma,
}

impl Colormap {
    /// All colormaps in display order.
    pub const ALL: [Colormap; 4] = [
        Colormap::Viridis,
        Colormap::Plasma,
        Colormap::Inferno,
        Colormap::Magma,
    ];

    /// Stable identifier used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Colormap::Viridis => "viridis",
            Colormap::Plasma => "plasma",
            Colormap::Inferno => "inferno",
            Colormap::Magma => "magma",
        }
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Colormap::Viridis => "Viridis",
            Colormap::Plasma => "Plasma",
            Colormap::Inferno => "Inferno",
            Colormap::Magma => "Magma",
        }
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Colormap {
    type Err = DepthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Colormap::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DepthError::invalid_input(format!("unknown colormap '{s}'")))
    }
}

/// Tonal adjustments applied while rendering a depth map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    /// Additive offset; `1.0` is neutral.
    pub brightness: f32,
    /// Multiplicative gain; `1.0` is neutral.
    pub exposure: f32,
    /// Contrast; `1.0` disables the contrast pass.
    pub contrast: f32,
    /// Sharpen blend in `[0, 1]`; `0.0` disables the sharpen pass.
    pub sharpness: f32,
}

impl Adjustments {
    /// The adjustments that leave a normalized map untouched.
    pub const IDENTITY: Adjustments = Adjustments {
        brightness: 1.0,
        exposure: 1.0,
        contrast: 1.0,
        sharpness: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Adjustments {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Everything the visualization needs to render a depth map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationSettings {
    pub colormap: Colormap,
    pub brightness: f32,
    pub exposure: f32,
    pub contrast: f32,
    pub sharpness: f32,
    /// Render through the enhance and 2x upscale path.
    pub high_quality: bool,
}

impl Default for VisualizationSettings {
    fn default() -> Self {
        Self {
            colormap: Colormap::Viridis,
            brightness: 1.0,
            exposure: 1.0,
            contrast: 1.0,
            sharpness: 0.0,
            high_quality: false,
        }
    }
}

impl VisualizationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = colormap;
        self
    }

    pub fn with_adjustments(mut self, adjustments: Adjustments) -> Self {
        self.brightness = adjustments.brightness;
        self.exposure = adjustments.exposure;
        self.contrast = adjustments.contrast;
        self.sharpness = adjustments.sharpness;
        self
    }

    pub fn with_high_quality(mut self, high_quality: bool) -> Self {
        self.high_quality = high_quality;
        self
    }

    /// The tonal part of the settings.
    pub fn adjustments(&self) -> Adjustments {
        Adjustments {
            brightness: self.brightness,
            exposure: self.exposure,
            contrast: self.contrast,
            sharpness: self.sharpness,
        }
    }

    /// True when `other` differs from `self` only in the colormap.
    pub fn differs_only_in_colormap(&self, other: &VisualizationSettings) -> bool {
        self.colormap != other.colormap
            && self.adjustments() == other.adjustments()
            && self.high_quality == other.high_quality
    }
}

impl ConfigValidator for VisualizationSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_finite(self.brightness, "brightness")?;
        self.validate_non_negative_f32(self.exposure, "exposure")?;
        self.validate_finite(self.contrast, "contrast")?;
        self.validate_f32_range(self.sharpness, 0.0, 1.0, "sharpness")?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = VisualizationSettings::default();
        assert_eq!(settings.colormap, Colormap::Viridis);
        assert!(settings.adjustments().is_identity());
        assert!(!settings.high_quality);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let negative_exposure = VisualizationSettings {
            exposure: -1.0,
            ..Default::default()
        };
        assert!(negative_exposure.validate().is_err());

        let strong_sharpen = VisualizationSettings {
            sharpness: 1.5,
            ..Default::default()
        };
        assert!(strong_sharpen.validate().is_err());

        let nan_brightness = VisualizationSettings {
            brightness: f32::NAN,
            ..Default::default()
        };
        assert!(nan_brightness.validate().is_err());
    }

    #[test]
    fn test_colormap_parse() {
        assert_eq!("plasma".parse::<Colormap>().ok(), Some(Colormap::Plasma));
        assert_eq!(" Magma ".parse::<Colormap>().ok(), Some(Colormap::Magma));
        assert!("jet".parse::<Colormap>().is_err());
    }

    #[test]
    fn test_differs_only_in_colormap() {
        let base = VisualizationSettings::default();
        let recolored = base.with_colormap(Colormap::Inferno);
        assert!(base.differs_only_in_colormap(&recolored));

        let brighter = recolored.with_adjustments(Adjustments {
            brightness: 1.2,
            ..Adjustments::IDENTITY
        });
        assert!(!base.differs_only_in_colormap(&brighter));
        assert!(!base.differs_only_in_colormap(&base));
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: VisualizationSettings =
            serde_json::from_str(r#"{"colormap":"magma","contrast":1.5}"#).expect("parse");
        assert_eq!(settings.colormap, Colormap::Magma);
        assert_eq!(settings.contrast, 1.5);
        assert_eq!(settings.exposure, 1.0);
    }
}
