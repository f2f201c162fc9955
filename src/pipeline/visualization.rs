//! Visualization state.
//!
//! [`VisualizationCoordinator`] keeps the latest depth map together with the
//! grayscale and colored renderings derived from it. Re-rendering only happens
//! through [`VisualizationCoordinator::set_depth`] and
//! [`VisualizationCoordinator::on_settings_changed`], and only for the variants
//! a change actually affects. Pointer lookups read the unprocessed map and
//! never re-render.

use crate::core::config::ConfigValidatorExt;
use crate::core::{DepthError, DepthResult};
use crate::domain::{DepthMap, VisualizationSettings};
use depthlens_core::processors::{
    depth_at, encode_png, enhance, export_filename, to_colored_image, to_grayscale_image,
    trigger_download, upscale,
};
use image::RgbaImage;
use serde::Serialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Upscale factor applied in high-quality mode.
pub const HIGH_QUALITY_SCALE: u32 = 2;

/// The two renderings of a depth map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageVariant {
    Grayscale,
    Colored,
}

/// Which renderings a settings change refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Unchanged,
    ColoredOnly,
    Both,
}

/// Depth under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HoverDepth {
    pub x: i64,
    pub y: i64,
    pub depth: f32,
}

/// Number of renders performed per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RenderCounters {
    pub grayscale: usize,
    pub colored: usize,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    depth: Option<Arc<DepthMap>>,
    settings: VisualizationSettings,
    grayscale: Option<Arc<RgbaImage>>,
    colored: Option<Arc<RgbaImage>>,
    hover: Option<HoverDepth>,
    counters: RenderCounters,
}

impl CoordinatorState {
    /// The map renderings are produced from: enhanced and enlarged in
    /// high-quality mode.
    fn render_source<'a>(
        depth: &'a DepthMap,
        settings: &VisualizationSettings,
    ) -> DepthResult<Cow<'a, DepthMap>> {
        if settings.high_quality {
            Ok(Cow::Owned(upscale(&enhance(depth), HIGH_QUALITY_SCALE)?))
        } else {
            Ok(Cow::Borrowed(depth))
        }
    }

    fn render(&mut self, grayscale: bool, colored: bool) -> DepthResult<()> {
        let Some(depth) = self.depth.clone() else {
            self.grayscale = None;
            self.colored = None;
            return Ok(());
        };
        let source = Self::render_source(&depth, &self.settings)?;
        let adjustments = self.settings.adjustments();
        if grayscale {
            self.grayscale = Some(Arc::new(to_grayscale_image(&source, &adjustments)));
            self.counters.grayscale += 1;
        }
        if colored {
            self.colored = Some(Arc::new(to_colored_image(
                &source,
                self.settings.colormap,
                &adjustments,
            )));
            self.counters.colored += 1;
        }
        Ok(())
    }
}

/// Holds the current depth map, its settings and its renderings.
#[derive(Debug, Default)]
pub struct VisualizationCoordinator {
    state: Mutex<CoordinatorState>,
}

impl VisualizationCoordinator {
    pub fn new(settings: VisualizationSettings) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                settings,
                ..CoordinatorState::default()
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the depth map and renders both variants, or clears everything for `None`.
    pub fn set_depth(&self, depth: Option<Arc<DepthMap>>) -> DepthResult<()> {
        let mut state = self.lock_state();
        state.hover = None;
        state.depth = depth;
        if state.depth.is_none() {
            state.grayscale = None;
            state.colored = None;
            return Ok(());
        }
        state.render(true, true)
    }

    /// Applies new settings and re-renders what they affect.
    ///
    /// # Errors
    ///
    /// Invalid settings are rejected with [`DepthError::ConfigError`] and leave
    /// the current state untouched.
    pub fn on_settings_changed(
        &self,
        settings: VisualizationSettings,
    ) -> DepthResult<RenderOutcome> {
        let settings = settings.validate_and_wrap()?;
        let mut state = self.lock_state();
        if state.settings == settings {
            return Ok(RenderOutcome::Unchanged);
        }
        let outcome = if state.settings.differs_only_in_colormap(&settings) {
            RenderOutcome::ColoredOnly
        } else {
            RenderOutcome::Both
        };
        state.settings = settings;
        if state.depth.is_some() {
            state.render(outcome == RenderOutcome::Both, true)?;
        }
        tracing::debug!(?outcome, "Visualization settings applied");
        Ok(outcome)
    }

    /// Flips high-quality mode.
    pub fn toggle_high_quality(&self) -> DepthResult<RenderOutcome> {
        let settings = self.settings();
        let high_quality = !settings.high_quality;
        self.on_settings_changed(settings.with_high_quality(high_quality))
    }

    /// Looks up the depth under the pointer.
    pub fn pointer_move(&self, x: i64, y: i64) -> Option<f32> {
        let mut state = self.lock_state();
        let depth = state.depth.as_deref().and_then(|map| depth_at(map, x, y));
        state.hover = depth.map(|depth| HoverDepth { x, y, depth });
        depth
    }

    pub fn pointer_leave(&self) {
        self.lock_state().hover = None;
    }

    pub fn hover(&self) -> Option<HoverDepth> {
        self.lock_state().hover
    }

    pub fn settings(&self) -> VisualizationSettings {
        self.lock_state().settings
    }

    pub fn depth(&self) -> Option<Arc<DepthMap>> {
        self.lock_state().depth.clone()
    }

    pub fn image(&self, variant: ImageVariant) -> Option<Arc<RgbaImage>> {
        let state = self.lock_state();
        match variant {
            ImageVariant::Grayscale => state.grayscale.clone(),
            ImageVariant::Colored => state.colored.clone(),
        }
    }

    pub fn grayscale(&self) -> Option<Arc<RgbaImage>> {
        self.image(ImageVariant::Grayscale)
    }

    pub fn colored(&self) -> Option<Arc<RgbaImage>> {
        self.image(ImageVariant::Colored)
    }

    pub fn render_counters(&self) -> RenderCounters {
        self.lock_state().counters
    }

    /// Writes the current rendering of `variant` as `depth_map_<timestamp_ms>.png`.
    pub fn export(
        &self,
        variant: ImageVariant,
        directory: &Path,
        timestamp_ms: u64,
    ) -> DepthResult<PathBuf> {
        let image = self
            .image(variant)
            .ok_or_else(|| DepthError::invalid_input("no depth map to export"))?;
        let png = encode_png(&image)?;
        let path = trigger_download(&png, directory, &export_filename(timestamp_ms))?;
        tracing::info!(path = %path.display(), ?variant, "Exported depth map");
        Ok(path)
    }
}
