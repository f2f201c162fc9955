//! The depth session controller.
//!
//! [`DepthSession`] ties the lifecycle manager, the estimator and the
//! visualization coordinator to a model/backend/precision selection. Changing
//! the selection releases the live model and, with auto-load enabled, loads the
//! new selection straight away. Observers registered with
//! [`DepthSession::subscribe`] receive every state change as a
//! [`PipelineEvent`].

use super::estimator::{DepthEstimator, EstimationEvent};
use super::lifecycle::{LifecycleEvent, LoadState, ModelManager, ProgressSnapshot};
use super::stats::EstimationStats;
use super::visualization::{HoverDepth, ImageVariant, RenderOutcome, VisualizationCoordinator};
use crate::core::capability::{CapabilityDetector, CapabilityMap};
use crate::core::config::{ConfigValidatorExt, DepthLensConfig};
use crate::core::inference::{ImageInput, ImageStore, InferenceEngine, OrtDepthEngine};
use crate::core::{DepthError, DepthResult};
use crate::domain::{ComputeBackend, DepthMap, PrecisionLevel, VisualizationSettings, find_model};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything an observer can be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    LoadState(LoadState),
    LoadProgress {
        percentage: f64,
        snapshot: Option<ProgressSnapshot>,
    },
    EstimationProgress(f64),
    ImagesUpdated,
    Hover(Option<HoverDepth>),
    Error(String),
}

/// Receiver of [`PipelineEvent`]s.
pub type PipelineObserver = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Snapshot of a [`DepthSession`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineState {
    pub model_id: String,
    pub backend: ComputeBackend,
    pub precision: PrecisionLevel,
    pub auto_load: bool,
    pub load_state: LoadState,
    pub loading_percentage: f64,
    pub progress: Option<ProgressSnapshot>,
    pub current_model: Option<String>,
    pub last_error: Option<String>,
    pub is_processing: bool,
    pub estimation_progress: f64,
    pub hover: Option<HoverDepth>,
    pub settings: VisualizationSettings,
}

#[derive(Debug, Clone)]
struct Selection {
    model_id: String,
    backend: ComputeBackend,
    precision: PrecisionLevel,
    auto_load: bool,
}

/// Fan-out of events to observers, remembering the latest error.
#[derive(Default)]
struct EventHub {
    observers: Mutex<Vec<PipelineObserver>>,
    last_error: Mutex<Option<String>>,
}

impl EventHub {
    fn publish(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::Error(message) => {
                *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(message.clone());
            }
            PipelineEvent::LoadState(LoadState::Loading) => self.clear_error(),
            _ => {}
        }
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer(&event);
        }
    }

    fn clear_error(&self) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Owns a depth pipeline and the user's current selection.
pub struct DepthSession {
    manager: Arc<ModelManager>,
    estimator: DepthEstimator,
    visualization: VisualizationCoordinator,
    capabilities: CapabilityMap,
    selection: Mutex<Selection>,
    hub: Arc<EventHub>,
}

impl fmt::Debug for DepthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepthSession")
            .field("selection", &*self.lock_selection())
            .field("manager", &self.manager)
            .finish()
    }
}

impl DepthSession {
    /// Creates a session backed by ONNX Runtime, probing execution providers.
    pub fn with_ort(config: DepthLensConfig) -> DepthResult<Self> {
        let engine = Arc::new(OrtDepthEngine::new(config.engine.clone()));
        Self::new(engine, config)
    }

    /// Creates a session on `engine`, probing execution providers.
    pub fn new(engine: Arc<dyn InferenceEngine>, config: DepthLensConfig) -> DepthResult<Self> {
        let capabilities = CapabilityDetector::default().detect();
        Self::with_parts(engine, config, capabilities, ImageStore::global().clone())
    }

    /// Creates a session from explicit parts.
    ///
    /// `images` must be the store the engine resolves `blob:` URLs against.
    pub fn with_parts(
        engine: Arc<dyn InferenceEngine>,
        config: DepthLensConfig,
        capabilities: CapabilityMap,
        images: ImageStore,
    ) -> DepthResult<Self> {
        let config = config.validate_and_wrap()?;
        let hub = Arc::new(EventHub::default());

        let manager = Arc::new(ModelManager::new(engine, config.lifecycle.clone()));
        let sink = hub.clone();
        manager.set_listener(Arc::new(move |event: &LifecycleEvent| {
            sink.publish(match event {
                LifecycleEvent::StateChanged(state) => PipelineEvent::LoadState(*state),
                LifecycleEvent::Progress {
                    percentage,
                    snapshot,
                } => PipelineEvent::LoadProgress {
                    percentage: *percentage,
                    snapshot: snapshot.clone(),
                },
            })
        }));

        let estimator = DepthEstimator::new(manager.clone(), images, config.estimator.clone());
        let sink = hub.clone();
        estimator.set_listener(Arc::new(move |event: &EstimationEvent| match event {
            EstimationEvent::Started => sink.clear_error(),
            EstimationEvent::Progress(percentage) => {
                sink.publish(PipelineEvent::EstimationProgress(*percentage))
            }
            EstimationEvent::Finished { .. } => {}
            EstimationEvent::Failed(message) => sink.publish(PipelineEvent::Error(message.clone())),
        }));

        let session = Self {
            manager,
            estimator,
            visualization: VisualizationCoordinator::new(config.visualization),
            capabilities,
            selection: Mutex::new(Selection {
                model_id: config.session.model_id.clone(),
                backend: config.session.backend,
                precision: config.session.precision,
                auto_load: config.session.auto_load,
            }),
            hub,
        };
        tracing::debug!(
            supported = ?session.capabilities.supported_backends(),
            "Depth session created"
        );
        Ok(session)
    }

    fn lock_selection(&self) -> MutexGuard<'_, Selection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an observer for every subsequent [`PipelineEvent`].
    pub fn subscribe(&self, observer: PipelineObserver) {
        self.hub
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn change_selection(&self, apply: impl FnOnce(&mut Selection) -> bool) -> DepthResult<()> {
        let auto_load = {
            let mut selection = self.lock_selection();
            if !apply(&mut selection) {
                return Ok(());
            }
            selection.auto_load
        };
        self.manager.release();
        if auto_load {
            self.load_selected()?;
        }
        Ok(())
    }

    /// Selects a catalog model. Unknown ids are rejected with [`DepthError::InvalidInput`].
    pub fn select_model(&self, model_id: &str) -> DepthResult<()> {
        if find_model(model_id).is_none() {
            return Err(DepthError::invalid_input(format!(
                "unknown model id '{model_id}'"
            )));
        }
        self.change_selection(|selection| {
            if selection.model_id == model_id {
                return false;
            }
            selection.model_id = model_id.to_string();
            true
        })
    }

    pub fn select_backend(&self, backend: ComputeBackend) -> DepthResult<()> {
        self.change_selection(|selection| {
            if selection.backend == backend {
                return false;
            }
            selection.backend = backend;
            true
        })
    }

    pub fn select_precision(&self, precision: PrecisionLevel) -> DepthResult<()> {
        self.change_selection(|selection| {
            if selection.precision == precision {
                return false;
            }
            selection.precision = precision;
            true
        })
    }

    /// Enables or disables auto-loading; enabling it loads the selection if nothing is loaded.
    pub fn set_auto_load(&self, enabled: bool) -> DepthResult<()> {
        self.lock_selection().auto_load = enabled;
        if enabled && !self.manager.has_model() && self.manager.status() != LoadState::Loading {
            self.load_selected()?;
        }
        Ok(())
    }

    /// Loads the current selection.
    pub fn load_selected(&self) -> DepthResult<()> {
        let selection = self.lock_selection().clone();
        let descriptor = find_model(&selection.model_id).ok_or_else(|| {
            DepthError::invalid_input(format!("unknown model id '{}'", selection.model_id))
        })?;
        if !self.capabilities.is_supported(selection.backend) {
            tracing::warn!(
                backend = %selection.backend,
                "Backend was not detected as supported, attempting load anyway"
            );
        }

        let result = self
            .manager
            .load(descriptor, selection.backend, selection.precision);
        if let Err(e) = &result {
            match e {
                DepthError::LoadSuperseded { .. } => {}
                DepthError::ModelLoad { message, .. } => {
                    self.hub.publish(PipelineEvent::Error(message.clone()))
                }
                other => self.hub.publish(PipelineEvent::Error(other.user_message())),
            }
        }
        result
    }

    /// Releases the live model.
    pub fn release(&self) {
        self.manager.release();
    }

    /// Estimates depth for `input` and renders the result.
    pub fn estimate(&self, input: impl Into<ImageInput>) -> DepthResult<Arc<DepthMap>> {
        let depth = Arc::new(self.estimator.estimate(input)?);
        self.visualization.set_depth(Some(depth.clone()))?;
        self.hub.publish(PipelineEvent::ImagesUpdated);
        Ok(depth)
    }

    /// Drops the current depth map and its renderings.
    pub fn clear_depth(&self) -> DepthResult<()> {
        self.visualization.set_depth(None)?;
        self.hub.publish(PipelineEvent::ImagesUpdated);
        Ok(())
    }

    /// Applies visualization settings, re-rendering what they affect.
    pub fn update_settings(&self, settings: VisualizationSettings) -> DepthResult<RenderOutcome> {
        let outcome = self.visualization.on_settings_changed(settings)?;
        if outcome != RenderOutcome::Unchanged && self.visualization.depth().is_some() {
            self.hub.publish(PipelineEvent::ImagesUpdated);
        }
        Ok(outcome)
    }

    pub fn toggle_high_quality(&self) -> DepthResult<RenderOutcome> {
        let settings = self.visualization.settings();
        self.update_settings(settings.with_high_quality(!settings.high_quality))
    }

    pub fn pointer_move(&self, x: i64, y: i64) -> Option<f32> {
        let depth = self.visualization.pointer_move(x, y);
        self.hub
            .publish(PipelineEvent::Hover(self.visualization.hover()));
        depth
    }

    pub fn pointer_leave(&self) {
        self.visualization.pointer_leave();
        self.hub.publish(PipelineEvent::Hover(None));
    }

    /// Writes the current rendering of `variant` as `depth_map_<timestamp_ms>.png`.
    pub fn export(
        &self,
        variant: ImageVariant,
        directory: &Path,
        timestamp_ms: u64,
    ) -> DepthResult<PathBuf> {
        self.visualization.export(variant, directory, timestamp_ms)
    }

    pub fn state(&self) -> PipelineState {
        let selection = self.lock_selection().clone();
        PipelineState {
            model_id: selection.model_id,
            backend: selection.backend,
            precision: selection.precision,
            auto_load: selection.auto_load,
            load_state: self.manager.status(),
            loading_percentage: self.manager.loading_percentage(),
            progress: self.manager.progress(),
            current_model: self.manager.current_model(),
            last_error: self.hub.last_error(),
            is_processing: self.estimator.is_processing(),
            estimation_progress: self.estimator.progress(),
            hover: self.visualization.hover(),
            settings: self.visualization.settings(),
        }
    }

    pub fn capabilities(&self) -> &CapabilityMap {
        &self.capabilities
    }

    pub fn visualization(&self) -> &VisualizationCoordinator {
        &self.visualization
    }

    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    pub fn estimation_stats(&self) -> EstimationStats {
        self.estimator.stats()
    }
}

impl Drop for DepthSession {
    fn drop(&mut self) {
        self.manager.release();
    }
}
