//! Depth estimation orchestration.
//!
//! [`DepthEstimator`] turns an image into a [`DepthMap`] at the image's own
//! resolution: it resolves the input to a URL, probes the natural size, runs
//! the loaded model and rescales the raw output when the model worked at a
//! different resolution.

use super::lifecycle::ModelManager;
use super::stats::{EstimationStats, StatsManager};
use crate::core::config::EstimatorConfig;
use crate::core::inference::{ImageInput, ImageStore, RawDepthTensor};
use crate::core::{DepthError, DepthResult};
use crate::domain::DepthMap;
use depthlens_core::processors::resize_to;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Estimation progress after the input URL is resolved.
pub const RESOLVED_PERCENT: f64 = 10.0;
/// Estimation progress after the image header is read.
pub const DIMENSIONS_PERCENT: f64 = 25.0;
/// Estimation progress after the model ran.
pub const INFERRED_PERCENT: f64 = 75.0;

/// Notifications emitted by the estimator.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimationEvent {
    Started,
    Progress(f64),
    Finished { width: u32, height: u32 },
    Failed(String),
}

/// Receiver of [`EstimationEvent`]s.
pub type EstimationListener = Arc<dyn Fn(&EstimationEvent) + Send + Sync>;

/// Counts a running call until dropped, including on unwind.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct EstimatorState {
    progress: f64,
    progress_expires_at: Option<Instant>,
    last_error: Option<String>,
}

/// Runs depth estimation against the model owned by a [`ModelManager`].
pub struct DepthEstimator {
    manager: Arc<ModelManager>,
    images: ImageStore,
    config: EstimatorConfig,
    state: Mutex<EstimatorState>,
    in_flight: AtomicUsize,
    stats: StatsManager,
    listener: Mutex<Option<EstimationListener>>,
}

impl fmt::Debug for DepthEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepthEstimator")
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .field("config", &self.config)
            .finish()
    }
}

/// Builds a depth map from raw model output, rescaled to `width x height`.
///
/// Rescaling failures fall back to the model's own resolution.
pub fn depth_map_from_tensor(
    tensor: RawDepthTensor,
    width: u32,
    height: u32,
) -> DepthResult<DepthMap> {
    tensor.validate()?;
    let (raw_height, raw_width) = (tensor.height() as u32, tensor.width() as u32);
    let raw = DepthMap::new(tensor.data, raw_width, raw_height)?;
    if (raw_width, raw_height) == (width, height) {
        return Ok(raw);
    }

    match resize_to(&raw, width, height) {
        Ok(resized) => {
            tracing::debug!(
                from = ?(raw_width, raw_height),
                to = ?(width, height),
                "Rescaled depth output"
            );
            Ok(resized)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                from = ?(raw_width, raw_height),
                to = ?(width, height),
                "Failed to rescale depth output, using model resolution"
            );
            Ok(raw)
        }
    }
}

impl DepthEstimator {
    pub fn new(manager: Arc<ModelManager>, images: ImageStore, config: EstimatorConfig) -> Self {
        Self {
            manager,
            images,
            config,
            state: Mutex::new(EstimatorState::default()),
            in_flight: AtomicUsize::new(0),
            stats: StatsManager::new(),
            listener: Mutex::new(None),
        }
    }

    /// Installs the receiver of estimation events, replacing any previous one.
    pub fn set_listener(&self, listener: EstimationListener) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn lock_state(&self) -> MutexGuard<'_, EstimatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: EstimationEvent) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener(&event);
        }
    }

    fn set_progress(&self, percentage: f64) {
        {
            let mut state = self.lock_state();
            state.progress = percentage;
            state.progress_expires_at = None;
        }
        self.emit(EstimationEvent::Progress(percentage));
    }

    fn record_error(&self, error: &DepthError) {
        let message = error.user_message();
        self.lock_state().last_error = Some(message.clone());
        self.emit(EstimationEvent::Failed(message));
    }

    /// Estimates depth for `input`.
    ///
    /// # Errors
    ///
    /// * [`DepthError::NotReady`] if no model is loaded.
    /// * [`DepthError::ModelNotLoaded`] if the model is still being finalized.
    /// * Image, engine and shape errors from the call itself.
    pub fn estimate(&self, input: impl Into<ImageInput>) -> DepthResult<DepthMap> {
        let model = match self.manager.ready_model() {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!(error = %e, "Estimation requested without a ready model");
                self.record_error(&e);
                return Err(e);
            }
        };

        let in_flight = InFlight::enter(&self.in_flight);
        self.lock_state().last_error = None;
        self.emit(EstimationEvent::Started);
        self.set_progress(0.0);

        let started = Instant::now();
        let result = self.run_estimation(model.as_ref(), input.into());
        self.stats.record(result.is_ok(), started.elapsed());
        drop(in_flight);

        {
            let mut state = self.lock_state();
            state.progress_expires_at = Some(Instant::now() + self.config.progress_clear_delay());
        }
        match &result {
            Ok(map) => {
                tracing::info!(
                    width = map.width(),
                    height = map.height(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Depth estimation finished"
                );
                self.emit(EstimationEvent::Finished {
                    width: map.width(),
                    height: map.height(),
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Depth estimation failed");
                self.record_error(e);
            }
        }
        result
    }

    fn run_estimation(
        &self,
        model: &dyn crate::core::inference::DepthModel,
        input: ImageInput,
    ) -> DepthResult<DepthMap> {
        let url = self.images.resolve(input);
        self.set_progress(RESOLVED_PERCENT);

        let (width, height) = self.images.read_dimensions(url.as_str())?;
        self.set_progress(DIMENSIONS_PERCENT);

        let tensor = model.run(url.as_str())?;
        self.set_progress(INFERRED_PERCENT);

        let map = depth_map_from_tensor(tensor, width, height)?;
        self.set_progress(100.0);
        Ok(map)
    }

    /// Whether any estimation call is running.
    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Progress of the latest call; drops to 0 once the display delay has passed.
    pub fn progress(&self) -> f64 {
        let mut state = self.lock_state();
        if state
            .progress_expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            state.progress = 0.0;
            state.progress_expires_at = None;
        }
        state.progress
    }

    /// User-visible message of the latest failure.
    pub fn last_error(&self) -> Option<String> {
        self.lock_state().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.lock_state().last_error = None;
    }

    pub fn stats(&self) -> EstimationStats {
        self.stats.get_stats()
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LifecycleConfig;
    use crate::core::inference::{AcquireOptions, DepthModel, InferenceEngine, ProgressCallback};
    use crate::domain::{ComputeBackend, PrecisionLevel, find_model};
    use crate::pipeline::test_support::{FakeEngine, FakeModel, png_bytes, ramp_tensor};

    fn loaded_estimator(model: Arc<FakeModel>, clear_delay_ms: u64) -> DepthEstimator {
        let manager = Arc::new(ModelManager::new(
            Arc::new(FakeEngine::new(model)),
            LifecycleConfig {
                finalize_delay_ms: 0,
                progress_clear_delay_ms: 0,
            },
        ));
        manager
            .load(
                find_model("depth-anything-v2-small").expect("model"),
                ComputeBackend::Wasm,
                PrecisionLevel::Fp16,
            )
            .expect("load");
        DepthEstimator::new(
            manager,
            ImageStore::new(),
            EstimatorConfig {
                progress_clear_delay_ms: clear_delay_ms,
            },
        )
    }

    #[test]
    fn test_estimate_without_model_is_not_ready() {
        let manager = Arc::new(ModelManager::new(
            Arc::new(FakeEngine::failing("unused")),
            LifecycleConfig::default(),
        ));
        let estimator =
            DepthEstimator::new(manager.clone(), ImageStore::new(), EstimatorConfig::default());

        let result = estimator.estimate(png_bytes(4, 3));
        assert!(matches!(result, Err(DepthError::NotReady)));
        assert_eq!(
            estimator.last_error().as_deref(),
            Some("No model loaded. Please load a model first.")
        );
        assert_eq!(manager.status(), crate::pipeline::LoadState::Idle);
        assert!(estimator.images().is_empty());
        assert_eq!(estimator.stats().total_processed, 0);
    }

    #[test]
    fn test_estimate_at_native_resolution() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let estimator = loaded_estimator(model.clone(), 60_000);

        let map = estimator.estimate(png_bytes(4, 3)).expect("estimate");
        assert_eq!(map.dimensions(), (4, 3));
        assert_eq!(map.values()[6], 6.0);
        assert_eq!(estimator.progress(), 100.0);
        assert!(!estimator.is_processing());
        assert!(estimator.last_error().is_none());

        let seen = model.seen_urls.lock().expect("urls");
        assert!(seen[0].starts_with("blob:"));
        assert!(estimator.images().is_empty());

        let stats = estimator.stats();
        assert_eq!((stats.total_processed, stats.succeeded), (1, 1));
    }

    #[test]
    fn test_estimate_rescales_to_image_size() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let estimator = loaded_estimator(model, 60_000);

        let doubled = estimator.estimate(png_bytes(8, 6)).expect("estimate");
        assert_eq!(doubled.dimensions(), (8, 6));
        assert_eq!(doubled.values()[0], 0.0);

        let odd = estimator.estimate(png_bytes(5, 5)).expect("estimate");
        assert_eq!(odd.dimensions(), (5, 5));
        let (min, max) = odd.range().expect("non-empty");
        assert!(min >= -1e-4 && max <= 11.0 + 1e-4);
        assert!(max - min > 5.0, "depth range collapsed to ({min}, {max})");
    }

    #[derive(Debug)]
    struct PanickingModel;

    impl DepthModel for PanickingModel {
        fn run(&self, _image_url: &str) -> DepthResult<RawDepthTensor> {
            panic!("engine aborted");
        }
    }

    struct PanickingEngine;

    impl InferenceEngine for PanickingEngine {
        fn acquire(
            &self,
            _source_path: &str,
            _options: AcquireOptions,
            _on_progress: ProgressCallback<'_>,
        ) -> DepthResult<Arc<dyn DepthModel>> {
            Ok(Arc::new(PanickingModel))
        }
    }

    #[test]
    fn test_panicking_engine_clears_processing_flag() {
        let manager = Arc::new(ModelManager::new(
            Arc::new(PanickingEngine),
            LifecycleConfig {
                finalize_delay_ms: 0,
                progress_clear_delay_ms: 0,
            },
        ));
        manager
            .load(
                find_model("depth-anything-v2-small").expect("model"),
                ComputeBackend::Wasm,
                PrecisionLevel::Fp16,
            )
            .expect("load");
        let estimator = DepthEstimator::new(manager, ImageStore::new(), EstimatorConfig::default());

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            estimator.estimate(png_bytes(4, 3))
        }));
        assert!(outcome.is_err());
        assert!(!estimator.is_processing());
        assert!(estimator.images().is_empty());
    }

    #[test]
    fn test_inference_failure_keeps_model_loaded() {
        let model = Arc::new(FakeModel::failing("kernel crashed"));
        let estimator = loaded_estimator(model, 60_000);

        let result = estimator.estimate(png_bytes(4, 3));
        assert!(matches!(result, Err(DepthError::Inference { .. })));
        let message = estimator.last_error().expect("message");
        assert!(message.contains("kernel crashed"));
        assert!(!estimator.is_processing());
        assert!(estimator.images().is_empty());
        assert!(estimator.manager.is_loaded());
        assert_eq!(estimator.stats().failed, 1);
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let model = Arc::new(FakeModel::new(RawDepthTensor::new(3, 4, vec![0.0; 5])));
        let estimator = loaded_estimator(model, 60_000);
        assert!(matches!(
            estimator.estimate(png_bytes(4, 3)),
            Err(DepthError::ShapeMismatch {
                expected: 12,
                actual: 5
            })
        ));
        assert!(estimator.images().is_empty());
    }

    #[test]
    fn test_undecodable_bytes_release_object_url() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let estimator = loaded_estimator(model.clone(), 60_000);
        assert!(estimator.estimate(vec![1u8, 2, 3]).is_err());
        assert!(estimator.images().is_empty());
        assert_eq!(model.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_progress_expires_after_delay() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let estimator = loaded_estimator(model, 0);
        estimator.estimate(png_bytes(4, 3)).expect("estimate");
        assert_eq!(estimator.progress(), 0.0);
    }

    #[test]
    fn test_depth_map_from_tensor_falls_back_on_empty_source() {
        let map = depth_map_from_tensor(RawDepthTensor::new(0, 0, Vec::new()), 4, 3)
            .expect("fallback");
        assert_eq!(map.dimensions(), (0, 0));
    }
}
