//! Model lifecycle management.
//!
//! [`ModelManager`] owns the single live model handle. It drives the
//! `idle → loading → loaded | error` state machine, translates engine progress
//! ticks into an overall loading percentage, and makes sure a load that has been
//! overtaken by a release or a newer load can never install its handle.

use crate::core::config::LifecycleConfig;
use crate::core::inference::{AcquireOptions, DepthModel, InferenceEngine, LoadProgress};
use crate::core::{DepthError, DepthResult};
use crate::domain::{ComputeBackend, ModelDescriptor, PrecisionLevel};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Overall percentage reported when a load starts.
pub const LOAD_STARTED_PERCENT: f64 = 5.0;
/// Overall percentage once the engine starts fetching files.
pub const INITIATE_PERCENT: f64 = 10.0;
/// Upper bound of the download band.
pub const DOWNLOAD_CEILING_PERCENT: f64 = 80.0;
/// Overall percentage while the engine instantiates the model.
pub const LOADING_PERCENT: f64 = 85.0;
/// Overall percentage once the engine reports the model ready.
pub const READY_PERCENT: f64 = 95.0;
/// Overall percentage once the handle is installed.
pub const INSTALLED_PERCENT: f64 = 98.0;

/// Lifecycle state of the managed model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Error => "error",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient detail about an in-progress load.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProgressSnapshot {
    /// Download percentage while bytes are transferring, the overall percentage otherwise.
    pub percentage: f64,
    pub bytes_loaded: u64,
    pub bytes_total: u64,
    pub speed_bytes_per_sec: Option<f64>,
    pub eta_seconds: Option<f64>,
    pub current_file: Option<String>,
}

/// Notifications emitted by the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    StateChanged(LoadState),
    Progress {
        percentage: f64,
        snapshot: Option<ProgressSnapshot>,
    },
}

/// Receiver of [`LifecycleEvent`]s.
pub type LifecycleListener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Maps a byte count onto `(download_percent, overall_percent)`.
///
/// The overall value occupies the band between [`INITIATE_PERCENT`] and
/// [`DOWNLOAD_CEILING_PERCENT`].
pub fn download_percentages(loaded: u64, total: u64) -> (f64, f64) {
    if total == 0 {
        return (0.0, INITIATE_PERCENT);
    }
    let download = loaded as f64 / total as f64 * 100.0;
    let overall = (INITIATE_PERCENT + download.round() * 0.7).min(DOWNLOAD_CEILING_PERCENT);
    (download, overall)
}

/// Transfer speed in bytes per second and the seconds left at that speed.
///
/// Returns `None` when no time has elapsed. The ETA is 0 when the speed is 0.
pub fn transfer_estimate(delta_bytes: u64, elapsed: Duration, remaining: u64) -> Option<(f64, f64)> {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return None;
    }
    let speed = delta_bytes as f64 / seconds;
    let eta = if speed > 0.0 {
        remaining as f64 / speed
    } else {
        0.0
    };
    Some((speed, eta))
}

#[derive(Default)]
struct ManagerState {
    handle: Option<Arc<dyn DepthModel>>,
    status: LoadState,
    descriptor: Option<&'static ModelDescriptor>,
    backend: Option<ComputeBackend>,
    precision: Option<PrecisionLevel>,
    current_model: Option<String>,
    loading_percentage: f64,
    progress: Option<ProgressSnapshot>,
    progress_expires_at: Option<Instant>,
    last_error: Option<String>,
    last_tick: Option<(Instant, u64)>,
}

impl ManagerState {
    fn expire_progress(&mut self, now: Instant) {
        if self.progress_expires_at.is_some_and(|deadline| now >= deadline) {
            self.progress_expires_at = None;
            self.progress = None;
            self.loading_percentage = 0.0;
        }
    }

    fn clear_progress(&mut self) {
        self.progress = None;
        self.progress_expires_at = None;
        self.loading_percentage = 0.0;
        self.last_tick = None;
    }

    fn describe_current(&self) -> String {
        self.current_model
            .clone()
            .or_else(|| {
                self.descriptor
                    .map(|descriptor| descriptor.source_path.to_string())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn is_configuration(
        &self,
        descriptor: &ModelDescriptor,
        backend: ComputeBackend,
        precision: PrecisionLevel,
    ) -> bool {
        self.descriptor.is_some_and(|d| d.id == descriptor.id)
            && self.backend == Some(backend)
            && self.precision == Some(precision)
    }
}

/// Owner of the single live model handle.
pub struct ModelManager {
    engine: Arc<dyn InferenceEngine>,
    config: LifecycleConfig,
    state: Mutex<ManagerState>,
    generation: AtomicU64,
    listener: Mutex<Option<LifecycleListener>>,
}

impl fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("ModelManager")
            .field("status", &state.status)
            .field("current_model", &state.current_model)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl ModelManager {
    pub fn new(engine: Arc<dyn InferenceEngine>, config: LifecycleConfig) -> Self {
        Self {
            engine,
            config,
            state: Mutex::new(ManagerState::default()),
            generation: AtomicU64::new(0),
            listener: Mutex::new(None),
        }
    }

    /// Installs the receiver of lifecycle events, replacing any previous one.
    pub fn set_listener(&self, listener: LifecycleListener) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: LifecycleEvent) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener(&event);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Loads `descriptor` on `backend` at `precision`.
    ///
    /// Blocks until the model is usable. A handle that is still live must be
    /// released first; asking for the configuration that is already loaded is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// * [`DepthError::ModelAlreadyLoaded`] if another configuration is live.
    /// * [`DepthError::ModelLoad`] if the engine fails.
    /// * [`DepthError::LoadSuperseded`] if a release or a newer load happened
    ///   while this one was in flight.
    pub fn load(
        &self,
        descriptor: &'static ModelDescriptor,
        backend: ComputeBackend,
        precision: PrecisionLevel,
    ) -> DepthResult<()> {
        let generation = {
            let mut state = self.lock_state();
            if state.handle.is_some() {
                if state.is_configuration(descriptor, backend, precision) {
                    tracing::debug!(model = descriptor.id, %backend, %precision, "Model already loaded");
                    return Ok(());
                }
                let current = state.describe_current();
                let error = DepthError::ModelAlreadyLoaded { current };
                state.last_error = Some(error.to_string());
                return Err(error);
            }

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.status = LoadState::Loading;
            state.descriptor = Some(descriptor);
            state.backend = Some(backend);
            state.precision = Some(precision);
            state.current_model = None;
            state.last_error = None;
            state.clear_progress();
            state.loading_percentage = LOAD_STARTED_PERCENT;
            generation
        };
        self.emit(LifecycleEvent::StateChanged(LoadState::Loading));
        self.emit(LifecycleEvent::Progress {
            percentage: LOAD_STARTED_PERCENT,
            snapshot: None,
        });

        let options = AcquireOptions {
            backend,
            dtype: precision.dtype(),
        };
        tracing::info!(
            model = descriptor.source_path,
            %backend,
            %precision,
            dtype = %options.dtype,
            "Loading model"
        );

        let on_progress = |event: LoadProgress| self.on_progress(generation, event);
        let acquired = self
            .engine
            .acquire(descriptor.source_path, options, &on_progress);

        let handle = match acquired {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail_load(generation, descriptor, backend, e)),
        };

        {
            let mut state = self.lock_state();
            if !self.is_current(generation) {
                drop(state);
                tracing::info!(model = descriptor.source_path, "Discarding superseded model load");
                Self::dispose_handle(&handle);
                return Err(DepthError::LoadSuperseded {
                    model: descriptor.source_path.to_string(),
                });
            }
            state.handle = Some(handle);
            state.loading_percentage = INSTALLED_PERCENT;
        }
        self.emit(LifecycleEvent::Progress {
            percentage: INSTALLED_PERCENT,
            snapshot: None,
        });

        let delay = self.config.finalize_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let current_model = {
            let mut state = self.lock_state();
            if !self.is_current(generation) {
                return Err(DepthError::LoadSuperseded {
                    model: descriptor.source_path.to_string(),
                });
            }
            let current_model = format!("{} ({}, {})", descriptor.source_path, backend, precision);
            state.status = LoadState::Loaded;
            state.loading_percentage = 100.0;
            state.current_model = Some(current_model.clone());
            state.progress_expires_at = Some(Instant::now() + self.config.progress_clear_delay());
            current_model
        };
        tracing::info!(model = %current_model, "Model loaded");
        self.emit(LifecycleEvent::Progress {
            percentage: 100.0,
            snapshot: None,
        });
        self.emit(LifecycleEvent::StateChanged(LoadState::Loaded));
        Ok(())
    }

    fn fail_load(
        &self,
        generation: u64,
        descriptor: &ModelDescriptor,
        backend: ComputeBackend,
        error: DepthError,
    ) -> DepthError {
        let detail = match &error {
            DepthError::ModelLoad { message, .. } => message.clone(),
            other => other.user_message(),
        };
        let message = format!("Failed to load model on {backend}: {detail}");
        {
            let mut state = self.lock_state();
            if !self.is_current(generation) {
                drop(state);
                tracing::debug!(model = descriptor.source_path, error = %error, "Superseded load failed");
                return DepthError::LoadSuperseded {
                    model: descriptor.source_path.to_string(),
                };
            }
            state.status = LoadState::Error;
            state.last_error = Some(message.clone());
            state.clear_progress();
        }
        tracing::error!(model = descriptor.source_path, %backend, "{message}");
        self.emit(LifecycleEvent::StateChanged(LoadState::Error));
        DepthError::model_load_error(
            descriptor.source_path,
            backend.as_str(),
            message,
            Some(Box::new(error)),
        )
    }

    fn on_progress(&self, generation: u64, event: LoadProgress) {
        let (percentage, snapshot) = {
            let mut state = self.lock_state();
            if !self.is_current(generation) {
                return;
            }
            let now = Instant::now();
            let mut snapshot = state.progress.clone().unwrap_or_default();
            match event {
                LoadProgress::Initiate { file } => {
                    state.last_tick = Some((now, 0));
                    state.loading_percentage = INITIATE_PERCENT;
                    snapshot = ProgressSnapshot {
                        percentage: INITIATE_PERCENT,
                        current_file: file,
                        ..ProgressSnapshot::default()
                    };
                }
                LoadProgress::Downloading {
                    file,
                    loaded,
                    total,
                } => {
                    if loaded == 0 || total == 0 {
                        return;
                    }
                    let (download, overall) = download_percentages(loaded, total);
                    let estimate = state.last_tick.and_then(|(at, previous)| {
                        transfer_estimate(
                            loaded.saturating_sub(previous),
                            now.saturating_duration_since(at),
                            total.saturating_sub(loaded),
                        )
                    });
                    if let Some((speed, eta)) = estimate {
                        snapshot.speed_bytes_per_sec = Some(speed);
                        snapshot.eta_seconds = Some(eta);
                    }
                    state.last_tick = Some((now, loaded));
                    state.loading_percentage = overall;
                    snapshot.percentage = download;
                    snapshot.bytes_loaded = loaded;
                    snapshot.bytes_total = total;
                    snapshot.current_file = file.or(snapshot.current_file);
                }
                LoadProgress::Loading { file } => {
                    state.loading_percentage = LOADING_PERCENT;
                    snapshot.percentage = LOADING_PERCENT;
                    snapshot.current_file = file.or(snapshot.current_file);
                }
                LoadProgress::Ready { file } => {
                    state.loading_percentage = READY_PERCENT;
                    snapshot.percentage = READY_PERCENT;
                    snapshot.current_file = file.or(snapshot.current_file);
                }
            }
            tracing::debug!(
                percentage = state.loading_percentage,
                bytes_loaded = snapshot.bytes_loaded,
                bytes_total = snapshot.bytes_total,
                "Model load progress"
            );
            state.progress = Some(snapshot.clone());
            (state.loading_percentage, snapshot)
        };
        self.emit(LifecycleEvent::Progress {
            percentage,
            snapshot: Some(snapshot),
        });
    }

    /// Drops the live handle and invalidates any in-flight load.
    ///
    /// Safe to call repeatedly. Dispose failures are logged and swallowed.
    pub fn release(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let (handle, previous) = {
            let mut state = self.lock_state();
            let previous = state.status;
            let handle = state.handle.take();
            state.status = LoadState::Idle;
            state.descriptor = None;
            state.backend = None;
            state.precision = None;
            state.current_model = None;
            state.clear_progress();
            (handle, previous)
        };

        if let Some(handle) = handle {
            tracing::info!("Releasing model");
            Self::dispose_handle(&handle);
        }
        if previous != LoadState::Idle {
            self.emit(LifecycleEvent::StateChanged(LoadState::Idle));
        }
    }

    fn dispose_handle(handle: &Arc<dyn DepthModel>) {
        if let Some(disposable) = handle.disposable()
            && let Err(e) = disposable.dispose()
        {
            tracing::warn!(error = %e, "Failed to dispose model");
        }
    }

    /// Handle to run inference with, if the model is fully loaded.
    ///
    /// # Errors
    ///
    /// [`DepthError::NotReady`] without a handle, [`DepthError::ModelNotLoaded`]
    /// while the handle is still being finalized.
    pub fn ready_model(&self) -> DepthResult<Arc<dyn DepthModel>> {
        let state = self.lock_state();
        match (&state.handle, state.status) {
            (None, _) => Err(DepthError::NotReady),
            (Some(handle), LoadState::Loaded) => Ok(handle.clone()),
            (Some(_), _) => Err(DepthError::ModelNotLoaded),
        }
    }

    /// `"<source_path> (<backend>, <precision>)"` of the loaded model.
    pub fn current_model(&self) -> Option<String> {
        self.lock_state().current_model.clone()
    }

    pub fn status(&self) -> LoadState {
        self.lock_state().status
    }

    pub fn is_loaded(&self) -> bool {
        self.status() == LoadState::Loaded
    }

    pub fn has_model(&self) -> bool {
        self.lock_state().handle.is_some()
    }

    pub fn progress(&self) -> Option<ProgressSnapshot> {
        let mut state = self.lock_state();
        state.expire_progress(Instant::now());
        state.progress.clone()
    }

    pub fn loading_percentage(&self) -> f64 {
        let mut state = self.lock_state();
        state.expire_progress(Instant::now());
        state.loading_percentage
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock_state().last_error.clone()
    }

    pub fn current_precision(&self) -> Option<PrecisionLevel> {
        self.lock_state().precision
    }

    pub fn current_backend(&self) -> Option<ComputeBackend> {
        self.lock_state().backend
    }

    pub fn current_descriptor(&self) -> Option<&'static ModelDescriptor> {
        self.lock_state().descriptor
    }
}

impl Drop for ModelManager {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::find_model;
    use crate::pipeline::test_support::{FakeEngine, FakeModel, GatedEngine, ramp_tensor};

    fn instant_config() -> LifecycleConfig {
        LifecycleConfig {
            finalize_delay_ms: 0,
            progress_clear_delay_ms: 60_000,
        }
    }

    fn small() -> &'static ModelDescriptor {
        find_model("depth-anything-v2-small").expect("catalog model")
    }

    #[test]
    fn test_download_percentages() {
        assert_eq!(download_percentages(0, 100), (0.0, 10.0));
        assert_eq!(download_percentages(50, 100), (50.0, 45.0));
        assert_eq!(download_percentages(100, 100), (100.0, 80.0));
        let (download, overall) = download_percentages(1, 3);
        assert!((download - 33.333).abs() < 0.01);
        assert!((overall - (10.0 + 33.0 * 0.7)).abs() < 1e-9);
    }

    #[test]
    fn test_transfer_estimate() {
        assert_eq!(transfer_estimate(100, Duration::ZERO, 50), None);
        assert_eq!(
            transfer_estimate(1000, Duration::from_secs(2), 1500),
            Some((500.0, 3.0))
        );
        assert_eq!(
            transfer_estimate(0, Duration::from_secs(1), 1500),
            Some((0.0, 0.0))
        );
    }

    #[test]
    fn test_load_reports_current_model() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let engine = Arc::new(FakeEngine::new(model));
        let manager = ModelManager::new(engine.clone(), instant_config());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        manager.set_listener(Arc::new(move |event: &LifecycleEvent| {
            sink.lock().expect("events").push(event.clone())
        }));

        manager
            .load(small(), ComputeBackend::Wasm, PrecisionLevel::Fp16)
            .expect("load");

        assert_eq!(manager.status(), LoadState::Loaded);
        assert_eq!(
            manager.current_model().as_deref(),
            Some("onnx-community/depth-anything-v2-small (wasm, fp16)")
        );
        assert_eq!(manager.loading_percentage(), 100.0);
        assert_eq!(manager.current_precision(), Some(PrecisionLevel::Fp16));
        assert!(manager.last_error().is_none());

        let acquired = engine.acquired.lock().expect("acquired");
        assert_eq!(acquired[0].0, "onnx-community/depth-anything-v2-small");
        assert_eq!(acquired[0].1.dtype, crate::domain::Dtype::Fp16);

        let percentages: Vec<f64> = events
            .lock()
            .expect("events")
            .iter()
            .filter_map(|event| match event {
                LifecycleEvent::Progress { percentage, .. } => Some(*percentage),
                _ => None,
            })
            .collect();
        assert_eq!(
            percentages,
            vec![5.0, 10.0, 45.0, 80.0, 85.0, 95.0, 98.0, 100.0]
        );
    }

    #[test]
    fn test_progress_snapshot_tracks_bytes() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let manager = ModelManager::new(Arc::new(FakeEngine::new(model)), instant_config());
        manager
            .load(small(), ComputeBackend::Wasm, PrecisionLevel::Fp16)
            .expect("load");

        let snapshot = manager.progress().expect("snapshot");
        assert_eq!(snapshot.percentage, READY_PERCENT);
        assert_eq!(snapshot.bytes_loaded, 100);
        assert_eq!(snapshot.bytes_total, 100);
        assert_eq!(snapshot.current_file.as_deref(), Some("onnx/model_fp16.onnx"));
    }

    #[test]
    fn test_progress_expires_lazily() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let config = LifecycleConfig {
            finalize_delay_ms: 0,
            progress_clear_delay_ms: 0,
        };
        let manager = ModelManager::new(Arc::new(FakeEngine::new(model)), config);
        manager
            .load(small(), ComputeBackend::Wasm, PrecisionLevel::Fp16)
            .expect("load");

        assert!(manager.progress().is_none());
        assert_eq!(manager.loading_percentage(), 0.0);
        assert!(manager.is_loaded());
    }

    #[test]
    fn test_identical_load_is_noop_and_other_config_rejected() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let engine = Arc::new(FakeEngine::new(model.clone()));
        let manager = ModelManager::new(engine.clone(), instant_config());

        manager
            .load(small(), ComputeBackend::Wasm, PrecisionLevel::Fp16)
            .expect("load");
        manager
            .load(small(), ComputeBackend::Wasm, PrecisionLevel::Fp16)
            .expect("same configuration");
        assert_eq!(engine.acquire_count(), 1);

        let result = manager.load(small(), ComputeBackend::Wasm, PrecisionLevel::Q4);
        assert!(matches!(result, Err(DepthError::ModelAlreadyLoaded { .. })));
        assert!(manager.last_error().is_some());
        assert!(manager.is_loaded());
        assert_eq!(model.disposals(), 0);
    }

    #[test]
    fn test_load_failure_records_message() {
        let manager = ModelManager::new(
            Arc::new(FakeEngine::failing("out of memory")),
            instant_config(),
        );
        let result = manager.load(small(), ComputeBackend::WebGpu, PrecisionLevel::Fp32);

        match result {
            Err(DepthError::ModelLoad { message, .. }) => {
                assert_eq!(message, "Failed to load model on webgpu: out of memory")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(manager.status(), LoadState::Error);
        assert_eq!(
            manager.last_error().as_deref(),
            Some("Failed to load model on webgpu: out of memory")
        );
        assert!(manager.progress().is_none());
        assert!(matches!(manager.ready_model(), Err(DepthError::NotReady)));
    }

    #[test]
    fn test_release_is_idempotent() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let manager = ModelManager::new(Arc::new(FakeEngine::new(model.clone())), instant_config());
        manager
            .load(small(), ComputeBackend::Wasm, PrecisionLevel::Fp16)
            .expect("load");

        manager.release();
        manager.release();

        assert_eq!(model.disposals(), 1);
        assert_eq!(manager.status(), LoadState::Idle);
        assert!(manager.current_model().is_none());
        assert!(manager.current_precision().is_none());
        assert!(!manager.has_model());
    }

    #[test]
    fn test_release_during_load_disposes_late_handle() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let (engine, gate) = GatedEngine::new(model.clone());
        let manager = Arc::new(ModelManager::new(Arc::new(engine), instant_config()));

        let loader = {
            let manager = manager.clone();
            std::thread::spawn(move || {
                manager.load(small(), ComputeBackend::Wasm, PrecisionLevel::Fp16)
            })
        };

        gate.started.recv().expect("load started");
        assert_eq!(manager.status(), LoadState::Loading);
        manager.release();
        gate.open.send(()).expect("open gate");

        let result = loader.join().expect("loader thread");
        assert!(matches!(result, Err(DepthError::LoadSuperseded { .. })));
        assert_eq!(model.disposals(), 1);
        assert_eq!(manager.status(), LoadState::Idle);
        assert!(!manager.has_model());
        assert!(manager.progress().is_none());
    }

    fn base() -> &'static ModelDescriptor {
        find_model("depth-anything-v2-base").expect("catalog model")
    }

    fn spawn_load(
        manager: &Arc<ModelManager>,
        descriptor: &'static ModelDescriptor,
        precision: PrecisionLevel,
    ) -> std::thread::JoinHandle<DepthResult<()>> {
        let manager = manager.clone();
        std::thread::spawn(move || manager.load(descriptor, ComputeBackend::Wasm, precision))
    }

    #[test]
    fn test_newer_load_wins_over_overlapping_load() {
        let first = Arc::new(FakeModel::new(ramp_tensor()));
        let second = Arc::new(FakeModel::new(ramp_tensor()));
        let (engine, gates) =
            GatedEngine::scripted(vec![Ok(first.clone()), Ok(second.clone())]);
        let manager = Arc::new(ModelManager::new(Arc::new(engine), instant_config()));

        let older = spawn_load(&manager, small(), PrecisionLevel::Fp16);
        gates[0].started.recv().expect("first load started");
        let newer = spawn_load(&manager, base(), PrecisionLevel::Fp32);
        gates[1].started.recv().expect("second load started");

        gates[0].open.send(()).expect("open first gate");
        let result = older.join().expect("older loader");
        assert!(matches!(result, Err(DepthError::LoadSuperseded { .. })));
        assert_eq!(first.disposals(), 1);
        assert_eq!(manager.status(), LoadState::Loading);
        assert!(!manager.has_model());

        gates[1].open.send(()).expect("open second gate");
        newer.join().expect("newer loader").expect("load");
        assert_eq!(manager.status(), LoadState::Loaded);
        assert_eq!(
            manager.current_model().as_deref(),
            Some("onnx-community/depth-anything-v2-base (wasm, fp32)")
        );
        assert_eq!(manager.current_precision(), Some(PrecisionLevel::Fp32));
        assert_eq!(second.disposals(), 0);
    }

    #[test]
    fn test_superseded_failure_leaves_newer_load_alone() {
        let second = Arc::new(FakeModel::new(ramp_tensor()));
        let (engine, gates) = GatedEngine::scripted(vec![
            Err("device lost".to_string()),
            Ok(second.clone()),
        ]);
        let manager = Arc::new(ModelManager::new(Arc::new(engine), instant_config()));

        let older = spawn_load(&manager, small(), PrecisionLevel::Fp16);
        gates[0].started.recv().expect("first load started");
        let newer = spawn_load(&manager, base(), PrecisionLevel::Fp32);
        gates[1].started.recv().expect("second load started");

        gates[0].open.send(()).expect("open first gate");
        let result = older.join().expect("older loader");
        assert!(matches!(result, Err(DepthError::LoadSuperseded { .. })));
        assert_eq!(manager.status(), LoadState::Loading);
        assert!(manager.last_error().is_none());

        gates[1].open.send(()).expect("open second gate");
        newer.join().expect("newer loader").expect("load");
        assert_eq!(manager.status(), LoadState::Loaded);
        assert!(manager.last_error().is_none());
        assert_eq!(manager.current_descriptor().map(|d| d.id), Some("depth-anything-v2-base"));
    }

    #[test]
    fn test_ready_model_during_finalize_is_not_loaded() {
        let model = Arc::new(FakeModel::new(ramp_tensor()));
        let config = LifecycleConfig {
            finalize_delay_ms: 300,
            progress_clear_delay_ms: 60_000,
        };
        let manager = Arc::new(ModelManager::new(Arc::new(FakeEngine::new(model)), config));

        let loader = {
            let manager = manager.clone();
            std::thread::spawn(move || {
                manager.load(small(), ComputeBackend::Wasm, PrecisionLevel::Fp16)
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while !manager.has_model() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(
            manager.ready_model(),
            Err(DepthError::ModelNotLoaded)
        ));

        loader.join().expect("loader thread").expect("load");
        assert!(manager.ready_model().is_ok());
    }
}
