//! The narrow contract between the pipeline and an inference engine.
//!
//! The pipeline never touches tensors or sessions directly. It asks an
//! [`InferenceEngine`] to acquire a model for a `(backend, dtype)` pair and then
//! runs that model against image URLs, receiving a raw `[h, w]` depth tensor.

use crate::core::{DepthError, DepthResult};
use crate::domain::{ComputeBackend, Dtype};
use std::fmt;
use std::sync::Arc;

/// Options forwarded to [`InferenceEngine::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    pub backend: ComputeBackend,
    pub dtype: Dtype,
}

/// Progress notifications emitted while a model is acquired.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadProgress {
    /// The engine started fetching a file.
    Initiate { file: Option<String> },
    /// Byte-level transfer progress for a file.
    Downloading {
        file: Option<String>,
        loaded: u64,
        total: u64,
    },
    /// Files are fetched and the model is being instantiated.
    Loading { file: Option<String> },
    /// The model is instantiated.
    Ready { file: Option<String> },
}

/// Callback the engine invokes for every [`LoadProgress`] tick.
pub type ProgressCallback<'a> = &'a (dyn Fn(LoadProgress) + Send + Sync);

/// Raw depth output of a model, before any rescaling.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDepthTensor {
    /// `[height, width]`
    pub dims: [usize; 2],
    /// Row-major depth values.
    pub data: Vec<f32>,
}

impl RawDepthTensor {
    pub fn new(height: usize, width: usize, data: Vec<f32>) -> Self {
        Self {
            dims: [height, width],
            data,
        }
    }

    pub fn height(&self) -> usize {
        self.dims[0]
    }

    pub fn width(&self) -> usize {
        self.dims[1]
    }

    /// Checks that `data` holds exactly `height * width` values.
    pub fn validate(&self) -> DepthResult<()> {
        let expected = self.height() * self.width();
        if self.data.len() != expected {
            return Err(DepthError::shape_mismatch(expected, self.data.len()));
        }
        if u32::try_from(self.height()).is_err() || u32::try_from(self.width()).is_err() {
            return Err(DepthError::invalid_input(format!(
                "depth tensor dims {:?} exceed the supported image size",
                self.dims
            )));
        }
        Ok(())
    }
}

/// Optional capability for models that hold releasable resources.
pub trait Disposable: Send + Sync {
    /// Frees the model's resources. Called at most once, on release.
    fn dispose(&self) -> DepthResult<()>;
}

/// A loaded model handle.
pub trait DepthModel: Send + Sync + fmt::Debug {
    /// Runs depth estimation on the image behind `image_url`.
    fn run(&self, image_url: &str) -> DepthResult<RawDepthTensor>;

    /// Returns the model's dispose capability, if it has one.
    fn disposable(&self) -> Option<&dyn Disposable> {
        None
    }
}

/// Black-box inference service that turns a model source into a runnable handle.
pub trait InferenceEngine: Send + Sync {
    /// Acquires a model, reporting progress through `on_progress`.
    ///
    /// This call blocks until the model is usable or acquisition fails.
    fn acquire(
        &self,
        source_path: &str,
        options: AcquireOptions,
        on_progress: ProgressCallback<'_>,
    ) -> DepthResult<Arc<dyn DepthModel>>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Arc<E> {
    fn acquire(
        &self,
        source_path: &str,
        options: AcquireOptions,
        on_progress: ProgressCallback<'_>,
    ) -> DepthResult<Arc<dyn DepthModel>> {
        (**self).acquire(source_path, options, on_progress)
    }
}
