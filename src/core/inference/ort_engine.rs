//! ONNX Runtime implementation of the inference engine contract.
//!
//! Model files are looked up under `<model_root>/<source_path>/onnx/`, read in
//! chunks so that loading reports byte-level progress, and committed to an ORT
//! session built with the execution provider matching the requested backend.

use super::engine::{
    AcquireOptions, DepthModel, Disposable, InferenceEngine, LoadProgress, ProgressCallback,
    RawDepthTensor,
};
use super::image_source::ImageStore;
use crate::core::config::{OrtEngineConfig, OrtGraphOptimizationLevel};
use crate::core::{DepthError, DepthResult, SimpleError};
use crate::domain::{ComputeBackend, Dtype};
use image::imageops::FilterType;
use ndarray::Array4;
use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::TensorRef;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// File name of the ONNX export for a dtype.
pub fn model_file_name(dtype: Dtype) -> &'static str {
    match dtype {
        Dtype::Fp32 => "model.onnx",
        Dtype::Fp16 => "model_fp16.onnx",
        Dtype::Q8 => "model_quantized.onnx",
        Dtype::Q4 => "model_q4.onnx",
        Dtype::Bnb4 => "model_bnb4.onnx",
        Dtype::Bnb8 => "model_bnb8.onnx",
    }
}

/// Builds the execution providers for a backend.
///
/// `auto` leaves the choice to ONNX Runtime; `wasm` pins the CPU provider.
/// Backends whose cargo feature is not compiled in are reported as errors.
pub fn execution_providers_for(
    backend: ComputeBackend,
    device_id: Option<i32>,
) -> Result<Vec<ExecutionProviderDispatch>, ort::Error> {
    let _ = device_id;
    match backend {
        ComputeBackend::Auto => Ok(Vec::new()),
        ComputeBackend::Wasm => Ok(vec![CPUExecutionProvider::default().build()]),
        #[cfg(feature = "directml")]
        ComputeBackend::Gpu => {
            let mut provider = ort::execution_providers::DirectMLExecutionProvider::default();
            if let Some(id) = device_id {
                provider = provider.with_device_id(id);
            }
            Ok(vec![provider.build()])
        }
        #[cfg(feature = "cuda")]
        ComputeBackend::Cuda => {
            let mut provider = ort::execution_providers::CUDAExecutionProvider::default();
            if let Some(id) = device_id {
                provider = provider.with_device_id(id);
            }
            Ok(vec![provider.build()])
        }
        #[cfg(feature = "webgpu")]
        ComputeBackend::WebGpu => Ok(vec![
            ort::execution_providers::WebGPUExecutionProvider::default().build(),
        ]),
        #[cfg(feature = "coreml")]
        ComputeBackend::WebNn => Ok(vec![
            ort::execution_providers::CoreMLExecutionProvider::default().build(),
        ]),
        #[cfg(feature = "openvino")]
        ComputeBackend::WebNnGpu | ComputeBackend::WebNnNpu | ComputeBackend::WebNnCpu => {
            let device_type = match backend {
                ComputeBackend::WebNnGpu => "GPU",
                ComputeBackend::WebNnNpu => "NPU",
                _ => "CPU",
            };
            Ok(vec![
                ort::execution_providers::OpenVINOExecutionProvider::default()
                    .with_device_type(device_type)
                    .build(),
            ])
        }
        #[allow(unreachable_patterns)]
        other => Err(ort::Error::new(format!(
            "{} execution provider requested but the matching cargo feature is not enabled",
            other.label()
        ))),
    }
}

fn apply_engine_config(
    mut builder: SessionBuilder,
    config: &OrtEngineConfig,
) -> Result<SessionBuilder, ort::Error> {
    builder = builder.with_log_level(LogLevel::Error)?;
    if let Some(intra) = config.intra_threads {
        builder = builder.with_intra_threads(intra)?;
    }
    if let Some(inter) = config.inter_threads {
        builder = builder.with_inter_threads(inter)?;
    }
    if let Some(level) = config.optimization_level {
        let mapped = match level {
            OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
            OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
            OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
            OrtGraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        };
        builder = builder.with_optimization_level(mapped)?;
    }
    Ok(builder)
}

/// Reads a file in chunks, reporting `(loaded, total)` after every chunk.
fn read_with_progress(
    path: &Path,
    chunk_bytes: usize,
    mut on_chunk: impl FnMut(u64, u64),
) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    let total = file.metadata()?.len();
    let mut bytes = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; chunk_bytes.max(1)];
    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
        on_chunk(bytes.len() as u64, total);
    }
    Ok(bytes)
}

/// [`InferenceEngine`] backed by ONNX Runtime sessions.
#[derive(Debug, Clone)]
pub struct OrtDepthEngine {
    config: OrtEngineConfig,
    images: ImageStore,
}

impl OrtDepthEngine {
    /// Creates an engine that resolves `blob:` URLs through the global image store.
    pub fn new(config: OrtEngineConfig) -> Self {
        Self::with_image_store(config, ImageStore::global().clone())
    }

    pub fn with_image_store(config: OrtEngineConfig, images: ImageStore) -> Self {
        Self { config, images }
    }

    pub fn config(&self) -> &OrtEngineConfig {
        &self.config
    }

    /// Location of the model file for a source path and dtype.
    pub fn model_path(&self, source_path: &str, dtype: Dtype) -> PathBuf {
        self.config
            .model_root
            .join(source_path)
            .join("onnx")
            .join(model_file_name(dtype))
    }
}

impl InferenceEngine for OrtDepthEngine {
    fn acquire(
        &self,
        source_path: &str,
        options: AcquireOptions,
        on_progress: ProgressCallback<'_>,
    ) -> DepthResult<Arc<dyn DepthModel>> {
        let path = self.model_path(source_path, options.dtype);
        let file = Some(model_file_name(options.dtype).to_string());
        let load_error = |message: String, source: Option<Box<dyn std::error::Error + Send + Sync>>| {
            DepthError::model_load_error(source_path, options.backend.as_str(), message, source)
        };

        on_progress(LoadProgress::Initiate { file: file.clone() });
        let bytes = read_with_progress(&path, self.config.read_chunk_bytes, |loaded, total| {
            on_progress(LoadProgress::Downloading {
                file: file.clone(),
                loaded,
                total,
            })
        })
        .map_err(|e| {
            load_error(
                format!("cannot read model file {}: {e}", path.display()),
                Some(Box::new(e)),
            )
        })?;

        on_progress(LoadProgress::Loading { file: file.clone() });
        let session = Session::builder()
            .and_then(|builder| apply_engine_config(builder, &self.config))
            .and_then(|builder| {
                let providers = execution_providers_for(options.backend, self.config.device_id)?;
                if providers.is_empty() {
                    Ok(builder)
                } else {
                    builder.with_execution_providers(providers)
                }
            })
            .and_then(|builder| builder.commit_from_memory(&bytes))
            .map_err(|e| load_error(e.to_string(), Some(Box::new(e))))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| load_error("model declares no inputs".to_string(), None))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| load_error("model declares no outputs".to_string(), None))?;
        on_progress(LoadProgress::Ready { file });

        tracing::debug!(
            model = source_path,
            backend = %options.backend,
            dtype = %options.dtype,
            input = %input_name,
            output = %output_name,
            "ONNX session ready"
        );

        Ok(Arc::new(OrtDepthModel {
            session: Mutex::new(Some(session)),
            input_name,
            output_name,
            input_size: self.config.input_size,
            model_name: source_path.to_string(),
            images: self.images.clone(),
        }))
    }
}

/// A loaded ONNX depth model.
pub struct OrtDepthModel {
    session: Mutex<Option<Session>>,
    input_name: String,
    output_name: String,
    input_size: u32,
    model_name: String,
    images: ImageStore,
}

impl std::fmt::Debug for OrtDepthModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtDepthModel")
            .field("model_name", &self.model_name)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_size", &self.input_size)
            .finish()
    }
}

impl OrtDepthModel {
    /// Resizes to the square model input and applies ImageNet normalization (NCHW).
    fn preprocess(&self, image: &image::DynamicImage) -> Array4<f32> {
        let size = self.input_size;
        let rgb = image
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgb8();
        let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
        tensor
    }
}

/// Interprets an ONNX output shape as `[height, width]`.
///
/// Accepts `[H, W]` and any shape with singleton leading axes such as `[1, H, W]`.
fn depth_dims(shape: &[i64]) -> DepthResult<[usize; 2]> {
    let invalid = || {
        DepthError::invalid_input(format!("unexpected depth output shape {shape:?}"))
    };
    if shape.len() < 2 || shape.iter().any(|&d| d < 0) {
        return Err(invalid());
    }
    let (leading, spatial) = shape.split_at(shape.len() - 2);
    if leading.iter().any(|&d| d != 1) {
        return Err(invalid());
    }
    Ok([spatial[0] as usize, spatial[1] as usize])
}

impl DepthModel for OrtDepthModel {
    fn run(&self, image_url: &str) -> DepthResult<RawDepthTensor> {
        let image = self.images.load_image(image_url)?;
        let input = self.preprocess(&image);
        let input_tensor = TensorRef::from_array_view(input.view()).map_err(|e| {
            DepthError::inference_error(&self.model_name, "tensor_conversion", e)
        })?;

        let mut guard = self
            .session
            .lock()
            .map_err(|_| {
                DepthError::inference_error(
                    &self.model_name,
                    "failed to acquire session lock",
                    SimpleError::new("session lock poisoned"),
                )
            })?;
        let session = guard.as_mut().ok_or_else(|| {
            DepthError::inference_error(
                &self.model_name,
                "session has been disposed",
                SimpleError::new("model released"),
            )
        })?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| DepthError::inference_error(&self.model_name, "forward_pass", e))?;
        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                DepthError::inference_error(
                    &self.model_name,
                    &format!("failed to extract output tensor '{}' as f32", self.output_name),
                    e,
                )
            })?;
        let [height, width] = depth_dims(shape)?;
        let tensor = RawDepthTensor::new(height, width, data.to_vec());
        tensor.validate()?;
        Ok(tensor)
    }

    fn disposable(&self) -> Option<&dyn Disposable> {
        Some(self)
    }
}

impl Disposable for OrtDepthModel {
    fn dispose(&self) -> DepthResult<()> {
        let mut guard = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.take().is_some() {
            tracing::debug!(model = %self.model_name, "ONNX session disposed");
        }
        Ok(())
    }
}
