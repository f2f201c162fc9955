//! Inference engine integration.
//!
//! [`engine`] defines the contract the pipeline depends on, [`image_source`]
//! resolves image inputs to URLs the engine can read, and [`ort_engine`]
//! implements the contract on top of ONNX Runtime.

pub mod engine;
pub mod image_source;
pub mod ort_engine;

pub use engine::{
    AcquireOptions, DepthModel, Disposable, InferenceEngine, LoadProgress, ProgressCallback,
    RawDepthTensor,
};
pub use image_source::{ImageInput, ImageStore, ResolvedUrl, ScopedObjectUrl};
pub use ort_engine::{OrtDepthEngine, OrtDepthModel, execution_providers_for, model_file_name};
