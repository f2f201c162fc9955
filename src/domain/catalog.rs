//! Static catalogs of depth models, compute backends and precision levels.

use crate::core::DepthError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A depth model that can be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    /// Stable identifier used for selection.
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Repository-style path the engine resolves model files from.
    pub source_path: &'static str,
    pub size_hint: &'static str,
}

/// Every model the pipeline knows how to load, in display order.
pub static AVAILABLE_MODELS: [ModelDescriptor; 4] = [
    ModelDescriptor {
        id: "depth-anything-v2-large",
        display_name: "Depth Anything V2 Large",
        description: "Best quality, slowest",
        source_path: "onnx-community/depth-anything-v2-large",
        size_hint: "~150MB",
    },
    ModelDescriptor {
        id: "depth-anything-v2-small",
        display_name: "Depth Anything V2 Small",
        description: "Fast, balanced quality",
        source_path: "onnx-community/depth-anything-v2-small",
        size_hint: "~25MB",
    },
    ModelDescriptor {
        id: "depth-anything-v2-base",
        display_name: "Depth Anything V2 Base",
        description: "Better quality, slower",
        source_path: "onnx-community/depth-anything-v2-base",
        size_hint: "~90MB",
    },
    ModelDescriptor {
        id: "dpt-hybrid-midas",
        display_name: "DPT Hybrid MiDaS",
        description: "Alternative model",
        source_path: "Xenova/dpt-hybrid-midas",
        size_hint: "~45MB",
    },
];

/// Identifier of the model selected when nothing else is configured (the first catalog entry).
pub const DEFAULT_MODEL_ID: &str = "depth-anything-v2-large";

/// Looks up a catalog entry by id.
pub fn find_model(id: &str) -> Option<&'static ModelDescriptor> {
    AVAILABLE_MODELS.iter().find(|model| model.id == id)
}

/// Returns true when `id` names a catalog model.
pub fn can_model_be_loaded(id: &str) -> bool {
    find_model(id).is_some()
}

/// Broad family a compute backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendClass {
    CpuBaseline,
    GpuGeneric,
    GpuSpecialized,
    NeuralAccelerator,
}

/// Compute execution target for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComputeBackend {
    /// Let the engine pick.
    #[serde(rename = "auto")]
    Auto,
    /// Portable CPU execution.
    #[default]
    #[serde(rename = "wasm")]
    Wasm,
    #[serde(rename = "gpu")]
    Gpu,
    #[serde(rename = "webgpu")]
    WebGpu,
    #[serde(rename = "cuda")]
    Cuda,
    #[serde(rename = "webnn")]
    WebNn,
    #[serde(rename = "webnn-gpu")]
    WebNnGpu,
    #[serde(rename = "webnn-npu")]
    WebNnNpu,
    #[serde(rename = "webnn-cpu")]
    WebNnCpu,
}

impl ComputeBackend {
    /// All backends in display order.
    pub const ALL: [ComputeBackend; 9] = [
        ComputeBackend::Auto,
        ComputeBackend::Wasm,
        ComputeBackend::WebGpu,
        ComputeBackend::Gpu,
        ComputeBackend::Cuda,
        ComputeBackend::WebNn,
        ComputeBackend::WebNnGpu,
        ComputeBackend::WebNnNpu,
        ComputeBackend::WebNnCpu,
    ];

    /// Stable identifier, also used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            ComputeBackend::Auto => "auto",
            ComputeBackend::Wasm => "wasm",
            ComputeBackend::Gpu => "gpu",
            ComputeBackend::WebGpu => "webgpu",
            ComputeBackend::Cuda => "cuda",
            ComputeBackend::WebNn => "webnn",
            ComputeBackend::WebNnGpu => "webnn-gpu",
            ComputeBackend::WebNnNpu => "webnn-npu",
            ComputeBackend::WebNnCpu => "webnn-cpu",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ComputeBackend::Auto => "Auto",
            ComputeBackend::Wasm => "WebAssembly",
            ComputeBackend::Gpu => "GPU",
            ComputeBackend::WebGpu => "WebGPU",
            ComputeBackend::Cuda => "CUDA",
            ComputeBackend::WebNn => "WebNN",
            ComputeBackend::WebNnGpu => "WebNN (GPU)",
            ComputeBackend::WebNnNpu => "WebNN (NPU)",
            ComputeBackend::WebNnCpu => "WebNN (CPU)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ComputeBackend::Auto => "Best backend the runtime can offer",
            ComputeBackend::Wasm => "CPU-based, works everywhere",
            ComputeBackend::Gpu => "GPU acceleration (if available)",
            ComputeBackend::WebGpu => "GPU acceleration (modern runtimes)",
            ComputeBackend::Cuda => "NVIDIA GPU acceleration",
            ComputeBackend::WebNn => "Neural network accelerator, device chosen by the runtime",
            ComputeBackend::WebNnGpu => "Neural network API on the GPU",
            ComputeBackend::WebNnNpu => "Neural network API on a dedicated NPU",
            ComputeBackend::WebNnCpu => "Neural network API on the CPU",
        }
    }

    pub fn class(self) -> BackendClass {
        match self {
            ComputeBackend::Auto | ComputeBackend::Wasm => BackendClass::CpuBaseline,
            ComputeBackend::Gpu | ComputeBackend::Cuda => BackendClass::GpuGeneric,
            ComputeBackend::WebGpu => BackendClass::GpuSpecialized,
            ComputeBackend::WebNn
            | ComputeBackend::WebNnGpu
            | ComputeBackend::WebNnNpu
            | ComputeBackend::WebNnCpu => BackendClass::NeuralAccelerator,
        }
    }

    /// Backends that are reported as supported without probing.
    pub fn is_always_supported(self) -> bool {
        matches!(self, ComputeBackend::Auto | ComputeBackend::Wasm)
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputeBackend {
    type Err = DepthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ComputeBackend::ALL
            .into_iter()
            .find(|backend| backend.as_str() == needle)
            .ok_or_else(|| DepthError::invalid_input(format!("unknown compute backend '{s}'")))
    }
}

/// Numeric representation the engine executes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Fp32,
    Fp16,
    Q8,
    Q4,
    Bnb4,
    Bnb8,
}

impl Dtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Dtype::Fp32 => "fp32",
            Dtype::Fp16 => "fp16",
            Dtype::Q8 => "q8",
            Dtype::Q4 => "q4",
            Dtype::Bnb4 => "bnb4",
            Dtype::Bnb8 => "bnb8",
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing precision / quantization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionLevel {
    Fp32,
    #[default]
    Fp16,
    Q8,
    Q4,
    Int8,
    Bnb4,
    Bnb8,
}

impl PrecisionLevel {
    pub const ALL: [PrecisionLevel; 7] = [
        PrecisionLevel::Fp32,
        PrecisionLevel::Fp16,
        PrecisionLevel::Q8,
        PrecisionLevel::Q4,
        PrecisionLevel::Int8,
        PrecisionLevel::Bnb4,
        PrecisionLevel::Bnb8,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrecisionLevel::Fp32 => "fp32",
            PrecisionLevel::Fp16 => "fp16",
            PrecisionLevel::Q8 => "q8",
            PrecisionLevel::Q4 => "q4",
            PrecisionLevel::Int8 => "int8",
            PrecisionLevel::Bnb4 => "bnb4",
            PrecisionLevel::Bnb8 => "bnb8",
        }
    }

    /// Execution dtype for this level. `int8` runs on the `q8` weights.
    pub fn dtype(self) -> Dtype {
        match self {
            PrecisionLevel::Fp32 => Dtype::Fp32,
            PrecisionLevel::Fp16 => Dtype::Fp16,
            PrecisionLevel::Q8 | PrecisionLevel::Int8 => Dtype::Q8,
            PrecisionLevel::Q4 => Dtype::Q4,
            PrecisionLevel::Bnb4 => Dtype::Bnb4,
            PrecisionLevel::Bnb8 => Dtype::Bnb8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PrecisionLevel::Fp32 => "FP32",
            PrecisionLevel::Fp16 => "FP16",
            PrecisionLevel::Q8 => "Q8",
            PrecisionLevel::Q4 => "Q4",
            PrecisionLevel::Int8 => "INT8",
            PrecisionLevel::Bnb4 => "BNB4",
            PrecisionLevel::Bnb8 => "BNB8",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PrecisionLevel::Fp32 => "Full precision, best quality",
            PrecisionLevel::Fp16 => "Half precision, good quality",
            PrecisionLevel::Q8 => "8-bit quantized, smaller size",
            PrecisionLevel::Q4 => "4-bit quantized, fastest",
            PrecisionLevel::Int8 => "Integer 8-bit, optimized",
            PrecisionLevel::Bnb4 => "4-bit BitsAndBytes",
            PrecisionLevel::Bnb8 => "8-bit BitsAndBytes",
        }
    }

    pub fn size_hint(self) -> &'static str {
        match self {
            PrecisionLevel::Fp32 => "~100MB",
            PrecisionLevel::Fp16 => "~50MB",
            PrecisionLevel::Q8 | PrecisionLevel::Int8 | PrecisionLevel::Bnb8 => "~25MB",
            PrecisionLevel::Q4 | PrecisionLevel::Bnb4 => "~12MB",
        }
    }
}

impl fmt::Display for PrecisionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrecisionLevel {
    type Err = DepthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        PrecisionLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == needle)
            .ok_or_else(|| DepthError::invalid_input(format!("unknown precision level '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(AVAILABLE_MODELS.len(), 4);
        let small = find_model("depth-anything-v2-small").expect("catalog entry");
        assert_eq!(small.source_path, "onnx-community/depth-anything-v2-small");
        assert!(can_model_be_loaded("dpt-hybrid-midas"));
        assert!(!can_model_be_loaded("zoedepth"));
        assert!(can_model_be_loaded(DEFAULT_MODEL_ID));
    }

    #[test]
    fn test_backend_round_trip_through_strings() {
        for backend in ComputeBackend::ALL {
            assert_eq!(backend.as_str().parse::<ComputeBackend>().ok(), Some(backend));
        }
        assert!("tpu".parse::<ComputeBackend>().is_err());
    }

    #[test]
    fn test_backend_classes() {
        assert_eq!(ComputeBackend::Wasm.class(), BackendClass::CpuBaseline);
        assert_eq!(ComputeBackend::Cuda.class(), BackendClass::GpuGeneric);
        assert_eq!(ComputeBackend::WebGpu.class(), BackendClass::GpuSpecialized);
        assert_eq!(ComputeBackend::WebNnNpu.class(), BackendClass::NeuralAccelerator);
        assert!(ComputeBackend::Auto.is_always_supported());
        assert!(!ComputeBackend::WebGpu.is_always_supported());
    }

    #[test]
    fn test_precision_dtype_mapping() {
        assert_eq!(PrecisionLevel::Int8.dtype(), Dtype::Q8);
        assert_eq!(PrecisionLevel::Q8.dtype(), Dtype::Q8);
        assert_eq!(PrecisionLevel::Fp16.dtype(), Dtype::Fp16);
        assert_eq!(PrecisionLevel::Bnb4.dtype(), Dtype::Bnb4);
        assert_eq!(PrecisionLevel::Fp32.size_hint(), "~100MB");
    }

    #[test]
    fn test_serde_identifiers() {
        let json = serde_json::to_string(&ComputeBackend::WebNnGpu).expect("serialize");
        assert_eq!(json, "\"webnn-gpu\"");
        let level: PrecisionLevel = serde_json::from_str("\"int8\"").expect("deserialize");
        assert_eq!(level, PrecisionLevel::Int8);
    }
}
