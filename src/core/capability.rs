//! Compute backend capability detection.
//!
//! A [`CapabilityDetector`] runs one probe per backend and reports which
//! backends look usable. Probes are isolated from each other: an error or a
//! panic inside one probe marks that backend unsupported and detection moves
//! on to the next.

use crate::domain::ComputeBackend;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Outcome of a single probe.
pub type ProbeResult = Result<bool, Box<dyn std::error::Error + Send + Sync>>;

/// A capability probe.
pub type Probe = Box<dyn Fn() -> ProbeResult + Send + Sync>;

/// Backend support as observed by [`CapabilityDetector::detect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityMap {
    supported: HashMap<ComputeBackend, bool>,
}

impl CapabilityMap {
    /// Returns whether `backend` was reported supported.
    ///
    /// Backends that were never probed count as unsupported unless they are
    /// always available.
    pub fn is_supported(&self, backend: ComputeBackend) -> bool {
        backend.is_always_supported() || self.supported.get(&backend).copied().unwrap_or(false)
    }

    /// Supported backends in display order.
    pub fn supported_backends(&self) -> Vec<ComputeBackend> {
        ComputeBackend::ALL
            .into_iter()
            .filter(|backend| self.is_supported(*backend))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComputeBackend, bool)> + '_ {
        ComputeBackend::ALL
            .into_iter()
            .map(|backend| (backend, self.is_supported(backend)))
    }

    fn insert(&mut self, backend: ComputeBackend, supported: bool) {
        self.supported.insert(backend, supported);
    }
}

/// Runs registered probes and collects a [`CapabilityMap`].
pub struct CapabilityDetector {
    probes: Vec<(ComputeBackend, Probe)>,
}

impl std::fmt::Debug for CapabilityDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDetector")
            .field(
                "probes",
                &self.probes.iter().map(|(b, _)| *b).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for CapabilityDetector {
    fn default() -> Self {
        Self::with_ort_probes()
    }
}

impl CapabilityDetector {
    /// Creates a detector without probes.
    pub fn new() -> Self {
        Self { probes: Vec::new() }
    }

    /// Creates a detector that probes ONNX Runtime execution providers.
    ///
    /// Providers whose cargo feature is not enabled probe `false`.
    pub fn with_ort_probes() -> Self {
        ComputeBackend::ALL
            .into_iter()
            .filter(|backend| !backend.is_always_supported())
            .fold(Self::new(), |detector, backend| {
                detector.with_probe(backend, move || ort_provider_available(backend))
            })
    }

    /// Registers a probe for `backend`, replacing any existing one.
    pub fn with_probe(
        mut self,
        backend: ComputeBackend,
        probe: impl Fn() -> ProbeResult + Send + Sync + 'static,
    ) -> Self {
        self.probes.retain(|(b, _)| *b != backend);
        self.probes.push((backend, Box::new(probe)));
        self
    }

    /// Runs every probe in sequence.
    pub fn detect(&self) -> CapabilityMap {
        let mut map = CapabilityMap::default();
        map.insert(ComputeBackend::Auto, true);
        map.insert(ComputeBackend::Wasm, true);

        for (backend, probe) in &self.probes {
            if backend.is_always_supported() {
                continue;
            }
            let supported = match catch_unwind(AssertUnwindSafe(probe)) {
                Ok(Ok(supported)) => supported,
                Ok(Err(e)) => {
                    tracing::debug!(backend = %backend, error = %e, "Capability probe failed");
                    false
                }
                Err(_) => {
                    tracing::debug!(backend = %backend, "Capability probe panicked");
                    false
                }
            };
            tracing::debug!(backend = %backend, supported, "Capability probed");
            map.insert(*backend, supported);
        }
        map
    }
}

/// Asks ONNX Runtime whether the execution provider behind `backend` is usable.
pub fn ort_provider_available(backend: ComputeBackend) -> ProbeResult {
    #[allow(unused_imports)]
    use ort::execution_providers::ExecutionProvider;

    match backend {
        ComputeBackend::Auto | ComputeBackend::Wasm => Ok(true),
        #[cfg(feature = "directml")]
        ComputeBackend::Gpu => {
            Ok(ort::execution_providers::DirectMLExecutionProvider::default().is_available()?)
        }
        #[cfg(feature = "cuda")]
        ComputeBackend::Cuda => {
            Ok(ort::execution_providers::CUDAExecutionProvider::default().is_available()?)
        }
        #[cfg(feature = "webgpu")]
        ComputeBackend::WebGpu => {
            Ok(ort::execution_providers::WebGPUExecutionProvider::default().is_available()?)
        }
        #[cfg(feature = "coreml")]
        ComputeBackend::WebNn => {
            Ok(ort::execution_providers::CoreMLExecutionProvider::default().is_available()?)
        }
        #[cfg(feature = "openvino")]
        ComputeBackend::WebNnGpu | ComputeBackend::WebNnNpu | ComputeBackend::WebNnCpu => {
            Ok(ort::execution_providers::OpenVINOExecutionProvider::default().is_available()?)
        }
        #[allow(unreachable_patterns)]
        _ => Ok(false),
    }
}
