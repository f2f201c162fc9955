//! In-memory engines and models for pipeline tests.

use crate::core::inference::{
    AcquireOptions, DepthModel, Disposable, InferenceEngine, LoadProgress, ProgressCallback,
    RawDepthTensor,
};
use crate::core::{DepthError, DepthResult, SimpleError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

/// Model that returns a fixed tensor and counts runs and disposals.
#[derive(Debug)]
pub struct FakeModel {
    pub tensor: RawDepthTensor,
    pub fail_with: Option<String>,
    pub runs: AtomicUsize,
    pub disposals: AtomicUsize,
    pub seen_urls: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn new(tensor: RawDepthTensor) -> Self {
        Self {
            tensor,
            fail_with: None,
            runs: AtomicUsize::new(0),
            disposals: AtomicUsize::new(0),
            seen_urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(RawDepthTensor::new(1, 1, vec![0.0]))
        }
    }

    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

impl DepthModel for FakeModel {
    fn run(&self, image_url: &str) -> DepthResult<RawDepthTensor> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.seen_urls
            .lock()
            .expect("seen urls")
            .push(image_url.to_string());
        match &self.fail_with {
            Some(message) => Err(DepthError::inference_error(
                "fake",
                "forward_pass",
                SimpleError::new(message.clone()),
            )),
            None => Ok(self.tensor.clone()),
        }
    }

    fn disposable(&self) -> Option<&dyn Disposable> {
        Some(self)
    }
}

impl Disposable for FakeModel {
    fn dispose(&self) -> DepthResult<()> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine that hands out a shared [`FakeModel`] after emitting a scripted
/// progress sequence.
pub struct FakeEngine {
    pub model: Arc<FakeModel>,
    pub progress: Vec<LoadProgress>,
    pub fail_with: Option<String>,
    pub acquired: Mutex<Vec<(String, AcquireOptions)>>,
}

impl FakeEngine {
    pub fn new(model: Arc<FakeModel>) -> Self {
        let file = Some("onnx/model_fp16.onnx".to_string());
        Self {
            model,
            progress: vec![
                LoadProgress::Initiate { file: file.clone() },
                LoadProgress::Downloading {
                    file: file.clone(),
                    loaded: 50,
                    total: 100,
                },
                LoadProgress::Downloading {
                    file: file.clone(),
                    loaded: 100,
                    total: 100,
                },
                LoadProgress::Loading { file: file.clone() },
                LoadProgress::Ready { file },
            ],
            fail_with: None,
            acquired: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(Arc::new(FakeModel::new(RawDepthTensor::new(1, 1, vec![0.0]))))
        }
    }

    pub fn acquire_count(&self) -> usize {
        self.acquired.lock().expect("acquired").len()
    }
}

impl InferenceEngine for FakeEngine {
    fn acquire(
        &self,
        source_path: &str,
        options: AcquireOptions,
        on_progress: ProgressCallback<'_>,
    ) -> DepthResult<Arc<dyn DepthModel>> {
        self.acquired
            .lock()
            .expect("acquired")
            .push((source_path.to_string(), options));
        for event in &self.progress {
            on_progress(event.clone());
        }
        match &self.fail_with {
            Some(message) => Err(DepthError::model_load_error(
                source_path,
                options.backend.as_str(),
                message.clone(),
                None,
            )),
            None => Ok(self.model.clone()),
        }
    }
}

/// Engine whose `acquire` calls each block until the test opens their gate.
///
/// Calls consume the scripted outcomes in arrival order.
pub struct GatedEngine {
    calls: Mutex<VecDeque<GatedCall>>,
}

struct GatedCall {
    outcome: Result<Arc<FakeModel>, String>,
    started: Sender<()>,
    open: Receiver<()>,
}

/// Test-side controls for one gated `acquire` call.
pub struct Gate {
    pub started: Receiver<()>,
    pub open: Sender<()>,
}

impl GatedEngine {
    /// A single call that succeeds with `model`.
    pub fn new(model: Arc<FakeModel>) -> (Self, Gate) {
        let (engine, mut gates) = Self::scripted(vec![Ok(model)]);
        let gate = gates.remove(0);
        (engine, gate)
    }

    /// One gated call per outcome; `Err` carries the engine failure message.
    pub fn scripted(outcomes: Vec<Result<Arc<FakeModel>, String>>) -> (Self, Vec<Gate>) {
        let mut calls = VecDeque::new();
        let mut gates = Vec::new();
        for outcome in outcomes {
            let (started_tx, started_rx) = channel();
            let (open_tx, open_rx) = channel();
            calls.push_back(GatedCall {
                outcome,
                started: started_tx,
                open: open_rx,
            });
            gates.push(Gate {
                started: started_rx,
                open: open_tx,
            });
        }
        (
            Self {
                calls: Mutex::new(calls),
            },
            gates,
        )
    }
}

impl InferenceEngine for GatedEngine {
    fn acquire(
        &self,
        source_path: &str,
        options: AcquireOptions,
        on_progress: ProgressCallback<'_>,
    ) -> DepthResult<Arc<dyn DepthModel>> {
        let call = self
            .calls
            .lock()
            .expect("calls")
            .pop_front()
            .expect("unscripted acquire");
        call.started.send(()).expect("signal start");
        call.open.recv().expect("gate opened");
        on_progress(LoadProgress::Ready { file: None });
        match call.outcome {
            Ok(model) => Ok(model),
            Err(message) => Err(DepthError::model_load_error(
                source_path,
                options.backend.as_str(),
                message,
                None,
            )),
        }
    }
}

/// A 4x3 tensor with values 0..12.
pub fn ramp_tensor() -> RawDepthTensor {
    RawDepthTensor::new(3, 4, (0..12).map(|v| v as f32).collect())
}

/// PNG bytes of a solid `width x height` image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([120, 80, 40, 255]));
    depthlens_core::processors::encode_png(&image).expect("encode png")
}
