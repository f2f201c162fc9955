//! The depth pipeline.
//!
//! This module wires model lifecycle management, inference orchestration and
//! visualization state into a single [`DepthSession`].

pub mod estimator;
pub mod lifecycle;
pub mod session;
pub mod stats;
pub mod visualization;

#[cfg(test)]
pub(crate) mod test_support;

pub use estimator::{DepthEstimator, EstimationEvent, EstimationListener, depth_map_from_tensor};
pub use lifecycle::{
    LifecycleEvent, LifecycleListener, LoadState, ModelManager, ProgressSnapshot,
    download_percentages, transfer_estimate,
};
pub use session::{DepthSession, PipelineEvent, PipelineObserver, PipelineState};
pub use stats::{EstimationStats, StatsManager};
pub use visualization::{
    HIGH_QUALITY_SCALE, HoverDepth, ImageVariant, RenderCounters, RenderOutcome,
    VisualizationCoordinator,
};
