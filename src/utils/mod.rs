//! Utility functions for the depth pipeline.
//!
//! Display formatting for load progress and session persistence of rendered
//! depth images.

pub mod format;
pub mod persistence;

pub use format::{format_file_size, format_speed, format_time, loading_stage_caption};
pub use persistence::{
    COLORED_KEY, CanvasPersistence, GRAYSCALE_KEY, JsonFileSessionStore, MemorySessionStore,
    READY_KEY, RestoredImages, SessionStore,
};
