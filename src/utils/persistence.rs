//! Session persistence for rendered depth images.
//!
//! Rendered images are stored as PNG data URLs in a string key-value
//! [`SessionStore`]. A separate ready marker guards restoration so that a
//! half-written snapshot is never restored.

use crate::core::{DepthError, DepthResult};
use depthlens_core::processors::{decode_data_url, encode_png, to_data_url};
use image::RgbaImage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key of the grayscale rendering.
pub const GRAYSCALE_KEY: &str = "depth-grayscale-canvas";
/// Key of the colored rendering.
pub const COLORED_KEY: &str = "depth-colored-canvas";
/// Key of the ready marker.
pub const READY_KEY: &str = "depth-canvas-ready";

/// String key-value storage scoped to a session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> DepthResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> DepthResult<()>;
    fn remove(&self, key: &str) -> DepthResult<()>;
}

/// Store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> DepthResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> DepthResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> DepthResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every write rewrites the whole file.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> DepthResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            DepthError::serialization_error(format!(
                "invalid session store {}: {e}",
                self.path.display()
            ))
        })
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> DepthResult<()> {
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| DepthError::serialization_error(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> DepthResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read()?;
        f(&mut entries);
        self.write(&entries)
    }
}

impl SessionStore for JsonFileSessionStore {
    fn get(&self, key: &str) -> DepthResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> DepthResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> DepthResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

/// Images recovered from a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoredImages {
    pub grayscale: Option<RgbaImage>,
    pub colored: Option<RgbaImage>,
}

/// Saves and restores rendered depth images through a [`SessionStore`].
pub struct CanvasPersistence<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> CanvasPersistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Writes each present image as a PNG data URL.
    pub fn snapshot(
        &self,
        grayscale: Option<&RgbaImage>,
        colored: Option<&RgbaImage>,
    ) -> DepthResult<()> {
        for (key, image) in [(GRAYSCALE_KEY, grayscale), (COLORED_KEY, colored)] {
            if let Some(image) = image {
                let url = to_data_url(&encode_png(image)?);
                self.store.set(key, &url)?;
            }
        }
        tracing::debug!(
            grayscale = grayscale.is_some(),
            colored = colored.is_some(),
            "Persisted depth canvases"
        );
        Ok(())
    }

    /// Marks the stored snapshot as complete.
    pub fn mark_ready(&self) -> DepthResult<()> {
        self.store.set(READY_KEY, "true")
    }

    /// Decodes the stored images, or returns `None` when no snapshot was marked ready.
    ///
    /// Entries that fail to decode are skipped.
    pub fn restore(&self) -> DepthResult<Option<RestoredImages>> {
        if self.store.get(READY_KEY)?.as_deref() != Some("true") {
            return Ok(None);
        }
        let decode = |key: &str| -> DepthResult<Option<RgbaImage>> {
            let Some(url) = self.store.get(key)? else {
                return Ok(None);
            };
            match decode_data_url(&url) {
                Ok(image) => Ok(Some(image)),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Skipping undecodable persisted canvas");
                    Ok(None)
                }
            }
        };
        Ok(Some(RestoredImages {
            grayscale: decode(GRAYSCALE_KEY)?,
            colored: decode(COLORED_KEY)?,
        }))
    }

    /// Removes the images and the ready marker.
    pub fn clear(&self) -> DepthResult<()> {
        for key in [GRAYSCALE_KEY, COLORED_KEY, READY_KEY] {
            self.store.remove(key)?;
        }
        Ok(())
    }
}
