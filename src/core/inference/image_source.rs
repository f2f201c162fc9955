//! Image references passed to inference engines.
//!
//! Engines receive images as URLs. In-memory bytes are registered in an
//! [`ImageStore`] under a `blob:` URL for the duration of a call; the
//! [`ScopedObjectUrl`] guard revokes the entry when it goes out of scope, on
//! success and error paths alike.

use crate::core::{DepthError, DepthResult};
use base64::Engine;
use image::{DynamicImage, ImageReader};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

const BLOB_SCHEME: &str = "blob:";
const FILE_SCHEME: &str = "file://";

/// An image handed to the estimator.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    /// A `blob:`, `data:` or `file://` URL, or a plain path string.
    Url(String),
    /// A path on the local filesystem.
    Path(PathBuf),
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        ImageInput::Bytes(bytes)
    }
}

impl From<&str> for ImageInput {
    fn from(url: &str) -> Self {
        ImageInput::Url(url.to_string())
    }
}

impl From<String> for ImageInput {
    fn from(url: String) -> Self {
        ImageInput::Url(url)
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

impl From<&Path> for ImageInput {
    fn from(path: &Path) -> Self {
        ImageInput::Path(path.to_path_buf())
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
    next_id: AtomicU64,
}

/// Registry of in-memory images addressable by `blob:` URLs.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    inner: Arc<StoreInner>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used when no store is configured explicitly.
    pub fn global() -> &'static ImageStore {
        static GLOBAL: OnceLock<ImageStore> = OnceLock::new();
        GLOBAL.get_or_init(ImageStore::new)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<[u8]>>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `bytes` and returns a guard that revokes the URL on drop.
    pub fn create_object_url(&self, bytes: impl Into<Arc<[u8]>>) -> ScopedObjectUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{BLOB_SCHEME}depthlens/{id}");
        self.entries().insert(url.clone(), bytes.into());
        tracing::trace!(%url, "Created object URL");
        ScopedObjectUrl {
            store: self.clone(),
            url,
        }
    }

    /// Removes a URL from the registry. Returns false if it was not registered.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.entries().remove(url).is_some();
        if removed {
            tracing::trace!(%url, "Revoked object URL");
        }
        removed
    }

    /// Number of live object URLs.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries().contains_key(url)
    }

    /// Turns an input into a URL, minting a scoped object URL for raw bytes.
    pub fn resolve(&self, input: ImageInput) -> ResolvedUrl {
        match input {
            ImageInput::Bytes(bytes) => ResolvedUrl::Scoped(self.create_object_url(bytes)),
            ImageInput::Url(url) => ResolvedUrl::Plain(url),
            ImageInput::Path(path) => ResolvedUrl::Plain(path.to_string_lossy().into_owned()),
        }
    }

    /// Loads the encoded bytes behind a URL.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::UnsupportedSource`] for revoked blobs and remote URLs.
    pub fn load_bytes(&self, url: &str) -> DepthResult<Arc<[u8]>> {
        if url.starts_with(BLOB_SCHEME) {
            return self
                .entries()
                .get(url)
                .cloned()
                .ok_or_else(|| DepthError::UnsupportedSource {
                    source_ref: url.to_string(),
                });
        }
        if let Some(rest) = url.strip_prefix("data:") {
            let (_, payload) =
                rest.split_once(";base64,")
                    .ok_or_else(|| DepthError::UnsupportedSource {
                        source_ref: url.chars().take(32).collect(),
                    })?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| DepthError::serialization_error(format!("invalid data URL: {e}")))?;
            return Ok(bytes.into());
        }
        let path = local_path(url)?;
        Ok(std::fs::read(path)?.into())
    }

    /// Reads the natural width and height from the image header.
    pub fn read_dimensions(&self, url: &str) -> DepthResult<(u32, u32)> {
        if url.starts_with(BLOB_SCHEME) || url.starts_with("data:") {
            let bytes = self.load_bytes(url)?;
            let reader = ImageReader::new(Cursor::new(&bytes[..])).with_guessed_format()?;
            return Ok(reader.into_dimensions()?);
        }
        let reader = ImageReader::open(local_path(url)?)?.with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    /// Fully decodes the image behind a URL.
    pub fn load_image(&self, url: &str) -> DepthResult<DynamicImage> {
        let bytes = self.load_bytes(url)?;
        let reader = ImageReader::new(Cursor::new(&bytes[..])).with_guessed_format()?;
        Ok(reader.decode()?)
    }
}

fn local_path(url: &str) -> DepthResult<PathBuf> {
    if url.contains("://") && !url.starts_with(FILE_SCHEME) {
        return Err(DepthError::UnsupportedSource {
            source_ref: url.to_string(),
        });
    }
    Ok(PathBuf::from(url.strip_prefix(FILE_SCHEME).unwrap_or(url)))
}

/// A registered object URL, revoked when dropped.
#[derive(Debug)]
pub struct ScopedObjectUrl {
    store: ImageStore,
    url: String,
}

impl ScopedObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ScopedObjectUrl {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}

/// A URL ready to hand to an engine.
#[derive(Debug)]
pub enum ResolvedUrl {
    /// Minted for in-memory bytes; revoked on drop.
    Scoped(ScopedObjectUrl),
    /// Supplied by the caller.
    Plain(String),
}

impl ResolvedUrl {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedUrl::Scoped(scoped) => scoped.as_str(),
            ResolvedUrl::Plain(url) => url,
        }
    }
}
