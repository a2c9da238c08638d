use crate::config::CaptureConfig;
use crate::engine::CapturedImage;
use crate::error::SessionError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Persists captured images and returns a URI the host can open.
///
/// Called from the session's serial executor, so implementations may block.
pub trait ImageStore: Send + Sync {
    fn store(&self, image: &CapturedImage) -> Result<String, SessionError>;
}

/// Writes each image to `<cache_dir>/<uuid>.<ext>`
#[derive(Debug, Clone)]
pub struct CacheDirImageStore {
    cache_dir: PathBuf,
    extension: String,
}

impl CacheDirImageStore {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(cache_dir: P, extension: S) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.cache_dir.clone(), config.file_extension.clone())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn image_path(&self) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", Uuid::new_v4(), self.extension))
    }
}

impl ImageStore for CacheDirImageStore {
    fn store(&self, image: &CapturedImage) -> Result<String, SessionError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| SessionError::ImageStore {
            details: format!("cannot create {}: {}", self.cache_dir.display(), e),
        })?;

        let path = self.image_path();
        std::fs::write(&path, &image.bytes).map_err(|e| SessionError::ImageStore {
            details: format!("cannot write {}: {}", path.display(), e),
        })?;

        info!(
            "Stored {}x{} image ({} bytes) at {}",
            image.width,
            image.height,
            image.bytes.len(),
            path.display()
        );
        Ok(format!("file://{}", path.display()))
    }
}

/// Keeps images in memory, keyed by their `memory://` URI
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: Mutex<HashMap<String, CapturedImage>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &str) -> Option<CapturedImage> {
        self.images.lock().get(uri).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageStore for MemoryImageStore {
    fn store(&self, image: &CapturedImage) -> Result<String, SessionError> {
        let uri = format!("memory://{}", Uuid::new_v4());
        self.images.lock().insert(uri.clone(), image.clone());
        debug!("Stored image in memory as {}", uri);
        Ok(uri)
    }
}
