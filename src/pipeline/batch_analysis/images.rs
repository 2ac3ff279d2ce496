//! Image retrieval for vision-batch analysis.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;

use super::traits::ImageStore;
use crate::models::Screenshot;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image store backed by a directory; image references are relative paths
/// under `root`.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a reference, refusing anything that could leave `root`.
    fn resolve(&self, image_ref: &str) -> Result<PathBuf, ImageError> {
        let relative = Path::new(image_ref);
        if image_ref.trim().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ImageError::InvalidReference(image_ref.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn fetch(&self, image_ref: &str) -> Result<Vec<u8>, ImageError> {
        let path = self.resolve(image_ref)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ImageError::NotFound(image_ref.to_string()))
            }
            Err(e) => Err(ImageError::Io(e)),
        }
    }
}

/// A screenshot together with its image bytes.
pub struct LoadedImage<'a> {
    pub screenshot: &'a Screenshot,
    pub bytes: Vec<u8>,
}

/// Fetch all images of a batch concurrently. Failed fetches are logged and
/// left out; order follows the input.
pub async fn load_batch_images<'a>(
    store: &dyn ImageStore,
    screenshots: &'a [Screenshot],
) -> Vec<LoadedImage<'a>> {
    let fetches = screenshots
        .iter()
        .map(|shot| async move { (shot, store.fetch(&shot.image_ref).await) });

    join_all(fetches)
        .await
        .into_iter()
        .filter_map(|(shot, result)| match result {
            Ok(bytes) => Some(LoadedImage {
                screenshot: shot,
                bytes,
            }),
            Err(e) => {
                tracing::warn!(
                    screenshot_id = %shot.id,
                    image_ref = %shot.image_ref,
                    error = %e,
                    "Skipping screenshot image"
                );
                None
            }
        })
        .collect()
}
