use crate::frame::{Frame, FrameError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(feature = "webcam")]
use crate::camera::CameraError;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("No images found in {0:?}")]
    NoImages(PathBuf),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[cfg(feature = "webcam")]
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Frame source unavailable: {0}")]
    Unavailable(String),
}

/// Produces frames one at a time; `Ok(None)` ends the stream.
#[async_trait]
pub trait FrameSource: Send + 'static {
    async fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;
}

/// Replays the images of a directory in file name order.
#[derive(Debug)]
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
    loop_images: bool,
}

impl ImageDirSource {
    pub fn new(dir: &Path, loop_images: bool) -> Result<Self, FrameSourceError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(FrameSourceError::NoImages(dir.to_path_buf()));
        }
        paths.sort();
        tracing::info!("Replaying {} images from {:?}", paths.len(), dir);

        Ok(Self {
            paths,
            next: 0,
            loop_images,
        })
    }
}

#[async_trait]
impl FrameSource for ImageDirSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        if self.next >= self.paths.len() {
            if !self.loop_images {
                return Ok(None);
            }
            self.next = 0;
        }

        let path = self.paths[self.next].clone();
        self.next += 1;

        let bytes = tokio::fs::read(&path).await?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| FrameSourceError::Decode { path, source })?;

        Ok(Some(Frame::from_dynamic(image)))
    }
}
