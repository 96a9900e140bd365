use crate::bounding_box::BoundingBox;
use image::{codecs::jpeg::JpegEncoder, imageops, DynamicImage, ExtendedColorType, RgbImage};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Pixel buffer of {len} bytes does not match a {width}x{height} RGB frame")]
    InvalidBuffer { width: u32, height: u32, len: usize },
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(#[from] image::ImageError),
    #[error("Crop region is empty")]
    EmptyCrop,
}

/// Runs its callback once, when dropped.
pub struct ReleaseHook(Option<Box<dyn FnOnce() + Send + Sync>>);

impl ReleaseHook {
    pub fn new(cb: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self(Some(Box::new(cb)))
    }
}

impl Drop for ReleaseHook {
    fn drop(&mut self) {
        if let Some(cb) = self.0.take() {
            cb();
        }
    }
}

/// A single RGB camera frame.
///
/// Frames are moved through the pipeline and released when dropped, so a
/// frame handed to the predictor is released exactly once whichever way the
/// prediction ends.
pub struct Frame {
    image: RgbImage,
    release: Option<ReleaseHook>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        let len = data.len();
        let image = RgbImage::from_raw(width, height, data).ok_or(FrameError::InvalidBuffer {
            width,
            height,
            len,
        })?;
        Ok(Self::from_rgb(image))
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            image,
            release: None,
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::from_rgb(image.into_rgb8())
    }

    /// Attaches a callback that runs when the frame is released.
    pub fn with_release_hook(mut self, cb: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.release = Some(ReleaseHook::new(cb));
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copies the part of the frame covered by `region`. The copy carries no
    /// release hook.
    pub fn crop(&self, region: &BoundingBox) -> Result<Frame, FrameError> {
        let rect = region
            .to_pixels(self.width(), self.height())
            .ok_or(FrameError::EmptyCrop)?;
        let cropped =
            imageops::crop_imm(&self.image, rect.x, rect.y, rect.width, rect.height).to_image();
        Ok(Frame::from_rgb(cropped))
    }

    /// Encodes the frame as a baseline JPEG. `quality` is clamped to `1..=100`.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder.encode(
            self.image.as_raw(),
            self.width(),
            self.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buf)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("has_release_hook", &self.release.is_some())
            .finish()
    }
}
