use crate::config::SourceConfig;
use crate::frame::{Frame, FrameError};
use crate::frame_source::{FrameSource, FrameSourceError};
use async_trait::async_trait;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    OpenCameraFailed(opencv::Error),
    #[error("Camera {0} is not available")]
    NotOpened(i32),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(opencv::Error),
    #[error("Camera returned an empty frame")]
    EmptyFrame,
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

impl From<opencv::Error> for CameraError {
    fn from(err: opencv::Error) -> Self {
        CameraError::OpenCvError(err)
    }
}

/// Webcam frame source backed by OpenCV. Frames are converted to RGB and
/// scaled to the configured size.
pub struct Camera {
    capture: videoio::VideoCapture,
    size: Size,
}

impl Camera {
    pub fn new(config: &SourceConfig) -> Result<Self, CameraError> {
        let mut capture = videoio::VideoCapture::new(config.device_index, videoio::CAP_ANY)
            .map_err(CameraError::OpenCameraFailed)?;
        if !capture.is_opened()? {
            return Err(CameraError::NotOpened(config.device_index));
        }
        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;

        Ok(Self {
            capture,
            size: Size::new(config.width as i32, config.height as i32),
        })
    }

    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let mut bgr = Mat::default();
        let grabbed = self
            .capture
            .read(&mut bgr)
            .map_err(CameraError::ReadFrameFailed)?;
        if !grabbed || bgr.empty() {
            return Err(CameraError::EmptyFrame);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let rgb = if rgb.size()? != self.size {
            let mut resized = Mat::default();
            imgproc::resize(
                &rgb,
                &mut resized,
                self.size,
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
            resized
        } else {
            rgb
        };

        let data = rgb.data_bytes()?.to_vec();
        Ok(Frame::new(rgb.cols() as u32, rgb.rows() as u32, data)?)
    }
}

#[async_trait]
impl FrameSource for Camera {
    async fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        Ok(Some(self.capture_frame()?))
    }
}
