use crate::{bounding_box::BoundingBox, frame::Frame};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Hand detection failed: {0}")]
    DetectionFailed(String),
}

/// Normalised landmark position; `x` and `y` are in `0.0..=1.0` of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Landmarks of one detected hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    pub landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// Smallest box holding every landmark, `None` for an empty set.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.landmarks.first()?;
        let init = BoundingBox {
            x1: first.x,
            y1: first.y,
            x2: first.x,
            y2: first.y,
        };
        Some(self.landmarks.iter().fold(init, |acc, lm| BoundingBox {
            x1: acc.x1.min(lm.x),
            y1: acc.y1.min(lm.y),
            x2: acc.x2.max(lm.x),
            y2: acc.y2.max(lm.y),
        }))
    }
}

/// Finds hands in a frame. Frames with no hands never reach the predictor.
#[async_trait]
pub trait HandDetector: Send + Sync + 'static {
    async fn detect(&self, frame: &Frame) -> Result<Vec<LandmarkSet>, DetectorError>;
}

/// Reports one landmark-less hand for every frame, leaving hand detection to
/// the remote classifier, which rejects frames without a hand.
#[derive(Debug, Clone, Default)]
pub struct RemoteHandCheck;

#[async_trait]
impl HandDetector for RemoteHandCheck {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<LandmarkSet>, DetectorError> {
        Ok(vec![LandmarkSet::default()])
    }
}
