use crate::bounding_box::BoundingBox;
use crate::classifier::{ClassifierError, GestureClassifier};
use crate::direction::{Direction, GestureMap};
use crate::frame::{Frame, FrameError};
use crate::telemetry::Metrics;
use crate::throttle::Throttle;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionOutcome {
    /// The throttle interval had not elapsed; nothing was sent.
    Skipped,
    NoDirection,
    Direction(Direction),
}

impl PredictionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionOutcome::Skipped => "skipped",
            PredictionOutcome::NoDirection => "no_direction",
            PredictionOutcome::Direction(_) => "direction",
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            PredictionOutcome::Direction(direction) => Some(*direction),
            _ => None,
        }
    }
}

/// Sends at most one frame per throttle interval to the gesture classifier
/// and maps the returned label to a direction.
///
/// Every failure (encoding, network, non-success status, missing or unknown
/// label) ends as [`PredictionOutcome::NoDirection`]; nothing is retried.
pub struct ThrottledPredictor<C: GestureClassifier> {
    classifier: C,
    gestures: GestureMap,
    throttle: Mutex<Throttle>,
    jpeg_quality: u8,
    metrics: Arc<Metrics>,
}

impl<C: GestureClassifier> ThrottledPredictor<C> {
    pub fn new(
        classifier: C,
        gestures: GestureMap,
        interval: Duration,
        jpeg_quality: u8,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            classifier,
            gestures,
            throttle: Mutex::new(Throttle::new(interval)),
            jpeg_quality,
            metrics,
        }
    }

    pub async fn predict(&self, frame: Frame, now: Instant) -> PredictionOutcome {
        self.predict_region(frame, None, now).await
    }

    /// Like [`predict`](Self::predict), but submits only `region` of the frame
    /// when one is given.
    #[instrument(skip(self, frame), fields(width = frame.width(), height = frame.height()))]
    pub async fn predict_region(
        &self,
        frame: Frame,
        region: Option<BoundingBox>,
        now: Instant,
    ) -> PredictionOutcome {
        let accepted = self.throttle.lock().try_acquire(now);
        if !accepted {
            tracing::trace!("Throttle interval not elapsed, skipping frame");
            self.metrics.record_prediction(PredictionOutcome::Skipped.as_str());
            return PredictionOutcome::Skipped;
        }

        let started = Instant::now();
        let outcome = match self.classify(frame, region).await {
            Ok(Some(label)) => match self.gestures.lookup(&label) {
                Some(direction) => {
                    tracing::info!("Mapped gesture {} to direction {}", label, direction);
                    PredictionOutcome::Direction(direction)
                }
                None => {
                    tracing::info!("Unknown gesture: {}", label);
                    PredictionOutcome::NoDirection
                }
            },
            Ok(None) => {
                tracing::warn!("No class in classifier response");
                PredictionOutcome::NoDirection
            }
            Err(PredictionError::Classifier(ClassifierError::Rejected { status, body })) => {
                tracing::warn!("Classifier error: {} {}", status, body);
                PredictionOutcome::NoDirection
            }
            Err(e) => {
                tracing::error!("Prediction failed: {:?}", e);
                PredictionOutcome::NoDirection
            }
        };

        self.metrics
            .record_prediction_duration(started.elapsed().as_millis() as u64);
        self.metrics.record_prediction(outcome.as_str());

        outcome
    }

    async fn classify(
        &self,
        frame: Frame,
        region: Option<BoundingBox>,
    ) -> Result<Option<String>, PredictionError> {
        let jpeg = match region {
            Some(region) => frame.crop(&region)?.encode_jpeg(self.jpeg_quality)?,
            None => frame.encode_jpeg(self.jpeg_quality)?,
        };
        drop(frame);

        let response = self.classifier.classify(jpeg).await?;
        Ok(response.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{counted_frame, MockClassifier};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INTERVAL: Duration = Duration::from_millis(1000);

    fn predictor(classifier: MockClassifier) -> ThrottledPredictor<MockClassifier> {
        ThrottledPredictor::new(
            classifier,
            GestureMap::default(),
            INTERVAL,
            80,
            Arc::new(Metrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_only_first_call_within_interval_reaches_classifier() {
        let classifier = MockClassifier::label("one");
        let calls = classifier.calls();
        let predictor = predictor(classifier);
        let released = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        let first = predictor.predict(counted_frame(&released), start).await;
        let second = predictor
            .predict(counted_frame(&released), start + Duration::from_millis(999))
            .await;
        let third = predictor
            .predict(counted_frame(&released), start + INTERVAL)
            .await;

        assert_eq!(first, PredictionOutcome::Direction(Direction::Up));
        assert_eq!(second, PredictionOutcome::Skipped);
        assert_eq!(third, PredictionOutcome::Direction(Direction::Up));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_labels_map_case_insensitively() {
        for (label, expected) in [
            ("one", Some(Direction::Up)),
            ("FIST", Some(Direction::Down)),
            ("Two", Some(Direction::Left)),
            ("three", Some(Direction::Right)),
            ("wave", None),
        ] {
            let predictor = predictor(MockClassifier::label(label));
            let released = Arc::new(AtomicUsize::new(0));

            let outcome = predictor.predict(counted_frame(&released), Instant::now()).await;

            assert_eq!(outcome.direction(), expected, "label {}", label);
            assert_eq!(released.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_missing_class_yields_no_direction() {
        let predictor = predictor(MockClassifier::missing_class());
        let released = Arc::new(AtomicUsize::new(0));

        let outcome = predictor.predict(counted_frame(&released), Instant::now()).await;

        assert_eq!(outcome, PredictionOutcome::NoDirection);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_request_yields_no_direction() {
        let predictor = predictor(MockClassifier::status(StatusCode::UNPROCESSABLE_ENTITY));
        let released = Arc::new(AtomicUsize::new(0));

        let outcome = predictor.predict(counted_frame(&released), Instant::now()).await;

        assert_eq!(outcome, PredictionOutcome::NoDirection);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classifier_error_yields_no_direction() {
        let predictor = predictor(MockClassifier::malformed());
        let released = Arc::new(AtomicUsize::new(0));

        let outcome = predictor.predict(counted_frame(&released), Instant::now()).await;

        assert_eq!(outcome, PredictionOutcome::NoDirection);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_encoding_failure_still_releases_frame_and_consumes_interval() {
        let classifier = MockClassifier::label("one");
        let calls = classifier.calls();
        let predictor = predictor(classifier);
        let released = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let empty = BoundingBox {
            x1: 0.5,
            y1: 0.5,
            x2: 0.5,
            y2: 0.5,
        };

        let outcome = predictor
            .predict_region(counted_frame(&released), Some(empty), start)
            .await;
        let next = predictor
            .predict(counted_frame(&released), start + Duration::from_millis(10))
            .await;

        assert_eq!(outcome, PredictionOutcome::NoDirection);
        assert_eq!(next, PredictionOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cropped_region_is_submitted() {
        let classifier = MockClassifier::label("two");
        let sizes = classifier.sizes();
        let predictor = predictor(classifier);
        let released = Arc::new(AtomicUsize::new(0));
        let half = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 0.5,
            y2: 0.5,
        };

        let outcome = predictor
            .predict_region(counted_frame(&released), Some(half), Instant::now())
            .await;

        assert_eq!(outcome, PredictionOutcome::Direction(Direction::Left));
        assert_eq!(sizes.lock().as_slice(), &[(8, 6)]);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
