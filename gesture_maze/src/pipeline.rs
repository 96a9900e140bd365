use crate::classifier::GestureClassifier;
use crate::dispatch::DirectionDispatcher;
use crate::frame::Frame;
use crate::frame_source::{FrameSource, FrameSourceError};
use crate::landmarks::HandDetector;
use crate::prediction::{PredictionOutcome, ThrottledPredictor};
use crate::telemetry::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{sync::broadcast, task::JoinHandle, time::sleep};

/// Hand detector → throttled predictor → dispatcher, for one frame at a time.
pub struct FrameHandler<C: GestureClassifier> {
    detector: Box<dyn HandDetector>,
    predictor: ThrottledPredictor<C>,
    dispatcher: DirectionDispatcher,
    crop_margin: Option<f32>,
    metrics: Arc<Metrics>,
}

impl<C: GestureClassifier> FrameHandler<C> {
    pub fn new(
        detector: Box<dyn HandDetector>,
        predictor: ThrottledPredictor<C>,
        dispatcher: DirectionDispatcher,
        crop_margin: Option<f32>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            detector,
            predictor,
            dispatcher,
            crop_margin,
            metrics,
        }
    }

    pub async fn process_frame(&self, frame: Frame) -> PredictionOutcome {
        self.metrics.record_frame();

        let hands = match self.detector.detect(&frame).await {
            Ok(hands) => hands,
            Err(e) => {
                tracing::warn!("Hand detection failed: {}", e);
                return PredictionOutcome::NoDirection;
            }
        };
        let Some(hand) = hands.first() else {
            tracing::trace!("No hands in frame");
            return PredictionOutcome::NoDirection;
        };

        let region = self
            .crop_margin
            .and_then(|margin| hand.bounding_box().map(|bbox| bbox.expand(margin)));

        let outcome = self
            .predictor
            .predict_region(frame, region, Instant::now())
            .await;
        if let Some(direction) = outcome.direction() {
            self.dispatcher.dispatch(direction);
        }

        outcome
    }

    /// Waits for key events still scheduled by earlier frames.
    pub async fn flush(&self) {
        self.dispatcher.flush().await;
    }
}

/// Feeds frames from a source through a [`FrameHandler`].
pub struct Pipeline<C: GestureClassifier> {
    source: Box<dyn FrameSource>,
    handler: FrameHandler<C>,
    frame_delay: Duration,
    max_consecutive_failures: u64,
}

impl<C: GestureClassifier> Pipeline<C> {
    pub fn new(
        source: Box<dyn FrameSource>,
        handler: FrameHandler<C>,
        frame_delay: Duration,
        max_consecutive_failures: u64,
    ) -> Self {
        Self {
            source,
            handler,
            frame_delay,
            max_consecutive_failures,
        }
    }

    /// Runs the pipeline on its own task until the source is exhausted, too
    /// many consecutive source reads fail, or shutdown is signalled.
    pub fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut consecutive_failures = 0;
            let max_consecutive_failures = self.max_consecutive_failures;

            loop {
                tokio::select! {
                    result = self.step() => {
                        match result {
                            Ok(true) => {
                                consecutive_failures = 0;
                            }
                            Ok(false) => {
                                tracing::info!("Frame source exhausted");
                                break;
                            }
                            Err(err) => {
                                consecutive_failures += 1;
                                tracing::error!(
                                    "Failed to read frame ({}/{}): {:?}",
                                    consecutive_failures,
                                    max_consecutive_failures,
                                    err
                                );
                                if consecutive_failures >= max_consecutive_failures {
                                    tracing::error!("Persistent failure detected. Exiting pipeline loop");
                                    break;
                                }
                            }
                        }
                    },
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Pipeline received shutdown signal");
                        break;
                    }
                }

                sleep(self.frame_delay).await;
            }
            self.handler.flush().await;
            tracing::info!("Pipeline stopped");
        })
    }

    /// Reads and handles one frame. Returns `Ok(false)` once the source is
    /// exhausted.
    async fn step(&mut self) -> Result<bool, FrameSourceError> {
        let Some(frame) = self.source.next_frame().await? else {
            return Ok(false);
        };
        self.handler.process_frame(frame).await;
        Ok(true)
    }
}
