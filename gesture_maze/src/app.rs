use crate::classifier::HttpClassifier;
use crate::config::{Config, SourceConfig, SourceKind};
use crate::dispatch::{BroadcastKeySink, DirectionDispatcher, KeySink, LogKeySink};
use crate::frame_source::{FrameSource, FrameSourceError, ImageDirSource};
use crate::landmarks::RemoteHandCheck;
use crate::pipeline::{FrameHandler, Pipeline};
use crate::prediction::ThrottledPredictor;
use crate::server::HttpServer;
use crate::telemetry::Metrics;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

const KEY_EVENT_CAPACITY: usize = 64;

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            tracing::error!("Failed to initialize metrics: {:?}", e);
            return Err(e.into());
        }
    };

    let source = match open_frame_source(&config.source) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Failed to initialize frame source: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let classifier = match HttpClassifier::new(&config.classifier) {
        Ok(classifier) => classifier,
        Err(e) => {
            tracing::error!("Failed to initialize classifier client: {:?}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Sending gesture frames to {}", classifier.url());

    let gestures = config.gestures.build_map()?;
    let predictor = ThrottledPredictor::new(
        classifier,
        gestures,
        config.throttle.get_interval(),
        config.classifier.jpeg_quality,
        metrics.clone(),
    );

    let (keys_tx, _) = broadcast::channel(KEY_EVENT_CAPACITY);
    let mut sinks: Vec<Box<dyn KeySink>> = vec![Box::new(BroadcastKeySink::new(keys_tx.clone()))];
    if config.dispatch.log_keys {
        sinks.push(Box::new(LogKeySink));
    }
    let dispatcher =
        DirectionDispatcher::new(sinks, config.dispatch.get_keyup_delay(), metrics.clone());

    let handler = FrameHandler::new(
        Box::new(RemoteHandCheck),
        predictor,
        dispatcher,
        config.detector.crop_margin,
        metrics.clone(),
    );
    let pipeline = Pipeline::new(
        source,
        handler,
        config.source.get_frame_delay(),
        config.source.max_consecutive_failures,
    );

    let server = HttpServer::new(keys_tx, metrics, &config.server).await?;

    // The pipeline stops first so pending keyups reach connected clients.
    let (pipeline_shutdown_tx, pipeline_shutdown_rx) = broadcast::channel(1);
    let (server_shutdown_tx, server_shutdown_rx) = broadcast::channel(1);

    let mut pipeline_handle = pipeline.run(pipeline_shutdown_rx);
    let server_handle = server.run(server_shutdown_rx).await?;

    let pipeline_finished = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, starting graceful shutdown.");
            false
        }
        _ = &mut pipeline_handle => {
            tracing::info!("Pipeline finished, shutting down.");
            true
        }
    };

    if !pipeline_finished {
        let _ = pipeline_shutdown_tx.send(());
        let _ = pipeline_handle.await;
    }
    let _ = server_shutdown_tx.send(());
    let _ = server_handle.await;

    Ok(())
}

fn open_frame_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>, FrameSourceError> {
    match config.kind {
        SourceKind::ImageDir => {
            let dir = config.image_dir.as_deref().ok_or_else(|| {
                FrameSourceError::Unavailable("source.image_dir is not set".into())
            })?;
            Ok(Box::new(ImageDirSource::new(dir, config.loop_images)?))
        }
        #[cfg(feature = "webcam")]
        SourceKind::Webcam => Ok(Box::new(crate::camera::Camera::new(config)?)),
        #[cfg(not(feature = "webcam"))]
        SourceKind::Webcam => Err(FrameSourceError::Unavailable(
            "built without the `webcam` feature".into(),
        )),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
