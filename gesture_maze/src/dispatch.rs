use crate::direction::Direction;
use crate::telemetry::Metrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::{mem, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinSet, time::sleep};

#[derive(Error, Debug)]
pub enum KeySinkError {
    #[error("Key sink closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventType {
    KeyDown,
    KeyUp,
}

/// Synthetic keyboard event, shaped like the DOM `KeyboardEvent` init dict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyEvent {
    #[serde(rename = "type")]
    pub event_type: KeyEventType,
    pub key: &'static str,
    pub code: &'static str,
    pub bubbles: bool,
}

impl KeyEvent {
    pub fn new(event_type: KeyEventType, direction: Direction) -> Self {
        Self {
            event_type,
            key: direction.arrow_key(),
            code: direction.arrow_key(),
            bubbles: true,
        }
    }
}

/// Consumer of synthetic key events.
pub trait KeySink: Send + Sync + 'static {
    fn send(&self, event: &KeyEvent) -> Result<(), KeySinkError>;
}

#[derive(Debug, Clone, Default)]
pub struct LogKeySink;

impl KeySink for LogKeySink {
    fn send(&self, event: &KeyEvent) -> Result<(), KeySinkError> {
        tracing::info!(event_type = ?event.event_type, key = event.key, "Key event");
        Ok(())
    }
}

/// Publishes key events to every subscriber of a broadcast channel. Having no
/// subscribers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastKeySink {
    tx: broadcast::Sender<KeyEvent>,
}

impl BroadcastKeySink {
    pub fn new(tx: broadcast::Sender<KeyEvent>) -> Self {
        Self { tx }
    }
}

impl KeySink for BroadcastKeySink {
    fn send(&self, event: &KeyEvent) -> Result<(), KeySinkError> {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!("No key event subscribers");
        }
        Ok(())
    }
}

/// Turns a direction into a `keydown` now and a `keyup` after `keyup_delay`.
#[derive(Clone)]
pub struct DirectionDispatcher {
    sinks: Arc<Vec<Box<dyn KeySink>>>,
    keyup_delay: Duration,
    pending_keyups: Arc<Mutex<JoinSet<()>>>,
    metrics: Arc<Metrics>,
}

impl DirectionDispatcher {
    pub fn new(sinks: Vec<Box<dyn KeySink>>, keyup_delay: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            sinks: Arc::new(sinks),
            keyup_delay,
            pending_keyups: Arc::new(Mutex::new(JoinSet::new())),
            metrics,
        }
    }

    /// Must be called from within a tokio runtime; the `keyup` is scheduled as
    /// a separate task.
    pub fn dispatch(&self, direction: Direction) {
        tracing::info!("Dispatching direction {}", direction);
        self.metrics.record_key_press(direction.as_str());
        emit(&self.sinks, &KeyEvent::new(KeyEventType::KeyDown, direction));

        let sinks = self.sinks.clone();
        let delay = self.keyup_delay;
        let mut pending = self.pending_keyups.lock();
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            sleep(delay).await;
            emit(&sinks, &KeyEvent::new(KeyEventType::KeyUp, direction));
        });
    }

    /// Waits until every scheduled `keyup` has been emitted.
    pub async fn flush(&self) {
        let mut pending = mem::take(&mut *self.pending_keyups.lock());
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::error!("Keyup task failed: {:?}", e);
            }
        }
    }
}

fn emit(sinks: &[Box<dyn KeySink>], event: &KeyEvent) {
    for sink in sinks {
        if let Err(e) = sink.send(event) {
            tracing::warn!("Failed to deliver key event: {}", e);
        }
    }
}
