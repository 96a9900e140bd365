use crate::classifier::{ClassifierError, GestureClassifier, PredictionResponse};
use crate::frame::Frame;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

#[derive(Clone, Copy)]
enum Reply {
    Label(&'static str),
    MissingClass,
    Status(StatusCode),
    Malformed,
}

/// Classifier double that counts calls and records the size of every
/// submitted JPEG.
#[derive(Clone)]
pub struct MockClassifier {
    reply: Reply,
    calls: Arc<AtomicUsize>,
    sizes: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockClassifier {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
            sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn label(label: &'static str) -> Self {
        Self::new(Reply::Label(label))
    }

    pub fn missing_class() -> Self {
        Self::new(Reply::MissingClass)
    }

    pub fn status(status: StatusCode) -> Self {
        Self::new(Reply::Status(status))
    }

    pub fn malformed() -> Self {
        Self::new(Reply::Malformed)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn sizes(&self) -> Arc<Mutex<Vec<(u32, u32)>>> {
        self.sizes.clone()
    }
}

#[async_trait]
impl GestureClassifier for MockClassifier {
    async fn classify(&self, jpeg: Vec<u8>) -> Result<PredictionResponse, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let decoded = image::load_from_memory(&jpeg).expect("classifier received invalid jpeg");
        self.sizes.lock().push((decoded.width(), decoded.height()));

        match self.reply {
            Reply::Label(label) => Ok(PredictionResponse {
                class: Some(label.to_string()),
            }),
            Reply::MissingClass => Ok(PredictionResponse { class: None }),
            Reply::Status(status) => Err(ClassifierError::Rejected {
                status,
                body: "No hand detected".to_string(),
            }),
            Reply::Malformed => Err(PredictionResponse::from_json(b"<html>")
                .map(|_| ())
                .unwrap_err()
                .into()),
        }
    }
}

/// A 16x12 frame that bumps `released` when dropped.
pub fn counted_frame(released: &Arc<AtomicUsize>) -> Frame {
    let released = released.clone();
    Frame::new(16, 12, vec![90; 16 * 12 * 3])
        .unwrap()
        .with_release_hook(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
}
