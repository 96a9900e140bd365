use crate::config::ClassifierConfig;
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

const UPLOAD_FIELD: &str = "file";
const UPLOAD_FILENAME: &str = "gesture_frame.jpg";
const UPLOAD_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuildFailed(reqwest::Error),
    #[error("Classifier request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Classifier rejected the frame with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("Malformed classifier response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Reply from the remote classifier. `class` is `None` when the field is
/// missing or is not a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionResponse {
    pub class: Option<String>,
}

impl PredictionResponse {
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        let class = value
            .get("class")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self { class })
    }
}

#[async_trait]
pub trait GestureClassifier: Send + Sync + 'static {
    async fn classify(&self, jpeg: Vec<u8>) -> Result<PredictionResponse, ClassifierError>;
}

/// Posts JPEG frames as `multipart/form-data` to a gesture classification
/// endpoint.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.get_request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ClassifierError::ClientBuildFailed)?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GestureClassifier for HttpClassifier {
    #[instrument(skip(self, jpeg), fields(url = %self.url, bytes = jpeg.len()))]
    async fn classify(&self, jpeg: Vec<u8>) -> Result<PredictionResponse, ClassifierError> {
        let part = Part::bytes(jpeg)
            .file_name(UPLOAD_FILENAME)
            .mime_str(UPLOAD_MIME)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self.client.post(&self.url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Rejected { status, body });
        }

        let body = response.bytes().await?;
        let prediction = PredictionResponse::from_json(&body)?;
        tracing::debug!("Classifier prediction: {:?}", prediction);

        Ok(prediction)
    }
}
