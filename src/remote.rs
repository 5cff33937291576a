//! Typed client for the litreader HTTP API.
//!
//! This is what the reader frontend does over `fetch`: upload a PDF, poll
//! `/api/batch/{id}`, send layout chunks to `/api/translate-layout` and fetch
//! the full text. It implements [`StatusSource`] and [`BatchTranslator`], so
//! the generic poller and orchestrator can drive a remote server unchanged.

use crate::config::ModelVersion;
use crate::error::ReaderError;
use crate::model::{
    FullText, JobId, JobStatus, ParseSubmission, TextBlock, TranslateLayoutRequest, TranslationBatchResult,
    UploadedFile,
};
use crate::pipeline::poll::StatusSource;
use crate::pipeline::translate::BatchTranslator;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Envelope as read by the client. `data` may be `null` on errors.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Client for a running litreader server.
#[derive(Debug, Clone)]
pub struct ReaderApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReaderApiClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ReaderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ReaderError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http(http, base_url))
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, url: &str) -> Result<T, ReaderError> {
        let response = request.send().await.map_err(|e| ReaderError::transport(url, e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| ReaderError::transport(url, e))?;

        let envelope = serde_json::from_slice::<RawEnvelope>(&body);
        if rejected_request(status) {
            let message = match envelope {
                Ok(envelope) => envelope.message,
                Err(_) => String::from_utf8_lossy(&body).trim().to_string(),
            };
            return Err(ReaderError::InvalidInput {
                reason: format!("{url} rejected the request (HTTP {status}): {message}"),
            });
        }

        let envelope = envelope.map_err(|e| ReaderError::Transport {
            url: url.to_string(),
            reason: format!("HTTP {status}: unreadable response ({e})"),
        })?;
        if !status.is_success() || !envelope.success {
            return Err(ReaderError::Transport {
                url: url.to_string(),
                reason: format!("HTTP {status}: {}", envelope.message),
            });
        }
        debug!(url, message = %envelope.message, "API call succeeded");
        Ok(serde_json::from_value(envelope.data)?)
    }

    /// `GET /api/health`.
    pub async fn health(&self) -> Result<(), ReaderError> {
        let url = self.url("health");
        let _: serde_json::Value = self.send(self.http.get(&url), &url).await?;
        Ok(())
    }

    /// `POST /api/upload`; returns the stored (sanitized) file name.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ReaderError> {
        let url = self.url("upload");
        let form = Form::new().part("file", file_part(filename, bytes)?);
        let data: UploadedFile = self.send(self.http.post(&url).multipart(form), &url).await?;
        Ok(data.filename)
    }

    /// `POST /api/parse-pdf` without waiting; the server uses the batch
    /// upload flow.
    pub async fn parse_pdf(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        model_version: Option<ModelVersion>,
    ) -> Result<ParseSubmission, ReaderError> {
        let url = self.url("parse-pdf");
        let mut form = Form::new()
            .part("file", file_part(filename, bytes)?)
            .text("wait", "false");
        if let Some(mv) = model_version {
            form = form.text("model_version", mv.as_str());
        }
        self.send(self.http.post(&url).multipart(form), &url).await
    }

    /// `POST /api/parse-pdf` with a public `file_url` (task flow).
    pub async fn parse_url(&self, file_url: &str, model_version: Option<ModelVersion>) -> Result<ParseSubmission, ReaderError> {
        let url = self.url("parse-pdf");
        let mut form = Form::new().text("file_url", file_url.to_string()).text("wait", "false");
        if let Some(mv) = model_version {
            form = form.text("model_version", mv.as_str());
        }
        self.send(self.http.post(&url).multipart(form), &url).await
    }

    /// `GET /api/task/{id}` or `GET /api/batch/{id}`.
    pub async fn job_status(&self, job: &JobId) -> Result<JobStatus, ReaderError> {
        let url = match job {
            JobId::Task(id) => self.url(&format!("task/{id}")),
            JobId::Batch(id) => self.url(&format!("batch/{id}")),
        };
        self.send(self.http.get(&url), &url).await
    }

    /// `POST /api/translate-layout` for one chunk.
    pub async fn translate_layout(&self, request: &TranslateLayoutRequest) -> Result<TranslationBatchResult, ReaderError> {
        let url = self.url("translate-layout");
        self.send(self.http.post(&url).json(request), &url).await
    }

    /// `GET /api/full-text/{id}`.
    pub async fn full_text(&self, job_id: &str) -> Result<String, ReaderError> {
        let url = self.url(&format!("full-text/{job_id}"));
        let data: FullText = self.send(self.http.get(&url), &url).await?;
        Ok(data.content)
    }
}

/// 4xx answers will not change on retry, except timeouts and rate limits.
fn rejected_request(status: reqwest::StatusCode) -> bool {
    use reqwest::StatusCode;
    status.is_client_error() && !matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS)
}

fn file_part(filename: &str, bytes: Vec<u8>) -> Result<Part, ReaderError> {
    let mime = if filename.to_ascii_lowercase().ends_with(".json") {
        "application/json"
    } else {
        "application/pdf"
    };
    Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime)
        .map_err(|e| ReaderError::Internal(format!("invalid MIME type: {e}")))
}

impl StatusSource for ReaderApiClient {
    async fn query(&self, job: &JobId) -> Result<JobStatus, ReaderError> {
        self.job_status(job).await
    }
}

impl BatchTranslator for ReaderApiClient {
    async fn translate_batch(
        &self,
        blocks: &[TextBlock],
        target_lang: &str,
        model: Option<&str>,
        force_retranslate: bool,
    ) -> Result<TranslationBatchResult, ReaderError> {
        let request = TranslateLayoutRequest {
            layout: blocks.to_vec(),
            target_lang: Some(target_lang.to_string()),
            model: model.map(str::to_string),
            force_retranslate,
        };
        self.translate_layout(&request).await
    }
}
