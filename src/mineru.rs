//! HTTP client for the MinerU document-parsing service.
//!
//! MinerU wraps every JSON answer in `{code, msg, data}`; `code != 0` is a
//! business error even on HTTP 200. Two submission flows exist:
//!
//! * **URL task**: `POST /extract/task` with a public file URL → `task_id`,
//!   polled at `GET /extract/task/{id}`.
//! * **Batch upload**: `POST /file-urls/batch` → `batch_id` plus pre-signed
//!   upload URLs; the file is `PUT` there and MinerU starts parsing on its own.
//!   Polled at `GET /extract-results/batch/{id}`.
//!
//! Finished jobs expose a `full_zip_url` with the results (see
//! [`crate::pipeline::archive`]).

use crate::config::{ModelVersion, ReaderConfig};
use crate::error::ReaderError;
use crate::model::{ExtractProgress, JobState, JobStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

/// Optional knobs of a URL task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ocr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_formula: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_table: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_ranges: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateTaskRequest<'a> {
    url: &'a str,
    model_version: &'static str,
    #[serde(flatten)]
    options: &'a ExtractOptions,
}

#[derive(Debug, Deserialize)]
struct CreateTaskData {
    #[serde(default)]
    task_id: Option<String>,
}

/// Status of one URL task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub state: JobState,
    #[serde(default)]
    pub full_zip_url: Option<String>,
    #[serde(default)]
    pub err_msg: Option<String>,
    #[serde(default)]
    pub extract_progress: Option<ExtractProgress>,
}

/// One file entry of a batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchFileResult {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub state: JobState,
    #[serde(default)]
    pub full_zip_url: Option<String>,
    #[serde(default)]
    pub err_msg: Option<String>,
    #[serde(default)]
    pub extract_progress: Option<ExtractProgress>,
}

/// Status of a batch upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub batch_id: String,
    #[serde(default)]
    pub extract_result: Vec<BatchFileResult>,
}

/// File announced to `/file-urls/batch`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadFile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadUrlsRequest<'a> {
    files: &'a [UploadFile],
    model_version: &'static str,
}

/// Pre-signed upload URLs for a new batch.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadUrls {
    pub batch_id: String,
    #[serde(default)]
    pub file_urls: Vec<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl TaskResult {
    /// Status snapshot without any downloaded results attached.
    pub fn into_status(self) -> JobStatus {
        JobStatus {
            state: self.state,
            extract_progress: self.extract_progress,
            err_msg: non_empty(self.err_msg),
            full_zip_url: non_empty(self.full_zip_url),
            ..JobStatus::default()
        }
    }
}

impl BatchResult {
    /// Status of the first file of the batch; an empty batch is still
    /// `pending`.
    pub fn into_status(self) -> JobStatus {
        match self.extract_result.into_iter().next() {
            Some(first) => JobStatus {
                state: first.state,
                extract_progress: first.extract_progress,
                err_msg: non_empty(first.err_msg),
                full_zip_url: non_empty(first.full_zip_url),
                ..JobStatus::default()
            },
            None => JobStatus::with_state(JobState::Pending),
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// MinerU API client.
#[derive(Debug, Clone)]
pub struct MineruClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    model_version: ModelVersion,
}

impl MineruClient {
    pub fn new(config: &ReaderConfig) -> Result<Self, ReaderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ReaderError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http(http, config))
    }

    /// Reuse an existing connection pool.
    pub fn with_http(http: reqwest::Client, config: &ReaderConfig) -> Self {
        Self {
            http,
            base_url: config.mineru_base_url.trim_end_matches('/').to_string(),
            token: config.mineru_token.clone(),
            model_version: config.model_version,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.trim().is_empty()
    }

    fn token(&self) -> Result<&str, ReaderError> {
        if self.is_configured() {
            Ok(&self.token)
        } else {
            Err(ReaderError::MineruNotConfigured)
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, ReaderError> {
        let response = request
            .bearer_auth(self.token()?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ReaderError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReaderError::Transport {
                url: url.to_string(),
                reason: format!("HTTP {status}: {}", truncate(&body, 300)),
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ReaderError::transport(url, e))?;
        if envelope.code != 0 {
            warn!(code = envelope.code, msg = %envelope.msg, "MinerU returned a business error");
            return Err(ReaderError::MineruApi {
                code: envelope.code,
                message: envelope.msg,
            });
        }
        envelope.data.ok_or_else(|| ReaderError::MineruApi {
            code: 0,
            message: "response carried no data".into(),
        })
    }

    /// Submit a publicly reachable PDF URL; returns the `task_id`.
    pub async fn create_extract_task(
        &self,
        file_url: &str,
        model_version: Option<ModelVersion>,
        options: &ExtractOptions,
    ) -> Result<String, ReaderError> {
        let url = format!("{}/extract/task", self.base_url);
        let body = CreateTaskRequest {
            url: file_url,
            model_version: model_version.unwrap_or(self.model_version).as_str(),
            options,
        };
        info!(file_url, "Creating MinerU extract task");
        let data: CreateTaskData = self.send(self.http.post(&url).json(&body), &url).await?;
        let task_id = data
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ReaderError::MineruApi {
                code: 0,
                message: "no task_id in response".into(),
            })?;
        info!(%task_id, "MinerU task created");
        Ok(task_id)
    }

    pub async fn get_task_result(&self, task_id: &str) -> Result<TaskResult, ReaderError> {
        let url = format!("{}/extract/task/{task_id}", self.base_url);
        debug!(task_id, "Querying MinerU task");
        self.send(self.http.get(&url), &url).await
    }

    /// Request pre-signed upload URLs for `files`.
    pub async fn get_file_upload_urls(
        &self,
        files: &[UploadFile],
        model_version: Option<ModelVersion>,
    ) -> Result<UploadUrls, ReaderError> {
        let url = format!("{}/file-urls/batch", self.base_url);
        let body = UploadUrlsRequest {
            files,
            model_version: model_version.unwrap_or(self.model_version).as_str(),
        };
        info!(files = files.len(), "Requesting MinerU upload URLs");
        self.send(self.http.post(&url).json(&body), &url).await
    }

    /// `PUT` the raw file bytes to a pre-signed URL. No bearer token: the URL
    /// carries its own signature.
    pub async fn upload_file_to_url(&self, bytes: Vec<u8>, upload_url: &str) -> Result<(), ReaderError> {
        let size = bytes.len();
        let response = self
            .http
            .put(upload_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ReaderError::transport(upload_url, e))?;
        if !response.status().is_success() {
            return Err(ReaderError::Transport {
                url: upload_url.to_string(),
                reason: format!("upload failed with HTTP {}", response.status()),
            });
        }
        info!(bytes = size, "File uploaded to MinerU");
        Ok(())
    }

    pub async fn get_batch_result(&self, batch_id: &str) -> Result<BatchResult, ReaderError> {
        let url = format!("{}/extract-results/batch/{batch_id}", self.base_url);
        debug!(batch_id, "Querying MinerU batch");
        self.send(self.http.get(&url), &url).await
    }

    /// Download a result archive.
    pub async fn download_zip(&self, zip_url: &str) -> Result<Vec<u8>, ReaderError> {
        info!(zip_url, "Downloading MinerU result archive");
        let response = self
            .http
            .get(zip_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| ReaderError::transport(zip_url, e))?;
        if !response.status().is_success() {
            return Err(ReaderError::Transport {
                url: zip_url.to_string(),
                reason: format!("download failed with HTTP {}", response.status()),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReaderError::transport(zip_url, e))?;
        debug!(bytes = bytes.len(), "Archive downloaded");
        Ok(bytes.to_vec())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
