//! Error types for the litreader library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ReaderError`] — **Fatal** for one operation: the parse job failed
//!   remotely, polling ran out of attempts, the parser returned nothing
//!   usable, or a required service is not configured. Returned as
//!   `Err(ReaderError)` from the client, poller and workflow functions.
//!
//! * [`BatchError`] — **Non-fatal**: one translation batch failed but the run
//!   continues with the next batch. Stored in
//!   [`crate::pipeline::translate::TranslationSummary`] so callers can show
//!   partial success instead of losing every translated block to one bad call.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the litreader library.
#[derive(Debug, Error)]
pub enum ReaderError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The request or argument is malformed.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Upload has an extension outside the allowed set.
    #[error("Unsupported file type '{filename}', only {allowed} are accepted")]
    UnsupportedFileType { filename: String, allowed: String },

    /// The file was read, but is not a PDF.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── Parser service errors ─────────────────────────────────────────────
    /// `MINERU_TOKEN` is missing.
    #[error("MinerU is not configured.\nSet MINERU_TOKEN in the environment or .env file.")]
    MineruNotConfigured,

    /// MinerU answered HTTP 200 with a non-zero business code.
    #[error("MinerU API error (code {code}): {message}")]
    MineruApi { code: i64, message: String },

    /// The remote job reached `state = failed`.
    #[error("Parse job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// The job finished but no text block could be extracted.
    #[error(
        "Parse job {job_id} finished but no text blocks were found.\n\
The PDF may be scanned or image-only; try re-submitting with OCR enabled."
    )]
    NoBlocks { job_id: String },

    /// The attempt budget was exhausted before a terminal state.
    #[error("Parse job {job_id} did not finish after {attempts} status checks (~{secs}s)")]
    PollTimeout {
        job_id: String,
        attempts: u32,
        secs: u64,
    },

    /// The caller tore the operation down.
    #[error("Polling of job {job_id} was cancelled")]
    Cancelled { job_id: String },

    /// The result archive could not be read or contains no JSON.
    #[error("Result archive error: {reason}")]
    Archive { reason: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// Connection refused, DNS failure, truncated body, unexpected status.
    #[error("Request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No API key for any translation provider.
    #[error("LLM provider is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    /// The LLM API returned a non-retryable error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// LLM API returned HTTP 429.
    #[error("Rate limit exceeded for model '{model}'")]
    RateLimitExceeded {
        model: String,
        retry_after_secs: Option<u64>,
    },

    /// LLM API call timed out.
    #[error("LLM call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// LLM API returned 401/403.
    #[error("Authentication error from LLM API: {detail}\nCheck QWEN_API_KEY / OPENAI_API_KEY.")]
    AuthError { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a local file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialisation failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReaderError {
    /// Whether a status query that failed this way should consume one poll
    /// attempt and keep going.
    ///
    /// Network failures, upstream business errors and archive hiccups are
    /// indistinguishable from "still running" for the poller. Missing
    /// configuration and bad input never fix themselves, so they abort.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ReaderError::MineruNotConfigured
                | ReaderError::InvalidConfig(_)
                | ReaderError::InvalidInput { .. }
                | ReaderError::ProviderNotConfigured { .. }
                | ReaderError::AuthError { .. }
                | ReaderError::Cancelled { .. }
        )
    }

    /// Build a [`ReaderError::Transport`] from a reqwest error.
    pub(crate) fn transport(url: &str, err: reqwest::Error) -> Self {
        ReaderError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    /// Build a [`ReaderError::Io`] for `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReaderError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single translation batch.
///
/// Every block of the batch is counted as failed; the orchestrator moves on
/// to the next batch.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum BatchError {
    /// The batch call itself failed (transport, HTTP status, envelope error).
    #[error("Batch {batch}: {size} blocks failed: {detail}")]
    Failed {
        batch: usize,
        size: usize,
        detail: String,
    },
}

impl BatchError {
    /// Number of blocks the failure accounts for.
    pub fn size(&self) -> usize {
        match self {
            BatchError::Failed { size, .. } => *size,
        }
    }
}

/// Map a raw translation failure message to a short operator hint.
///
/// Returned text is appended to the `/api/translate-layout` summary message.
pub fn failure_hint(first_error: &str) -> Option<&'static str> {
    let lower = first_error.to_lowercase();
    if lower.contains("401") || lower.contains("unauthorized") || lower.contains("authentication")
    {
        Some("API key is invalid, check the configuration")
    } else if lower.contains("429") || lower.contains("rate limit") {
        Some("API rate limit exceeded, retry later")
    } else if lower.contains("timeout") || lower.contains("timed out") {
        Some("API call timed out, check the network")
    } else if lower.contains("model") && lower.contains("not found") {
        Some("model does not exist, check the model configuration")
    } else if lower.contains("not configured") {
        Some("no API key configured, set QWEN_API_KEY or OPENAI_API_KEY")
    } else {
        None
    }
}
