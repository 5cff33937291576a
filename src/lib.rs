//! # litreader
//!
//! Backend and client logic of a literature reader: PDFs are parsed by the
//! MinerU document service into bounding-box-addressed text blocks, the
//! blocks are translated by an OpenAI-compatible LLM (Qwen by default), and a
//! translated full-text document is rebuilt from the translated blocks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Submit      upload to MinerU (batch flow) or hand it a URL (task flow)
//!  ├─ 2. Poll        every 3 s, at most 120 checks, transient errors tolerated
//!  ├─ 3. Archive     download + unpack the result ZIP (spawn_blocking)
//!  ├─ 4. Normalize   four known JSON shapes → Vec<TextBlock>
//!  ├─ 5. Translate   batches of 10, sequential, continue-on-error
//!  └─ 6. Reconstruct translated full text: concatenation or substitution
//! ```
//!
//! The same pieces run on both sides of the HTTP API: the [`server`] calls
//! MinerU and the LLM, while [`remote::ReaderApiClient`] lets the poller and
//! the batch orchestrator drive a running server the way the browser
//! frontend does.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use litreader::{poll_job, translate_layout, NoopProgressCallback, ReaderApiClient, TranslateOptions};
//! use litreader::config::PollPolicy;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = ReaderApiClient::new("http://127.0.0.1:5000")?;
//!     let pdf = std::fs::read("paper.pdf")?;
//!     let submission = api.parse_pdf("paper.pdf", pdf, None).await?;
//!     let job = submission.job_id().ok_or("server returned no job id")?;
//!
//!     let parsed = poll_job(&api, &job, PollPolicy::default(), &NoopProgressCallback, None).await?;
//!     let summary = translate_layout(&api, parsed.blocks, &TranslateOptions::default(), &NoopProgressCallback).await;
//!     eprintln!(
//!         "{} translated, {} skipped, {} failed",
//!         summary.counts.translated, summary.counts.skipped, summary.counts.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP API ([`server`]) |
//! | `cli`    | on      | the `litreader` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable both when only the client-side logic is needed:
//! ```toml
//! litreader = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod mineru;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod remote;
#[cfg(feature = "server")]
pub mod server;
pub mod session;
pub mod stream;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ModelVersion, PollPolicy, ReaderConfig, ReaderConfigBuilder};
pub use error::{BatchError, ReaderError};
pub use llm::LlmClient;
pub use mineru::MineruClient;
pub use model::{
    ApiEnvelope, BBox, BlockKind, Document, JobId, JobState, JobStatus, ParseJob, TextBlock, TranslationBatchResult,
    TranslationCounts,
};
pub use pipeline::normalize::normalize_layout;
pub use pipeline::poll::{poll_job, PollOutcome, StatusSource};
pub use pipeline::reconstruct::{reconstruct, Reconstruction, Strategy};
pub use pipeline::translate::{translate_layout, BatchTranslator, TranslateOptions, TranslationSummary, Translator};
pub use progress::{NoopProgressCallback, PollProgressCallback, TranslationProgressCallback};
pub use remote::ReaderApiClient;
pub use session::{spawn_session, SessionEvent, SessionHandle, SessionState};
pub use stream::{translate_stream, TranslationProgress};
pub use workflow::MineruStatusSource;
