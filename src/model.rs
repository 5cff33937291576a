//! Data model shared by the poller, normalizer, orchestrator and server.
//!
//! All types serialise to the JSON shapes the reader frontend already speaks,
//! so the same structs travel through the HTTP API unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Blocks ───────────────────────────────────────────────────────────────

/// Axis-aligned bounding box `[x0, y0, x1, y1]` in page coordinates.
///
/// Constructed through [`BBox::from_values`], which guarantees four finite,
/// non-negative coordinates with `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    /// Build a box from at least four numbers; extra values are ignored.
    ///
    /// Returns `None` for short or non-finite input. Negative values are
    /// clamped to zero and swapped corners are reordered.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() < 4 || values[..4].iter().any(|v| !v.is_finite()) {
            return None;
        }
        let c = |v: f64| v.max(0.0);
        let (ax, ay, bx, by) = (c(values[0]), c(values[1]), c(values[2]), c(values[3]));
        Some(Self {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        })
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        Self::from_values(&v).unwrap_or(BBox {
            x0: 0.0,
            y0: 0.0,
            x1: 0.0,
            y1: 0.0,
        })
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// Coarse block classification used by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    #[default]
    Text,
    Title,
}

impl BlockKind {
    /// Map a raw parser type string to the coarse kind.
    pub fn from_raw(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("title") {
            BlockKind::Title
        } else {
            BlockKind::Text
        }
    }
}

/// One bounding-box-addressed unit of extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Stable synthetic identifier assigned at extraction time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// 1-based page number.
    pub page: u32,
    pub bbox: BBox,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: BlockKind,
}

impl TextBlock {
    pub fn new(page: u32, bbox: BBox, text: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: None,
            page,
            bbox,
            text: text.into(),
            translated_text: None,
            kind,
        }
    }

    /// A translation is present and non-blank.
    pub fn is_translated(&self) -> bool {
        self.translated_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Text shown in the translated pane: the translation if present, else
    /// the original.
    pub fn display_text(&self) -> &str {
        match self.translated_text.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => &self.text,
        }
    }

    /// Content key used to merge results when no synthetic id is available.
    pub fn content_key(&self) -> (u32, &str) {
        (self.page, self.text.as_str())
    }
}

// ── Jobs ─────────────────────────────────────────────────────────────────

/// Remote identifier of a parse job.
///
/// MinerU hands out `task_id`s for URL submissions and `batch_id`s for the
/// upload flow; both are polled the same way through different endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum JobId {
    Task(String),
    Batch(String),
}

impl JobId {
    pub fn as_str(&self) -> &str {
        match self {
            JobId::Task(id) | JobId::Batch(id) => id,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Task(id) => write!(f, "task {id}"),
            JobId::Batch(id) => write!(f, "batch {id}"),
        }
    }
}

/// Lifecycle state reported by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    #[default]
    Pending,
    WaitingFile,
    Running,
    Converting,
    Done,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::WaitingFile => "waiting-file",
            JobState::Running => "running",
            JobState::Converting => "converting",
            JobState::Done => "done",
            JobState::Failed => "failed",
            JobState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-level extraction progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractProgress {
    #[serde(default)]
    pub extracted_pages: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// One status snapshot of a parse job, as returned by `/api/task/{id}` and
/// `/api/batch/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_progress: Option<ExtractProgress>,
    /// Normalized blocks, when the server already ran the normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Vec<TextBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_count: Option<usize>,
    /// Raw parser output of unknown shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mineru_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_zip_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_md_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_dir: Option<String>,
}

impl JobStatus {
    pub fn with_state(state: JobState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }
}

/// A parse job tracked by the client from submission to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseJob {
    pub id: JobId,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ExtractProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ParseJob {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Pending,
            progress: None,
            result: None,
        }
    }
}

// ── Translation ──────────────────────────────────────────────────────────

/// Cumulative translation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationCounts {
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

impl TranslationCounts {
    /// Blocks accounted for so far.
    pub fn processed(&self) -> usize {
        self.translated + self.skipped + self.failed
    }
}

/// Result of one `/api/translate-layout` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationBatchResult {
    pub layout: Vec<TextBlock>,
    #[serde(default)]
    pub translated_count: usize,
    #[serde(default)]
    pub skipped_count: usize,
    #[serde(default)]
    pub failed_count: usize,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

/// Request body of `/api/translate-layout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateLayoutRequest {
    #[serde(default)]
    pub layout: Vec<TextBlock>,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub force_retranslate: bool,
}

// ── Documents ────────────────────────────────────────────────────────────

/// Original and translated full-text markdown of one parse job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub job_id: String,
    pub original: String,
    /// Only authoritative when the server supplied it directly; otherwise
    /// derived by [`crate::pipeline::reconstruct`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
}

// ── HTTP envelope ────────────────────────────────────────────────────────

/// `{success, message, data}` wrapper used by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// Data of `POST /api/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
}

/// Data of `POST /api/parse-pdf`. Exactly one of `task_id` / `batch_id` is
/// set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub state: JobState,
    /// Only present when the server waited for the job (`wait=true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Vec<TextBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mineru_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_md_path: Option<String>,
}

impl ParseSubmission {
    /// The job this submission started, if the server reported one.
    pub fn job_id(&self) -> Option<JobId> {
        match (&self.task_id, &self.batch_id) {
            (Some(id), _) => Some(JobId::Task(id.clone())),
            (None, Some(id)) => Some(JobId::Batch(id.clone())),
            (None, None) => None,
        }
    }
}

/// Request body of `POST /api/translate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateFileRequest {
    pub filename: String,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Data of `POST /api/translate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatedFile {
    pub translated_file: String,
    pub target_lang: String,
}

/// Data of `POST /api/layout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutFile {
    pub layout_count: usize,
    pub layout_file: String,
    pub layout: Vec<TextBlock>,
}

/// Data of `GET /api/full-text/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullText {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}
