//! High-level entry points that tie the MinerU client, the archive stage and
//! the normalizer together.
//!
//! The HTTP handlers are thin wrappers around these functions; the CLI and
//! library users can call them directly.

use crate::config::{ModelVersion, PollPolicy};
use crate::error::ReaderError;
use crate::mineru::{ExtractOptions, MineruClient, UploadFile};
use crate::model::{Document, JobId, JobState, JobStatus, TextBlock};
use crate::pipeline::archive::{extract_zip, find_file_recursive, open_extracted, ExtractedArchive};
use crate::pipeline::normalize::{legacy_pages_mut, normalize_layout};
use crate::pipeline::poll::{poll_job, PollOutcome, StatusSource};
use crate::pipeline::reconstruct::{reconstruct, Reconstruction};
use crate::pipeline::translate::Translator;
use crate::progress::PollProgressCallback;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extensions accepted by the upload endpoints.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "json"];

// ── File names ───────────────────────────────────────────────────────────

/// Whether `filename` has one of [`ALLOWED_EXTENSIONS`].
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Reduce a client-supplied name to a safe flat file name.
///
/// Whitespace becomes `_`, anything outside `[A-Za-z0-9._-]` is dropped
/// and leading dots are stripped. An allowed extension survives a stem that
/// sanitizes away (`论文.pdf` becomes `upload.pdf`). Returns `None` if
/// nothing usable is left.
pub fn secure_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            (stem, Some(ext.to_ascii_lowercase()))
        }
        _ => (base, None),
    };
    let stem = sanitize_stem(stem);
    match (stem, ext) {
        (Some(stem), Some(ext)) => Some(format!("{stem}.{ext}")),
        (None, Some(ext)) => Some(format!("upload.{ext}")),
        (stem, None) => stem,
    }
}

fn sanitize_stem(stem: &str) -> Option<String> {
    let cleaned: String = stem
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).trim_end_matches('.').to_string();
    cleaned.contains(|c: char| c.is_ascii_alphanumeric()).then_some(cleaned)
}

/// Reject job ids that could escape the parser folder.
pub fn job_dir(root: &Path, job_id: &str) -> Result<PathBuf, ReaderError> {
    let valid = !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if !valid {
        return Err(ReaderError::InvalidInput {
            reason: format!("invalid job id '{job_id}'"),
        });
    }
    Ok(root.join(job_id))
}

/// Refuse uploads named `.pdf` that do not start with `%PDF-`.
pub fn check_pdf_magic(name: &str, bytes: &[u8]) -> Result<(), ReaderError> {
    if bytes.starts_with(b"%PDF-") {
        Ok(())
    } else {
        Err(ReaderError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(8).copied().collect(),
        })
    }
}

// ── Submission ───────────────────────────────────────────────────────────

/// Upload a PDF through the batch flow. MinerU starts parsing on its own
/// once the `PUT` completes.
pub async fn submit_upload(
    client: &MineruClient,
    filename: &str,
    bytes: Vec<u8>,
    model_version: Option<ModelVersion>,
) -> Result<JobId, ReaderError> {
    let files = [UploadFile {
        name: filename.to_string(),
        data_id: None,
    }];
    let urls = client.get_file_upload_urls(&files, model_version).await?;
    let upload_url = urls.file_urls.first().ok_or_else(|| ReaderError::MineruApi {
        code: 0,
        message: "no upload URL returned".into(),
    })?;
    client.upload_file_to_url(bytes, upload_url).await?;
    info!(batch_id = %urls.batch_id, filename, "PDF handed to MinerU");
    Ok(JobId::Batch(urls.batch_id))
}

/// Submit a publicly reachable PDF URL as a task.
pub async fn submit_url(
    client: &MineruClient,
    file_url: &str,
    model_version: Option<ModelVersion>,
    options: &ExtractOptions,
) -> Result<JobId, ReaderError> {
    let task_id = client
        .create_extract_task(file_url, model_version, options)
        .await?;
    Ok(JobId::Task(task_id))
}

// ── Status ───────────────────────────────────────────────────────────────

/// Queries MinerU directly and, for finished jobs, downloads and normalizes
/// the results so the status carries `layout`.
#[derive(Debug, Clone)]
pub struct MineruStatusSource {
    client: MineruClient,
    mineru_dir: PathBuf,
}

impl MineruStatusSource {
    pub fn new(client: MineruClient, mineru_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            mineru_dir: mineru_dir.into(),
        }
    }

    pub fn client(&self) -> &MineruClient {
        &self.client
    }

    /// Current status of `job`. A failure to fetch the results of a `done`
    /// job is logged and the bare status returned; the poller then reports
    /// "no blocks".
    pub async fn status(&self, job: &JobId) -> Result<JobStatus, ReaderError> {
        let dir = job_dir(&self.mineru_dir, job.as_str())?;
        let mut status = match job {
            JobId::Task(id) => self.client.get_task_result(id).await?.into_status(),
            JobId::Batch(id) => self.client.get_batch_result(id).await?.into_status(),
        };

        if status.state == JobState::Done {
            match status.full_zip_url.clone() {
                Some(url) => {
                    if let Err(e) = self.attach_results(&mut status, &url, dir).await {
                        warn!(%job, error = %e, "Could not fetch parse results");
                    }
                }
                None => warn!(%job, "Job is done but carries no result archive URL"),
            }
        }
        Ok(status)
    }

    /// Reuses results already unpacked under `dir`; downloads otherwise.
    async fn attach_results(&self, status: &mut JobStatus, zip_url: &str, dir: PathBuf) -> Result<(), ReaderError> {
        let extracted = match reopen_in_background(dir.clone()).await? {
            Some(extracted) => {
                debug!(dir = %dir.display(), "Reusing extracted parse results");
                extracted
            }
            None => {
                let bytes = self.client.download_zip(zip_url).await?;
                extract_in_background(bytes, dir).await?
            }
        };
        let data = read_json(&extracted.json_path).await?;
        let layout = normalize_layout(&data);

        status.layout_count = Some(layout.len());
        status.layout = Some(layout);
        status.mineru_data = Some(data);
        status.json_path = Some(extracted.json_path.display().to_string());
        status.full_md_path = extracted.full_md_path.map(|p| p.display().to_string());
        status.images_dir = extracted.images_dir.map(|p| p.display().to_string());
        Ok(())
    }
}

impl StatusSource for MineruStatusSource {
    async fn query(&self, job: &JobId) -> Result<JobStatus, ReaderError> {
        self.status(job).await
    }
}

async fn reopen_in_background(dir: PathBuf) -> Result<Option<ExtractedArchive>, ReaderError> {
    tokio::task::spawn_blocking(move || open_extracted(&dir))
        .await
        .map_err(|e| ReaderError::Internal(format!("lookup task panicked: {e}")))?
}

async fn extract_in_background(bytes: Vec<u8>, dir: PathBuf) -> Result<ExtractedArchive, ReaderError> {
    tokio::task::spawn_blocking(move || extract_zip(&bytes, &dir))
        .await
        .map_err(|e| ReaderError::Internal(format!("extraction task panicked: {e}")))?
}

/// Wait for `job` with the server-side policy.
pub async fn wait_for_task<S: StatusSource>(
    source: &S,
    job: &JobId,
    policy: PollPolicy,
    progress: &dyn PollProgressCallback,
    cancel: Option<&CancellationToken>,
) -> Result<PollOutcome, ReaderError> {
    poll_job(source, job, policy, progress, cancel).await
}

// ── Files ────────────────────────────────────────────────────────────────

pub async fn read_json(path: &Path) -> Result<Value, ReaderError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ReaderError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ReaderError::io(path, e),
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<(), ReaderError> {
    let body = serde_json::to_vec_pretty(value)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &body))
        .await
        .map_err(|e| ReaderError::Internal(format!("write task panicked: {e}")))?
}

/// Write through a temporary file in the target folder so readers never see
/// a half-written JSON.
fn write_atomic(path: &Path, body: &[u8]) -> Result<(), ReaderError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| ReaderError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ReaderError::io(dir, e))?;
    tmp.write_all(body).map_err(|e| ReaderError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| ReaderError::io(path, e.error))?;
    Ok(())
}

/// `dir/stem_suffix.json` next to `input`.
pub fn sibling_json(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_{suffix}.json"))
}

/// Normalize a stored parser JSON file and write `<name>_layout.json` next
/// to it.
pub async fn normalize_file(input: &Path) -> Result<(Vec<TextBlock>, PathBuf), ReaderError> {
    let data = read_json(input).await?;
    let layout = normalize_layout(&data);
    let output = sibling_json(input, "layout");
    write_json(&output, &layout).await?;
    info!(input = %input.display(), blocks = layout.len(), "Layout file written");
    Ok((layout, output))
}

/// Outcome of translating a legacy `{pages: [...]}` file.
#[derive(Debug, Clone)]
pub struct LegacyTranslation {
    pub output_path: PathBuf,
    pub total_blocks: usize,
    pub translated_blocks: usize,
}

/// Translate every `type == "text"` block of a legacy parser file, storing
/// the result as `translated_text` on the block, and write
/// `<name>_<lang>.json` next to the input.
pub async fn translate_legacy_file<T: Translator>(
    translator: &T,
    input: &Path,
    target_lang: &str,
    model: Option<&str>,
) -> Result<LegacyTranslation, ReaderError> {
    let mut data = read_json(input).await?;
    let mut total_blocks = 0;
    let mut translated_blocks = 0;

    if let Some(pages) = legacy_pages_mut(&mut data) {
        for page in pages.iter_mut() {
            let Some(blocks) = page.get_mut("blocks").and_then(Value::as_array_mut) else {
                continue;
            };
            for block in blocks.iter_mut() {
                if block.get("type").and_then(Value::as_str) != Some("text") {
                    continue;
                }
                total_blocks += 1;
                let text = legacy_block_text(block);
                if text.is_empty() {
                    continue;
                }
                let translated = translator.translate(&text, target_lang, model).await?;
                if let Some(obj) = block.as_object_mut() {
                    obj.insert("translated_text".into(), Value::String(translated));
                    translated_blocks += 1;
                }
            }
        }
    } else {
        warn!(input = %input.display(), "File has no 'pages' array; nothing to translate");
    }

    let output_path = sibling_json(input, target_lang);
    write_json(&output_path, &data).await?;
    info!(output = %output_path.display(), total_blocks, translated_blocks, "Legacy file translated");
    Ok(LegacyTranslation {
        output_path,
        total_blocks,
        translated_blocks,
    })
}

fn legacy_block_text(block: &Value) -> String {
    block
        .get("lines")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .map(|l| l.get("text").and_then(Value::as_str).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Full-text markdown of a job: `<job>/full.md`, else the first `full.md`
/// found below the job directory.
pub async fn read_full_text(mineru_dir: &Path, job_id: &str) -> Result<(String, PathBuf), ReaderError> {
    let dir = job_dir(mineru_dir, job_id)?;
    let direct = dir.join("full.md");
    let path = if direct.is_file() {
        direct
    } else {
        find_file_recursive(&dir, "full.md")?.ok_or_else(|| ReaderError::FileNotFound {
            path: direct.clone(),
        })?
    };
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ReaderError::io(&path, e))?;
    Ok((content, path))
}

/// Pair an original full text with its reconstructed translation.
pub fn translated_document(job_id: &str, original: String, blocks: &[TextBlock]) -> (Document, Reconstruction) {
    let rebuilt = reconstruct(&original, blocks);
    let doc = Document {
        job_id: job_id.to_string(),
        original,
        translated: Some(rebuilt.markdown.clone()),
    };
    (doc, rebuilt)
}
