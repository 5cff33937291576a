//! Batch translation: the client-side orchestrator and the server-side
//! per-block translator it talks to.
//!
//! ```text
//!  layout ──▶ select ──▶ chunk(10) ──▶ BatchTranslator ──▶ merge ──▶ counts
//!                           │              (sequential)      by id,
//!                           └── failure: whole chunk failed   else (page, text)
//! ```
//!
//! The orchestrator never aborts: a failed batch is recorded as a
//! [`BatchError`], every block of it counts as failed, and the next batch
//! runs. "Zero translated, N failed" is a normal outcome.

use crate::error::{failure_hint, BatchError, ReaderError};
use crate::model::{TextBlock, TranslationBatchResult, TranslationCounts};
use crate::progress::TranslationProgressCallback;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};

/// Default number of blocks per batch call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Translates one chunk of blocks in a single call.
///
/// Implemented by [`crate::remote::ReaderApiClient`] (`POST
/// /api/translate-layout`) and by [`LayoutTranslator`] (in-process).
pub trait BatchTranslator: Send + Sync {
    fn translate_batch(
        &self,
        blocks: &[TextBlock],
        target_lang: &str,
        model: Option<&str>,
        force_retranslate: bool,
    ) -> impl Future<Output = Result<TranslationBatchResult, ReaderError>> + Send;
}

/// Translates one piece of text.
pub trait Translator: Send + Sync {
    fn translate(
        &self,
        text: &str,
        target_lang: &str,
        model: Option<&str>,
    ) -> impl Future<Output = Result<String, ReaderError>> + Send;
}

/// Knobs of one orchestrator run.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub target_lang: String,
    pub model: Option<String>,
    pub force_retranslate: bool,
    pub batch_size: usize,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            target_lang: "zh".to_string(),
            model: None,
            force_retranslate: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Outcome of a whole orchestrator run.
#[derive(Debug, Clone, Default)]
pub struct TranslationSummary {
    /// The working copy with every successful translation merged in.
    pub layout: Vec<TextBlock>,
    pub counts: TranslationCounts,
    pub batches_submitted: usize,
    pub errors: Vec<BatchError>,
    /// First per-block or per-batch error message seen.
    pub first_error: Option<String>,
}

/// Which blocks a run would submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationPlan {
    /// Indices into the layout, in layout order.
    pub selected: Vec<usize>,
    /// Blocks with text that already carry a translation and are not forced.
    pub skipped: usize,
    /// Blocks with non-empty text.
    pub total: usize,
}

impl TranslationPlan {
    pub fn new(layout: &[TextBlock], force_retranslate: bool) -> Self {
        let mut selected = Vec::new();
        let mut skipped = 0;
        let mut total = 0;
        for (i, block) in layout.iter().enumerate() {
            if block.text.trim().is_empty() {
                continue;
            }
            total += 1;
            if force_retranslate || !block.is_translated() {
                selected.push(i);
            } else {
                skipped += 1;
            }
        }
        Self {
            selected,
            skipped,
            total,
        }
    }

    /// `ceil(selected / batch_size)`.
    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.selected.len().div_ceil(batch_size.max(1))
    }
}

/// Run the batch orchestrator over `layout`.
pub async fn translate_layout<T: BatchTranslator>(
    translator: &T,
    mut layout: Vec<TextBlock>,
    options: &TranslateOptions,
    progress: &dyn TranslationProgressCallback,
) -> TranslationSummary {
    let plan = TranslationPlan::new(&layout, options.force_retranslate);
    let batch_size = options.batch_size.max(1);
    let batches = plan.batch_count(batch_size);

    let mut counts = TranslationCounts {
        skipped: plan.skipped,
        total: plan.total,
        ..TranslationCounts::default()
    };
    let mut errors = Vec::new();
    let mut first_error: Option<String> = None;

    info!(
        total = plan.total,
        pending = plan.selected.len(),
        skipped = plan.skipped,
        batches,
        target_lang = %options.target_lang,
        "Translation started"
    );
    progress.on_translation_start(&counts, batches);

    for (i, chunk) in plan.selected.chunks(batch_size).enumerate() {
        let batch_no = i + 1;
        let blocks: Vec<TextBlock> = chunk.iter().map(|&idx| layout[idx].clone()).collect();

        let result = translator
            .translate_batch(
                &blocks,
                &options.target_lang,
                options.model.as_deref(),
                options.force_retranslate,
            )
            .await;

        match result {
            Ok(batch) => {
                let merged = merge_batch(&mut layout, chunk, &batch.layout);
                let len = chunk.len();
                let translated = batch.translated_count.min(len);
                let skipped = batch.skipped_count.min(len - translated);
                counts.translated += translated;
                counts.skipped += skipped;
                counts.failed += len - translated - skipped;
                if first_error.is_none() {
                    first_error = batch.first_error.clone();
                }
                debug!(batch = batch_no, merged, translated, "Batch merged");
            }
            Err(e) => {
                let detail = e.to_string();
                warn!(batch = batch_no, size = chunk.len(), error = %detail, "Translation batch failed");
                counts.failed += chunk.len();
                progress.on_batch_error(batch_no, batches, &detail);
                first_error.get_or_insert_with(|| detail.clone());
                errors.push(BatchError::Failed {
                    batch: batch_no,
                    size: chunk.len(),
                    detail,
                });
            }
        }
        progress.on_batch_complete(batch_no, batches, &counts);
    }

    info!(
        translated = counts.translated,
        skipped = counts.skipped,
        failed = counts.failed,
        total = counts.total,
        "Translation finished"
    );
    progress.on_translation_complete(&counts);

    TranslationSummary {
        layout,
        counts,
        batches_submitted: batches,
        errors,
        first_error,
    }
}

/// Copy translations from `returned` into the blocks at `chunk` indices.
///
/// Blocks are matched by synthetic `id` when both sides carry one, otherwise
/// by `(page, text)`. Returns how many blocks received a translation.
pub fn merge_batch(layout: &mut [TextBlock], chunk: &[usize], returned: &[TextBlock]) -> usize {
    let mut by_id: HashMap<u32, usize> = HashMap::new();
    let mut by_key: HashMap<(u32, String), usize> = HashMap::new();
    for &idx in chunk {
        let block = &layout[idx];
        if let Some(id) = block.id {
            by_id.entry(id).or_insert(idx);
        }
        by_key
            .entry((block.page, block.text.clone()))
            .or_insert(idx);
    }

    let mut merged = 0;
    for r in returned.iter().filter(|r| r.is_translated()) {
        let target = r
            .id
            .and_then(|id| by_id.get(&id))
            .or_else(|| by_key.get(&(r.page, r.text.clone())))
            .copied();
        if let Some(idx) = target {
            layout[idx].translated_text = r.translated_text.clone();
            merged += 1;
        }
    }
    merged
}

// ── Server side ──────────────────────────────────────────────────────────

/// Translates each block of a layout with a [`Translator`], one call per
/// block. Backs `POST /api/translate-layout`.
#[derive(Debug, Clone)]
pub struct LayoutTranslator<T> {
    inner: T,
}

impl<T: Translator> LayoutTranslator<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Translate every block that has text and either no translation yet or
    /// `force_retranslate`. A failed block keeps whatever translation it had.
    pub async fn translate_blocks(
        &self,
        mut layout: Vec<TextBlock>,
        target_lang: &str,
        model: Option<&str>,
        force_retranslate: bool,
    ) -> TranslationBatchResult {
        let mut translated_count = 0;
        let mut skipped_count = 0;
        let mut failed_count = 0;
        let mut total_count = 0;
        let mut first_error = None;

        for block in layout.iter_mut() {
            let text = block.text.trim().to_string();
            if text.is_empty() {
                continue;
            }
            total_count += 1;
            if !force_retranslate && block.is_translated() {
                skipped_count += 1;
                continue;
            }

            match self.inner.translate(&text, target_lang, model).await {
                Ok(out) => {
                    if out == text && text.chars().count() > 10 {
                        warn!(preview = %preview(&text), "Translation equals the source text; the model may not have translated it");
                    }
                    block.translated_text = Some(out);
                    translated_count += 1;
                }
                Err(e) => {
                    failed_count += 1;
                    warn!(page = block.page, error = %e, "Block translation failed");
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }

        info!(
            translated_count,
            skipped_count, failed_count, total_count, "Layout translation finished"
        );
        TranslationBatchResult {
            layout,
            translated_count,
            skipped_count,
            failed_count,
            total_count,
            first_error,
        }
    }
}

impl<T: Translator> BatchTranslator for LayoutTranslator<T> {
    async fn translate_batch(
        &self,
        blocks: &[TextBlock],
        target_lang: &str,
        model: Option<&str>,
        force_retranslate: bool,
    ) -> Result<TranslationBatchResult, ReaderError> {
        Ok(self
            .translate_blocks(blocks.to_vec(), target_lang, model, force_retranslate)
            .await)
    }
}

/// Operator-facing summary line of one `/api/translate-layout` call.
pub fn summary_message(result: &TranslationBatchResult, api_configured: bool) -> String {
    let mut msg = format!("Translation finished: {} translated", result.translated_count);
    if result.skipped_count > 0 {
        msg.push_str(&format!(", {} skipped", result.skipped_count));
    }
    if result.failed_count > 0 {
        msg.push_str(&format!(", {} failed", result.failed_count));
        if !api_configured {
            msg.push_str(" (no API key configured, set QWEN_API_KEY or OPENAI_API_KEY)");
        } else if let Some(err) = result.first_error.as_deref() {
            match failure_hint(err) {
                Some(hint) => msg.push_str(&format!(" ({hint})")),
                None => msg.push_str(&format!(" (error: {})", preview(err))),
            }
        }
    }
    msg
}

fn preview(s: &str) -> String {
    match s.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
