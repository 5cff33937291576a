//! Streaming translation API: emit progress as each batch lands.
//!
//! [`crate::pipeline::translate::translate_layout`] returns only after the
//! last batch. [`translate_stream`] runs the same orchestrator in a spawned
//! task and yields a [`TranslationProgress`] item per event, ending with
//! [`TranslationProgress::Finished`] carrying the merged layout. Dropping the
//! stream abandons the run after the batch in flight.

use crate::model::{TextBlock, TranslationCounts};
use crate::pipeline::translate::{translate_layout, BatchTranslator, TranslateOptions, TranslationSummary};
use crate::progress::TranslationProgressCallback;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// One event of a streamed translation run.
#[derive(Debug, Clone)]
pub enum TranslationProgress {
    Started {
        counts: TranslationCounts,
        batches: usize,
    },
    /// Cumulative counts after batch `batch` (1-indexed).
    Batch {
        batch: usize,
        batches: usize,
        counts: TranslationCounts,
    },
    BatchFailed {
        batch: usize,
        batches: usize,
        error: String,
    },
    Finished(TranslationSummary),
}

impl TranslationProgress {
    /// Counts carried by this event, if any.
    pub fn counts(&self) -> Option<&TranslationCounts> {
        match self {
            TranslationProgress::Started { counts, .. } | TranslationProgress::Batch { counts, .. } => Some(counts),
            TranslationProgress::Finished(summary) => Some(&summary.counts),
            TranslationProgress::BatchFailed { .. } => None,
        }
    }
}

/// A boxed stream of translation events.
pub type TranslationStream = BoxStream<'static, TranslationProgress>;

struct ChannelProgress(mpsc::UnboundedSender<TranslationProgress>);

impl TranslationProgressCallback for ChannelProgress {
    fn on_translation_start(&self, counts: &TranslationCounts, batches: usize) {
        let _ = self.0.send(TranslationProgress::Started {
            counts: *counts,
            batches,
        });
    }

    fn on_batch_complete(&self, batch: usize, batches: usize, counts: &TranslationCounts) {
        let _ = self.0.send(TranslationProgress::Batch {
            batch,
            batches,
            counts: *counts,
        });
    }

    fn on_batch_error(&self, batch: usize, batches: usize, error: &str) {
        let _ = self.0.send(TranslationProgress::BatchFailed {
            batch,
            batches,
            error: error.to_string(),
        });
    }
}

/// Translate `layout`, streaming progress events.
///
/// Must be called from within a Tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use litreader::stream::{translate_stream, TranslationProgress};
/// use litreader::{ReaderApiClient, TranslateOptions};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Arc::new(ReaderApiClient::new("http://127.0.0.1:5000")?);
/// let layout = Vec::new();
/// let mut events = translate_stream(client, layout, TranslateOptions::default());
/// while let Some(event) = events.next().await {
///     if let TranslationProgress::Finished(summary) = event {
///         println!("{} translated", summary.counts.translated);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn translate_stream<T>(translator: Arc<T>, layout: Vec<TextBlock>, options: TranslateOptions) -> TranslationStream
where
    T: BatchTranslator + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let progress = ChannelProgress(tx.clone());
        tokio::select! {
            summary = translate_layout(translator.as_ref(), layout, &options, &progress) => {
                let _ = tx.send(TranslationProgress::Finished(summary));
            }
            _ = tx.closed() => debug!("Translation stream dropped; abandoning run"),
        }
    });
    UnboundedReceiverStream::new(rx).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReaderError;
    use crate::model::{BBox, BlockKind, TranslationBatchResult};

    struct FailSecond;

    impl BatchTranslator for FailSecond {
        async fn translate_batch(
            &self,
            blocks: &[TextBlock],
            _target_lang: &str,
            _model: Option<&str>,
            _force: bool,
        ) -> Result<TranslationBatchResult, ReaderError> {
            if blocks.first().and_then(|b| b.id) == Some(10) {
                return Err(ReaderError::LlmApiError {
                    message: "HTTP 500: boom".into(),
                });
            }
            let layout: Vec<TextBlock> = blocks
                .iter()
                .map(|b| TextBlock {
                    translated_text: Some(format!("T:{}", b.text)),
                    ..b.clone()
                })
                .collect();
            Ok(TranslationBatchResult {
                translated_count: layout.len(),
                total_count: layout.len(),
                layout,
                ..TranslationBatchResult::default()
            })
        }
    }

    fn layout(n: u32) -> Vec<TextBlock> {
        (0..n)
            .map(|i| {
                let mut b = TextBlock::new(1, BBox::from([0.0, 0.0, 1.0, 1.0]), format!("b{i}"), BlockKind::Text);
                b.id = Some(i);
                b
            })
            .collect()
    }

    #[tokio::test]
    async fn emits_start_batches_and_summary() {
        let events: Vec<_> = translate_stream(Arc::new(FailSecond), layout(25), TranslateOptions::default())
            .collect()
            .await;

        assert!(matches!(events[0], TranslationProgress::Started { batches: 3, .. }));
        let failed = events
            .iter()
            .filter(|e| matches!(e, TranslationProgress::BatchFailed { batch: 2, .. }))
            .count();
        assert_eq!(failed, 1);
        let batch_events = events
            .iter()
            .filter(|e| matches!(e, TranslationProgress::Batch { .. }))
            .count();
        assert_eq!(batch_events, 3);

        let Some(TranslationProgress::Finished(summary)) = events.last() else {
            panic!("stream must end with the summary");
        };
        assert_eq!(summary.counts.translated, 15);
        assert_eq!(summary.counts.failed, 10);
        assert_eq!(summary.counts.processed(), 25);
        assert_eq!(summary.layout[0].translated_text.as_deref(), Some("T:b0"));
        assert!(summary.layout[10].translated_text.is_none());
    }

    #[tokio::test]
    async fn counts_are_monotonic() {
        let events: Vec<_> = translate_stream(Arc::new(FailSecond), layout(30), TranslateOptions::default())
            .collect()
            .await;
        let processed: Vec<usize> = events.iter().filter_map(|e| e.counts()).map(|c| c.processed()).collect();
        assert!(processed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(processed.last(), Some(&30));
    }
}
