//! Per-document session controller.
//!
//! One actor task owns the [`SessionState`] of a document being read: the
//! parse job, the current layout, cumulative translation counts, the
//! original and translated full text and a one-line status for display.
//! Everything else talks to it by sending [`SessionEvent`]s through a
//! [`SessionHandle`]; readers subscribe to a `watch` channel.
//!
//! ```text
//!  poller ──┐                        ┌──▶ watch::Receiver<SessionState>
//!  orchestrator ─▶ mpsc<SessionEvent> ─▶ apply()
//!  caller ──┘                        └──  CancellationToken (teardown)
//! ```
//!
//! State transitions live in [`apply`], which does no I/O and is tested
//! without a runtime. After [`SessionHandle::close`] every further event is
//! dropped, so a late callback from a detached poll loop cannot touch a
//! dismissed view.

use crate::model::{ExtractProgress, JobId, JobState, JobStatus, ParseJob, TextBlock, TranslationCounts};
use crate::pipeline::reconstruct::{reconstruct, Strategy};
use crate::progress::{PollProgressCallback, TranslationProgressCallback};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything the reader view shows for one document.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub job: Option<ParseJob>,
    pub layout: Vec<TextBlock>,
    pub counts: TranslationCounts,
    pub original: Option<String>,
    pub translated: Option<String>,
    /// How `translated` was produced.
    pub strategy: Option<Strategy>,
    pub translating: bool,
    pub status: String,
    /// Number of events applied so far.
    pub revision: u64,
}

/// A message that changes the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    JobSubmitted(JobId),
    PollStarted {
        max_attempts: u32,
    },
    PollAttempt {
        attempt: u32,
        max_attempts: u32,
        state: JobState,
        progress: Option<ExtractProgress>,
    },
    PollError {
        attempt: u32,
        error: String,
    },
    ParseCompleted {
        block_count: usize,
    },
    ParseFailed(String),
    LayoutLoaded(Vec<TextBlock>),
    OriginalLoaded(String),
    TranslationStarted {
        counts: TranslationCounts,
        batches: usize,
    },
    BatchCompleted {
        batch: usize,
        batches: usize,
        counts: TranslationCounts,
    },
    BatchFailed {
        batch: usize,
        error: String,
    },
    TranslationFinished(TranslationCounts),
    /// The merged layout after a translation run.
    LayoutTranslated(Vec<TextBlock>),
}

/// Apply one event to `state`.
pub fn apply(state: &mut SessionState, event: SessionEvent) {
    state.revision += 1;
    match event {
        SessionEvent::JobSubmitted(id) => {
            state.status = format!("Submitted {id}");
            state.job = Some(ParseJob::new(id));
        }
        SessionEvent::PollStarted { max_attempts } => {
            state.status = format!("Waiting for the parser (up to {max_attempts} checks)");
        }
        SessionEvent::PollAttempt {
            attempt,
            max_attempts,
            state: job_state,
            progress,
        } => {
            state.status = match &progress {
                Some(p) if p.total_pages > 0 => format!(
                    "Parsing: {}/{} pages ({job_state}, check {attempt}/{max_attempts})",
                    p.extracted_pages, p.total_pages
                ),
                _ => format!("Parsing ({job_state}, check {attempt}/{max_attempts})"),
            };
            if let Some(job) = state.job.as_mut() {
                job.state = job_state;
                if progress.is_some() {
                    job.progress = progress;
                }
            }
        }
        SessionEvent::PollError { attempt, error } => {
            state.status = format!("Status check {attempt} failed, retrying: {error}");
        }
        SessionEvent::ParseCompleted { block_count } => {
            state.status = format!("Parsed: {block_count} text blocks");
            if let Some(job) = state.job.as_mut() {
                job.state = JobState::Done;
            }
        }
        SessionEvent::ParseFailed(message) => {
            state.status = format!("Parsing failed: {message}");
            if let Some(job) = state.job.as_mut() {
                job.state = JobState::Failed;
            }
        }
        SessionEvent::LayoutLoaded(layout) => {
            state.layout = layout;
            refresh_translated(state);
        }
        SessionEvent::OriginalLoaded(text) => {
            state.original = Some(text);
            refresh_translated(state);
        }
        SessionEvent::TranslationStarted { counts, batches } => {
            state.translating = true;
            state.counts = counts;
            state.status = format!("Translating {} blocks in {batches} batches", counts.total);
        }
        SessionEvent::BatchCompleted { batch, batches, counts } => {
            state.counts = counts;
            state.status = format!(
                "Translating: {}/{} (batch {batch}/{batches}, {} translated, {} skipped, {} failed)",
                counts.processed(),
                counts.total,
                counts.translated,
                counts.skipped,
                counts.failed
            );
        }
        SessionEvent::BatchFailed { batch, error } => {
            debug!(batch, %error, "Batch failure recorded in session");
        }
        SessionEvent::TranslationFinished(counts) => {
            state.translating = false;
            state.counts = counts;
            state.status = format!(
                "Translation finished: {} translated, {} skipped, {} failed",
                counts.translated, counts.skipped, counts.failed
            );
        }
        SessionEvent::LayoutTranslated(layout) => {
            state.layout = layout;
            refresh_translated(state);
        }
    }
}

/// Rebuild the translated document when both inputs are present.
fn refresh_translated(state: &mut SessionState) {
    let Some(original) = state.original.as_deref() else {
        return;
    };
    if !state.layout.iter().any(TextBlock::is_translated) {
        return;
    }
    let rebuilt = reconstruct(original, &state.layout);
    state.strategy = Some(rebuilt.strategy);
    state.translated = Some(rebuilt.markdown);
}

/// Cloneable handle to a running session actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
}

/// Start a session actor. Must be called from within a Tokio runtime.
pub fn spawn_session(initial: SessionState) -> SessionHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(initial);
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => state_tx.send_modify(|s| apply(s, event)),
                    None => break,
                },
            }
        }
        info!("Session closed");
    });

    SessionHandle {
        tx,
        state: state_rx,
        cancel,
    }
}

impl SessionHandle {
    /// Queue an event. A no-op once the session is closed.
    pub fn send(&self, event: SessionEvent) {
        if self.cancel.is_cancelled() {
            debug!("Dropping event for closed session");
            return;
        }
        let _ = self.tx.send(event);
    }

    /// Latest state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Token to pass to the poller so teardown also stops polling.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tear the session down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl PollProgressCallback for SessionHandle {
    fn on_poll_start(&self, _job: &JobId, max_attempts: u32) {
        self.send(SessionEvent::PollStarted { max_attempts });
    }

    fn on_poll_attempt(&self, _job: &JobId, attempt: u32, max_attempts: u32, status: &JobStatus) {
        self.send(SessionEvent::PollAttempt {
            attempt,
            max_attempts,
            state: status.state,
            progress: status.extract_progress.clone(),
        });
    }

    fn on_poll_error(&self, _job: &JobId, attempt: u32, error: &str) {
        self.send(SessionEvent::PollError {
            attempt,
            error: error.to_string(),
        });
    }

    fn on_poll_complete(&self, _job: &JobId, block_count: usize) {
        self.send(SessionEvent::ParseCompleted { block_count });
    }
}

impl TranslationProgressCallback for SessionHandle {
    fn on_translation_start(&self, counts: &TranslationCounts, batches: usize) {
        self.send(SessionEvent::TranslationStarted {
            counts: *counts,
            batches,
        });
    }

    fn on_batch_complete(&self, batch: usize, batches: usize, counts: &TranslationCounts) {
        self.send(SessionEvent::BatchCompleted {
            batch,
            batches,
            counts: *counts,
        });
    }

    fn on_batch_error(&self, batch: usize, _batches: usize, error: &str) {
        self.send(SessionEvent::BatchFailed {
            batch,
            error: error.to_string(),
        });
    }

    fn on_translation_complete(&self, counts: &TranslationCounts) {
        self.send(SessionEvent::TranslationFinished(*counts));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, BlockKind};

    fn block(page: u32, text: &str, translated: Option<&str>) -> TextBlock {
        let mut b = TextBlock::new(page, BBox::from([0.0, 0.0, 10.0, 10.0]), text, BlockKind::Text);
        b.translated_text = translated.map(str::to_string);
        b
    }

    #[test]
    fn poll_events_update_job_and_status() {
        let mut s = SessionState::default();
        apply(&mut s, SessionEvent::JobSubmitted(JobId::Batch("b1".into())));
        apply(
            &mut s,
            SessionEvent::PollAttempt {
                attempt: 2,
                max_attempts: 120,
                state: JobState::Running,
                progress: Some(ExtractProgress {
                    extracted_pages: 3,
                    total_pages: 10,
                    start_time: None,
                }),
            },
        );
        assert_eq!(s.job.as_ref().map(|j| j.state), Some(JobState::Running));
        assert!(s.status.contains("3/10 pages"), "{}", s.status);

        apply(&mut s, SessionEvent::ParseFailed("file too large".into()));
        assert_eq!(s.job.as_ref().map(|j| j.state), Some(JobState::Failed));
        assert!(s.status.contains("file too large"));
        assert_eq!(s.revision, 3);
    }

    #[test]
    fn translated_document_follows_layout_and_original() {
        let mut s = SessionState::default();
        apply(
            &mut s,
            SessionEvent::LayoutLoaded(vec![block(1, "Hello", None), block(1, "World", None)]),
        );
        apply(&mut s, SessionEvent::OriginalLoaded("Hello\n\nWorld".into()));
        assert!(s.translated.is_none(), "nothing translated yet");

        apply(
            &mut s,
            SessionEvent::LayoutTranslated(vec![block(1, "Hello", Some("你好")), block(1, "World", Some("世界"))]),
        );
        assert_eq!(s.translated.as_deref(), Some("你好\n\n世界"));
        assert_eq!(s.strategy, Some(Strategy::LayoutConcat));
    }

    #[test]
    fn translation_counts_flow_through() {
        let mut s = SessionState::default();
        let start = TranslationCounts {
            skipped: 2,
            total: 12,
            ..TranslationCounts::default()
        };
        apply(&mut s, SessionEvent::TranslationStarted { counts: start, batches: 1 });
        assert!(s.translating);
        let done = TranslationCounts {
            translated: 10,
            ..start
        };
        apply(&mut s, SessionEvent::TranslationFinished(done));
        assert!(!s.translating);
        assert_eq!(s.counts.processed(), 12);
        assert!(s.status.contains("10 translated"));
    }

    #[tokio::test]
    async fn actor_publishes_state() {
        let handle = spawn_session(SessionState::default());
        let mut rx = handle.subscribe();
        PollProgressCallback::on_poll_complete(&handle, &JobId::Task("t".into()), 7);
        let state = rx.wait_for(|s| s.revision >= 1).await.unwrap().clone();
        assert_eq!(state.status, "Parsed: 7 text blocks");
    }

    #[tokio::test]
    async fn closed_session_ignores_late_events() {
        let handle = spawn_session(SessionState::default());
        handle.send(SessionEvent::OriginalLoaded("x".into()));
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.revision == 1).await.unwrap();

        handle.close();
        assert!(handle.is_closed());
        assert!(handle.cancel_token().is_cancelled());
        handle.send(SessionEvent::OriginalLoaded("late".into()));
        tokio::task::yield_now().await;
        assert_eq!(handle.snapshot().original.as_deref(), Some("x"));
        assert_eq!(handle.snapshot().revision, 1);
    }
}
