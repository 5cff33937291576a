//! Progress-callback traits for polling and batch-translation events.
//!
//! Pass an implementation to [`crate::pipeline::poll::poll_job`] or
//! [`crate::pipeline::translate::translate_layout`] to receive events as the
//! job is polled and as each translation batch lands.
//!
//! Callbacks are the integration point for hosts: the CLI drives an
//! `indicatif` bar from them, [`crate::session::SessionHandle`] turns them into
//! session messages. The traits are `Send + Sync` so one implementation can be
//! shared across tasks.
//!
//! # Example
//!
//! ```rust
//! use litreader::{TranslationCounts, TranslationProgressCallback};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct LastCount(AtomicUsize);
//!
//! impl TranslationProgressCallback for LastCount {
//!     fn on_batch_complete(&self, _batch: usize, _batches: usize, counts: &TranslationCounts) {
//!         self.0.store(counts.processed(), Ordering::SeqCst);
//!     }
//! }
//!
//! let cb = LastCount(AtomicUsize::new(0));
//! cb.on_batch_complete(1, 3, &TranslationCounts { translated: 10, total: 25, ..Default::default() });
//! assert_eq!(cb.0.load(Ordering::SeqCst), 10);
//! ```

use crate::model::{JobId, JobStatus, TranslationCounts};
use std::sync::Arc;

/// Called by the Job Poller on each status query.
///
/// All methods default to no-ops.
pub trait PollProgressCallback: Send + Sync {
    /// Called once before the first query.
    fn on_poll_start(&self, job: &JobId, max_attempts: u32) {
        let _ = (job, max_attempts);
    }

    /// Called after a query answered with a non-terminal status.
    ///
    /// # Arguments
    /// * `attempt` — 1-indexed attempt number
    /// * `status`  — the status as reported, including `extract_progress`
    fn on_poll_attempt(&self, job: &JobId, attempt: u32, max_attempts: u32, status: &JobStatus) {
        let _ = (job, attempt, max_attempts, status);
    }

    /// Called after a query failed with a retryable error. The attempt is
    /// consumed and polling continues.
    fn on_poll_error(&self, job: &JobId, attempt: u32, error: &str) {
        let _ = (job, attempt, error);
    }

    /// Called once when the job is done and blocks were extracted.
    fn on_poll_complete(&self, job: &JobId, block_count: usize) {
        let _ = (job, block_count);
    }
}

/// Called by the Batch Translation Orchestrator.
pub trait TranslationProgressCallback: Send + Sync {
    /// Called once before the first batch.
    ///
    /// # Arguments
    /// * `counts`  — initial counts; `skipped` already holds blocks that were
    ///   translated before the run and are not forced
    /// * `batches` — number of batches that will be submitted
    fn on_translation_start(&self, counts: &TranslationCounts, batches: usize) {
        let _ = (counts, batches);
    }

    /// Called after every batch, success or failure, with cumulative counts.
    ///
    /// `batch` is 1-indexed.
    fn on_batch_complete(&self, batch: usize, batches: usize, counts: &TranslationCounts) {
        let _ = (batch, batches, counts);
    }

    /// Called when a batch call failed. Its blocks are already counted as
    /// failed when [`on_batch_complete`](Self::on_batch_complete) follows.
    fn on_batch_error(&self, batch: usize, batches: usize, error: &str) {
        let _ = (batch, batches, error);
    }

    /// Called once after all batches have been attempted.
    fn on_translation_complete(&self, counts: &TranslationCounts) {
        let _ = counts;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PollProgressCallback for NoopProgressCallback {}
impl TranslationProgressCallback for NoopProgressCallback {}

impl<T: PollProgressCallback + ?Sized> PollProgressCallback for Arc<T> {
    fn on_poll_start(&self, job: &JobId, max_attempts: u32) {
        (**self).on_poll_start(job, max_attempts)
    }
    fn on_poll_attempt(&self, job: &JobId, attempt: u32, max_attempts: u32, status: &JobStatus) {
        (**self).on_poll_attempt(job, attempt, max_attempts, status)
    }
    fn on_poll_error(&self, job: &JobId, attempt: u32, error: &str) {
        (**self).on_poll_error(job, attempt, error)
    }
    fn on_poll_complete(&self, job: &JobId, block_count: usize) {
        (**self).on_poll_complete(job, block_count)
    }
}

impl<T: TranslationProgressCallback + ?Sized> TranslationProgressCallback for Arc<T> {
    fn on_translation_start(&self, counts: &TranslationCounts, batches: usize) {
        (**self).on_translation_start(counts, batches)
    }
    fn on_batch_complete(&self, batch: usize, batches: usize, counts: &TranslationCounts) {
        (**self).on_batch_complete(batch, batches, counts)
    }
    fn on_batch_error(&self, batch: usize, batches: usize, error: &str) {
        (**self).on_batch_error(batch, batches, error)
    }
    fn on_translation_complete(&self, counts: &TranslationCounts) {
        (**self).on_translation_complete(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        attempts: AtomicUsize,
        errors: AtomicUsize,
        batches: AtomicUsize,
        failed: AtomicUsize,
    }

    impl PollProgressCallback for Tracking {
        fn on_poll_attempt(&self, _: &JobId, _: u32, _: u32, _: &JobStatus) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_poll_error(&self, _: &JobId, _: u32, _: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl TranslationProgressCallback for Tracking {
        fn on_batch_complete(&self, _: usize, _: usize, counts: &TranslationCounts) {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.failed.store(counts.failed, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let job = JobId::Task("t".into());
        cb.on_poll_start(&job, 120);
        cb.on_poll_attempt(&job, 1, 120, &JobStatus::with_state(JobState::Running));
        cb.on_poll_error(&job, 2, "connection reset");
        cb.on_poll_complete(&job, 4);
        let counts = TranslationCounts::default();
        cb.on_translation_start(&counts, 0);
        cb.on_batch_error(1, 1, "boom");
        cb.on_translation_complete(&counts);
    }

    #[test]
    fn arc_forwards_events() {
        let tracker = Arc::new(Tracking::default());
        let job = JobId::Batch("b".into());
        let running = JobStatus::with_state(JobState::Running);

        let as_poll: &dyn PollProgressCallback = &tracker;
        as_poll.on_poll_attempt(&job, 1, 3, &running);
        as_poll.on_poll_error(&job, 2, "timeout");

        let as_tr: &dyn TranslationProgressCallback = &tracker;
        as_tr.on_batch_complete(
            1,
            2,
            &TranslationCounts {
                failed: 10,
                total: 20,
                ..Default::default()
            },
        );

        assert_eq!(tracker.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.batches.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failed.load(Ordering::SeqCst), 10);
    }
}
