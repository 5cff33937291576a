//! Job poller: drive a remote parse job to a terminal state.
//!
//! Fixed interval, fixed attempt budget, no backoff. A query that fails with
//! a retryable error is treated exactly like "still running": it consumes one
//! attempt and polling goes on. The poller never sleeps after its last
//! attempt, so `max_attempts` queries take `(max_attempts - 1) × interval`.

use crate::config::PollPolicy;
use crate::error::ReaderError;
use crate::model::{JobId, JobState, JobStatus, ParseJob, TextBlock};
use crate::pipeline::normalize::normalize_layout;
use crate::progress::PollProgressCallback;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Anything that can report the status of a parse job.
///
/// Implemented by [`crate::remote::ReaderApiClient`] (our own HTTP API) and
/// by [`crate::workflow::MineruStatusSource`] (MinerU directly).
pub trait StatusSource: Send + Sync {
    fn query(&self, job: &JobId) -> impl Future<Output = Result<JobStatus, ReaderError>> + Send;
}

/// Result of a successful poll.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub job: ParseJob,
    pub blocks: Vec<TextBlock>,
    /// The final `done` status as reported.
    pub status: JobStatus,
    /// Number of queries issued, including the final one.
    pub attempts: u32,
}

/// Poll `job` until it is done, failed, or the attempt budget runs out.
///
/// * `done` with blocks → `Ok(PollOutcome)`
/// * `done` without blocks → [`ReaderError::NoBlocks`]
/// * `failed` → [`ReaderError::JobFailed`] carrying the remote message
/// * budget exhausted → [`ReaderError::PollTimeout`]
/// * `cancel` fired → [`ReaderError::Cancelled`]
pub async fn poll_job<S: StatusSource>(
    source: &S,
    job: &JobId,
    policy: PollPolicy,
    progress: &dyn PollProgressCallback,
    cancel: Option<&CancellationToken>,
) -> Result<PollOutcome, ReaderError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut parse_job = ParseJob::new(job.clone());
    progress.on_poll_start(job, max_attempts);
    info!(%job, max_attempts, interval_ms = policy.interval.as_millis() as u64, "Polling started");

    for attempt in 1..=max_attempts {
        let result = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(cancelled(job)),
                r = source.query(job) => r,
            },
            None => source.query(job).await,
        };

        match result {
            Ok(status) => {
                parse_job.state = status.state;
                if status.extract_progress.is_some() {
                    parse_job.progress = status.extract_progress.clone();
                }
                match status.state {
                    JobState::Done => return finish(parse_job, status, attempt, progress),
                    JobState::Failed => {
                        let message = status
                            .err_msg
                            .filter(|m| !m.trim().is_empty())
                            .unwrap_or_else(|| "unknown error".to_string());
                        warn!(%job, %message, "Parse job failed");
                        return Err(ReaderError::JobFailed {
                            job_id: job.as_str().to_string(),
                            message,
                        });
                    }
                    state => {
                        debug!(%job, attempt, %state, "Job not finished yet");
                        progress.on_poll_attempt(job, attempt, max_attempts, &status);
                    }
                }
            }
            Err(e) if e.is_retryable() => {
                warn!(%job, attempt, error = %e, "Status query failed; counting as still running");
                progress.on_poll_error(job, attempt, &e.to_string());
            }
            Err(e) => return Err(e),
        }

        if attempt < max_attempts {
            match cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => return Err(cancelled(job)),
                    _ = tokio::time::sleep(policy.interval) => {}
                },
                None => tokio::time::sleep(policy.interval).await,
            }
        }
    }

    warn!(%job, max_attempts, "Polling budget exhausted");
    Err(ReaderError::PollTimeout {
        job_id: job.as_str().to_string(),
        attempts: max_attempts,
        secs: policy.budget().as_secs(),
    })
}

fn finish(
    mut parse_job: ParseJob,
    status: JobStatus,
    attempts: u32,
    progress: &dyn PollProgressCallback,
) -> Result<PollOutcome, ReaderError> {
    let blocks = blocks_from_status(&status);
    if blocks.is_empty() {
        return Err(ReaderError::NoBlocks {
            job_id: parse_job.id.as_str().to_string(),
        });
    }
    parse_job.result = status.mineru_data.clone();
    progress.on_poll_complete(&parse_job.id, blocks.len());
    info!(job = %parse_job.id, blocks = blocks.len(), attempts, "Parse job done");
    Ok(PollOutcome {
        job: parse_job,
        blocks,
        status,
        attempts,
    })
}

/// Blocks carried by a `done` status: the server-normalized layout when
/// present, otherwise the raw parser output run through the normalizer.
pub fn blocks_from_status(status: &JobStatus) -> Vec<TextBlock> {
    match &status.layout {
        Some(layout) if !layout.is_empty() => layout.clone(),
        _ => status
            .mineru_data
            .as_ref()
            .map(normalize_layout)
            .unwrap_or_default(),
    }
}

fn cancelled(job: &JobId) -> ReaderError {
    info!(%job, "Polling cancelled");
    ReaderError::Cancelled {
        job_id: job.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, BlockKind};
    use crate::progress::NoopProgressCallback;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers `running` for the first `running_for` queries, then `last`.
    struct Scripted {
        running_for: u32,
        last: JobStatus,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(running_for: u32, last: JobStatus) -> Self {
            Self {
                running_for,
                last,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl StatusSource for Scripted {
        async fn query(&self, _job: &JobId) -> Result<JobStatus, ReaderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.running_for {
                Ok(JobStatus::with_state(JobState::Running))
            } else {
                Ok(self.last.clone())
            }
        }
    }

    /// Replays a fixed list of answers, then repeats the last one.
    struct Replay(Mutex<Vec<Result<JobStatus, ReaderError>>>);

    impl StatusSource for Replay {
        async fn query(&self, _job: &JobId) -> Result<JobStatus, ReaderError> {
            let mut answers = self.0.lock().unwrap();
            if answers.len() > 1 {
                answers.remove(0)
            } else {
                match &answers[0] {
                    Ok(s) => Ok(s.clone()),
                    Err(_) => Err(ReaderError::Internal("exhausted".into())),
                }
            }
        }
    }

    fn done_with_layout() -> JobStatus {
        JobStatus {
            layout: Some(vec![TextBlock::new(
                1,
                BBox::from([0.0, 0.0, 10.0, 10.0]),
                "Hello",
                BlockKind::Text,
            )]),
            ..JobStatus::with_state(JobState::Done)
        }
    }

    fn job() -> JobId {
        JobId::Task("t-1".into())
    }

    #[tokio::test(start_paused = true)]
    async fn done_on_last_allowed_attempt_succeeds() {
        let source = Scripted::new(119, done_with_layout());
        let start = tokio::time::Instant::now();
        let out = poll_job(&source, &job(), PollPolicy::default(), &NoopProgressCallback, None)
            .await
            .unwrap();
        assert_eq!(out.attempts, 120);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.job.state, JobState::Done);
        assert_eq!(source.calls.load(Ordering::SeqCst), 120);
        assert_eq!(start.elapsed(), Duration::from_secs(3 * 119));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_job_times_out() {
        let source = Scripted::new(121, done_with_layout());
        let err = poll_job(&source, &job(), PollPolicy::default(), &NoopProgressCallback, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::PollTimeout { attempts: 120, .. }), "{err}");
        assert_eq!(source.calls.load(Ordering::SeqCst), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_state_surfaces_remote_message() {
        let failed = JobStatus {
            err_msg: Some("file is encrypted".into()),
            ..JobStatus::with_state(JobState::Failed)
        };
        let source = Scripted::new(2, failed);
        let err = poll_job(&source, &job(), PollPolicy::default(), &NoopProgressCallback, None)
            .await
            .unwrap_err();
        match err {
            ReaderError::JobFailed { message, .. } => assert_eq!(message, "file is encrypted"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn done_without_blocks_is_no_blocks() {
        let done = JobStatus {
            layout: Some(vec![]),
            mineru_data: Some(json!({"something": "else"})),
            ..JobStatus::with_state(JobState::Done)
        };
        let source = Scripted::new(0, done);
        let err = poll_job(&source, &job(), PollPolicy::default(), &NoopProgressCallback, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::NoBlocks { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn raw_parser_output_is_normalized() {
        let done = JobStatus {
            mineru_data: Some(json!([{"text": "Hi", "bbox": [0, 0, 1, 1], "page_idx": 0}])),
            ..JobStatus::with_state(JobState::Done)
        };
        let out = poll_job(
            &Scripted::new(0, done),
            &job(),
            PollPolicy::default(),
            &NoopProgressCallback,
            None,
        )
        .await
        .unwrap();
        assert_eq!(out.blocks[0].text, "Hi");
        assert!(out.job.result.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_consume_attempts() {
        let transport = || {
            Err(ReaderError::Transport {
                url: "http://x".into(),
                reason: "connection refused".into(),
            })
        };
        let source = Replay(Mutex::new(vec![transport(), transport(), Ok(done_with_layout())]));
        let policy = PollPolicy {
            interval: Duration::from_secs(3),
            max_attempts: 3,
        };
        let out = poll_job(&source, &job(), policy, &NoopProgressCallback, None)
            .await
            .unwrap();
        assert_eq!(out.attempts, 3);

        let source = Replay(Mutex::new(vec![transport(), transport(), Ok(done_with_layout())]));
        let policy = PollPolicy {
            interval: Duration::from_secs(3),
            max_attempts: 2,
        };
        let err = poll_job(&source, &job(), policy, &NoopProgressCallback, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::PollTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_errors_abort_immediately() {
        let source = Replay(Mutex::new(vec![
            Err(ReaderError::MineruNotConfigured),
            Ok(done_with_layout()),
        ]));
        let err = poll_job(&source, &job(), PollPolicy::default(), &NoopProgressCallback, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::MineruNotConfigured));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let source = Scripted::new(u32::MAX, done_with_layout());
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            child.cancel();
        });
        let err = poll_job(&source, &job(), PollPolicy::default(), &NoopProgressCallback, Some(&token))
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::Cancelled { .. }));
        assert!(source.calls.load(Ordering::SeqCst) <= 5);
    }
}
