//! Drive a [`ResumableUpload`] to completion, retrying transient failures.
//!
//! Retryable transport errors end the current attempt; the loop then waits
//! the [`RetryPolicy`] delay and re-drives the same request, which resumes
//! from the server's committed offset. Rejections and local read errors are
//! returned at once. At most one attempt per task is ever in flight.

use super::resumable::{Step, StepError};
use super::{RemoteFile, ResumableUpload, UploadTask, UploadTransport};
use crate::error::Pdf2SlidesError;
use crate::progress::ProgressCallback;
use crate::retry::{RetryDecision, RetryPolicy, Shutdown};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A finished upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub file: RemoteFile,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Upload `task` and return the created file.
///
/// The source file stays open until a terminal result is known and is
/// closed before this function returns.
///
/// # Errors
/// - [`Pdf2SlidesError::MaxRetriesExceeded`] after `policy.max_tries`
///   failed attempts
/// - [`Pdf2SlidesError::UploadRejected`] on a non-retryable response
/// - [`Pdf2SlidesError::Interrupted`] if `shutdown` fires during a delay
/// - [`Pdf2SlidesError::SourceReadFailed`] if the file cannot be read
pub async fn upload_with_backoff(
    transport: &dyn UploadTransport,
    task: UploadTask,
    policy: &RetryPolicy,
    shutdown: &Shutdown,
    progress: Option<&ProgressCallback>,
) -> Result<UploadOutcome, Pdf2SlidesError> {
    let mut request = ResumableUpload::open(task).await?;
    info!(
        "Uploading {} ({} bytes, {} byte chunks)",
        request.task().name,
        request.total(),
        request.task().chunk_size
    );

    let result = drive(&mut request, transport, policy, shutdown, progress).await;

    let name = request.task().name.clone();
    drop(request);
    debug!("{}: source released", name);
    result
}

async fn drive(
    request: &mut ResumableUpload,
    transport: &dyn UploadTransport,
    policy: &RetryPolicy,
    shutdown: &Shutdown,
    progress: Option<&ProgressCallback>,
) -> Result<UploadOutcome, Pdf2SlidesError> {
    let name = request.task().name.clone();
    let mut state = policy.start();

    loop {
        match request.next_chunk(transport).await {
            Ok(Step::Progress(status)) => {
                debug!("{}: {:.1}%", name, status.fraction() * 100.0);
                if let Some(cb) = progress {
                    cb.on_upload_progress(&name, status.fraction());
                }
            }
            Ok(Step::Done(file)) => {
                if let Some(cb) = progress {
                    cb.on_upload_progress(&name, 1.0);
                }
                info!("Uploaded {}, id: {}", name, file.id);
                return Ok(UploadOutcome {
                    file,
                    attempts: state.attempts_made(),
                });
            }
            Err(StepError::Source(source)) => {
                return Err(Pdf2SlidesError::SourceReadFailed {
                    path: request.task().source.clone(),
                    source,
                });
            }
            Err(StepError::Transport(e)) if !e.is_retryable() => {
                warn!("{}: upload rejected: {}", name, e);
                return Err(Pdf2SlidesError::UploadRejected { name, source: e });
            }
            Err(StepError::Transport(e)) => {
                warn!("{}: attempt {} failed: {}", name, state.attempts_made(), e);
                match state.on_failure() {
                    RetryDecision::GiveUp { attempts } => {
                        return Err(Pdf2SlidesError::MaxRetriesExceeded {
                            name,
                            attempts,
                            last_error: e,
                        });
                    }
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            "{}: retry {}/{} in {:.2}s from byte {}",
                            name,
                            state.attempt(),
                            policy.max_tries.max(1) - 1,
                            delay.as_secs_f64(),
                            request.offset()
                        );
                        if let Some(cb) = progress {
                            cb.on_retry(&name, state.attempt(), delay);
                        }
                        if !shutdown.sleep(delay).await {
                            return Err(Pdf2SlidesError::Interrupted { name });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::progress::PipelineProgressCallback;
    use crate::retry::{shutdown_channel, Jitter};
    use crate::upload::ChunkOutcome;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted transport: each `send_chunk` pops the next scripted failure
    /// (if any) before behaving like a well-behaved server.
    #[derive(Default)]
    struct ScriptedDrive {
        failures: Mutex<VecDeque<TransportError>>,
        committed: Mutex<u64>,
        sent_offsets: Mutex<Vec<u64>>,
        sessions: Mutex<u32>,
        status_queries: Mutex<u32>,
    }

    impl ScriptedDrive {
        fn failing(errors: Vec<TransportError>) -> Self {
            Self {
                failures: Mutex::new(errors.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl UploadTransport for ScriptedDrive {
        async fn open_session(&self, _task: &UploadTask, _total: u64) -> Result<String, TransportError> {
            *self.sessions.lock().unwrap() += 1;
            Ok("session-1".into())
        }

        async fn send_chunk(
            &self,
            _session: &str,
            offset: u64,
            chunk: Vec<u8>,
            total: u64,
        ) -> Result<ChunkOutcome, TransportError> {
            self.sent_offsets.lock().unwrap().push(offset);
            if let Some(e) = self.failures.lock().unwrap().pop_front() {
                return Err(e);
            }
            let mut committed = self.committed.lock().unwrap();
            *committed = offset + chunk.len() as u64;
            if *committed >= total {
                Ok(ChunkOutcome::Complete(RemoteFile {
                    id: "abc123".into(),
                    name: Some("deck".into()),
                    mime_type: None,
                }))
            } else {
                Ok(ChunkOutcome::Incomplete {
                    committed: *committed,
                })
            }
        }

        async fn query_status(&self, _session: &str, _total: u64) -> Result<ChunkOutcome, TransportError> {
            *self.status_queries.lock().unwrap() += 1;
            Ok(ChunkOutcome::Incomplete {
                committed: *self.committed.lock().unwrap(),
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        fractions: Mutex<Vec<f64>>,
        retries: Mutex<Vec<(u32, Duration)>>,
    }

    impl PipelineProgressCallback for Recorder {
        fn on_upload_progress(&self, _file: &str, fraction: f64) {
            self.fractions.lock().unwrap().push(fraction);
        }

        fn on_retry(&self, _file: &str, attempt: u32, delay: Duration) {
            self.retries.lock().unwrap().push((attempt, delay));
        }
    }

    fn busy() -> TransportError {
        TransportError::Retryable {
            status: Some(503),
            detail: "backend busy".into(),
        }
    }

    fn policy(max_tries: u32) -> RetryPolicy {
        RetryPolicy {
            max_tries,
            jitter: Jitter::Fixed(0.5),
        }
    }

    /// Four chunks worth of data at the minimum chunk size.
    fn source_file() -> (tempfile::TempDir, UploadTask) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.odp");
        std::fs::write(&path, vec![7u8; 4 * 1024]).unwrap();
        let task = UploadTask::odp_to_slides(&path, 1024);
        (dir, task)
    }

    #[tokio::test(start_paused = true)]
    async fn uploads_in_chunks_and_reports_progress() {
        let (_dir, task) = source_file();
        let drive = ScriptedDrive::default();
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();

        let out = upload_with_backoff(&drive, task, &policy(8), &Shutdown::never(), Some(&cb))
            .await
            .unwrap();

        assert_eq!(out.file.id, "abc123");
        assert_eq!(out.attempts, 1);
        assert_eq!(*drive.sent_offsets.lock().unwrap(), vec![0, 1024, 2048, 3072]);
        assert_eq!(*recorder.fractions.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0]);
        assert!(recorder.retries.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_resumes_from_committed_offset() {
        let (_dir, task) = source_file();
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();

        // Let two chunks through, then fail the third twice.
        let transport = FailAt {
            inner: ScriptedDrive::default(),
            offset: 2048,
            remaining: Mutex::new(2),
        };

        let out = upload_with_backoff(&transport, task, &policy(8), &Shutdown::never(), Some(&cb))
            .await
            .unwrap();

        assert_eq!(out.attempts, 3);
        let offsets = transport.inner.sent_offsets.lock().unwrap().clone();
        assert_eq!(offsets, vec![0, 1024, 2048, 2048, 2048, 3072]);
        assert_eq!(*transport.inner.sessions.lock().unwrap(), 1);
        assert_eq!(*transport.inner.status_queries.lock().unwrap(), 2);

        let retries = recorder.retries.lock().unwrap().clone();
        assert_eq!(
            retries,
            vec![
                (1, Duration::from_secs_f64(2.5)),
                (2, Duration::from_secs_f64(4.5)),
            ]
        );
    }

    /// Wraps a transport and fails chunks at one offset a fixed number of times.
    struct FailAt {
        inner: ScriptedDrive,
        offset: u64,
        remaining: Mutex<u32>,
    }

    #[async_trait]
    impl UploadTransport for FailAt {
        async fn open_session(&self, task: &UploadTask, total: u64) -> Result<String, TransportError> {
            self.inner.open_session(task, total).await
        }

        async fn send_chunk(
            &self,
            session: &str,
            offset: u64,
            chunk: Vec<u8>,
            total: u64,
        ) -> Result<ChunkOutcome, TransportError> {
            if offset == self.offset {
                let mut remaining = self.remaining.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    self.inner.sent_offsets.lock().unwrap().push(offset);
                    return Err(busy());
                }
            }
            self.inner.send_chunk(session, offset, chunk, total).await
        }

        async fn query_status(&self, session: &str, total: u64) -> Result<ChunkOutcome, TransportError> {
            self.inner.query_status(session, total).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_tries() {
        let (_dir, task) = source_file();
        let drive = ScriptedDrive::failing((0..100).map(|_| busy()).collect());

        let err = upload_with_backoff(&drive, task, &policy(8), &Shutdown::never(), None)
            .await
            .unwrap_err();

        match err {
            Pdf2SlidesError::MaxRetriesExceeded { attempts, last_error, .. } => {
                assert_eq!(attempts, 8);
                assert_eq!(last_error, busy());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(drive.sent_offsets.lock().unwrap().len(), 8);
    }

    /// Acknowledges every chunk without ever committing a byte.
    #[derive(Default)]
    struct StalledDrive {
        sends: Mutex<u32>,
    }

    #[async_trait]
    impl UploadTransport for StalledDrive {
        async fn open_session(&self, _task: &UploadTask, _total: u64) -> Result<String, TransportError> {
            Ok("session-1".into())
        }

        async fn send_chunk(
            &self,
            _session: &str,
            _offset: u64,
            _chunk: Vec<u8>,
            _total: u64,
        ) -> Result<ChunkOutcome, TransportError> {
            let mut sends = self.sends.lock().unwrap();
            *sends += 1;
            assert!(*sends <= 100, "upload loop did not stop");
            Ok(ChunkOutcome::Incomplete { committed: 0 })
        }

        async fn query_status(&self, _session: &str, _total: u64) -> Result<ChunkOutcome, TransportError> {
            Ok(ChunkOutcome::Incomplete { committed: 0 })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_server_counts_against_max_tries() {
        let (_dir, task) = source_file();
        let drive = StalledDrive::default();
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();

        let err = upload_with_backoff(&drive, task, &policy(8), &Shutdown::never(), Some(&cb))
            .await
            .unwrap_err();

        match err {
            Pdf2SlidesError::MaxRetriesExceeded { attempts, last_error, .. } => {
                assert_eq!(attempts, 8);
                assert!(last_error.is_retryable());
                assert!(last_error.to_string().contains("no progress"), "{last_error}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*drive.sends.lock().unwrap(), 8);
        assert_eq!(recorder.retries.lock().unwrap().len(), 7);
        assert!(recorder.fractions.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_chunk_size_fails_before_sending() {
        let (_dir, mut task) = source_file();
        task.chunk_size = 0;
        let drive = StalledDrive::default();

        let err = upload_with_backoff(&drive, task, &policy(8), &Shutdown::never(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Pdf2SlidesError::InvalidConfig(_)), "{err:?}");
        assert_eq!(*drive.sends.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_is_not_retried() {
        let (_dir, task) = source_file();
        let drive = ScriptedDrive::failing(vec![TransportError::Rejected {
            status: Some(400),
            detail: "bad metadata".into(),
        }]);

        let err = upload_with_backoff(&drive, task, &policy(8), &Shutdown::never(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Pdf2SlidesError::UploadRejected { .. }), "{err:?}");
        assert_eq!(drive.sent_offsets.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_pending_retry() {
        let (_dir, task) = source_file();
        let drive = Arc::new(ScriptedDrive::failing((0..100).map(|_| busy()).collect()));
        let (trigger, shutdown) = shutdown_channel();

        let handle = tokio::spawn({
            let drive = Arc::clone(&drive);
            async move { upload_with_backoff(drive.as_ref(), task, &policy(8), &shutdown, None).await }
        });

        // Let the first attempt fail and the retry delay start.
        while drive.sent_offsets.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        trigger.trigger();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Pdf2SlidesError::Interrupted { .. }), "{err:?}");
        assert_eq!(drive.sent_offsets.lock().unwrap().len(), 1);
    }
}
