//! The in-flight resumable request.

use super::{ChunkOutcome, RemoteFile, UploadTask, UploadTransport};
use crate::error::{Pdf2SlidesError, TransportError};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// Progress after a chunk: bytes the server holds out of the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStatus {
    pub resumable_progress: u64,
    pub total_size: u64,
}

impl ChunkStatus {
    /// `resumable_progress / total_size`; an empty upload counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total_size == 0 {
            1.0
        } else {
            self.resumable_progress as f64 / self.total_size as f64
        }
    }
}

/// Result of one [`ResumableUpload::next_chunk`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Progress(ChunkStatus),
    Done(RemoteFile),
}

/// Why a step failed.
#[derive(Debug)]
pub enum StepError {
    Transport(TransportError),
    Source(std::io::Error),
}

impl From<TransportError> for StepError {
    fn from(e: TransportError) -> Self {
        StepError::Transport(e)
    }
}

/// Upload state that survives failed attempts.
///
/// Holds the source file open until the value is dropped, which the
/// backoff loop does only after a terminal result.
#[derive(Debug)]
pub struct ResumableUpload {
    task: UploadTask,
    file: File,
    total: u64,
    session: Option<String>,
    offset: u64,
    needs_resync: bool,
}

impl ResumableUpload {
    /// Open the task's source file. A zero chunk size is rejected.
    pub async fn open(task: UploadTask) -> Result<Self, Pdf2SlidesError> {
        if task.chunk_size == 0 {
            return Err(Pdf2SlidesError::InvalidConfig(format!(
                "{}: chunk size must be greater than zero",
                task.name
            )));
        }
        let read_err = |source| Pdf2SlidesError::SourceReadFailed {
            path: task.source.clone(),
            source,
        };
        let file = File::open(&task.source).await.map_err(read_err)?;
        let total = file.metadata().await.map_err(read_err)?.len();
        Ok(Self {
            task,
            file,
            total,
            session: None,
            offset: 0,
            needs_resync: false,
        })
    }

    pub fn task(&self) -> &UploadTask {
        &self.task
    }

    /// Bytes the server has acknowledged.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Send the next chunk.
    ///
    /// Opens the session on first use. After a failed exchange the next call
    /// first asks the server how much it holds and continues from there.
    pub async fn next_chunk(&mut self, transport: &dyn UploadTransport) -> Result<Step, StepError> {
        let session = match self.session.clone() {
            Some(s) => s,
            None => {
                let s = transport.open_session(&self.task, self.total).await?;
                debug!("{}: opened upload session", self.task.name);
                self.session = Some(s.clone());
                self.needs_resync = false;
                s
            }
        };

        if self.needs_resync {
            match transport.query_status(&session, self.total).await {
                Ok(ChunkOutcome::Complete(file)) => {
                    self.offset = self.total;
                    return Ok(Step::Done(file));
                }
                Ok(ChunkOutcome::Incomplete { committed }) => {
                    debug!("{}: server holds {} bytes", self.task.name, committed);
                    self.offset = committed.min(self.total);
                    self.needs_resync = false;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let chunk = self.read_chunk().await.map_err(StepError::Source)?;
        debug!(
            "{}: sending {} bytes at offset {}/{}",
            self.task.name,
            chunk.len(),
            self.offset,
            self.total
        );

        match transport.send_chunk(&session, self.offset, chunk, self.total).await {
            Ok(ChunkOutcome::Complete(file)) => {
                self.offset = self.total;
                Ok(Step::Done(file))
            }
            Ok(ChunkOutcome::Incomplete { committed }) => {
                let committed = committed.min(self.total);
                if committed <= self.offset {
                    // Counts as a failed attempt so the retry ceiling applies.
                    self.needs_resync = true;
                    return Err(TransportError::Retryable {
                        status: None,
                        detail: format!(
                            "no progress: server holds {} of {} bytes after a chunk at {}",
                            committed, self.total, self.offset
                        ),
                    }
                    .into());
                }
                self.offset = committed;
                Ok(Step::Progress(ChunkStatus {
                    resumable_progress: self.offset,
                    total_size: self.total,
                }))
            }
            Err(e) => {
                self.needs_resync = true;
                Err(e.into())
            }
        }
    }

    async fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::with_capacity(self.task.chunk_size);
        (&mut self.file)
            .take(self.task.chunk_size as u64)
            .read_to_end(&mut buf)
            .await?;
        Ok(buf)
    }
}
