//! Result types returned by [`crate::run`].

use crate::error::{FileError, Pdf2SlidesError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome for one input PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// The PDF that was processed.
    pub source: PathBuf,

    /// Id of the created presentation. Set as soon as the upload succeeds,
    /// even if the text box correction then fails.
    pub presentation_id: Option<String>,

    /// Number of text boxes widened.
    pub corrections: usize,

    /// Upload attempts used; 0 if the upload never started.
    pub upload_attempts: u32,

    /// Wall-clock time spent on this file.
    pub duration_ms: u64,

    /// Set if the file failed at any stage.
    pub error: Option<FileError>,
}

impl FileResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Files never started because of a shutdown.
    pub skipped: usize,
    pub total_corrections: usize,
    pub total_duration_ms: u64,
    /// Whether the working directory was removed at the end of the run.
    pub work_dir_removed: bool,
}

impl RunStats {
    pub(crate) fn from_files(files: &[FileResult]) -> Self {
        let skipped = files
            .iter()
            .filter(|f| matches!(f.error, Some(FileError::Skipped { .. })))
            .count();
        let succeeded = files.iter().filter(|f| f.is_success()).count();
        Self {
            total_files: files.len(),
            succeeded,
            failed: files.len() - succeeded - skipped,
            skipped,
            total_corrections: files.iter().map(|f| f.corrections).sum(),
            ..Default::default()
        }
    }
}

/// Everything a run produced, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub files: Vec<FileResult>,
    pub stats: RunStats,
}

impl RunOutput {
    pub fn all_succeeded(&self) -> bool {
        self.files.iter().all(FileResult::is_success)
    }

    /// Turn any file failure (including skips) into
    /// [`Pdf2SlidesError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, Pdf2SlidesError> {
        if self.all_succeeded() {
            return Ok(self);
        }
        Err(Pdf2SlidesError::PartialFailure {
            success: self.stats.succeeded,
            failed: self.stats.total_files - self.stats.succeeded,
            total: self.stats.total_files,
        })
    }
}
