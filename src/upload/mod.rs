//! Chunked, resumable upload of a converted presentation to Drive.
//!
//! ## Layering
//!
//! ```text
//! upload_with_backoff   retry policy, progress reporting, shutdown
//!        │
//! ResumableUpload       open session, send chunk, resync offset after failure
//!        │
//! UploadTransport       one HTTP exchange (GoogleDrive, or a test fake)
//! ```
//!
//! The [`ResumableUpload`] value is the in-flight request: it owns the
//! session URI, the committed byte offset and the open source file. Every
//! retry re-drives the same value, so a failed chunk resumes from the last
//! offset the server acknowledged rather than from byte zero.

pub mod backoff;
pub mod drive;
pub mod resumable;

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use backoff::{upload_with_backoff, UploadOutcome};
pub use drive::GoogleDrive;
pub use resumable::{ChunkStatus, ResumableUpload};

/// MIME type of the LibreOffice intermediate.
pub const ODP_MIME: &str = "application/vnd.oasis.opendocument.presentation";

/// MIME type that makes Drive convert the upload into a Slides presentation.
pub const GOOGLE_SLIDES_MIME: &str = "application/vnd.google-apps.presentation";

/// Resumable uploads must be sent in multiples of this many bytes.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// One file to upload. Built once per converted file and dropped once the
/// remote id is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTask {
    pub source: PathBuf,
    /// Name of the created Drive file.
    pub name: String,
    /// MIME type of the bytes being sent.
    pub source_mime: String,
    /// MIME type Drive should convert to.
    pub target_mime: String,
    pub chunk_size: usize,
}

impl UploadTask {
    /// An ODP → Google Slides upload named after the file stem.
    pub fn odp_to_slides(source: impl Into<PathBuf>, chunk_size: usize) -> Self {
        let source = source.into();
        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "presentation".to_string());
        Self {
            source,
            name,
            source_mime: ODP_MIME.to_string(),
            target_mime: GOOGLE_SLIDES_MIME.to_string(),
            chunk_size,
        }
    }
}

/// Metadata of the created remote file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Server response to a chunk or a status query.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// More bytes are expected; the server holds `committed` bytes.
    Incomplete { committed: u64 },
    /// All bytes received; the file is created.
    Complete(RemoteFile),
}

/// One HTTP exchange of the resumable-upload protocol.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Start a session and return its URI.
    async fn open_session(&self, task: &UploadTask, total: u64) -> Result<String, TransportError>;

    /// Send `chunk`, which starts at byte `offset` of a `total`-byte upload.
    async fn send_chunk(
        &self,
        session: &str,
        offset: u64,
        chunk: Vec<u8>,
        total: u64,
    ) -> Result<ChunkOutcome, TransportError>;

    /// Ask how many bytes the server has committed.
    async fn query_status(&self, session: &str, total: u64) -> Result<ChunkOutcome, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odp_task_uses_file_stem() {
        let task = UploadTask::odp_to_slides("temp/quarterly.report.odp", CHUNK_GRANULARITY);
        assert_eq!(task.name, "quarterly.report");
        assert_eq!(task.source_mime, ODP_MIME);
        assert_eq!(task.target_mime, GOOGLE_SLIDES_MIME);
    }

    #[test]
    fn stem_is_not_a_character_strip() {
        // "podo.odp" must stay "podo", not lose trailing o/d/p characters.
        let task = UploadTask::odp_to_slides("temp/podo.odp", CHUNK_GRANULARITY);
        assert_eq!(task.name, "podo");
    }

    #[test]
    fn remote_file_parses_drive_response() {
        let f: RemoteFile = serde_json::from_str(
            r#"{"id":"abc123","name":"deck","mimeType":"application/vnd.google-apps.presentation"}"#,
        )
        .unwrap();
        assert_eq!(f.id, "abc123");
        assert_eq!(f.mime_type.as_deref(), Some(GOOGLE_SLIDES_MIME));
    }
}
