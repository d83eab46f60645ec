//! Error types for the pdf2gslides library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Pdf2SlidesError`]: **Fatal** for the operation that returned it
//!   (missing credentials, converter failure, retries exhausted, rejected
//!   batch update). Returned as `Err(Pdf2SlidesError)` from every stage.
//!
//! * [`FileError`]: **Non-fatal** for the run: one PDF failed at one stage
//!   but the remaining files are still processed. Stored inside
//!   [`crate::output::FileResult`] so callers can inspect partial success.
//!
//! * [`TransportError`]: one failed HTTP exchange during a resumable
//!   upload. Only [`TransportError::Retryable`] feeds the backoff loop in
//!   [`crate::upload`]; everything else is surfaced immediately.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2gslides library.
#[derive(Debug, Error)]
pub enum Pdf2SlidesError {
    // ── Directory errors ──────────────────────────────────────────────────
    /// Input or working directory could not be created or listed.
    #[error("Cannot access directory '{path}': {source}")]
    DirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// LibreOffice could not be found.
    #[error("LibreOffice (soffice) not found.\n{hint}")]
    ConverterNotFound { hint: String },

    /// The local converter exited non-zero, timed out, or produced no output.
    #[error("Conversion of '{path}' failed: {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    // ── Upload errors ─────────────────────────────────────────────────────
    /// The converted file could not be opened or read.
    #[error("Failed to read '{path}': {source}")]
    SourceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Retryable upload failures persisted through every allowed attempt.
    #[error("Upload of '{name}' failed after {attempts} attempts.\nLast error: {last_error}")]
    MaxRetriesExceeded {
        name: String,
        attempts: u32,
        last_error: TransportError,
    },

    /// The upload service rejected the request with a non-retryable error.
    #[error("Upload of '{name}' rejected: {source}")]
    UploadRejected {
        name: String,
        #[source]
        source: TransportError,
    },

    /// A shutdown was requested while a retry was pending.
    #[error("Upload of '{name}' interrupted by shutdown")]
    Interrupted { name: String },

    // ── Presentation errors ───────────────────────────────────────────────
    /// The presentation could not be read back.
    #[error("Failed to fetch presentation '{id}': {detail}")]
    PresentationFetchFailed { id: String, detail: String },

    /// The correction batch was rejected as a whole.
    #[error("Batch update of {requests} corrections on presentation '{id}' failed: {detail}")]
    BatchApplyFailed {
        id: String,
        requests: usize,
        detail: String,
    },

    // ── Credential errors ─────────────────────────────────────────────────
    /// Client secrets file is missing.
    #[error("OAuth client secrets not found at '{path}'\nDownload them from the Google Cloud console (OAuth client ID, desktop app).")]
    CredentialsMissing { path: PathBuf },

    /// Client secrets or token file could not be parsed.
    #[error("Invalid credentials file '{path}': {detail}")]
    InvalidCredentials { path: PathBuf, detail: String },

    /// Token refresh or authorization-code exchange failed.
    #[error("Authorization failed: {detail}")]
    AuthFailed { detail: String },

    /// The token endpoint could not be reached or answered 408/429/5xx.
    #[error("Token endpoint unavailable: {detail}")]
    AuthUnavailable { detail: String },

    /// The token cache could not be written.
    #[error("Failed to save token to '{path}': {source}")]
    TokenSaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Run-level errors ──────────────────────────────────────────────────
    /// Some files succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::RunOutput::into_result`] when the caller
    /// wants to treat any file failure as an error.
    #[error("{failed}/{total} files failed")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    /// Shutdown fired before any file was started.
    #[error("Cancelled before any file was processed")]
    Cancelled,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// One failed HTTP exchange with the upload service.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    /// Network failure, timeout, 408, 429, 5xx or a rate-limit 403.
    #[error("retryable transport error{}: {detail}", status_suffix(.status))]
    Retryable { status: Option<u16>, detail: String },

    /// The service refused the request; retrying will not help.
    #[error("request rejected{}: {detail}", status_suffix(.status))]
    Rejected { status: Option<u16>, detail: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl TransportError {
    /// Whether the backoff loop may re-issue the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Retryable { .. })
    }

    /// Classify an HTTP failure status and response body.
    ///
    /// 403 is only retryable when the body names a rate-limit reason.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = truncate(body, 300);
        let retryable = match status {
            408 | 429 | 500..=599 => true,
            403 => body.contains("rateLimitExceeded") || body.contains("userRateLimitExceeded"),
            _ => false,
        };
        if retryable {
            TransportError::Retryable {
                status: Some(status),
                detail,
            }
        } else {
            TransportError::Rejected {
                status: Some(status),
                detail,
            }
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            TransportError::Retryable {
                status,
                detail: e.to_string(),
            }
        } else {
            TransportError::Rejected {
                status,
                detail: e.to_string(),
            }
        }
    }
}

/// A non-fatal error for a single input file.
///
/// The run continues with the next file; the error is recorded in
/// [`crate::output::FileResult::error`].
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The PDF could not be converted to ODP.
    #[error("{file}: conversion failed: {detail}")]
    Conversion { file: String, detail: String },

    /// The ODP could not be uploaded.
    #[error("{file}: upload failed: {detail}")]
    Upload {
        file: String,
        kind: UploadFailure,
        detail: String,
    },

    /// The presentation was created but its text boxes were not corrected.
    #[error("{file}: text box correction on '{presentation_id}' failed: {detail}")]
    Correction {
        file: String,
        presentation_id: String,
        detail: String,
    },

    /// The file was never started because a shutdown was requested.
    #[error("{file}: skipped after shutdown")]
    Skipped { file: String },
}

/// How an upload ended when it did not produce a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailure {
    /// Retryable failures used up every attempt.
    RetriesExhausted,
    /// The service refused the upload outright.
    Rejected,
    /// Shutdown fired while a retry was pending.
    Interrupted,
    /// The converted file could not be read.
    SourceUnreadable,
    Other,
}

impl From<&Pdf2SlidesError> for UploadFailure {
    fn from(e: &Pdf2SlidesError) -> Self {
        match e {
            Pdf2SlidesError::MaxRetriesExceeded { .. } => UploadFailure::RetriesExhausted,
            Pdf2SlidesError::UploadRejected { .. } => UploadFailure::Rejected,
            Pdf2SlidesError::Interrupted { .. } => UploadFailure::Interrupted,
            Pdf2SlidesError::SourceReadFailed { .. } => UploadFailure::SourceUnreadable,
            _ => UploadFailure::Other,
        }
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}
