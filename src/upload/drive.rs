//! Google Drive v3 resumable-upload transport.
//!
//! Protocol summary:
//!
//! | Step         | Request                                   | Success                  |
//! |--------------|-------------------------------------------|--------------------------|
//! | open session | `POST …/files?uploadType=resumable`       | 200 + `Location` header  |
//! | send chunk   | `PUT <session>` + `Content-Range: a-b/N`  | 308 + `Range`, or 200/201 |
//! | query status | `PUT <session>` + `Content-Range: */N`    | 308 + `Range`, or 200/201 |
//!
//! A 308 here means "resume incomplete", not a redirect, so the client is
//! built with redirects disabled.

use super::{ChunkOutcome, RemoteFile, UploadTask, UploadTransport};
use crate::auth::CredentialProvider;
use crate::error::{Pdf2SlidesError, TransportError};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

/// Default Drive upload endpoint root.
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

const RESUME_INCOMPLETE: u16 = 308;

/// Drive v3 resumable uploads over HTTPS.
pub struct GoogleDrive {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    upload_url: String,
}

impl GoogleDrive {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        upload_url: impl Into<String>,
    ) -> Result<Self, Pdf2SlidesError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Pdf2SlidesError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            credentials,
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// A token refresh that failed in transit is retried like any other
    /// exchange; every other credential error rejects the upload.
    async fn bearer(&self) -> Result<String, TransportError> {
        self.credentials
            .access_token()
            .await
            .map_err(|e| match e {
                Pdf2SlidesError::AuthUnavailable { .. } => TransportError::Retryable {
                    status: None,
                    detail: e.to_string(),
                },
                _ => TransportError::Rejected {
                    status: None,
                    detail: e.to_string(),
                },
            })
    }
}

#[async_trait]
impl UploadTransport for GoogleDrive {
    async fn open_session(&self, task: &UploadTask, total: u64) -> Result<String, TransportError> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(format!("{}/files", self.upload_url))
            .query(&[("uploadType", "resumable"), ("fields", "id,name,mimeType")])
            .bearer_auth(token)
            .header("X-Upload-Content-Type", &task.source_mime)
            .header("X-Upload-Content-Length", total)
            .json(&json!({ "name": task.name, "mimeType": task.target_mime }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| TransportError::Rejected {
                status: None,
                detail: "session response carried no Location header".into(),
            })
    }

    async fn send_chunk(
        &self,
        session: &str,
        offset: u64,
        chunk: Vec<u8>,
        total: u64,
    ) -> Result<ChunkOutcome, TransportError> {
        let token = self.bearer().await?;
        let range = content_range(offset, chunk.len() as u64, total);
        let response = self
            .http
            .put(session)
            .bearer_auth(token)
            .header(CONTENT_RANGE, range)
            .header(CONTENT_LENGTH, chunk.len())
            .body(chunk)
            .send()
            .await?;
        outcome_from(response).await
    }

    async fn query_status(&self, session: &str, total: u64) -> Result<ChunkOutcome, TransportError> {
        let token = self.bearer().await?;
        let response = self
            .http
            .put(session)
            .bearer_auth(token)
            .header(CONTENT_RANGE, format!("bytes */{total}"))
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        outcome_from(response).await
    }
}

/// `Content-Range` for `len` bytes at `offset`; an empty chunk only states
/// the total.
fn content_range(offset: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{total}")
    } else {
        format!("bytes {}-{}/{}", offset, offset + len - 1, total)
    }
}

/// Committed byte count from a `Range: bytes=0-N` header. No header means
/// nothing was committed.
fn committed_from_range(range: Option<&str>) -> u64 {
    range
        .and_then(|r| r.strip_prefix("bytes="))
        .and_then(|r| r.split_once('-'))
        .and_then(|(_, end)| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .unwrap_or(0)
}

async fn outcome_from(response: Response) -> Result<ChunkOutcome, TransportError> {
    let status = response.status();
    if status.as_u16() == RESUME_INCOMPLETE {
        let range = response.headers().get(RANGE).and_then(|v| v.to_str().ok());
        return Ok(ChunkOutcome::Incomplete {
            committed: committed_from_range(range),
        });
    }
    if status == StatusCode::OK || status == StatusCode::CREATED {
        let file = response.json::<RemoteFile>().await.map_err(TransportError::from)?;
        return Ok(ChunkOutcome::Complete(file));
    }
    Err(error_from(response).await)
}

async fn error_from(response: Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::from_status(status, &body)
}
