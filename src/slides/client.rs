//! `reqwest` client for the Google Slides REST API.

use super::model::{BatchRequest, BatchUpdateBody, Presentation};
use super::SlidesApi;
use crate::auth::CredentialProvider;
use crate::error::{truncate, Pdf2SlidesError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Default Slides API root.
pub const SLIDES_API_URL: &str = "https://slides.googleapis.com/v1";

/// Slides API v1 over HTTPS, authorised by a [`CredentialProvider`].
pub struct GoogleSlides {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
}

impl GoogleSlides {
    pub fn new(credentials: Arc<dyn CredentialProvider>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn presentation_url(&self, presentation_id: &str) -> String {
        format!("{}/presentations/{}", self.base_url, presentation_id)
    }
}

#[async_trait]
impl SlidesApi for GoogleSlides {
    async fn get_presentation(&self, presentation_id: &str) -> Result<Presentation, Pdf2SlidesError> {
        let fail = |detail: String| Pdf2SlidesError::PresentationFetchFailed {
            id: presentation_id.to_string(),
            detail,
        };

        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .get(self.presentation_url(presentation_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {}: {}", status, truncate(&body, 300))));
        }

        response
            .json::<Presentation>()
            .await
            .map_err(|e| fail(format!("invalid presentation JSON: {e}")))
    }

    async fn batch_update(
        &self,
        presentation_id: &str,
        requests: &[BatchRequest],
    ) -> Result<(), Pdf2SlidesError> {
        let fail = |detail: String| Pdf2SlidesError::BatchApplyFailed {
            id: presentation_id.to_string(),
            requests: requests.len(),
            detail,
        };

        debug!("batchUpdate {} with {} requests", presentation_id, requests.len());
        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .post(format!("{}:batchUpdate", self.presentation_url(presentation_id)))
            .bearer_auth(token)
            .json(&BatchUpdateBody { requests })
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {}: {}", status, truncate(&body, 300))));
        }
        Ok(())
    }
}
