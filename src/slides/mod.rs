//! Presentation side of the pipeline: read the shape tree back and submit
//! the text-box width correction.
//!
//! ```text
//! presentation id ──▶ SlidesApi::get_presentation ──▶ build_corrections
//!                                                          │
//!                      SlidesApi::batch_update  ◀──────────┘ (one batch)
//! ```

pub mod client;
pub mod correct;
pub mod model;

use crate::error::Pdf2SlidesError;
use async_trait::async_trait;
use model::{BatchRequest, Presentation};

pub use client::GoogleSlides;
pub use correct::{build_corrections, correct_text_boxes, DEFAULT_TEXT_BOX_SCALE_X};

/// Read and batch-update access to presentations.
///
/// `batch_update` is all-or-nothing: the implementation either applies every
/// request or returns [`Pdf2SlidesError::BatchApplyFailed`].
#[async_trait]
pub trait SlidesApi: Send + Sync {
    async fn get_presentation(&self, presentation_id: &str) -> Result<Presentation, Pdf2SlidesError>;

    async fn batch_update(
        &self,
        presentation_id: &str,
        requests: &[BatchRequest],
    ) -> Result<(), Pdf2SlidesError>;
}
