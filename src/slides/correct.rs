//! Text-box width correction.
//!
//! Importing an ODP into Slides renders text boxes slightly too narrow, so
//! lines that fit in LibreOffice wrap in Slides. Widening every text box by
//! a fixed factor about its own position fixes the wrap without moving it.
//!
//! The correction is sent with [`ApplyMode::Relative`]: the server composes
//! `delta · current`, so only the delta is computed here. With the shape at
//! `(tx, ty)` the delta is
//!
//! ```text
//! T(tx, ty) · S(scale_x, 1) · T(-tx, -ty)
//!   = ┌ scale_x  0  tx·(1 - scale_x) ┐
//!     └    0     1        0         ┘
//! ```
//!
//! which leaves `(tx, ty)` fixed. An absolute transform would discard the
//! shape's existing scale and position.

use super::model::{ApplyMode, BatchRequest, CorrectionRequest, Presentation, ShapeType, Unit};
use super::SlidesApi;
use crate::error::Pdf2SlidesError;
use crate::geometry::Affine;
use tracing::{debug, info};

/// Width factor applied to every text box.
pub const DEFAULT_TEXT_BOX_SCALE_X: f64 = 1.1;

/// Build one relative correction per text box in the presentation.
///
/// Non-text-box shapes produce nothing. The anchor is the shape's own
/// translation; its existing scale is not consulted because the delta is
/// composed server-side.
pub fn build_corrections(presentation: &Presentation, scale_x: f64) -> Vec<BatchRequest> {
    presentation
        .shapes()
        .filter(|shape| shape.shape_type == ShapeType::TextBox)
        .map(|shape| {
            let current = Affine::from_transform(&shape.transform);
            let delta = Affine::anchored_scale(current.translate_x, current.translate_y, scale_x, 1.0);
            let unit = shape.transform.unit.unwrap_or(Unit::Emu);
            BatchRequest::UpdatePageElementTransform(CorrectionRequest {
                object_id: shape.object_id,
                transform: delta.to_transform(unit),
                apply_mode: ApplyMode::Relative,
            })
        })
        .collect()
}

/// Fetch a presentation and widen all its text boxes in a single batch.
///
/// Returns the number of corrections submitted. An empty batch is still
/// sent. A rejected batch is surfaced whole; nothing is retried here.
pub async fn correct_text_boxes(
    slides: &dyn SlidesApi,
    presentation_id: &str,
    scale_x: f64,
) -> Result<usize, Pdf2SlidesError> {
    let presentation = slides.get_presentation(presentation_id).await?;
    let requests = build_corrections(&presentation, scale_x);
    debug!(
        "Presentation {}: {} slides, {} text boxes",
        presentation_id,
        presentation.slides.len(),
        requests.len()
    );

    slides.batch_update(presentation_id, &requests).await?;
    info!("Fixed text box widths on {} ({} shapes)", presentation_id, requests.len());
    Ok(requests.len())
}
