//! Serde model of the Slides API resources this crate reads and writes.
//!
//! Only the fields the text-box correction needs are modelled; unknown
//! fields are ignored on input. The API omits numeric fields that equal
//! zero, so every transform component is optional.

use serde::{Deserialize, Serialize};

/// A presentation as returned by `presentations.get`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub presentation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub slides: Vec<Page>,
}

/// One slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub object_id: String,
    #[serde(default)]
    pub page_elements: Vec<PageElement>,
}

/// A top-level element on a slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageElement {
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<AffineTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProperties {
    pub shape_type: ShapeType,
}

/// Shape type tag. Only text boxes are corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShapeType {
    TextBox,
    Rectangle,
    #[serde(other)]
    Other,
}

/// Wire form of an element transform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffineTransform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shear_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shear_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unit {
    #[default]
    Emu,
    Pt,
    UnitUnspecified,
}

/// A shape flattened out of the presentation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub object_id: String,
    pub shape_type: ShapeType,
    pub transform: AffineTransform,
}

impl Presentation {
    /// Every top-level shape on every slide, in slide order.
    ///
    /// Elements that are not shapes (images, tables, groups, lines) are
    /// skipped. A missing transform reads as the identity.
    pub fn shapes(&self) -> impl Iterator<Item = Shape> + '_ {
        self.slides
            .iter()
            .flat_map(|page| page.page_elements.iter())
            .filter_map(|el| {
                el.shape.as_ref().map(|shape| Shape {
                    object_id: el.object_id.clone(),
                    shape_type: shape.shape_type,
                    transform: el.transform.clone().unwrap_or_default(),
                })
            })
    }
}

/// How the server combines a supplied transform with the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyMode {
    /// Compose with the current transform: `new = supplied · current`.
    Relative,
    /// Replace the current transform.
    Absolute,
}

/// One `updatePageElementTransform` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionRequest {
    pub object_id: String,
    pub transform: AffineTransform,
    pub apply_mode: ApplyMode,
}

/// An entry of the `requests` array of `presentations.batchUpdate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchRequest {
    UpdatePageElementTransform(CorrectionRequest),
}

/// Body of `presentations.batchUpdate`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchUpdateBody<'a> {
    pub requests: &'a [BatchRequest],
}
