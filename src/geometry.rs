//! 2-D affine transforms in the Slides element reference frame.
//!
//! A page element's transform is the matrix
//!
//! ```text
//! ┌ scale_x  shear_x  translate_x ┐
//! │ shear_y  scale_y  translate_y │
//! └    0        0          1      ┘
//! ```
//!
//! [`Affine`] stores the top two rows; the implicit bottom row is always
//! `[0, 0, 1]`, so composition never leaves the affine group.

use crate::slides::model::{AffineTransform, Unit};

/// A 2×3 affine matrix with an implicit `[0, 0, 1]` bottom row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub scale_x: f64,
    pub shear_x: f64,
    pub translate_x: f64,
    pub shear_y: f64,
    pub scale_y: f64,
    pub translate_y: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        scale_x: 1.0,
        shear_x: 0.0,
        translate_x: 0.0,
        shear_y: 0.0,
        scale_y: 1.0,
        translate_y: 0.0,
    };

    pub fn translation(tx: f64, ty: f64) -> Self {
        Affine {
            translate_x: tx,
            translate_y: ty,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Affine {
            scale_x: sx,
            scale_y: sy,
            ..Self::IDENTITY
        }
    }

    /// Scale by `(sx, sy)` about the anchor `(ax, ay)` instead of the origin.
    ///
    /// Built as `T(ax, ay) · S(sx, sy) · T(-ax, -ay)`: move the anchor to the
    /// origin, scale, move it back. The anchor is a fixed point of the result.
    pub fn anchored_scale(ax: f64, ay: f64, sx: f64, sy: f64) -> Self {
        Self::translation(ax, ay)
            .compose(&Self::scale(sx, sy))
            .compose(&Self::translation(-ax, -ay))
    }

    /// Matrix product `self · rhs`: `rhs` is applied first, then `self`.
    pub fn compose(&self, rhs: &Affine) -> Affine {
        let a = self;
        let b = rhs;
        Affine {
            scale_x: a.scale_x * b.scale_x + a.shear_x * b.shear_y,
            shear_x: a.scale_x * b.shear_x + a.shear_x * b.scale_y,
            translate_x: a.scale_x * b.translate_x + a.shear_x * b.translate_y + a.translate_x,
            shear_y: a.shear_y * b.scale_x + a.scale_y * b.shear_y,
            scale_y: a.shear_y * b.shear_x + a.scale_y * b.scale_y,
            translate_y: a.shear_y * b.translate_x + a.scale_y * b.translate_y + a.translate_y,
        }
    }

    /// Map the point `(x, y)` through this transform.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.scale_x * x + self.shear_x * y + self.translate_x,
            self.shear_y * x + self.scale_y * y + self.translate_y,
        )
    }

    /// Read a wire transform; absent scales are 1 and absent shears and
    /// translations are 0.
    pub fn from_transform(t: &AffineTransform) -> Self {
        Affine {
            scale_x: t.scale_x.unwrap_or(1.0),
            shear_x: t.shear_x.unwrap_or(0.0),
            translate_x: t.translate_x.unwrap_or(0.0),
            shear_y: t.shear_y.unwrap_or(0.0),
            scale_y: t.scale_y.unwrap_or(1.0),
            translate_y: t.translate_y.unwrap_or(0.0),
        }
    }

    /// Produce a wire transform with every field populated.
    pub fn to_transform(&self, unit: Unit) -> AffineTransform {
        AffineTransform {
            scale_x: Some(self.scale_x),
            scale_y: Some(self.scale_y),
            shear_x: Some(self.shear_x),
            shear_y: Some(self.shear_y),
            translate_x: Some(self.translate_x),
            translate_y: Some(self.translate_y),
            unit: Some(unit),
        }
    }
}
