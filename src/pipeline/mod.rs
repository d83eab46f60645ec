//! Local pipeline stages that run before anything touches the network.
//!
//! ## Data Flow
//!
//! ```text
//! in/*.pdf ──▶ discover ──▶ soffice ──▶ temp/*.odp ──▶ crate::upload
//! ```
//!
//! 1. [`discover`]: create `in/` and `temp/`, list the PDFs to process
//! 2. [`soffice`]: convert one PDF to ODP with headless LibreOffice

pub mod discover;
pub mod soffice;

use crate::error::Pdf2SlidesError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Converts one source document into an intermediate file in `out_dir`.
///
/// Implementations must write the output as `<out_dir>/<source stem>.odp`
/// and return its path. A process that reports success without writing
/// the file is a [`Pdf2SlidesError::ConversionFailed`].
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, Pdf2SlidesError>;
}
