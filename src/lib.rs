//! # pdf2gslides
//!
//! Batch-convert local PDF files into Google Slides presentations.
//!
//! Each PDF is converted locally to OpenDocument Presentation by
//! LibreOffice's Impress PDF import, uploaded to Google Drive through a
//! chunked resumable upload that Drive converts into a native presentation,
//! and finally patched: every text box is widened by 10 % about its own
//! origin so lines that fit in the PDF do not wrap in Slides.
//!
//! ## Pipeline Overview
//!
//! ```text
//! in/*.pdf
//!  │
//!  ├─ 1. Discover  create in/ and temp/, list PDFs in name order
//!  ├─ 2. Convert   soffice --headless → temp/<stem>.odp
//!  ├─ 3. Upload    resumable Drive upload, ODP → Slides, backoff on 5xx/429
//!  ├─ 4. Correct   one batchUpdate: scaleX 1.1 on every TEXT_BOX
//!  └─ 5. Cleanup   remove temp/ when every file succeeded
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2gslides::{run, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads credentials.json, caches the OAuth token in token.json
//!     let config = PipelineConfig::default();
//!     let output = run(&config).await?;
//!     for file in &output.files {
//!         println!("{} → {:?}", file.source.display(), file.presentation_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2gslides` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2gslides = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod auth;
pub mod config;
pub mod convert;
pub mod error;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod slides;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use convert::{run, run_sync, run_until, run_with, Services};
pub use error::{FileError, Pdf2SlidesError, TransportError, UploadFailure};
pub use output::{FileResult, RunOutput, RunStats};
pub use pipeline::DocumentConverter;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use retry::{shutdown_channel, Jitter, RetryPolicy, Shutdown, ShutdownTrigger};
pub use slides::SlidesApi;
pub use upload::UploadTransport;
