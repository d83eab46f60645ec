//! Progress-callback trait for per-file pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline converts, uploads and corrects each file.
//!
//! # Example
//!
//! ```rust
//! use pdf2gslides::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, file: &str, presentation_id: &str, corrections: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{file} → {presentation_id} ({corrections} text boxes)");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Called by the pipeline as it processes each file.
///
/// Files are processed one at a time, but implementations must still be
/// `Send + Sync` because the run future may move between runtime threads.
/// All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once with the number of PDFs discovered.
    fn on_run_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file is converted. `index` is 1-based.
    fn on_file_start(&self, file: &str, index: usize, total_files: usize) {
        let _ = (file, index, total_files);
    }

    /// Called when the local converter produced the intermediate.
    fn on_converted(&self, file: &str) {
        let _ = file;
    }

    /// Called after every acknowledged chunk with
    /// `bytes_transferred / total_size`.
    fn on_upload_progress(&self, file: &str, fraction: f64) {
        let _ = (file, fraction);
    }

    /// Called when a failed upload attempt is rescheduled.
    ///
    /// * `attempt`: 0-based number of the attempt about to run
    /// * `delay`:   wait before it starts
    fn on_retry(&self, file: &str, attempt: u32, delay: Duration) {
        let _ = (file, attempt, delay);
    }

    /// Called when the presentation exists and its text boxes are corrected.
    fn on_file_complete(&self, file: &str, presentation_id: &str, corrections: usize) {
        let _ = (file, presentation_id, corrections);
    }

    /// Called when a file fails at any stage.
    fn on_file_error(&self, file: &str, error: &str) {
        let _ = (file, error);
    }

    /// Called once after every file has been attempted.
    fn on_run_complete(&self, total_files: usize, succeeded: usize) {
        let _ = (total_files, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
