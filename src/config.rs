//! Configuration for a PDF-to-Slides run.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Collaborators (converter, upload transport,
//! Slides client) are not configured here; see [`crate::convert::Services`].

use crate::auth::DRIVE_FILE_SCOPE;
use crate::error::Pdf2SlidesError;
use crate::progress::ProgressCallback;
use crate::retry::{Jitter, RetryPolicy, DEFAULT_MAX_TRIES};
use crate::slides::client::SLIDES_API_URL;
use crate::slides::DEFAULT_TEXT_BOX_SCALE_X;
use crate::upload::drive::DRIVE_UPLOAD_URL;
use crate::upload::CHUNK_GRANULARITY;
use std::fmt;
use std::path::PathBuf;

/// Configuration for a conversion run.
///
/// # Example
/// ```rust
/// use pdf2gslides::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .input_dir("decks")
///     .max_tries(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory scanned for `*.pdf`. Default: `in`.
    pub input_dir: PathBuf,

    /// Directory receiving the converted `*.odp` files. Default: `temp`.
    ///
    /// Removed after a run in which every file succeeded, unless
    /// `keep_work_dir` is set.
    pub work_dir: PathBuf,

    /// Keep the working directory after a successful run. Default: false.
    pub keep_work_dir: bool,

    /// Upload chunk size in bytes. Default: 256 KiB.
    ///
    /// Must be a non-zero multiple of 256 KiB; Drive rejects other sizes for
    /// every chunk but the last.
    pub chunk_size: usize,

    /// Attempt ceiling per upload. Default: 8.
    pub max_tries: u32,

    /// Jitter added to every retry delay. Default: uniform in `[0, 1)`.
    pub jitter: Jitter,

    /// Width factor applied to every text box. Default: 1.1.
    pub text_box_scale_x: f64,

    /// Explicit `soffice` executable. If None, it is searched for.
    pub soffice_path: Option<PathBuf>,

    /// Timeout for one LibreOffice conversion in seconds. Default: 300.
    pub conversion_timeout_secs: u64,

    /// OAuth client secrets JSON. Default: `credentials.json`.
    pub credentials_path: PathBuf,

    /// OAuth token cache. Default: `token.json`.
    pub token_path: PathBuf,

    /// Pre-obtained bearer token; bypasses the OAuth flow when set.
    pub access_token: Option<String>,

    /// OAuth scope requested by the consent flow.
    pub oauth_scope: String,

    /// Drive upload endpoint root.
    pub drive_upload_url: String,

    /// Slides API root.
    pub slides_api_url: String,

    /// Per-file progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("in"),
            work_dir: PathBuf::from("temp"),
            keep_work_dir: false,
            chunk_size: CHUNK_GRANULARITY,
            max_tries: DEFAULT_MAX_TRIES,
            jitter: Jitter::default(),
            text_box_scale_x: DEFAULT_TEXT_BOX_SCALE_X,
            soffice_path: None,
            conversion_timeout_secs: 300,
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            access_token: None,
            oauth_scope: DRIVE_FILE_SCOPE.to_string(),
            drive_upload_url: DRIVE_UPLOAD_URL.to_string(),
            slides_api_url: SLIDES_API_URL.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("input_dir", &self.input_dir)
            .field("work_dir", &self.work_dir)
            .field("keep_work_dir", &self.keep_work_dir)
            .field("chunk_size", &self.chunk_size)
            .field("max_tries", &self.max_tries)
            .field("jitter", &self.jitter)
            .field("text_box_scale_x", &self.text_box_scale_x)
            .field("soffice_path", &self.soffice_path)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field("credentials_path", &self.credentials_path)
            .field("token_path", &self.token_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("drive_upload_url", &self.drive_upload_url)
            .field("slides_api_url", &self.slides_api_url)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_tries: self.max_tries,
            jitter: self.jitter,
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn keep_work_dir(mut self, v: bool) -> Self {
        self.config.keep_work_dir = v;
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn max_tries(mut self, n: u32) -> Self {
        self.config.max_tries = n;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn text_box_scale_x(mut self, factor: f64) -> Self {
        self.config.text_box_scale_x = factor;
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = Some(path.into());
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.credentials_path = path.into();
        self
    }

    pub fn token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.token_path = path.into();
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    pub fn oauth_scope(mut self, scope: impl Into<String>) -> Self {
        self.config.oauth_scope = scope.into();
        self
    }

    pub fn drive_upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive_upload_url = url.into();
        self
    }

    pub fn slides_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.slides_api_url = url.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Pdf2SlidesError> {
        let c = &self.config;
        if c.chunk_size == 0 || c.chunk_size % CHUNK_GRANULARITY != 0 {
            return Err(Pdf2SlidesError::InvalidConfig(format!(
                "chunk size must be a non-zero multiple of {} bytes, got {}",
                CHUNK_GRANULARITY, c.chunk_size
            )));
        }
        if c.max_tries == 0 {
            return Err(Pdf2SlidesError::InvalidConfig("max tries must be ≥ 1".into()));
        }
        if !c.text_box_scale_x.is_finite() || c.text_box_scale_x <= 0.0 {
            return Err(Pdf2SlidesError::InvalidConfig(format!(
                "text box scale must be a positive number, got {}",
                c.text_box_scale_x
            )));
        }
        if c.conversion_timeout_secs == 0 {
            return Err(Pdf2SlidesError::InvalidConfig(
                "conversion timeout must be ≥ 1 second".into(),
            ));
        }
        if c.input_dir == c.work_dir {
            return Err(Pdf2SlidesError::InvalidConfig(
                "input and working directories must differ (the working directory is deleted after a run)"
                    .into(),
            ));
        }
        Ok(self.config)
    }
}
