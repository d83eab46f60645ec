//! Run entry points: convert, upload and correct every PDF in the input
//! directory.
//!
//! Files are processed one at a time, in name order. A failure at any stage
//! of one file is recorded in its [`FileResult`] and the run moves on to the
//! next file; only setup problems (directories, converter, credentials) are
//! fatal.

use crate::auth::{CredentialProvider, OAuthCredentials, StaticToken};
use crate::config::PipelineConfig;
use crate::error::{FileError, Pdf2SlidesError, UploadFailure};
use crate::output::{FileResult, RunOutput, RunStats};
use crate::pipeline::discover::{clear_work_dir, discover_pdfs, ensure_dirs};
use crate::pipeline::soffice::SofficeConverter;
use crate::pipeline::DocumentConverter;
use crate::retry::Shutdown;
use crate::slides::{correct_text_boxes, GoogleSlides, SlidesApi};
use crate::upload::backoff::upload_with_backoff;
use crate::upload::drive::GoogleDrive;
use crate::upload::{UploadTask, UploadTransport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The external collaborators a run talks to.
///
/// [`Services::google`] wires up LibreOffice, Drive and Slides; tests and
/// embedders can pass their own implementations to [`run_with`].
#[derive(Clone)]
pub struct Services {
    pub converter: Arc<dyn DocumentConverter>,
    pub transport: Arc<dyn UploadTransport>,
    pub slides: Arc<dyn SlidesApi>,
}

impl Services {
    pub fn new(
        converter: Arc<dyn DocumentConverter>,
        transport: Arc<dyn UploadTransport>,
        slides: Arc<dyn SlidesApi>,
    ) -> Self {
        Self {
            converter,
            transport,
            slides,
        }
    }

    /// Production services. Locates `soffice` and obtains an access token
    /// up front so a missing converter or failed consent aborts the run
    /// before any file is touched.
    pub async fn google(config: &PipelineConfig) -> Result<Self, Pdf2SlidesError> {
        let converter = SofficeConverter::discover(
            config.soffice_path.as_deref(),
            config.conversion_timeout_secs,
        )?;

        let credentials: Arc<dyn CredentialProvider> = match config.access_token {
            Some(ref token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(OAuthCredentials::from_files(
                &config.credentials_path,
                &config.token_path,
                config.oauth_scope.clone(),
            )?),
        };
        credentials.access_token().await?;

        let transport = GoogleDrive::new(Arc::clone(&credentials), config.drive_upload_url.as_str())?;
        let slides = GoogleSlides::new(credentials, config.slides_api_url.as_str());

        Ok(Self::new(
            Arc::new(converter),
            Arc::new(transport),
            Arc::new(slides),
        ))
    }
}

/// Process every PDF in `config.input_dir` against Google Drive and Slides.
///
/// # Returns
/// `Ok(RunOutput)` once every file has been attempted, even if some failed
/// (check `output.stats.failed` or call [`RunOutput::into_result`]).
///
/// # Errors
/// Returns `Err(Pdf2SlidesError)` only for fatal errors:
/// - the input or working directory cannot be created or listed
/// - LibreOffice cannot be found
/// - credentials are missing or authorization fails
pub async fn run(config: &PipelineConfig) -> Result<RunOutput, Pdf2SlidesError> {
    run_until(config, &Shutdown::never()).await
}

/// Like [`run`], stopping early once `shutdown` fires.
///
/// Google services are only set up when at least one PDF is found, so an
/// empty input folder needs neither LibreOffice nor credentials. A shutdown
/// during that setup (for example while waiting for OAuth consent) returns
/// [`Pdf2SlidesError::Cancelled`].
pub async fn run_until(
    config: &PipelineConfig,
    shutdown: &Shutdown,
) -> Result<RunOutput, Pdf2SlidesError> {
    let start = Instant::now();
    ensure_dirs(&config.input_dir, &config.work_dir).await?;
    let pdfs = discover_pdfs(&config.input_dir).await?;
    if pdfs.is_empty() {
        info!("No PDFs in {}", config.input_dir.display());
        return finish(config, Vec::new(), start).await;
    }

    let services = tokio::select! {
        biased;
        _ = shutdown.triggered() => return Err(Pdf2SlidesError::Cancelled),
        services = Services::google(config) => services?,
    };
    process_all(config, &services, shutdown, pdfs, start).await
}

/// Like [`run`], with caller-supplied services and a shutdown signal.
///
/// Once `shutdown` fires no new file is started; a pending upload retry is
/// abandoned and the remaining files are reported as
/// [`FileError::Skipped`].
pub async fn run_with(
    config: &PipelineConfig,
    services: &Services,
    shutdown: &Shutdown,
) -> Result<RunOutput, Pdf2SlidesError> {
    let start = Instant::now();
    ensure_dirs(&config.input_dir, &config.work_dir).await?;
    let pdfs = discover_pdfs(&config.input_dir).await?;
    process_all(config, services, shutdown, pdfs, start).await
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(config: &PipelineConfig) -> Result<RunOutput, Pdf2SlidesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2SlidesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn process_all(
    config: &PipelineConfig,
    services: &Services,
    shutdown: &Shutdown,
    pdfs: Vec<PathBuf>,
    start: Instant,
) -> Result<RunOutput, Pdf2SlidesError> {
    let total = pdfs.len();
    info!("Processing {} PDFs from {}", total, config.input_dir.display());
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut files = Vec::with_capacity(total);
    for (i, source) in pdfs.into_iter().enumerate() {
        let result = if shutdown.is_triggered() {
            let file = display_name(&source);
            warn!("{}: skipped, shutdown requested", file);
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_error(&file, "skipped after shutdown");
            }
            FileResult {
                source,
                presentation_id: None,
                corrections: 0,
                upload_attempts: 0,
                duration_ms: 0,
                error: Some(FileError::Skipped { file }),
            }
        } else {
            process_file(config, services, shutdown, source, i + 1, total).await
        };
        files.push(result);
    }

    finish(config, files, start).await
}

async fn process_file(
    config: &PipelineConfig,
    services: &Services,
    shutdown: &Shutdown,
    source: PathBuf,
    index: usize,
    total: usize,
) -> FileResult {
    let start = Instant::now();
    let file = display_name(&source);
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_file_start(&file, index, total);
    }
    info!("[{}/{}] {}", index, total, file);

    let mut result = FileResult {
        source,
        presentation_id: None,
        corrections: 0,
        upload_attempts: 0,
        duration_ms: 0,
        error: None,
    };

    if let Err(error) = stages(config, services, shutdown, &file, &mut result).await {
        warn!("{}", error);
        if let Some(cb) = cb {
            cb.on_file_error(&file, &error.to_string());
        }
        result.error = Some(error);
    } else if let (Some(cb), Some(id)) = (cb, result.presentation_id.as_deref()) {
        cb.on_file_complete(&file, id, result.corrections);
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

/// Convert, upload and correct one file, filling `result` as stages finish.
async fn stages(
    config: &PipelineConfig,
    services: &Services,
    shutdown: &Shutdown,
    file: &str,
    result: &mut FileResult,
) -> Result<(), FileError> {
    let odp = services
        .converter
        .convert(&result.source, &config.work_dir)
        .await
        .map_err(|e| FileError::Conversion {
            file: file.to_string(),
            detail: e.to_string(),
        })?;
    debug!("{}: converted to {}", file, odp.display());
    if let Some(ref cb) = config.progress_callback {
        cb.on_converted(file);
    }

    let task = UploadTask::odp_to_slides(odp, config.chunk_size);
    let uploaded = upload_with_backoff(
        services.transport.as_ref(),
        task,
        &config.retry_policy(),
        shutdown,
        config.progress_callback.as_ref(),
    )
    .await
    .map_err(|e| FileError::Upload {
        file: file.to_string(),
        kind: UploadFailure::from(&e),
        detail: e.to_string(),
    })?;
    let presentation_id = uploaded.file.id;
    result.upload_attempts = uploaded.attempts;
    result.presentation_id = Some(presentation_id.clone());

    result.corrections = correct_text_boxes(
        services.slides.as_ref(),
        &presentation_id,
        config.text_box_scale_x,
    )
    .await
    .map_err(|e| FileError::Correction {
        file: file.to_string(),
        presentation_id: presentation_id.clone(),
        detail: e.to_string(),
    })?;

    Ok(())
}

async fn finish(
    config: &PipelineConfig,
    files: Vec<FileResult>,
    start: Instant,
) -> Result<RunOutput, Pdf2SlidesError> {
    let mut stats = RunStats::from_files(&files);

    if stats.succeeded == stats.total_files && !config.keep_work_dir {
        match clear_work_dir(&config.work_dir).await {
            Ok(()) => stats.work_dir_removed = true,
            Err(e) => warn!("{}", e),
        }
    } else {
        debug!("Keeping {}", config.work_dir.display());
    }

    stats.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Run complete: {}/{} files, {} text boxes, {}ms",
        stats.succeeded, stats.total_files, stats.total_corrections, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.total_files, stats.succeeded);
    }

    Ok(RunOutput { files, stats })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
