//! Integration tests for a whole run, with in-memory stand-ins for
//! LibreOffice, Drive and Slides.
//!
//! A live run against Google is gated behind `E2E_ENABLED`, since it needs
//! LibreOffice, `credentials.json` and network access:
//!   E2E_ENABLED=1 cargo test --test pipeline live_ -- --nocapture

use async_trait::async_trait;
use pdf2gslides::pipeline::soffice::expected_output;
use pdf2gslides::slides::model::{ApplyMode, BatchRequest, Presentation};
use pdf2gslides::upload::{ChunkOutcome, RemoteFile, UploadTask};
use pdf2gslides::{
    run, run_until, run_with, shutdown_channel, DocumentConverter, FileError, Jitter, Pdf2SlidesError,
    PipelineConfig, PipelineProgressCallback, Services, Shutdown, ShutdownTrigger, SlidesApi,
    TransportError, UploadFailure, UploadTransport,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Writes `<stem>.odp` with fixed content, or fails for listed file names.
#[derive(Default)]
struct FakeConverter {
    fail: HashSet<String>,
    body: Vec<u8>,
}

impl FakeConverter {
    fn new(body_len: usize) -> Self {
        Self {
            fail: HashSet::new(),
            body: vec![b'P'; body_len],
        }
    }

    fn failing(mut self, name: &str) -> Self {
        self.fail.insert(name.to_string());
        self
    }
}

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, Pdf2SlidesError> {
        let name = source.file_name().unwrap().to_string_lossy().into_owned();
        if self.fail.contains(&name) {
            return Err(Pdf2SlidesError::ConversionFailed {
                path: source.to_path_buf(),
                detail: "soffice exited with exit status: 1".into(),
            });
        }
        let out = expected_output(source, out_dir);
        tokio::fs::write(&out, &self.body).await.unwrap();
        Ok(out)
    }
}

/// In-memory resumable upload server. Ids come from `ids` (by upload name)
/// or default to `id-<name>`. `transient` failures are injected on the
/// first `send_chunk` calls.
#[derive(Default)]
struct FakeDrive {
    ids: HashMap<String, String>,
    transient: Mutex<u32>,
    received: Mutex<HashMap<String, u64>>,
    uploads: Mutex<Vec<(String, String)>>,
}

impl FakeDrive {
    fn with_id(mut self, name: &str, id: &str) -> Self {
        self.ids.insert(name.to_string(), id.to_string());
        self
    }

    fn with_transient_failures(self, n: u32) -> Self {
        *self.transient.lock().unwrap() = n;
        self
    }

    fn id_for(&self, session: &str) -> String {
        let name = session.trim_start_matches("session-");
        self.ids
            .get(name)
            .cloned()
            .unwrap_or_else(|| format!("id-{name}"))
    }
}

#[async_trait]
impl UploadTransport for FakeDrive {
    async fn open_session(&self, task: &UploadTask, _total: u64) -> Result<String, TransportError> {
        self.uploads
            .lock()
            .unwrap()
            .push((task.name.clone(), task.target_mime.clone()));
        Ok(format!("session-{}", task.name))
    }

    async fn send_chunk(
        &self,
        session: &str,
        offset: u64,
        chunk: Vec<u8>,
        total: u64,
    ) -> Result<ChunkOutcome, TransportError> {
        {
            let mut transient = self.transient.lock().unwrap();
            if *transient > 0 {
                *transient -= 1;
                return Err(TransportError::Retryable {
                    status: Some(503),
                    detail: "backend unavailable".into(),
                });
            }
        }
        let end = offset + chunk.len() as u64;
        self.received
            .lock()
            .unwrap()
            .insert(session.to_string(), end);
        if end >= total {
            Ok(ChunkOutcome::Complete(RemoteFile {
                id: self.id_for(session),
                name: None,
                mime_type: Some("application/vnd.google-apps.presentation".into()),
            }))
        } else {
            Ok(ChunkOutcome::Incomplete { committed: end })
        }
    }

    async fn query_status(&self, session: &str, _total: u64) -> Result<ChunkOutcome, TransportError> {
        let committed = self
            .received
            .lock()
            .unwrap()
            .get(session)
            .copied()
            .unwrap_or(0);
        Ok(ChunkOutcome::Incomplete { committed })
    }
}

/// Serves fixed presentations and records every batch.
#[derive(Default)]
struct FakeSlides {
    presentations: HashMap<String, Presentation>,
    reject_batches_for: HashSet<String>,
    batches: Mutex<Vec<(String, Vec<BatchRequest>)>>,
}

impl FakeSlides {
    fn with(mut self, presentation: Presentation) -> Self {
        self.presentations
            .insert(presentation.presentation_id.clone(), presentation);
        self
    }

    fn rejecting(mut self, id: &str) -> Self {
        self.reject_batches_for.insert(id.to_string());
        self
    }
}

#[async_trait]
impl SlidesApi for FakeSlides {
    async fn get_presentation(&self, presentation_id: &str) -> Result<Presentation, Pdf2SlidesError> {
        Ok(self
            .presentations
            .get(presentation_id)
            .cloned()
            .unwrap_or_else(|| Presentation {
                presentation_id: presentation_id.to_string(),
                ..Default::default()
            }))
    }

    async fn batch_update(
        &self,
        presentation_id: &str,
        requests: &[BatchRequest],
    ) -> Result<(), Pdf2SlidesError> {
        if self.reject_batches_for.contains(presentation_id) {
            return Err(Pdf2SlidesError::BatchApplyFailed {
                id: presentation_id.to_string(),
                requests: requests.len(),
                detail: "HTTP 400: invalid object id".into(),
            });
        }
        self.batches
            .lock()
            .unwrap()
            .push((presentation_id.to_string(), requests.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, e: String) {
        self.0.lock().unwrap().push(e);
    }
}

impl PipelineProgressCallback for EventLog {
    fn on_run_start(&self, total_files: usize) {
        self.push(format!("run_start {total_files}"));
    }
    fn on_file_start(&self, file: &str, index: usize, total: usize) {
        self.push(format!("start {file} {index}/{total}"));
    }
    fn on_converted(&self, file: &str) {
        self.push(format!("converted {file}"));
    }
    fn on_retry(&self, file: &str, attempt: u32, _delay: Duration) {
        self.push(format!("retry {file} {attempt}"));
    }
    fn on_file_complete(&self, file: &str, presentation_id: &str, corrections: usize) {
        self.push(format!("complete {file} {presentation_id} {corrections}"));
    }
    fn on_file_error(&self, file: &str, _error: &str) {
        self.push(format!("error {file}"));
    }
    fn on_run_complete(&self, total_files: usize, succeeded: usize) {
        self.push(format!("run_complete {succeeded}/{total_files}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Workspace {
    _root: tempfile::TempDir,
    input: PathBuf,
    work: PathBuf,
}

fn workspace(pdfs: &[&str]) -> Workspace {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("in");
    let work = root.path().join("temp");
    std::fs::create_dir_all(&input).unwrap();
    for name in pdfs {
        std::fs::write(input.join(name), b"%PDF-1.7\n").unwrap();
    }
    Workspace {
        _root: root,
        input,
        work,
    }
}

fn config(ws: &Workspace) -> pdf2gslides::PipelineConfigBuilder {
    PipelineConfig::builder()
        .input_dir(&ws.input)
        .work_dir(&ws.work)
        .jitter(Jitter::Fixed(0.0))
}

fn services(converter: FakeConverter, drive: Arc<FakeDrive>, slides: Arc<FakeSlides>) -> Services {
    Services::new(Arc::new(converter), drive, slides)
}

fn deck_presentation(id: &str) -> Presentation {
    serde_json::from_value(json!({
        "presentationId": id,
        "slides": [{
            "objectId": "p1",
            "pageElements": [
                {
                    "objectId": "tb1",
                    "shape": { "shapeType": "TEXT_BOX" },
                    "transform": { "scaleX": 1.0, "scaleY": 1.0, "translateX": 200.0, "translateY": 300.0, "unit": "EMU" }
                },
                {
                    "objectId": "rect1",
                    "shape": { "shapeType": "RECTANGLE" },
                    "transform": { "scaleX": 1.0, "scaleY": 1.0, "translateX": 10.0, "translateY": 10.0, "unit": "EMU" }
                },
                { "objectId": "img1", "image": {} }
            ]
        }]
    }))
    .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_deck_is_uploaded_and_corrected() {
    let ws = workspace(&["deck.pdf"]);
    let drive = Arc::new(FakeDrive::default().with_id("deck", "abc123"));
    let slides = Arc::new(FakeSlides::default().with(deck_presentation("abc123")));
    let svc = services(FakeConverter::new(1000), Arc::clone(&drive), Arc::clone(&slides));
    let cfg = config(&ws).build().unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);

    assert_eq!(output.files.len(), 1);
    let file = &output.files[0];
    assert!(file.is_success(), "{:?}", file.error);
    assert_eq!(file.presentation_id.as_deref(), Some("abc123"));
    assert_eq!(file.corrections, 1);
    assert_eq!(file.upload_attempts, 1);

    let uploads = drive.uploads.lock().unwrap().clone();
    assert_eq!(
        uploads,
        vec![("deck".to_string(), "application/vnd.google-apps.presentation".to_string())]
    );

    let batches = slides.batches.lock().unwrap().clone();
    assert_eq!(batches.len(), 1);
    let (id, requests) = &batches[0];
    assert_eq!(id, "abc123");
    assert_eq!(requests.len(), 1);
    let BatchRequest::UpdatePageElementTransform(req) = &requests[0];
    assert_eq!(req.object_id, "tb1");
    assert_eq!(req.apply_mode, ApplyMode::Relative);
    assert_eq!(req.transform.scale_x, Some(1.1));
    assert_eq!(req.transform.scale_y, Some(1.0));
    assert!((req.transform.translate_x.unwrap() + 20.0).abs() < 1e-9);
    assert!(req.transform.translate_y.unwrap().abs() < 1e-9);

    assert!(output.stats.work_dir_removed);
    assert!(!ws.work.exists());
    assert!(output.into_result().is_ok());
}

#[tokio::test]
async fn multi_chunk_upload_reports_progress() {
    let ws = workspace(&["big.pdf"]);
    let drive = Arc::new(FakeDrive::default());
    let slides = Arc::new(FakeSlides::default());
    let fractions = Arc::new(Mutex::new(Vec::new()));

    struct Fractions(Arc<Mutex<Vec<f64>>>);
    impl PipelineProgressCallback for Fractions {
        fn on_upload_progress(&self, _file: &str, fraction: f64) {
            self.0.lock().unwrap().push(fraction);
        }
    }

    let cfg = config(&ws)
        .chunk_size(256 * 1024)
        .progress_callback(Arc::new(Fractions(Arc::clone(&fractions))))
        .build()
        .unwrap();
    let svc = services(FakeConverter::new(512 * 1024 + 10), drive, slides);

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);
    assert!(output.all_succeeded());
    assert_eq!(output.files[0].presentation_id.as_deref(), Some("id-big"));

    let fractions = fractions.lock().unwrap().clone();
    assert_eq!(fractions.len(), 3, "{fractions:?}");
    assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(fractions.last(), Some(&1.0));
}

#[tokio::test]
async fn conversion_failure_does_not_stop_the_run() {
    let ws = workspace(&["a.pdf", "b.pdf"]);
    let drive = Arc::new(FakeDrive::default());
    let slides = Arc::new(FakeSlides::default());
    let svc = services(
        FakeConverter::new(100).failing("a.pdf"),
        Arc::clone(&drive),
        slides,
    );
    let cfg = config(&ws).build().unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);

    assert!(matches!(
        output.files[0].error,
        Some(FileError::Conversion { ref file, .. }) if file == "a.pdf"
    ));
    assert!(output.files[1].is_success());
    assert_eq!(output.files[1].presentation_id.as_deref(), Some("id-b"));
    assert_eq!(drive.uploads.lock().unwrap().len(), 1);

    assert_eq!(output.stats.succeeded, 1);
    assert_eq!(output.stats.failed, 1);
    assert!(!output.stats.work_dir_removed);
    assert!(ws.work.join("b.odp").exists());

    match assert_err!(output.into_result()) {
        Pdf2SlidesError::PartialFailure {
            success,
            failed,
            total,
        } => assert_eq!((success, failed, total), (1, 1, 2)),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn correction_failure_keeps_presentation_id() {
    let ws = workspace(&["deck.pdf"]);
    let drive = Arc::new(FakeDrive::default().with_id("deck", "abc123"));
    let slides = Arc::new(
        FakeSlides::default()
            .with(deck_presentation("abc123"))
            .rejecting("abc123"),
    );
    let svc = services(FakeConverter::new(100), drive, slides);
    let cfg = config(&ws).build().unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);
    let file = &output.files[0];
    assert_eq!(file.presentation_id.as_deref(), Some("abc123"));
    match &file.error {
        Some(FileError::Correction {
            presentation_id,
            detail,
            ..
        }) => {
            assert_eq!(presentation_id, "abc123");
            assert!(detail.contains("HTTP 400"), "{detail}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn presentation_without_text_boxes_still_gets_a_batch() {
    let ws = workspace(&["plain.pdf"]);
    let slides = Arc::new(FakeSlides::default());
    let svc = services(
        FakeConverter::new(100),
        Arc::new(FakeDrive::default()),
        Arc::clone(&slides),
    );
    let cfg = config(&ws).build().unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);
    assert_eq!(output.files[0].corrections, 0);
    let batches = slides.batches.lock().unwrap().clone();
    assert_eq!(batches, vec![("id-plain".to_string(), vec![])]);
}

#[tokio::test]
async fn empty_input_dir_is_a_clean_run() {
    let ws = workspace(&[]);
    let svc = services(
        FakeConverter::new(1),
        Arc::new(FakeDrive::default()),
        Arc::new(FakeSlides::default()),
    );
    let cfg = config(&ws).build().unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);
    assert!(output.files.is_empty());
    assert_eq!(output.stats.total_files, 0);
    assert!(output.stats.work_dir_removed);
    assert!(ws.input.is_dir());
}

#[tokio::test]
async fn missing_dirs_are_created() {
    let root = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig::builder()
        .input_dir(root.path().join("in"))
        .work_dir(root.path().join("temp"))
        .keep_work_dir(true)
        .build()
        .unwrap();
    let svc = services(
        FakeConverter::new(1),
        Arc::new(FakeDrive::default()),
        Arc::new(FakeSlides::default()),
    );

    assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);
    assert!(root.path().join("in").is_dir());
    assert!(root.path().join("temp").is_dir());
}

#[tokio::test]
async fn empty_input_needs_no_converter_or_credentials() {
    let ws = workspace(&[]);
    let cfg = config(&ws)
        .soffice_path("/definitely/not/soffice")
        .credentials_path("/definitely/not/credentials.json")
        .build()
        .unwrap();
    let (trigger, shutdown) = shutdown_channel();

    let output = assert_ok!(run_until(&cfg, &shutdown).await);
    assert_eq!(output.stats.total_files, 0);
    drop(trigger);
}

#[tokio::test]
async fn shutdown_before_setup_cancels_the_run() {
    let ws = workspace(&["deck.pdf"]);
    let cfg = config(&ws)
        .credentials_path("/definitely/not/credentials.json")
        .build()
        .unwrap();
    let (trigger, shutdown) = shutdown_channel();
    trigger.trigger();

    let err = assert_err!(run_until(&cfg, &shutdown).await);
    assert!(matches!(err, Pdf2SlidesError::Cancelled), "{err:?}");
}

#[tokio::test]
async fn keep_work_dir_preserves_intermediates() {
    let ws = workspace(&["deck.pdf"]);
    let svc = services(
        FakeConverter::new(100),
        Arc::new(FakeDrive::default()),
        Arc::new(FakeSlides::default()),
    );
    let cfg = config(&ws).keep_work_dir(true).build().unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);
    assert!(output.all_succeeded());
    assert!(!output.stats.work_dir_removed);
    assert!(ws.work.join("deck.odp").exists());
}

#[tokio::test(start_paused = true)]
async fn transient_upload_failure_is_retried() {
    let ws = workspace(&["deck.pdf"]);
    let log = Arc::new(EventLog::default());
    let drive = Arc::new(FakeDrive::default().with_transient_failures(2));
    let svc = services(FakeConverter::new(100), drive, Arc::new(FakeSlides::default()));
    let cfg = config(&ws)
        .progress_callback(Arc::clone(&log) as Arc<dyn PipelineProgressCallback>)
        .build()
        .unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);
    assert!(output.all_succeeded());
    assert_eq!(output.files[0].upload_attempts, 3);

    let events = log.events();
    assert_eq!(
        events,
        vec![
            "run_start 1",
            "start deck.pdf 1/1",
            "converted deck.pdf",
            "retry deck 1",
            "retry deck 2",
            "complete deck.pdf id-deck 0",
            "run_complete 1/1",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_the_file() {
    let ws = workspace(&["a.pdf", "b.pdf"]);
    let drive = Arc::new(FakeDrive::default().with_transient_failures(3));
    let svc = services(FakeConverter::new(100), drive, Arc::new(FakeSlides::default()));
    let cfg = config(&ws).max_tries(3).build().unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &Shutdown::never()).await);
    match &output.files[0].error {
        Some(FileError::Upload { file, kind, detail }) => {
            assert_eq!(file, "a.pdf");
            assert_eq!(*kind, UploadFailure::RetriesExhausted);
            assert!(detail.contains("3 attempts"), "{detail}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(output.files[1].is_success());
}

#[tokio::test]
async fn shutdown_before_start_skips_every_file() {
    let ws = workspace(&["a.pdf", "b.pdf"]);
    let drive = Arc::new(FakeDrive::default());
    let svc = services(
        FakeConverter::new(100),
        Arc::clone(&drive),
        Arc::new(FakeSlides::default()),
    );
    let cfg = config(&ws).build().unwrap();
    let (trigger, shutdown) = shutdown_channel();
    trigger.trigger();

    let output = assert_ok!(run_with(&cfg, &svc, &shutdown).await);
    assert_eq!(output.stats.skipped, 2);
    assert!(output
        .files
        .iter()
        .all(|f| matches!(f.error, Some(FileError::Skipped { .. }))));
    assert!(drive.uploads.lock().unwrap().is_empty());
    assert!(!output.stats.work_dir_removed);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_retry_interrupts_and_skips_the_rest() {
    struct StopOnRetry(ShutdownTrigger);
    impl PipelineProgressCallback for StopOnRetry {
        fn on_retry(&self, _file: &str, _attempt: u32, _delay: Duration) {
            self.0.trigger();
        }
    }

    let ws = workspace(&["a.pdf", "b.pdf"]);
    let drive = Arc::new(FakeDrive::default().with_transient_failures(100));
    let svc = services(FakeConverter::new(100), drive, Arc::new(FakeSlides::default()));
    let (trigger, shutdown) = shutdown_channel();
    let cfg = config(&ws)
        .progress_callback(Arc::new(StopOnRetry(trigger)))
        .build()
        .unwrap();

    let output = assert_ok!(run_with(&cfg, &svc, &shutdown).await);
    match &output.files[0].error {
        Some(FileError::Upload { kind, .. }) => assert_eq!(*kind, UploadFailure::Interrupted),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(output.files[0].upload_attempts, 0);
    assert!(matches!(
        output.files[1].error,
        Some(FileError::Skipped { .. })
    ));
}

// ── Live run ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_run_against_google() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run the live test");
        return;
    }
    let ws = workspace(&[]);
    let sample = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/sample.pdf");
    if !sample.exists() {
        println!("SKIP — test file not found: {}", sample.display());
        return;
    }
    std::fs::copy(&sample, ws.input.join("sample.pdf")).unwrap();

    let cfg = config(&ws).build().unwrap();
    let output = assert_ok!(run(&cfg).await);
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
    assert!(output.all_succeeded());
}
