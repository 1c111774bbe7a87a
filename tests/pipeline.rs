//! Integration tests for the rename batch.
//!
//! Storage and the vision model are replaced by in-memory fakes, so these
//! run offline and deterministically:
//!
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use exhibit_renamer::pipeline::fallback::fallback_name;
use exhibit_renamer::storage::{Listing, RenamedFile};
use exhibit_renamer::{
    run, run_stream, run_sync, BatchSummary, FileError, FileRecord, ImagePayload, ModelError,
    RenameConfig, RenameError, RenameOutcome, RenameProgressCallback, Reporter, StorageClient,
    StorageError, TaskStage, VisionModel,
};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeStorage {
    files: Vec<FileRecord>,
    truncated: bool,
    fail_listing: bool,
    fail_download: HashSet<String>,
    fail_rename: HashSet<String>,
    download_delay: Duration,
    rename_delay: Duration,

    listed_page_size: Mutex<Option<u32>>,
    downloads: Mutex<Vec<String>>,
    renames: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeStorage {
    fn with_files(files: Vec<FileRecord>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    fn renames(&self) -> Vec<(String, String)> {
        self.renames.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn list_children(&self, _folder_id: &str, page_size: u32) -> Result<Listing, StorageError> {
        *self.listed_page_size.lock().unwrap() = Some(page_size);
        if self.fail_listing {
            return Err(StorageError::Http {
                status: 404,
                message: "File not found: folder".into(),
            });
        }
        Ok(Listing {
            files: self.files.clone(),
            truncated: self.truncated,
        })
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.downloads.lock().unwrap().push(file_id.to_string());
        if self.fail_download.contains(file_id) {
            return Err(StorageError::Transport("connection reset".into()));
        }
        // The id doubles as the image content so the model fake can react to it.
        Ok(file_id.as_bytes().to_vec())
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<RenamedFile, StorageError> {
        if self.fail_rename.contains(file_id) {
            return Err(StorageError::Http {
                status: 403,
                message: "The user does not have sufficient permissions for this file.".into(),
            });
        }
        self.renames
            .lock()
            .unwrap()
            .push((file_id.to_string(), new_name.to_string()));
        if !self.rename_delay.is_zero() {
            tokio::time::sleep(self.rename_delay).await;
        }
        Ok(RenamedFile {
            id: file_id.to_string(),
            name: new_name.to_string(),
        })
    }
}

type Answer = Box<dyn Fn(&[u8]) -> Result<String, ModelError> + Send + Sync>;

struct FakeModel {
    answer: Answer,
    calls: AtomicUsize,
}

impl FakeModel {
    fn new(answer: impl Fn(&[u8]) -> Result<String, ModelError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            answer: Box::new(answer),
            calls: AtomicUsize::new(0),
        })
    }

    fn always(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    fn describe(&self) -> String {
        "fake/vision".into()
    }

    async fn generate(&self, _prompt: &str, image: ImagePayload) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.bytes == b"boom" {
            panic!("model exploded on {}", image.mime_type);
        }
        (self.answer)(&image.bytes)
    }
}

#[derive(Default)]
struct Recorder {
    started: Mutex<Option<usize>>,
    completed: Mutex<Option<BatchSummary>>,
    stages: Mutex<Vec<(String, TaskStage)>>,
    renamed: AtomicUsize,
    skipped: AtomicUsize,
    errors: AtomicUsize,
    fallbacks: AtomicUsize,
}

impl RenameProgressCallback for Recorder {
    fn on_batch_start(&self, total_files: usize) {
        *self.started.lock().unwrap() = Some(total_files);
    }

    fn on_file_stage(&self, file: &FileRecord, stage: TaskStage) {
        self.stages.lock().unwrap().push((file.id.clone(), stage));
    }

    fn on_fallback(&self, _file: &FileRecord, _reason: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_renamed(&self, _file: &FileRecord, _new_name: &str) {
        self.renamed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_skipped(&self, _file: &FileRecord) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_error(&self, _file: &FileRecord, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        *self.completed.lock().unwrap() = Some(*summary);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Route library logs to the test harness; shown for failing tests only.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

fn jpegs(n: usize) -> Vec<FileRecord> {
    (0..n)
        .map(|i| FileRecord::new(format!("f{i}"), format!("IMG_{i:04}.jpg"), "image/jpeg"))
        .collect()
}

fn config() -> RenameConfig {
    RenameConfig::default()
}

fn new_name(outcome: &RenameOutcome) -> &str {
    match outcome {
        RenameOutcome::Succeeded { new_name } => new_name,
        other => panic!("expected success, got {other:?}"),
    }
}

// ── Reference scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn ten_receipts_are_all_renamed() {
    init_tracing();
    let storage = Arc::new(FakeStorage::with_files(jpegs(10)));
    let model = FakeModel::always("2023-10-27_Receipt_Lunch");

    let report = run(storage.clone(), model.clone(), "folder", &config())
        .await
        .unwrap();

    assert_eq!(
        report.summary,
        BatchSummary {
            succeeded: 10,
            skipped: 0,
            failed: 0,
            total: 10
        }
    );
    assert_eq!(report.files.len(), 10);
    for file in &report.files {
        assert_eq!(new_name(&file.outcome), "2023-10-27_Receipt_Lunch.jpg");
        assert!(file.analysis_warning.is_none());
    }
    assert_eq!(storage.renames().len(), 10);
    assert_eq!(model.calls(), 10);
    assert!(!report.listing_truncated);
}

#[tokio::test]
async fn analysis_failure_renames_to_needs_review() {
    let storage = Arc::new(FakeStorage::with_files(vec![FileRecord::new(
        "s1",
        "scan.png",
        "image/png",
    )]));
    let model = FakeModel::new(|_| Err(ModelError::Provider("quota exceeded".into())));

    let report = run(storage.clone(), model, "folder", &config()).await.unwrap();

    assert_eq!(report.summary.succeeded, 1);
    let file = &report.files[0];
    assert_eq!(new_name(&file.outcome), fallback_name("scan.png"));
    assert!(new_name(&file.outcome).starts_with("NEEDS_REVIEW_"));
    assert!(new_name(&file.outcome).ends_with("_scan.png"));
    assert!(file
        .analysis_warning
        .as_deref()
        .is_some_and(|w| w.contains("quota exceeded")));
    assert!(report.needs_review().any(|f| f.file.id == "s1"));
}

#[tokio::test]
async fn pdf_is_skipped_without_calls() {
    let storage = Arc::new(FakeStorage::with_files(vec![FileRecord::new(
        "p1",
        "statement.pdf",
        "application/pdf",
    )]));
    let model = FakeModel::always("unused_name");

    let report = run(storage.clone(), model.clone(), "folder", &config())
        .await
        .unwrap();

    assert_eq!(
        report.files[0].outcome,
        RenameOutcome::Skipped {
            mime_type: "application/pdf".into()
        }
    );
    assert_eq!(report.summary.skipped, 1);
    assert!(storage.downloads().is_empty());
    assert!(storage.renames().is_empty());
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn one_rename_failure_among_ten() {
    init_tracing();
    let mut storage = FakeStorage::with_files(jpegs(10));
    storage.fail_rename.insert("f3".into());
    let storage = Arc::new(storage);
    let model = FakeModel::always("2023-10-27_Receipt_Lunch");

    let report = run(storage.clone(), model, "folder", &config()).await.unwrap();

    assert_eq!(
        report.summary,
        BatchSummary {
            succeeded: 9,
            skipped: 0,
            failed: 1,
            total: 10
        }
    );
    let failed: Vec<_> = report.files.iter().filter(|f| f.outcome.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file.id, "f3");
    match &failed[0].outcome {
        RenameOutcome::Failed {
            error: FileError::RenameFailed { target, detail },
        } => {
            assert_eq!(target, "2023-10-27_Receipt_Lunch.jpg");
            assert!(detail.contains("403"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(storage.renames().iter().all(|(id, _)| id != "f3"));
}

// ── Batch-level behaviour ────────────────────────────────────────────────────

#[tokio::test]
async fn empty_folder_reports_zeroes() {
    let storage = Arc::new(FakeStorage::default());
    let model = FakeModel::always("x_y");
    let recorder = Arc::new(Recorder::default());
    let config = RenameConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn RenameProgressCallback>)
        .build()
        .unwrap();

    let report = run(storage, model.clone(), "folder", &config).await.unwrap();

    assert_eq!(report.summary, BatchSummary::default());
    assert!(report.files.is_empty());
    assert_eq!(model.calls(), 0);
    assert_eq!(*recorder.started.lock().unwrap(), Some(0));
    assert_eq!(
        *recorder.completed.lock().unwrap(),
        Some(BatchSummary::default())
    );
}

#[tokio::test]
async fn listing_failure_is_fatal_and_touches_nothing() {
    let storage = Arc::new(FakeStorage {
        fail_listing: true,
        files: jpegs(3),
        ..Default::default()
    });
    let model = FakeModel::always("x_y");

    let err = run(storage.clone(), model.clone(), "missing-folder", &config())
        .await
        .unwrap_err();

    match err {
        RenameError::ListingFailed { folder_id, source } => {
            assert_eq!(folder_id, "missing-folder");
            assert!(matches!(source, StorageError::Http { status: 404, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(storage.downloads().is_empty());
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn download_failure_keeps_original_name() {
    let mut storage = FakeStorage::with_files(jpegs(3));
    storage.fail_download.insert("f1".into());
    let storage = Arc::new(storage);
    let model = FakeModel::always("01-02-2023_Email_Rent");

    let report = run(storage.clone(), model.clone(), "folder", &config())
        .await
        .unwrap();

    assert_eq!((report.summary.succeeded, report.summary.failed), (2, 1));
    let failed = report.files.iter().find(|f| f.file.id == "f1").unwrap();
    assert!(matches!(
        failed.outcome,
        RenameOutcome::Failed {
            error: FileError::DownloadFailed { .. }
        }
    ));
    assert!(storage.renames().iter().all(|(id, _)| id != "f1"));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn separatorless_answer_falls_back() {
    let storage = Arc::new(FakeStorage::with_files(vec![FileRecord::new(
        "b1",
        "blurry.heic",
        "image/heic",
    )]));
    let model = FakeModel::always("I cannot read this document.");

    let report = run(storage, model, "folder", &config()).await.unwrap();

    let name = new_name(&report.files[0].outcome);
    assert_eq!(name, fallback_name("blurry.heic"));
    assert!(report.files[0].analysis_warning.is_some());
}

#[tokio::test]
async fn extension_follows_original_or_defaults_to_jpg() {
    let storage = Arc::new(FakeStorage::with_files(vec![
        FileRecord::new("a", "photo.png", "image/png"),
        FileRecord::new("b", "scan", "image/jpeg"),
    ]));
    let model = FakeModel::always("\"05-06-2022_Medical_Bill_Clinic_Visit\"");

    let report = run(storage, model, "folder", &config()).await.unwrap();

    let by_id = |id: &str| {
        report
            .files
            .iter()
            .find(|f| f.file.id == id)
            .map(|f| new_name(&f.outcome).to_string())
            .unwrap()
    };
    assert_eq!(by_id("a"), "05-06-2022_Medical_Bill_Clinic_Visit.png");
    assert_eq!(by_id("b"), "05-06-2022_Medical_Bill_Clinic_Visit.jpg");
}

#[tokio::test]
async fn every_listed_file_gets_exactly_one_outcome() {
    let mut files = jpegs(6);
    files.push(FileRecord::new("doc", "notes.txt", "text/plain"));
    files.push(FileRecord::new("dir", "Old", "application/vnd.google-apps.folder"));
    let mut storage = FakeStorage::with_files(files);
    storage.fail_download.insert("f2".into());
    storage.fail_rename.insert("f4".into());
    let storage = Arc::new(storage);
    let model = FakeModel::new(|bytes| {
        if bytes == b"f5" {
            Ok(String::new())
        } else {
            Ok("2021-01-01_Text_Message_Pickup".into())
        }
    });

    let report = run(storage, model, "folder", &config()).await.unwrap();

    let s = report.summary;
    assert_eq!(s.total, 8);
    assert_eq!(s.succeeded + s.skipped + s.failed, s.total);
    assert_eq!((s.succeeded, s.skipped, s.failed), (4, 2, 2));

    let mut ids: Vec<_> = report.files.iter().map(|f| f.file.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["dir", "doc", "f0", "f1", "f2", "f3", "f4", "f5"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_never_exceeds_concurrency() {
    let storage = Arc::new(FakeStorage {
        files: jpegs(20),
        download_delay: Duration::from_millis(20),
        ..Default::default()
    });
    let model = FakeModel::always("2023-10-27_Receipt_Lunch");
    let config = RenameConfig::builder().concurrency(3).build().unwrap();

    let report = run(storage.clone(), model, "folder", &config).await.unwrap();

    assert_eq!(report.summary.succeeded, 20);
    let peak = storage.max_in_flight.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 3, "peak in-flight was {peak}");
}

#[tokio::test]
async fn panicking_task_fails_only_its_file() {
    init_tracing();
    let mut files = jpegs(3);
    files.push(FileRecord::new("boom", "cursed.jpg", "image/jpeg"));
    let storage = Arc::new(FakeStorage::with_files(files));
    let model = FakeModel::always("2023-10-27_Receipt_Lunch");
    let recorder = Arc::new(Recorder::default());
    let config = RenameConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn RenameProgressCallback>)
        .build()
        .unwrap();

    let report = run(storage, model, "folder", &config).await.unwrap();

    assert_eq!((report.summary.succeeded, report.summary.failed), (3, 1));
    let cursed = report.files.iter().find(|f| f.file.id == "boom").unwrap();
    match &cursed.outcome {
        RenameOutcome::Failed {
            error: FileError::TaskPanicked { detail },
        } => assert!(detail.contains("model exploded")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_file_times_out() {
    let storage = Arc::new(FakeStorage {
        files: jpegs(1),
        download_delay: Duration::from_millis(1500),
        ..Default::default()
    });
    let model = FakeModel::always("x_y");
    let config = RenameConfig::builder()
        .task_timeout_secs(Some(1))
        .build()
        .unwrap();

    let report = run(storage.clone(), model.clone(), "folder", &config)
        .await
        .unwrap();

    assert_eq!(
        report.files[0].outcome,
        RenameOutcome::Failed {
            error: FileError::Timeout { secs: 1 }
        }
    );
    assert!(storage.renames().is_empty());
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn slow_rename_finishes_and_counts_as_renamed() {
    let storage = Arc::new(FakeStorage {
        files: jpegs(1),
        rename_delay: Duration::from_millis(1500),
        ..Default::default()
    });
    let model = FakeModel::always("01-01-2024_Email_Hi");
    let config = RenameConfig::builder()
        .task_timeout_secs(Some(1))
        .build()
        .unwrap();

    let report = run(storage.clone(), model, "folder", &config).await.unwrap();

    assert_eq!(
        report.files[0].outcome,
        RenameOutcome::Succeeded {
            new_name: "01-01-2024_Email_Hi.jpg".into()
        }
    );
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(
        storage.renames(),
        vec![("f0".to_string(), "01-01-2024_Email_Hi.jpg".to_string())]
    );
}

#[tokio::test]
async fn fallback_keeps_slashes_in_original_name() {
    let storage = Arc::new(FakeStorage::with_files(vec![
        FileRecord::new("lease", "Lease 1/2.jpg", "image/jpeg"),
        FileRecord::new("dotted", "scan.", "image/jpeg"),
    ]));
    let model = FakeModel::new(|_| Err(ModelError::Transport("connection reset".into())));

    let report = run(storage.clone(), model, "folder", &config()).await.unwrap();

    assert_eq!(report.summary.succeeded, 2);
    let mut renames = storage.renames();
    renames.sort();
    assert_eq!(
        renames,
        vec![
            ("dotted".to_string(), fallback_name("scan.")),
            ("lease".to_string(), fallback_name("Lease 1/2.jpg")),
        ]
    );
    assert!(fallback_name("Lease 1/2.jpg").ends_with("_Lease 1/2.jpg"));
}

#[tokio::test]
async fn model_slashes_and_trailing_dots_are_kept() {
    let storage = Arc::new(FakeStorage::with_files(jpegs(1)));
    let model = FakeModel::always("12.03.2021_Letter_A/B");

    let report = run(storage, model, "folder", &config()).await.unwrap();

    assert_eq!(new_name(&report.files[0].outcome), "12.03.2021_Letter_A/B");
}

#[tokio::test]
async fn truncated_listing_is_flagged() {
    let storage = Arc::new(FakeStorage {
        files: jpegs(2),
        truncated: true,
        ..Default::default()
    });
    let model = FakeModel::always("x_y");
    let config = RenameConfig::builder().page_size(2).build().unwrap();

    let report = run(storage.clone(), model, "folder", &config).await.unwrap();

    assert!(report.listing_truncated);
    assert_eq!(report.summary.total, 2);
    assert_eq!(*storage.listed_page_size.lock().unwrap(), Some(2));
}

#[tokio::test]
async fn progress_events_cover_every_file() {
    let mut files = jpegs(2);
    files.push(FileRecord::new("t", "readme.txt", "text/plain"));
    let storage = Arc::new(FakeStorage::with_files(files));
    let model = FakeModel::new(|bytes| {
        if bytes == b"f1" {
            Err(ModelError::NoText { reason: None })
        } else {
            Ok("2020-02-02_Email_Hello".into())
        }
    });
    let recorder = Arc::new(Recorder::default());
    let config = RenameConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn RenameProgressCallback>)
        .build()
        .unwrap();

    let report = run(storage, model, "folder", &config).await.unwrap();

    assert_eq!(*recorder.started.lock().unwrap(), Some(3));
    assert_eq!(*recorder.completed.lock().unwrap(), Some(report.summary));
    assert_eq!(recorder.renamed.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.skipped.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.fallbacks.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);

    let stages = recorder.stages.lock().unwrap();
    let for_file = |id: &str| -> Vec<TaskStage> {
        stages
            .iter()
            .filter(|(file_id, _)| file_id == id)
            .map(|(_, s)| *s)
            .collect()
    };
    assert_eq!(
        for_file("f0"),
        [
            TaskStage::Listed,
            TaskStage::Downloading,
            TaskStage::Analyzing,
            TaskStage::Naming,
            TaskStage::Renaming
        ]
    );
    assert_eq!(for_file("t"), [TaskStage::Listed]);
}

#[tokio::test]
async fn same_named_files_report_progress_by_id() {
    let storage = Arc::new(FakeStorage::with_files(vec![
        FileRecord::new("a", "IMG_0001.jpg", "image/jpeg"),
        FileRecord::new("b", "IMG_0001.jpg", "image/jpeg"),
    ]));
    let recorder = Arc::new(Recorder::default());
    let config = RenameConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn RenameProgressCallback>)
        .build()
        .unwrap();

    run(storage, FakeModel::always("x_y"), "folder", &config)
        .await
        .unwrap();

    let stages = recorder.stages.lock().unwrap();
    for id in ["a", "b"] {
        let seen = stages.iter().filter(|(file_id, _)| file_id == id).count();
        assert_eq!(seen, 5, "stages for {id}");
    }
}

#[test]
fn sync_wrapper_runs_its_own_runtime() {
    let storage = Arc::new(FakeStorage::with_files(jpegs(2)));
    let model = FakeModel::always("2018-08-08_Email_Invoice");

    let report = run_sync(storage, model, "folder", &config()).unwrap();

    assert_eq!(report.summary.succeeded, 2);
}

// ── Streaming API ────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_one_report_per_file() {
    let mut files = jpegs(5);
    files.push(FileRecord::new("v", "clip.mp4", "video/mp4"));
    let storage = Arc::new(FakeStorage::with_files(files));
    let model = FakeModel::always("2019-09-09_Receipt_Parking");

    let mut reports = run_stream(storage, model, "folder", &config()).await.unwrap();
    let mut reporter = Reporter::default();
    while let Some(report) = reports.next().await {
        reporter.record(report);
    }

    let summary = reporter.summary();
    assert_eq!((summary.succeeded, summary.skipped, summary.total), (5, 1, 6));
}

#[tokio::test]
async fn stream_surfaces_listing_failure_up_front() {
    let storage = Arc::new(FakeStorage {
        fail_listing: true,
        ..Default::default()
    });
    let result = run_stream(storage, FakeModel::always("x_y"), "folder", &config()).await;
    assert!(matches!(result, Err(RenameError::ListingFailed { .. })));
}

#[tokio::test]
async fn dropping_the_stream_stops_in_flight_files() {
    let storage = Arc::new(FakeStorage {
        files: jpegs(4),
        download_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let model = FakeModel::always("x_y");
    let config = RenameConfig::builder().concurrency(2).build().unwrap();

    let mut reports = run_stream(storage.clone(), model.clone(), "folder", &config)
        .await
        .unwrap();
    // Start the first two downloads, then walk away before any finishes.
    assert!(tokio::time::timeout(Duration::from_millis(50), reports.next())
        .await
        .is_err());
    assert_eq!(storage.in_flight.load(Ordering::SeqCst), 2);
    drop(reports);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(storage.downloads().is_empty());
    assert!(storage.renames().is_empty());
    assert_eq!(model.calls(), 0);
}
