use super::*;
use crate::config::AppConfig;
use crate::error::RecognitionError;
use crate::frame::{FrameSource, ImageFrameSource, SourceKind};
use crate::recognition::{BoxedRecognizer, Recognition, Recognizer};
use crate::region::{RegionDraft, RegionUpdate};
use crate::results::ExtractionRecord;
use crate::sampler::SampledImage;
use crate::scheduler::CaptureSettingsUpdate;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct EchoRecognizer {
    delay: Duration,
}

#[async_trait]
impl Recognizer for EchoRecognizer {
    async fn recognize(&self, image: &SampledImage) -> Result<Recognition, RecognitionError> {
        tokio::time::sleep(self.delay).await;
        Ok(Recognition::new(format!("text of {}", image.region_name), 90.0))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

fn recognizer(delay_ms: u64) -> BoxedRecognizer {
    Arc::new(EchoRecognizer {
        delay: Duration::from_millis(delay_ms),
    })
}

fn source() -> Arc<dyn FrameSource> {
    Arc::new(ImageFrameSource::new(
        RgbaImage::from_pixel(320, 180, Rgba([30, 30, 30, 255])),
        SourceKind::File,
    ))
}

fn create_test_config(export_dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.capture.interval_ms = 500;
    config.export.directory = export_dir.path().to_string_lossy().into_owned();
    config
}

fn exported_files(dir: &TempDir) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

#[tokio::test]
async fn test_app_seeds_configured_regions() {
    let dir = TempDir::new().unwrap();
    let app = ExtractionApp::new(create_test_config(&dir), Some(source()), recognizer(10)).unwrap();

    let names: Vec<String> = app.regions().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Speaker", "Subtitle"]);
    assert!(!app.is_capturing());
    assert_eq!(app.settings().interval_ms, 500);
}

#[tokio::test]
async fn test_app_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.capture.interval_ms = 0;

    assert!(ExtractionApp::new(config, None, recognizer(10)).is_err());
}

#[tokio::test]
async fn test_region_crud_passthrough() {
    let dir = TempDir::new().unwrap();
    let app = ExtractionApp::new(create_test_config(&dir), None, recognizer(10)).unwrap();

    let added = app.add_region(RegionDraft::new("Title", "#FFFFFF", 0.0, 0.0, 50.0, 10.0));
    assert_eq!(app.regions().len(), 3);

    let renamed = app
        .update_region(&added.id, RegionUpdate::rename("Heading"))
        .unwrap();
    assert_eq!(renamed.name, "Heading");
    assert_eq!(renamed.width, 50.0);

    assert!(app.remove_region(&added.id).is_some());
    assert!(app.remove_region(&added.id).is_none());
    assert_eq!(app.regions().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_for_duration_exports_results() {
    let dir = TempDir::new().unwrap();
    let mut app =
        ExtractionApp::new(create_test_config(&dir), Some(source()), recognizer(50)).unwrap();

    let exit_code = app.run(Some(Duration::from_millis(1200))).await.unwrap();
    assert_eq!(exit_code, 0);
    assert!(!app.is_capturing());

    // Two cycles over two regions
    let records = app.export();
    assert_eq!(records.len(), 4);

    let files = exported_files(&dir);
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("ocr-results-") && name.ends_with(".json"));

    let raw = std::fs::read_to_string(&files[0]).unwrap();
    assert!(raw.contains("\"formattedTime\""));
    let parsed: Vec<ExtractionRecord> = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, records);
}

#[tokio::test(start_paused = true)]
async fn test_run_without_export_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut app =
        ExtractionApp::new(create_test_config(&dir), Some(source()), recognizer(50)).unwrap();
    app.set_export_on_exit(false);

    let exit_code = app.run(Some(Duration::from_millis(700))).await.unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(app.export().len(), 2);
    assert!(exported_files(&dir).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_handle_ends_run() {
    let dir = TempDir::new().unwrap();
    let mut app = ExtractionApp::new(create_test_config(&dir), Some(source()), recognizer(10))
        .unwrap();
    app.set_export_on_exit(false);

    let handle = app.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(handle.request(ShutdownReason::UserRequest));
        assert!(!handle.request(ShutdownReason::UserRequest));
    });

    assert_eq!(app.run(None).await.unwrap(), 0);
    assert_eq!(app.export().len(), 2);

    // The shutdown channel is single use
    assert!(app.run(None).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_stuck_recognition_exits_after_grace() {
    let dir = TempDir::new().unwrap();
    let mut app = ExtractionApp::new(
        create_test_config(&dir),
        Some(source()),
        recognizer(3_600_000),
    )
    .unwrap();
    app.set_shutdown_grace(Duration::from_secs(1));

    let exit_code = app.run(Some(Duration::from_millis(700))).await.unwrap();
    assert_eq!(exit_code, 1);

    // Whatever was committed by then is still exported
    let files = exported_files(&dir);
    assert_eq!(files.len(), 1);
    let parsed: Vec<ExtractionRecord> =
        serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert!(parsed.is_empty());
}

#[tokio::test]
async fn test_settings_passthrough_validates() {
    let dir = TempDir::new().unwrap();
    let app = ExtractionApp::new(create_test_config(&dir), None, recognizer(10)).unwrap();

    let updated = app
        .update_settings(CaptureSettingsUpdate::sensitivity(80))
        .unwrap();
    assert_eq!(updated.sensitivity, 80);
    assert!(app
        .update_settings(CaptureSettingsUpdate::interval(1))
        .is_err());
    assert_eq!(app.settings().interval_ms, 500);
}

#[tokio::test]
async fn test_clear_results_empties_export() {
    let dir = TempDir::new().unwrap();
    let app = ExtractionApp::new(create_test_config(&dir), None, recognizer(10)).unwrap();

    app.results.append(crate::results::RecordDraft::captured_at(
        12.5, "Subtitle", "hello",
    ));
    assert_eq!(app.export().len(), 1);
    assert!(app.export_json().unwrap().contains("00:00:12"));

    app.clear_results();
    assert!(app.export().is_empty());
}
