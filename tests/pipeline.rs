// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-to-end runs against a scripted vision backend

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::watch;

use rename_images::date::{DateResolver, DateTagReader};
use rename_images::describe::{DescriptionRequester, ImagePayload, VisionBackend};
use rename_images::naming::FilenameSynthesizer;
use rename_images::pipeline::{Pipeline, RunSummary};
use rename_images::plan::{FileOutcome, FileReport, Mode, RenamePlanner};
use rename_images::selector::{FileSelector, SelectOptions};
use rename_images::{RenameError, Result};

type Script = dyn Fn(&str, &str) -> Option<String> + Send + Sync;

/// Replies based on (file contents, model); `None` is a backend failure
struct ScriptedBackend {
    script: Box<Script>,
}

impl ScriptedBackend {
    fn new(script: impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
        }
    }

    /// Same reply for every file and model
    fn always(reply: &'static str) -> Self {
        Self::new(move |_, _| Some(reply.to_string()))
    }
}

#[async_trait]
impl VisionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn describe(&self, image: &ImagePayload, model: &str, _prompt: &str) -> Result<String> {
        let bytes = general_purpose::STANDARD
            .decode(&image.base64)
            .map_err(|e| RenameError::Backend(e.to_string()))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        (self.script)(&content, model)
            .ok_or_else(|| RenameError::Backend(format!("service unavailable for {}", content)))
    }
}

/// "EXIF" dates keyed by file name
struct FixedDates(HashMap<String, NaiveDate>);

impl FixedDates {
    fn none() -> Self {
        Self(HashMap::new())
    }

    fn with(entries: &[(&str, NaiveDate)]) -> Self {
        Self(entries.iter().map(|(n, d)| (n.to_string(), *d)).collect())
    }
}

impl DateTagReader for FixedDates {
    fn read_date_tag(&self, path: &Path) -> Option<NaiveDate> {
        let name = path.file_name()?.to_str()?;
        self.0.get(name).copied()
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Create a file whose contents double as its identity for the backend
fn photo(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, name).unwrap();
    path
}

struct Run {
    reports: Vec<FileReport>,
    summary: RunSummary,
}

async fn run(
    inputs: Vec<PathBuf>,
    backend: ScriptedBackend,
    dates: FixedDates,
    models: &[&str],
    dry_run: bool,
) -> Run {
    let models: Vec<String> = models.iter().map(|m| m.to_string()).collect();
    let prompts = vec!["Describe this image".to_string()];
    let mode = Mode::from_flags(models.len() > 1, dry_run);

    let requester = DescriptionRequester::new(Arc::new(backend), models, prompts, 4);
    let mut pipeline = Pipeline::new(
        FileSelector::new(inputs, SelectOptions::default()),
        DateResolver::new(Arc::new(dates)),
        requester,
        RenamePlanner::new(FilenameSynthesizer::new(72, "image"), mode),
        4,
    );

    let (_tx, rx) = watch::channel(false);
    let mut reports = Vec::new();
    let summary = pipeline.run(rx, |report| reports.push(report.clone())).await;
    Run { reports, summary }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn dated_description_becomes_the_new_name() {
    let temp = tempdir().unwrap();
    let source = photo(temp.path(), "IMG_1234.JPG");

    let result = run(
        vec![source.clone()],
        ScriptedBackend::always("a sunset over the golden gate bridge"),
        FixedDates::with(&[("IMG_1234.JPG", ymd(2024, 1, 1))]),
        &["gpt-4o-mini"],
        false,
    )
    .await;

    let expected = temp.path().join("2024-01-01-sunset-over-golden-gate-bridge.JPG");
    assert!(matches!(
        &result.reports[0].outcome,
        FileOutcome::Renamed { target } if target == &expected
    ));
    assert!(expected.exists());
    assert!(!source.exists());
    assert_eq!(result.summary.renamed, 1);
}

#[tokio::test]
async fn missing_date_leaves_plain_slug() {
    let temp = tempdir().unwrap();
    photo(temp.path(), "IMG_0001.jpg");

    run(
        vec![temp.path().to_path_buf()],
        ScriptedBackend::always("Two cats playing"),
        FixedDates::none(),
        &["gpt-4o-mini"],
        false,
    )
    .await;

    assert_eq!(file_names(temp.path()), ["two-cats-playing.jpg"]);
}

#[tokio::test]
async fn file_name_date_is_used_without_exif() {
    let temp = tempdir().unwrap();
    photo(temp.path(), "IMG_2023-07-04_0042.jpg");

    run(
        vec![temp.path().to_path_buf()],
        ScriptedBackend::always("Fireworks over the river"),
        FixedDates::none(),
        &["gpt-4o-mini"],
        false,
    )
    .await;

    assert_eq!(file_names(temp.path()), ["2023-07-04-fireworks-over-river.jpg"]);
}

#[tokio::test]
async fn comparison_mode_never_renames() {
    let temp = tempdir().unwrap();
    let source = photo(temp.path(), "IMG_5555.jpg");

    let backend = ScriptedBackend::new(|_, model| match model {
        "gpt-4o" => Some("Golden retriever on a beach".to_string()),
        _ => Some("Dog running in the sand".to_string()),
    });
    let result = run(
        vec![source.clone()],
        backend,
        FixedDates::with(&[("IMG_5555.jpg", ymd(2024, 5, 5))]),
        &["gpt-4o", "gpt-4o-mini"],
        false,
    )
    .await;

    match &result.reports[0].outcome {
        FileOutcome::Compared { rows } => {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].model, "gpt-4o");
            assert_eq!(
                rows[0].outcome,
                Ok("2024-05-05-golden-retriever-on-beach.jpg".to_string())
            );
            assert_eq!(rows[1].model, "gpt-4o-mini");
            assert_eq!(
                rows[1].outcome,
                Ok("2024-05-05-dog-running-in-sand.jpg".to_string())
            );
        }
        other => panic!("expected comparison, got {:?}", other),
    }
    assert_eq!(file_names(temp.path()), ["IMG_5555.jpg"]);
    assert_eq!(result.summary.compared, 1);
}

#[tokio::test]
async fn dry_run_reports_target_and_keeps_file() {
    let temp = tempdir().unwrap();
    let source = photo(temp.path(), "IMG_7777.png");

    let result = run(
        vec![source.clone()],
        ScriptedBackend::always("Mountain Lake Reflecting Snow Peaks"),
        FixedDates::none(),
        &["gpt-4o-mini"],
        true,
    )
    .await;

    match &result.reports[0].outcome {
        FileOutcome::Previewed { target } => {
            assert_eq!(target, &temp.path().join("mountain-lake-reflecting-snow-peaks.png"))
        }
        other => panic!("expected preview, got {:?}", other),
    }
    assert_eq!(file_names(temp.path()), ["IMG_7777.png"]);
}

#[tokio::test]
async fn identical_descriptions_are_numbered_in_input_order() {
    let temp = tempdir().unwrap();
    let names = ["IMG_0001.jpg", "IMG_0002.jpg", "IMG_0003.jpg"];
    for name in names {
        photo(temp.path(), name);
    }
    let same_day: Vec<(&str, NaiveDate)> = names.iter().map(|n| (*n, ymd(2024, 1, 1))).collect();

    let result = run(
        vec![temp.path().to_path_buf()],
        ScriptedBackend::always("Birthday cake"),
        FixedDates::with(&same_day),
        &["gpt-4o-mini"],
        false,
    )
    .await;

    let targets: Vec<String> = result
        .reports
        .iter()
        .map(|r| match &r.outcome {
            FileOutcome::Renamed { target } => target.file_name().unwrap().to_string_lossy().into_owned(),
            other => panic!("expected rename, got {:?}", other),
        })
        .collect();
    assert_eq!(
        targets,
        [
            "2024-01-01-birthday-cake.jpg",
            "2024-01-01-birthday-cake-2.jpg",
            "2024-01-01-birthday-cake-3.jpg",
        ]
    );
}

#[tokio::test]
async fn one_failing_file_does_not_stop_the_rest() {
    let temp = tempdir().unwrap();
    photo(temp.path(), "IMG_0001.jpg");
    photo(temp.path(), "IMG_0002.jpg");
    photo(temp.path(), "IMG_0003.jpg");

    let backend = ScriptedBackend::new(|content, _| {
        (content != "IMG_0002.jpg").then(|| format!("Harbor {}", &content[4..8]))
    });
    let result = run(
        vec![temp.path().to_path_buf()],
        backend,
        FixedDates::none(),
        &["gpt-4o-mini"],
        false,
    )
    .await;

    assert_eq!(result.reports.len(), 3);
    match &result.reports[1].outcome {
        FileOutcome::Failed { reason } => assert!(reason.contains("service unavailable")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(result.summary.renamed, 2);
    assert_eq!(result.summary.failed, 1);
    assert_eq!(
        file_names(temp.path()),
        ["IMG_0002.jpg", "harbor-0001.jpg", "harbor-0003.jpg"]
    );
}

#[tokio::test]
async fn existing_file_is_never_overwritten() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("two-cats.jpg"), "keep me").unwrap();
    photo(temp.path(), "IMG_0009.jpg");

    run(
        vec![temp.path().to_path_buf()],
        ScriptedBackend::always("two cats"),
        FixedDates::none(),
        &["gpt-4o-mini"],
        false,
    )
    .await;

    assert_eq!(file_names(temp.path()), ["two-cats-2.jpg", "two-cats.jpg"]);
    assert_eq!(fs::read_to_string(temp.path().join("two-cats.jpg")).unwrap(), "keep me");
}

#[tokio::test]
async fn non_camera_names_need_include_all() {
    let temp = tempdir().unwrap();
    photo(temp.path(), "holiday.jpg");

    let selector = FileSelector::new(vec![temp.path().to_path_buf()], SelectOptions::default());
    assert_eq!(selector.iter().count(), 0);
    let empty = selector.empty_directories();
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].ignored, vec![temp.path().join("holiday.jpg")]);

    let all = FileSelector::new(
        vec![temp.path().to_path_buf()],
        SelectOptions {
            recursive: false,
            include_all: true,
        },
    );
    assert_eq!(all.iter().count(), 1);
}

#[tokio::test]
async fn contentless_replies_fall_back_to_the_placeholder() {
    let temp = tempdir().unwrap();
    photo(temp.path(), "IMG_0001.jpg");
    photo(temp.path(), "IMG_0002.jpg");
    photo(temp.path(), "IMG_0003.jpg");

    let backend = ScriptedBackend::new(|content, _| {
        let reply = match content {
            "IMG_0001.jpg" => "",
            "IMG_0002.jpg" => "...",
            _ => "\"\"",
        };
        Some(reply.to_string())
    });
    let result = run(
        vec![temp.path().to_path_buf()],
        backend,
        FixedDates::none(),
        &["gpt-4o-mini"],
        false,
    )
    .await;

    assert_eq!(result.summary.renamed, 3);
    assert_eq!(result.summary.failed, 0);
    assert_eq!(file_names(temp.path()), ["image-2.jpg", "image-3.jpg", "image.jpg"]);
}

/// Flips the cancel flag from inside the first request it serves
struct CancellingBackend {
    calls: AtomicUsize,
    cancel: watch::Sender<bool>,
}

#[async_trait]
impl VisionBackend for CancellingBackend {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    async fn describe(&self, _image: &ImagePayload, _model: &str, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.cancel.send(true);
        Ok("Lighthouse at night".to_string())
    }
}

#[tokio::test]
async fn cancel_during_a_request_stops_queued_requests() {
    let temp = tempdir().unwrap();
    let source = photo(temp.path(), "IMG_0001.jpg");

    let (tx, rx) = watch::channel(false);
    let backend = Arc::new(CancellingBackend {
        calls: AtomicUsize::new(0),
        cancel: tx,
    });
    let models: Vec<String> = (1..=5).map(|i| format!("model-{}", i)).collect();
    let requester = DescriptionRequester::new(
        backend.clone(),
        models,
        vec!["Describe this image".to_string()],
        1,
    );
    let mut pipeline = Pipeline::new(
        FileSelector::new(vec![source.clone()], SelectOptions::default()),
        DateResolver::new(Arc::new(FixedDates::none())),
        requester,
        RenamePlanner::new(FilenameSynthesizer::new(72, "image"), Mode::Comparison),
        1,
    );

    let mut reports = Vec::new();
    pipeline.run(rx, |report| reports.push(report.clone())).await;

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    match &reports[0].outcome {
        FileOutcome::Compared { rows } => {
            assert_eq!(rows.len(), 5);
            assert_eq!(rows[0].outcome, Ok("lighthouse-at-night.jpg".to_string()));
            assert!(rows[1..]
                .iter()
                .all(|row| row.outcome == Err("cancelled".to_string())));
        }
        other => panic!("expected comparison, got {:?}", other),
    }
    assert!(source.exists());
}
