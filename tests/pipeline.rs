// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-to-end pipeline runs against an in-process backend and decoder

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use tyrescan::assessment::AnalysisState;
use tyrescan::backend::AnalysisBackend;
use tyrescan::frames::{FixedOrder, VideoDecoder, VideoInfo};
use tyrescan::media::{MediaAsset, MediaKind, ViewType};
use tyrescan::payload::AnalysisPayload;
use tyrescan::pipeline::{CompletionStatus, Pipeline, ViewRequest};
use tyrescan::{AppConfig, ErrorKind, Result};

const TREAD_REPLY: &str = r#"Sure! Here is my assessment:
```json
{"safety": {"isSafeToDrive": true, "visibleDamage": false, "sufficientTread": true,
 "unevenWear": false, "needsReplacement": false},
 "explanations": {"safety": "No defects seen.", "damage": "None.", "tread": "About 5mm.",
 "wear": "Even.", "replacement": "Not needed."}}
```
Drive safely."#;

const SIDEWALL_REPLY: &str = r#"{"tyreSize": {"width": "225", "aspectRatio": "45",
    "wheelDiameter": "17", "fullSize": "225/45R17", "isImageClear": true}}"#;

fn noise_png(width: u32, height: u32) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    let img = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut buffer = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

enum Step {
    Reply(&'static str),
    Hang,
}

/// Backend answering from a script, recording what it was sent
struct ScriptBackend {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<(ViewType, MediaKind, usize)>>,
}

impl ScriptBackend {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(ViewType, MediaKind, usize)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisBackend for ScriptBackend {
    fn name(&self) -> &'static str {
        "script"
    }

    async fn analyze(&self, payload: &AnalysisPayload, cancel: CancellationToken) -> Result<String> {
        self.seen
            .lock()
            .unwrap()
            .push((payload.view, payload.media_type, payload.images.len()));

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(text.to_string()),
            Some(Step::Hang) | None => {
                cancel.cancelled().await;
                Ok(String::new())
            }
        }
    }
}

/// Decoder reporting a fixed duration, recording requested timestamps
struct ClipDecoder {
    duration: f64,
    timestamps: Mutex<Vec<f64>>,
}

impl ClipDecoder {
    fn new(duration: f64) -> Arc<Self> {
        Arc::new(Self {
            duration,
            timestamps: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl VideoDecoder for ClipDecoder {
    async fn probe(&self, path: &Path) -> Result<VideoInfo> {
        assert!(path.exists(), "clip must be materialized while sampling");
        Ok(VideoInfo {
            duration_secs: self.duration,
            width: 256,
            height: 192,
        })
    }

    async fn frame_at(&self, _path: &Path, timestamp: f64) -> Result<Vec<u8>> {
        self.timestamps.lock().unwrap().push(timestamp);
        Ok(noise_png(256, 192))
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.backend.timeout_secs = 1;
    config
}

fn image(view: ViewType) -> ViewRequest {
    ViewRequest::new(view, MediaAsset::new(noise_png(32, 32), MediaKind::Image))
}

fn clip(view: ViewType) -> ViewRequest {
    ViewRequest::new(view, MediaAsset::new(b"\x00\x00\x00\x18ftypmp42 not really".to_vec(), MediaKind::Video))
}

#[tokio::test]
async fn test_video_sidewall_sampled_and_committed() {
    let backend = ScriptBackend::new(vec![Step::Reply(SIDEWALL_REPLY)]);
    let decoder = ClipDecoder::new(3.7);
    let pipeline = Pipeline::with_parts(&config(), backend.clone(), decoder.clone());

    // floor(3.7) = 3 candidates; identity order keeps all of them
    let mut order = FixedOrder(vec![0, 1, 2]);
    let report = pipeline
        .run_with_order(vec![clip(ViewType::SidewallView)], AnalysisState::new(), &mut order)
        .await;

    assert_eq!(report.status(), CompletionStatus::AllCommitted);
    assert_eq!(backend.seen(), vec![(ViewType::SidewallView, MediaKind::Video, 3)]);

    let timestamps = decoder.timestamps.lock().unwrap().clone();
    assert_eq!(timestamps.len(), 3);
    assert!(timestamps.iter().all(|&t| (0.0..3.7).contains(&t)));

    let size = report.state.get(ViewType::SidewallView).unwrap().tyre_size.clone().unwrap();
    assert_eq!(size.full_size.as_str(), "225/45R17");
}

#[tokio::test]
async fn test_timeout_keeps_earlier_commit() {
    let backend = ScriptBackend::new(vec![Step::Reply(SIDEWALL_REPLY), Step::Hang]);
    let pipeline = Pipeline::with_parts(&config(), backend.clone(), ClipDecoder::new(5.0));

    let started = Instant::now();
    let report = pipeline
        .run(vec![image(ViewType::SidewallView), image(ViewType::TreadView)], AnalysisState::new())
        .await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.status(), CompletionStatus::PartiallyCommitted);
    assert_eq!(report.committed, vec![ViewType::SidewallView]);
    assert_eq!(report.failed_view, Some(ViewType::TreadView));
    assert_eq!(report.error.as_ref().map(|e| e.kind()), Some(ErrorKind::Timeout));
    assert!(!report.state.is_committed(ViewType::TreadView));

    let body = report.to_response();
    assert_eq!(body["errorKind"], "timeout");
    assert_eq!(body["sidewallView"]["tyreSize"]["wheelDiameter"], "17");
}

#[tokio::test]
async fn test_prior_state_survives_failed_run() {
    let first = Pipeline::with_parts(
        &config(),
        ScriptBackend::new(vec![Step::Reply(TREAD_REPLY)]),
        ClipDecoder::new(5.0),
    );
    let report = first.run(vec![image(ViewType::TreadView)], AnalysisState::new()).await;
    assert_eq!(report.status(), CompletionStatus::AllCommitted);

    let second = Pipeline::with_parts(
        &config(),
        ScriptBackend::new(vec![Step::Reply("I cannot see a tyre in this picture.")]),
        ClipDecoder::new(5.0),
    );
    let report = second.run(vec![image(ViewType::SidewallView)], report.state).await;

    assert_eq!(report.status(), CompletionStatus::Failed);
    assert_eq!(report.error.as_ref().map(|e| e.kind()), Some(ErrorKind::NoJsonFound));
    let tread = report.state.get(ViewType::TreadView).unwrap();
    assert!(tread.safety.unwrap().is_safe_to_drive);
    assert_eq!(tread.explanations.as_ref().unwrap().tread, "About 5mm.");
}

#[tokio::test]
async fn test_oversized_image_never_reaches_backend() {
    let mut config = config();
    config.limits.max_image_bytes = 64;
    let backend = ScriptBackend::new(vec![Step::Reply(SIDEWALL_REPLY)]);
    let pipeline = Pipeline::with_parts(&config, backend.clone(), ClipDecoder::new(5.0));

    let report = pipeline.run(vec![image(ViewType::SidewallView)], AnalysisState::new()).await;

    assert_eq!(report.error.as_ref().map(|e| e.kind()), Some(ErrorKind::Input));
    assert!(backend.seen().is_empty());
    assert!(report.state.is_empty());
}

#[tokio::test]
async fn test_partial_size_reading_collapses() {
    let reply = r#"{"tyreSize": {"width": "225", "aspectRatio": "45",
        "wheelDiameter": null, "fullSize": "225/45R?", "isImageClear": true}}"#;
    let backend = ScriptBackend::new(vec![Step::Reply(reply)]);
    let pipeline = Pipeline::with_parts(&config(), backend, ClipDecoder::new(5.0));

    let report = pipeline.run(vec![image(ViewType::SidewallView)], AnalysisState::new()).await;

    assert_eq!(report.status(), CompletionStatus::AllCommitted);
    let body = report.to_response();
    let size = &body["sidewallView"]["tyreSize"];
    for field in ["width", "aspectRatio", "wheelDiameter", "fullSize"] {
        assert_eq!(size[field], "not available", "{}", field);
    }
    assert_eq!(size["isImageClear"], false);
}

#[tokio::test]
async fn test_short_clip_is_empty_video() {
    let backend = ScriptBackend::new(vec![Step::Reply(SIDEWALL_REPLY)]);
    let pipeline = Pipeline::with_parts(&config(), backend.clone(), ClipDecoder::new(0.6));

    let report = pipeline.run(vec![clip(ViewType::TreadView)], AnalysisState::new()).await;

    assert_eq!(report.error.as_ref().map(|e| e.kind()), Some(ErrorKind::EmptyVideo));
    assert!(backend.seen().is_empty());
}
