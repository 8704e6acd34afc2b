// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Bounded frame sampling from video assets
//!
//! Candidate timestamps are spread evenly over the clip, a frame order picks
//! which of them are kept, and the kept frames are returned in timestamp
//! order. Each kept frame is downscaled and re-encoded to bound payload size.

pub mod ffmpeg;
pub mod quality;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SamplerConfig;
use crate::media::{Frame, FrameSet, MediaAsset, MediaKind};
use crate::{Result, TyrescanError};

/// Basic facts about a video stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Source of decoded stills
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    /// Read duration and native resolution
    async fn probe(&self, path: &Path) -> Result<VideoInfo>;

    /// Decode the frame nearest `timestamp` as an encoded still image
    async fn frame_at(&self, path: &Path, timestamp: f64) -> Result<Vec<u8>>;
}

/// Decides which candidate timestamps are kept
pub trait FrameOrder: Send {
    /// `n` distinct indices from `0..len`, with `n <= len`
    fn choose(&mut self, len: usize, n: usize) -> Vec<usize>;
}

/// Shuffled selection, OS-seeded or reproducible from a seed
pub struct RandomOrder {
    rng: StdRng,
}

impl RandomOrder {
    pub fn from_os_rng() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Seeded when a seed is configured, random otherwise
    pub fn from_config(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_os_rng(),
        }
    }
}

impl FrameOrder for RandomOrder {
    fn choose(&mut self, len: usize, n: usize) -> Vec<usize> {
        index::sample(&mut self.rng, len, n).into_vec()
    }
}

/// Caller-supplied indices; the first `n` are used
pub struct FixedOrder(pub Vec<usize>);

impl FrameOrder for FixedOrder {
    fn choose(&mut self, _len: usize, n: usize) -> Vec<usize> {
        self.0.iter().copied().take(n).collect()
    }
}

/// Pick the timestamps to decode for a clip of `duration` seconds.
///
/// Returns at most `min(max_frames, floor(duration))` timestamps in
/// `(0, duration]`, ascending. Only the kept candidates are ever computed, so
/// the cost does not depend on the duration a container header claims.
pub fn plan_timestamps(duration: f64, max_frames: usize, order: &mut dyn FrameOrder) -> Result<Vec<f64>> {
    if !duration.is_finite() || duration < 1.0 {
        return Err(TyrescanError::EmptyVideo(format!("duration {:.3}s is under one second", duration)));
    }

    let whole = duration.floor();
    // Saturates for absurd durations
    let candidates = whole as usize;
    let n = max_frames.min(candidates);
    if n == 0 {
        return Err(TyrescanError::EmptyVideo("no frames requested".to_string()));
    }

    let picks = order.choose(candidates, n);
    if !is_selection(&picks, candidates, n) {
        return Err(TyrescanError::Input(format!(
            "frame order must pick {} distinct indices below {}",
            n, candidates
        )));
    }

    let mut kept: Vec<f64> = picks
        .iter()
        .map(|&i| duration * ((i as f64 + 1.0) / (whole + 1.0)))
        .collect();
    kept.sort_by(f64::total_cmp);
    // Neighbouring candidates can round to the same instant on very long clips
    kept.dedup();
    Ok(kept)
}

fn is_selection(indices: &[usize], len: usize, n: usize) -> bool {
    if indices.len() != n || indices.iter().any(|&i| i >= len) {
        return false;
    }
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).all(|w| w[0] != w[1])
}

/// Shrink an encoded still to `scale` of its size and re-encode as JPEG
pub fn downscale_and_encode(encoded: &[u8], scale: f32, quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(encoded)?;

    let width = ((img.width() as f32 * scale).round() as u32).max(1);
    let height = ((img.height() as f32 * scale).round() as u32).max(1);
    let small = img.resize_exact(width, height, FilterType::Triangle).to_rgb8();

    let mut buffer = Vec::new();
    small.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;

    Ok(buffer)
}

/// Samples frames from video assets
pub struct FrameSampler {
    decoder: Arc<dyn VideoDecoder>,
    scratch_dir: PathBuf,
    max_frames: usize,
    scale: f32,
    jpeg_quality: u8,
}

impl FrameSampler {
    pub fn new(decoder: Arc<dyn VideoDecoder>, settings: &SamplerConfig) -> Self {
        Self {
            decoder,
            scratch_dir: settings.scratch_dir.clone().unwrap_or_else(std::env::temp_dir),
            max_frames: settings.max_frames,
            scale: settings.scale,
            jpeg_quality: settings.jpeg_quality,
        }
    }

    /// Sample a frame set from a video asset.
    ///
    /// The asset is staged in a temporary file for the decoder; the file is
    /// removed when this call returns, whether sampling succeeded or not.
    pub async fn sample(&self, asset: &MediaAsset, order: &mut dyn FrameOrder) -> Result<FrameSet> {
        if asset.kind() != MediaKind::Video {
            return Err(TyrescanError::Input("frame sampling needs a video asset".to_string()));
        }

        let scratch = self.stage(asset)?;
        self.sample_file(scratch.path(), order).await
    }

    /// Copy the clip into a scratch file the decoder can open
    fn stage(&self, asset: &MediaAsset) -> Result<tempfile::NamedTempFile> {
        let staging_failed =
            |e: std::io::Error| TyrescanError::Decode(format!("could not stage video in {}: {}", self.scratch_dir.display(), e));

        let mut scratch = tempfile::Builder::new()
            .prefix("tyrescan-")
            .suffix(".video")
            .tempfile_in(&self.scratch_dir)
            .map_err(staging_failed)?;
        scratch.write_all(asset.bytes()).map_err(staging_failed)?;
        scratch.flush().map_err(staging_failed)?;
        Ok(scratch)
    }

    async fn sample_file(&self, path: &Path, order: &mut dyn FrameOrder) -> Result<FrameSet> {
        let info = self.decoder.probe(path).await?;
        debug!(
            "Video probe: {:.2}s at {}x{}",
            info.duration_secs, info.width, info.height
        );

        let timestamps = plan_timestamps(info.duration_secs, self.max_frames, order)?;

        let mut frames = Vec::with_capacity(timestamps.len());
        for timestamp in timestamps {
            let raw = self.decoder.frame_at(path, timestamp).await?;
            let (scale, quality) = (self.scale, self.jpeg_quality);
            let data = tokio::task::spawn_blocking(move || downscale_and_encode(&raw, scale, quality))
                .await
                .map_err(|e| TyrescanError::Decode(format!("frame encoder task failed: {}", e)))?
                .map_err(|e| TyrescanError::Decode(format!("frame at {:.2}s: {}", timestamp, e)))?;
            frames.push(Frame { timestamp, data });
        }

        let set = FrameSet::new(frames);
        info!("Sampled {} frames ({} bytes)", set.len(), set.total_bytes());
        Ok(set)
    }
}
