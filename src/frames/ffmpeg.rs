// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Video decoding through the FFmpeg command line tools

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{VideoDecoder, VideoInfo};
use crate::{Result, TyrescanError};

/// Decoder backed by `ffprobe` and `ffmpeg` on the PATH
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Check if FFmpeg is available
    pub async fn available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Pull duration and resolution out of `ffprobe -print_format json` output
pub fn parse_probe(json: &Value) -> Result<VideoInfo> {
    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| TyrescanError::Decode("ffprobe reported no streams".to_string()))?;

    let video_stream = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        .ok_or_else(|| TyrescanError::Decode("no video stream".to_string()))?;

    let width = dimension(video_stream.get("width"));
    let height = dimension(video_stream.get("height"));

    // Container duration first, stream duration when that is absent or "N/A"
    let duration_secs = seconds(json.get("format").and_then(|f| f.get("duration")))
        .or_else(|| seconds(video_stream.get("duration")))
        .unwrap_or(0.0);

    Ok(VideoInfo { duration_secs, width, height })
}

/// ffprobe writes durations as strings; anything not a positive finite number is unusable
fn seconds(value: Option<&Value>) -> Option<f64> {
    let secs = match value? {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

fn dimension(value: Option<&Value>) -> u32 {
    value
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let output = Command::new("ffprobe")
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TyrescanError::Decode(format!("Failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(TyrescanError::Decode("asset cannot be opened as video".to_string()));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| TyrescanError::Decode(format!("unreadable ffprobe output: {}", e)))?;

        parse_probe(&json)
    }

    async fn frame_at(&self, path: &Path, timestamp: f64) -> Result<Vec<u8>> {
        debug!("Decoding frame at {:.3}s", timestamp);

        let output = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel", "error",
                "-ss", &format!("{:.3}", timestamp),
                "-i",
            ])
            .arg(path)
            .args([
                "-frames:v", "1",
                "-f", "image2pipe",
                "-vcodec", "png",
                "pipe:1",
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TyrescanError::Decode(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TyrescanError::Decode(format!(
                "FFmpeg failed at {:.3}s: {}",
                timestamp,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(TyrescanError::Decode(format!("no frame at {:.3}s", timestamp)));
        }

        Ok(output.stdout)
    }
}
