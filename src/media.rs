// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Media assets, views and frame sets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::Result;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif", "heic", "heif", "avif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov", "wmv", "flv", "m4v", "3gp"];

/// Which side of the tyre is being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewType {
    TreadView,
    SidewallView,
}

impl ViewType {
    pub const ALL: [ViewType; 2] = [ViewType::TreadView, ViewType::SidewallView];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::TreadView => "treadView",
            ViewType::SidewallView => "sidewallView",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Guess the kind from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Guess the kind from a MIME type such as `video/mp4`
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split('/').next()? {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// A captured photo or clip. Immutable once created.
#[derive(Clone)]
pub struct MediaAsset {
    data: Vec<u8>,
    kind: MediaKind,
}

impl MediaAsset {
    pub fn new(data: Vec<u8>, kind: MediaKind) -> Self {
        Self { data, kind }
    }

    /// Read an asset from disk, inferring its kind from the extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let kind = MediaKind::from_path(path).ok_or_else(|| {
            crate::TyrescanError::Input(format!("Unsupported media file: {}", path.display()))
        })?;
        let data = std::fs::read(path)?;
        Ok(Self::new(data, kind))
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Content hash used to identify the asset in logs and history
    pub fn digest(&self) -> String {
        blake3::hash(&self.data).to_hex().to_string()
    }
}

impl fmt::Debug for MediaAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaAsset")
            .field("kind", &self.kind)
            .field("size", &self.data.len())
            .finish()
    }
}

/// One still sampled from a video, already encoded
#[derive(Clone, PartialEq)]
pub struct Frame {
    /// Source position in seconds
    pub timestamp: f64,
    pub data: Vec<u8>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Frames sampled from one video, in ascending timestamp order
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    frames: Vec<Frame>,
}

impl FrameSet {
    pub fn new(mut frames: Vec<Frame>) -> Self {
        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.timestamp).collect()
    }

    /// Combined encoded size of all frames
    pub fn total_bytes(&self) -> usize {
        self.frames.iter().map(|f| f.data.len()).sum()
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_view_type_names() {
        assert_eq!(serde_json::to_string(&ViewType::TreadView).unwrap(), "\"treadView\"");
        assert_eq!(ViewType::parse("sidewallView"), Some(ViewType::SidewallView));
        assert_eq!(ViewType::parse("frontView"), None);
    }

    #[test]
    fn test_kind_from_path_and_mime() {
        assert_eq!(MediaKind::from_path(&PathBuf::from("tyre.JPG")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(&PathBuf::from("clip.mov")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(&PathBuf::from("notes.txt")), None);
        assert_eq!(MediaKind::from_mime("video/quicktime"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_frame_set_sorted_by_timestamp() {
        let set = FrameSet::new(vec![
            Frame { timestamp: 2.5, data: vec![0; 3] },
            Frame { timestamp: 0.5, data: vec![0; 4] },
        ]);
        assert_eq!(set.timestamps(), vec![0.5, 2.5]);
        assert_eq!(set.total_bytes(), 7);
    }

    #[test]
    fn test_asset_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("side.png");
        std::fs::write(&path, b"data").unwrap();

        let asset = MediaAsset::from_file(&path).unwrap();
        assert_eq!(asset.kind(), MediaKind::Image);
        assert_eq!(asset.size(), 4);
        assert_eq!(asset.digest().len(), 64);
    }
}
