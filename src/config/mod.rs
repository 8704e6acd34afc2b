// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for tyrescan

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::media::ViewType;

const MIB: usize = 1024 * 1024;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Analysis backend
    pub backend: BackendConfig,

    /// Payload size ceilings
    #[serde(default)]
    pub limits: LimitConfig,

    /// Video frame sampling
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Frame quality gate
    #[serde(default)]
    pub quality_gate: QualityGateConfig,

    /// Which response schema the backend speaks
    #[serde(default)]
    pub schema_profile: SchemaProfile,

    /// Instruction pairs per view
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Web API settings
    #[serde(default)]
    pub web: WebConfig,

    /// Assessment history log
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Ollama-compatible vision model, instructions sent with the images
    #[default]
    Ollama,
    /// Remote analysis service that holds its own instructions
    Remote,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: usize,
    #[serde(default = "default_max_frame_set_bytes")]
    pub max_frame_set_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplerConfig {
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
    /// Fraction of native resolution kept per frame
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Fixed seed for reproducible timestamp selection
    #[serde(default)]
    pub seed: Option<u64>,
    /// Where clips are staged for the decoder; system temp dir when unset
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QualityGateConfig {
    #[serde(default = "default_min_frame_bytes")]
    pub min_frame_bytes: usize,
    /// Reject the whole view when a frame fails the gate
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchemaProfile {
    /// `{tyreSize: {...}}` / `{safety: {...}, explanations: {...}}`
    #[default]
    Nested,
    /// Older flat sidewall schema with the size fields at the top level
    LegacyFlat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Instructions {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_tread_prompts")]
    pub tread_view: Instructions,
    #[serde(default = "default_sidewall_prompts")]
    pub sidewall_view: Instructions,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_history_path")]
    pub path: String,
}

// Default value functions
fn default_model() -> String { "llava:13b".to_string() }
fn default_timeout() -> u64 { 25 }
fn default_max_image_bytes() -> usize { 4 * MIB }
fn default_max_video_bytes() -> usize { 50 * MIB }
fn default_max_frame_set_bytes() -> usize { 9 * MIB }
fn default_max_frames() -> usize { 10 }
fn default_scale() -> f32 { 0.25 }
fn default_jpeg_quality() -> u8 { 50 }
fn default_min_frame_bytes() -> usize { 2048 }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }
fn default_history_path() -> String { "tyrescan_history.jsonl".to_string() }

fn default_tread_prompts() -> Instructions {
    Instructions {
        system: "You are a tyre safety inspector. You will be shown photos or video frames of a \
                 tyre tread. Reply with exactly one JSON object of this shape and nothing after it:\n\
                 {\"safety\": {\"isSafeToDrive\": bool, \"visibleDamage\": bool, \
                 \"sufficientTread\": bool, \"unevenWear\": bool, \"needsReplacement\": bool}, \
                 \"explanations\": {\"safety\": string, \"damage\": string, \"tread\": string, \
                 \"wear\": string, \"replacement\": string}}\n\
                 Every explanation must be a non-empty sentence.".to_string(),
        user: "Inspect this tyre tread. Look for cuts, bulges, exposed cords, tread depth \
               relative to the wear indicators, and uneven wear across the width. \
               Decide whether it is safe to drive on and whether it needs replacing.".to_string(),
    }
}

fn default_sidewall_prompts() -> Instructions {
    Instructions {
        system: "You read tyre sidewall markings. Reply with exactly one JSON object of this \
                 shape and nothing after it:\n\
                 {\"tyreSize\": {\"width\": string, \"aspectRatio\": string, \
                 \"wheelDiameter\": string, \"fullSize\": string, \"isImageClear\": bool}}\n\
                 Use digits only for width, aspectRatio and wheelDiameter. If any of them cannot \
                 be read with certainty, use \"not available\" for all four size fields and set \
                 isImageClear to false.".to_string(),
        user: "Read the tyre size marking on this sidewall, for example 205/55R16.".to_string(),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                kind: BackendKind::Ollama,
                url: "http://localhost:11434".to_string(),
                model: default_model(),
                timeout_secs: default_timeout(),
            },
            limits: LimitConfig::default(),
            sampler: SamplerConfig::default(),
            quality_gate: QualityGateConfig::default(),
            schema_profile: SchemaProfile::default(),
            prompts: PromptConfig::default(),
            web: WebConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            max_video_bytes: default_max_video_bytes(),
            max_frame_set_bytes: default_max_frame_set_bytes(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_frames: default_max_frames(),
            scale: default_scale(),
            jpeg_quality: default_jpeg_quality(),
            seed: None,
            scratch_dir: None,
        }
    }
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_frame_bytes: default_min_frame_bytes(),
            strict: false,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            tread_view: default_tread_prompts(),
            sidewall_view: default_sidewall_prompts(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_history_path(),
        }
    }
}

impl PromptConfig {
    /// Instruction pair for a view
    pub fn for_view(&self, view: ViewType) -> &Instructions {
        match view {
            ViewType::TreadView => &self.tread_view,
            ViewType::SidewallView => &self.sidewall_view,
        }
    }
}

impl BackendConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::TyrescanError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let fail = |msg: &str| Err(crate::TyrescanError::Config(msg.to_string()));

        if self.backend.url.trim().is_empty() {
            return fail("backend.url must not be empty");
        }
        if self.backend.timeout_secs == 0 {
            return fail("backend.timeout_secs must be at least 1");
        }
        if self.sampler.max_frames == 0 {
            return fail("sampler.max_frames must be at least 1");
        }
        if !(self.sampler.scale > 0.0 && self.sampler.scale <= 1.0) {
            return fail("sampler.scale must be in (0, 1]");
        }
        if !(1..=100).contains(&self.sampler.jpeg_quality) {
            return fail("sampler.jpeg_quality must be in 1..=100");
        }
        if self.limits.max_image_bytes == 0
            || self.limits.max_video_bytes == 0
            || self.limits.max_frame_set_bytes == 0
        {
            return fail("limits must be non-zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.backend.deadline(), Duration::from_secs(25));
        assert_eq!(config.limits.max_image_bytes, 4 * MIB);
        assert_eq!(config.limits.max_video_bytes, 50 * MIB);
        assert_eq!(config.limits.max_frame_set_bytes, 9 * MIB);
        assert_eq!(config.sampler.scale, 0.25);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"backend": {"kind": "remote", "url": "https://example.test/analyze"}}"#,
        )
        .unwrap();
        assert_eq!(config.backend.kind, BackendKind::Remote);
        assert_eq!(config.backend.timeout_secs, 25);
        assert_eq!(config.schema_profile, SchemaProfile::Nested);
        assert!(config.prompts.sidewall_view.system.contains("not available"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.web.port, 8080);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.sampler.seed = Some(7);
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.sampler.seed, Some(7));
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        let mut config = AppConfig::default();
        config.sampler.scale = 0.0;
        assert_err!(config.validate());
        config.sampler.scale = 1.5;
        assert_err!(config.validate());
    }
}
