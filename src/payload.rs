// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Request payloads for the analysis backend

use tracing::debug;

use crate::config::{LimitConfig, PromptConfig};
use crate::media::{FrameSet, MediaAsset, MediaKind, ViewType};
use crate::{Result, TyrescanError};

/// Media that goes into one request
#[derive(Debug)]
pub enum PayloadMedia {
    Image(MediaAsset),
    Frames(FrameSet),
}

/// Everything the backend needs for one view
#[derive(Debug, Clone)]
pub struct AnalysisPayload {
    pub view: ViewType,
    pub media_type: MediaKind,
    /// Output contract
    pub system: String,
    /// What to look for
    pub user: String,
    /// Encoded images, in presentation order
    pub images: Vec<Vec<u8>>,
}

impl AnalysisPayload {
    pub fn total_bytes(&self) -> usize {
        self.images.iter().map(Vec::len).sum()
    }
}

pub struct PayloadBuilder {
    limits: LimitConfig,
    prompts: PromptConfig,
}

impl PayloadBuilder {
    pub fn new(limits: LimitConfig, prompts: PromptConfig) -> Self {
        Self { limits, prompts }
    }

    /// Fail fast if raw media is over its ceiling, before any decoding
    pub fn check_raw(&self, asset: &MediaAsset) -> Result<()> {
        let (what, limit) = match asset.kind() {
            MediaKind::Image => ("image", self.limits.max_image_bytes),
            MediaKind::Video => ("video", self.limits.max_video_bytes),
        };
        if asset.size() > limit {
            return Err(TyrescanError::PayloadTooLarge { what, size: asset.size(), limit });
        }
        Ok(())
    }

    /// Assemble the payload for one view
    pub fn build(&self, view: ViewType, media: PayloadMedia) -> Result<AnalysisPayload> {
        let instructions = self.prompts.for_view(view);

        let (media_type, images) = match media {
            PayloadMedia::Image(asset) => {
                if asset.kind() != MediaKind::Image {
                    return Err(TyrescanError::Input(format!(
                        "{} media supplied where an image was expected",
                        asset.kind().as_str()
                    )));
                }
                self.check_raw(&asset)?;
                if image::guess_format(asset.bytes()).is_err() {
                    return Err(TyrescanError::Input("image data is not a recognised format".to_string()));
                }
                (MediaKind::Image, vec![asset.into_bytes()])
            }
            PayloadMedia::Frames(frames) => {
                if frames.is_empty() {
                    return Err(TyrescanError::EmptyVideo("no frames were sampled".to_string()));
                }
                let size = frames.total_bytes();
                if size > self.limits.max_frame_set_bytes {
                    return Err(TyrescanError::PayloadTooLarge {
                        what: "frame set",
                        size,
                        limit: self.limits.max_frame_set_bytes,
                    });
                }
                let images = frames.into_frames().into_iter().map(|f| f.data).collect();
                (MediaKind::Video, images)
            }
        };

        let payload = AnalysisPayload {
            view,
            media_type,
            system: instructions.system.clone(),
            user: instructions.user.clone(),
            images,
        };
        debug!(
            "Built {} payload for {}: {} image(s), {} bytes",
            payload.media_type.as_str(),
            view,
            payload.images.len(),
            payload.total_bytes()
        );
        Ok(payload)
    }
}
