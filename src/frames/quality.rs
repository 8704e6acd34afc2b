// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Cheap screening of sampled frames before they are sent anywhere

use tracing::warn;

use crate::config::QualityGateConfig;
use crate::media::FrameSet;
use crate::{Result, TyrescanError};

/// Anything shorter cannot hold a header plus pixel data
const MIN_STRUCTURAL_BYTES: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

pub struct QualityGate {
    min_frame_bytes: usize,
    strict: bool,
}

impl QualityGate {
    pub fn new(settings: &QualityGateConfig) -> Self {
        Self {
            min_frame_bytes: settings.min_frame_bytes,
            strict: settings.strict,
        }
    }

    /// Judge one encoded frame
    pub fn inspect(&self, data: &[u8]) -> Verdict {
        if data.len() < MIN_STRUCTURAL_BYTES {
            return Verdict::Reject(format!("truncated payload ({} bytes)", data.len()));
        }
        if image::guess_format(data).is_err() {
            return Verdict::Reject("not a recognisable image".to_string());
        }
        if data.len() < self.min_frame_bytes {
            return Verdict::Reject(format!(
                "{} bytes is below the {} byte minimum",
                data.len(),
                self.min_frame_bytes
            ));
        }
        Verdict::Accept
    }

    /// Screen a frame set, returning how many frames were rejected.
    ///
    /// Rejections are only logged unless the gate is strict, in which case
    /// the first rejection is an error.
    pub fn screen(&self, frames: &FrameSet) -> Result<usize> {
        let mut rejected = 0;
        for frame in frames.frames() {
            if let Verdict::Reject(reason) = self.inspect(&frame.data) {
                if self.strict {
                    return Err(TyrescanError::Input(format!(
                        "frame at {:.2}s rejected: {}",
                        frame.timestamp, reason
                    )));
                }
                warn!("Low quality frame at {:.2}s: {}", frame.timestamp, reason);
                rejected += 1;
            }
        }
        Ok(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{downscale_and_encode, tests::noise_png};
    use crate::media::Frame;

    fn gate(strict: bool) -> QualityGate {
        QualityGate::new(&QualityGateConfig { min_frame_bytes: 2048, strict })
    }

    #[test]
    fn test_rejects_short_and_garbage() {
        let gate = gate(false);
        assert!(matches!(gate.inspect(&[0xFF, 0xD8, 0xFF]), Verdict::Reject(_)));
        assert!(matches!(gate.inspect(&[0x42; 4096]), Verdict::Reject(_)));
    }

    #[test]
    fn test_accepts_real_frame() {
        let jpeg = downscale_and_encode(&noise_png(256, 256), 1.0, 90).unwrap();
        assert_eq!(gate(false).inspect(&jpeg), Verdict::Accept);
    }

    #[test]
    fn test_lenient_screen_counts_rejections() {
        let frames = FrameSet::new(vec![
            Frame { timestamp: 0.5, data: vec![0; 10] },
            Frame { timestamp: 1.5, data: downscale_and_encode(&noise_png(256, 256), 1.0, 90).unwrap() },
        ]);
        assert_eq!(gate(false).screen(&frames).unwrap(), 1);
    }

    #[test]
    fn test_strict_screen_fails() {
        let frames = FrameSet::new(vec![Frame { timestamp: 0.5, data: vec![0; 10] }]);
        assert!(matches!(gate(true).screen(&frames), Err(TyrescanError::Input(_))));
    }
}
