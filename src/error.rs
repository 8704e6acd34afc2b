// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for tyrescan

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for tyrescan operations
pub type Result<T> = std::result::Result<T, TyrescanError>;

/// tyrescan error types
#[derive(Error, Debug)]
pub enum TyrescanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("{what} is {size} bytes, limit is {limit} bytes")]
    PayloadTooLarge {
        what: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("Video has no usable duration: {0}")]
    EmptyVideo(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Analysis backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Analysis backend error: {0}")]
    Upstream(String),

    #[error("No JSON object found in backend response")]
    NoJsonFound,

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TyrescanError {
    fn from(e: reqwest::Error) -> Self {
        TyrescanError::Upstream(e.to_string())
    }
}

/// Caller-facing classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Input,
    EmptyVideo,
    Decode,
    Timeout,
    Upstream,
    NoJsonFound,
    Schema,
}

impl TyrescanError {
    /// Classify this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            TyrescanError::Config(_)
            | TyrescanError::FileSystem(_)
            | TyrescanError::Input(_)
            | TyrescanError::PayloadTooLarge { .. } => ErrorKind::Input,
            TyrescanError::EmptyVideo(_) => ErrorKind::EmptyVideo,
            TyrescanError::Decode(_) | TyrescanError::Image(_) => ErrorKind::Decode,
            TyrescanError::Timeout(_) => ErrorKind::Timeout,
            TyrescanError::Upstream(_) => ErrorKind::Upstream,
            TyrescanError::NoJsonFound => ErrorKind::NoJsonFound,
            TyrescanError::Schema(_) | TyrescanError::Json(_) => ErrorKind::Schema,
        }
    }
}
