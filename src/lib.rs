// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! tyrescan: tyre assessment from photos and short clips
//!
//! Turns a tread view and/or a sidewall view (image or video) into a
//! structured assessment: a tyre size reading and, for tread, safety flags
//! with explanations. Video is sampled into a few downscaled keyframes,
//! everything is sent to a vision model backend under a deadline, and the
//! free-form answer is reduced to validated JSON.

pub mod assessment;
pub mod backend;
pub mod config;
pub mod error;
pub mod frames;
pub mod history;
pub mod media;
pub mod payload;
pub mod pipeline;
pub mod web;

pub use config::AppConfig;
pub use error::{ErrorKind, Result, TyrescanError};
pub use pipeline::{Pipeline, PipelineReport, ViewRequest};
