// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Per-view orchestration from media to committed results
//!
//! Views run strictly one after another. The first failing view stops the
//! run; results committed before it are kept and returned with the error.

use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use crate::assessment::{consistency, extract, schema, AnalysisResult, AnalysisState};
use crate::backend::{self, AnalysisBackend, Dispatcher};
use crate::config::{AppConfig, SchemaProfile};
use crate::frames::ffmpeg::FfmpegDecoder;
use crate::frames::quality::QualityGate;
use crate::frames::{FrameOrder, FrameSampler, RandomOrder, VideoDecoder};
use crate::media::{MediaAsset, MediaKind, ViewType};
use crate::payload::{PayloadBuilder, PayloadMedia};
use crate::{Result, TyrescanError};

/// One view to analyze
#[derive(Debug)]
pub struct ViewRequest {
    pub view: ViewType,
    pub media: MediaAsset,
    pub is_video: bool,
}

impl ViewRequest {
    pub fn new(view: ViewType, media: MediaAsset) -> Self {
        let is_video = media.kind() == MediaKind::Video;
        Self { view, media, is_video }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Every requested view committed
    AllCommitted,
    /// Some views committed before one failed
    PartiallyCommitted,
    /// Nothing committed in this run
    Failed,
}

/// Outcome of one invocation
#[derive(Debug)]
pub struct PipelineReport {
    pub state: AnalysisState,
    /// Views committed by this run, in order
    pub committed: Vec<ViewType>,
    pub failed_view: Option<ViewType>,
    pub error: Option<TyrescanError>,
}

impl PipelineReport {
    fn failed(state: AnalysisState, committed: Vec<ViewType>, view: Option<ViewType>, err: TyrescanError) -> Self {
        Self {
            state,
            committed,
            failed_view: view,
            error: Some(err),
        }
    }

    pub fn status(&self) -> CompletionStatus {
        match (&self.error, self.committed.is_empty()) {
            (None, _) => CompletionStatus::AllCommitted,
            (Some(_), false) => CompletionStatus::PartiallyCommitted,
            (Some(_), true) => CompletionStatus::Failed,
        }
    }

    /// Caller-facing JSON: results keyed by view, plus the error if any
    pub fn to_response(&self) -> Value {
        let mut body = serde_json::to_value(&self.state).unwrap_or_else(|_| json!({}));
        if let (Some(err), Some(obj)) = (&self.error, body.as_object_mut()) {
            obj.insert("error".to_string(), json!(err.to_string()));
            obj.insert("errorKind".to_string(), json!(err.kind()));
            if let Some(view) = self.failed_view {
                obj.insert("failedView".to_string(), json!(view));
            }
        }
        body
    }
}

/// The media-to-assessment pipeline
pub struct Pipeline {
    sampler: FrameSampler,
    gate: QualityGate,
    builder: PayloadBuilder,
    dispatcher: Dispatcher,
    schema_profile: SchemaProfile,
    seed: Option<u64>,
}

impl Pipeline {
    /// Pipeline with the configured backend and FFmpeg decoding
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backend = backend::from_config(&config.backend)?;
        Ok(Self::with_parts(config, backend, Arc::new(FfmpegDecoder::new())))
    }

    pub fn with_parts(
        config: &AppConfig,
        backend: Arc<dyn AnalysisBackend>,
        decoder: Arc<dyn VideoDecoder>,
    ) -> Self {
        Self {
            sampler: FrameSampler::new(decoder, &config.sampler),
            gate: QualityGate::new(&config.quality_gate),
            builder: PayloadBuilder::new(config.limits.clone(), config.prompts.clone()),
            dispatcher: Dispatcher::new(backend, config.backend.deadline()),
            schema_profile: config.schema_profile,
            seed: config.sampler.seed,
        }
    }

    /// Run every requested view, committing into `state` as views succeed
    pub async fn run(&self, requests: Vec<ViewRequest>, state: AnalysisState) -> PipelineReport {
        let mut order = RandomOrder::from_config(self.seed);
        self.run_with_order(requests, state, &mut order).await
    }

    /// Like [`Pipeline::run`] with an explicit frame order
    pub async fn run_with_order(
        &self,
        requests: Vec<ViewRequest>,
        mut state: AnalysisState,
        order: &mut dyn FrameOrder,
    ) -> PipelineReport {
        if let Err(e) = self.preflight(&requests) {
            error!("Rejected request: {}", e);
            return PipelineReport::failed(state, Vec::new(), None, e);
        }

        let mut committed = Vec::with_capacity(requests.len());
        for request in requests {
            let view = request.view;
            info!("Running {} ({}, {} bytes)", view, request.media.kind().as_str(), request.media.size());

            match self.analyze_view(request, order).await {
                Ok(result) => {
                    state.commit(view, result);
                    committed.push(view);
                    info!("Committed {}", view);
                }
                Err(e) => {
                    error!("{} failed: {}", view, e);
                    return PipelineReport::failed(state, committed, Some(view), e);
                }
            }
        }

        PipelineReport {
            state,
            committed,
            failed_view: None,
            error: None,
        }
    }

    /// Reject ill-formed requests before any decoding or network use
    fn preflight(&self, requests: &[ViewRequest]) -> Result<()> {
        if requests.is_empty() {
            return Err(TyrescanError::Input("no media supplied".to_string()));
        }

        let mut seen = HashSet::new();
        for request in requests {
            if !seen.insert(request.view) {
                return Err(TyrescanError::Input(format!("{} requested more than once", request.view)));
            }
            if request.media.size() == 0 {
                return Err(TyrescanError::Input(format!("{}: media is empty", request.view)));
            }
            let declared = if request.is_video { MediaKind::Video } else { MediaKind::Image };
            if declared != request.media.kind() {
                return Err(TyrescanError::Input(format!(
                    "{}: declared {} but media is {}",
                    request.view,
                    declared.as_str(),
                    request.media.kind().as_str()
                )));
            }
            self.builder.check_raw(&request.media)?;
        }

        Ok(())
    }

    async fn analyze_view(&self, request: ViewRequest, order: &mut dyn FrameOrder) -> Result<AnalysisResult> {
        let view = request.view;

        let media = match request.media.kind() {
            MediaKind::Image => PayloadMedia::Image(request.media),
            MediaKind::Video => {
                let frames = self.sampler.sample(&request.media, order).await?;
                self.gate.screen(&frames)?;
                PayloadMedia::Frames(frames)
            }
        };

        let payload = self.builder.build(view, media)?;
        let raw = self.dispatcher.dispatch(&payload).await?;
        let json = extract::extract_json(&raw)?;
        let result = schema::validate(view, &json, self.schema_profile)?;

        Ok(consistency::enforce_result(result))
    }
}
