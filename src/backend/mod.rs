// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Analysis backends and the deadline-bound dispatcher

pub mod ollama;
pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BackendConfig, BackendKind};
use crate::payload::AnalysisPayload;
use crate::{Result, TyrescanError};

/// An external service that looks at images and answers in free text
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Submit one payload and return the raw reply text.
    ///
    /// Implementations should stop work once `cancel` fires.
    async fn analyze(&self, payload: &AnalysisPayload, cancel: CancellationToken) -> Result<String>;
}

/// Build the backend selected in config
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn AnalysisBackend>> {
    let backend: Arc<dyn AnalysisBackend> = match config.kind {
        BackendKind::Ollama => Arc::new(ollama::OllamaClient::new(&config.url, &config.model)?),
        BackendKind::Remote => Arc::new(remote::RemoteClient::new(&config.url)?),
    };
    Ok(backend)
}

/// Sends exactly one request per call, bounded by a deadline
pub struct Dispatcher {
    backend: Arc<dyn AnalysisBackend>,
    deadline: Duration,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn AnalysisBackend>, deadline: Duration) -> Self {
        Self { backend, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Dispatch a payload. No retries: the first failure is returned.
    pub async fn dispatch(&self, payload: &AnalysisPayload) -> Result<String> {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        debug!(
            "Dispatching {} to {} (deadline {:?})",
            payload.view,
            self.backend.name(),
            self.deadline
        );

        let outcome = tokio::select! {
            result = self.backend.analyze(payload, cancel.clone()) => result,
            _ = tokio::time::sleep(self.deadline) => {
                cancel.cancel();
                warn!("{} call for {} cancelled after {:?}", self.backend.name(), payload.view, self.deadline);
                return Err(TyrescanError::Timeout(self.deadline));
            }
        };

        match outcome {
            Ok(text) => {
                info!(
                    "{} answered for {} in {:?} ({} chars)",
                    self.backend.name(),
                    payload.view,
                    started.elapsed(),
                    text.len()
                );
                Ok(text)
            }
            Err(e) => Err(normalize(e)),
        }
    }
}

/// Everything but a timeout surfaces as an upstream failure
fn normalize(err: TyrescanError) -> TyrescanError {
    match err {
        TyrescanError::Upstream(_) | TyrescanError::Timeout(_) => err,
        other => TyrescanError::Upstream(other.to_string()),
    }
}
