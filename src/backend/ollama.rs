// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama API client for vision-model analysis

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::AnalysisBackend;
use crate::payload::AnalysisPayload;
use crate::{Result, TyrescanError};

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TyrescanError::Config(format!("Failed to create HTTP client: {}", e)))?;

        // Normalize URL
        let base_url = base_url
            .trim_end_matches('/')
            .replace("/api/generate", "")
            .replace("/api/chat", "");

        Ok(Self {
            client,
            base_url,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                TyrescanError::Upstream(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check if the configured model is available
    pub async fn model_available(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| {
            m.starts_with(&self.model) || m == &format!("{}:latest", self.model)
        }))
    }

    async fn generate(&self, payload: &AnalysisPayload) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let images = payload
            .images
            .iter()
            .map(|img| general_purpose::STANDARD.encode(img))
            .collect();

        let request = GenerateRequest {
            model: &self.model,
            system: &payload.system,
            prompt: &payload.user,
            stream: false,
            images,
        };

        debug!(
            "Sending vision request to Ollama: model={}, images={}",
            self.model,
            payload.images.len()
        );

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(TyrescanError::Upstream(format!(
                "Ollama returned status {}: {}",
                status, message
            )));
        }

        let result: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| TyrescanError::Upstream(format!("Malformed Ollama envelope: {}", e)))?;
        Ok(result.response)
    }
}

#[async_trait]
impl AnalysisBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn analyze(&self, payload: &AnalysisPayload, cancel: CancellationToken) -> Result<String> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TyrescanError::Upstream("request cancelled".to_string())),
            result = self.generate(payload) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::payload;
    use crate::media::ViewType;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_url_normalization() {
        let client = OllamaClient::new("http://localhost:11434/api/generate/", "llava").unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_generate_sends_system_prompt_and_images() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["system"], "system");
                assert_eq!(body["prompt"], "user");
                assert_eq!(body["stream"], false);
                assert_eq!(body["images"][0], "AQID");
                Json(json!({"response": "Sure: {\"ok\": true}", "done": true}))
            }),
        );
        let url = serve(router).await;
        let client = OllamaClient::new(&url, "llava").unwrap();

        let text = client
            .analyze(&payload(ViewType::TreadView), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "Sure: {\"ok\": true}");
    }

    #[tokio::test]
    async fn test_error_status_is_upstream() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async {
                (StatusCode::NOT_FOUND, Json(json!({"error": "model 'llava' not found"})))
            }),
        );
        let url = serve(router).await;
        let client = OllamaClient::new(&url, "llava").unwrap();

        let err = client
            .analyze(&payload(ViewType::TreadView), CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            TyrescanError::Upstream(msg) => assert!(msg.contains("not found")),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_upstream() {
        let router = Router::new().route("/api/generate", post(|| async { "not json" }));
        let url = serve(router).await;
        let client = OllamaClient::new(&url, "llava").unwrap();

        let err = client
            .analyze(&payload(ViewType::SidewallView), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TyrescanError::Upstream(_)));
    }
}
