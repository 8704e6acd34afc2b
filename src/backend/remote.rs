// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Client for a remote analysis service that keeps its own instructions

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::AnalysisBackend;
use crate::media::MediaKind;
use crate::payload::AnalysisPayload;
use crate::{Result, TyrescanError};

pub struct RemoteClient {
    client: Client,
    url: String,
}

/// `{"content": "..."}` on success, `{"error": "..."}` on failure
#[derive(Deserialize)]
struct Envelope {
    content: Option<String>,
    error: Option<String>,
}

impl RemoteClient {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TyrescanError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    fn form(payload: &AnalysisPayload) -> Result<Form> {
        let mut form = Form::new()
            .text("viewType", payload.view.as_str())
            .text("mediaType", payload.media_type.as_str());

        match payload.media_type {
            MediaKind::Image => {
                let data = payload
                    .images
                    .first()
                    .ok_or_else(|| TyrescanError::Input("image payload without image".to_string()))?;
                form = form.part("file", jpeg_part(data.clone(), "image")?);
            }
            MediaKind::Video => {
                for (i, frame) in payload.images.iter().enumerate() {
                    form = form.part("frames", jpeg_part(frame.clone(), &format!("frame-{}", i))?);
                }
            }
        }

        Ok(form)
    }

    async fn post(&self, payload: &AnalysisPayload) -> Result<String> {
        debug!(
            "Posting {} {} payload to {}",
            payload.view,
            payload.media_type.as_str(),
            self.url
        );

        let response = self.client
            .post(&self.url)
            .multipart(Self::form(payload)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let envelope: Option<Envelope> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = envelope.and_then(|e| e.error).unwrap_or(body);
            return Err(TyrescanError::Upstream(format!(
                "analysis service returned {}: {}",
                status, message
            )));
        }

        match envelope {
            Some(Envelope { error: Some(error), .. }) => Err(TyrescanError::Upstream(error)),
            Some(Envelope { content: Some(content), .. }) => Ok(content),
            _ => Err(TyrescanError::Upstream("malformed response envelope".to_string())),
        }
    }
}

fn jpeg_part(data: Vec<u8>, name: &str) -> Result<Part> {
    let mime = match image::guess_format(&data) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    };
    Part::bytes(data)
        .file_name(name.to_string())
        .mime_str(mime)
        .map_err(|e| TyrescanError::Input(format!("bad part type: {}", e)))
}

#[async_trait]
impl AnalysisBackend for RemoteClient {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn analyze(&self, payload: &AnalysisPayload, cancel: CancellationToken) -> Result<String> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TyrescanError::Upstream("request cancelled".to_string())),
            result = self.post(payload) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::payload;
    use crate::media::ViewType;
    use axum::extract::Multipart;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/analyze", addr)
    }

    #[tokio::test]
    async fn test_video_payload_sends_all_frames() {
        let router = Router::new().route(
            "/analyze",
            post(|mut multipart: Multipart| async move {
                let mut names = Vec::new();
                while let Some(field) = multipart.next_field().await.unwrap() {
                    names.push(field.name().unwrap_or_default().to_string());
                }
                Json(json!({"content": names.join(",")}))
            }),
        );
        let url = serve(router).await;
        let client = RemoteClient::new(&url).unwrap();

        let mut video = payload(ViewType::TreadView);
        video.media_type = MediaKind::Video;
        video.images = vec![vec![1], vec![2], vec![3]];

        let text = client.analyze(&video, CancellationToken::new()).await.unwrap();
        assert_eq!(text, "viewType,mediaType,frames,frames,frames");
    }

    #[tokio::test]
    async fn test_error_envelope_is_upstream() {
        let router = Router::new().route(
            "/analyze",
            post(|| async {
                (StatusCode::BAD_GATEWAY, Json(json!({"error": "vision model overloaded"})))
            }),
        );
        let url = serve(router).await;
        let client = RemoteClient::new(&url).unwrap();

        let err = client
            .analyze(&payload(ViewType::SidewallView), CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            TyrescanError::Upstream(msg) => assert!(msg.contains("overloaded")),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_content_is_upstream() {
        let router = Router::new().route("/analyze", post(|| async { Json(json!({"result": 1})) }));
        let url = serve(router).await;
        let client = RemoteClient::new(&url).unwrap();

        let err = client
            .analyze(&payload(ViewType::SidewallView), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TyrescanError::Upstream(_)));
    }
}
