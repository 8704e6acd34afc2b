// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTTP API accepting tyre media uploads

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::assessment::AnalysisState;
use crate::config::AppConfig;
use crate::error::ErrorKind;
use crate::media::{MediaAsset, MediaKind, ViewType};
use crate::pipeline::{CompletionStatus, Pipeline, ViewRequest};
use crate::{Result, TyrescanError};

/// Shared application state
pub struct AppState {
    pub pipeline: Pipeline,
    pub config: AppConfig,
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Room for one video and one image plus multipart framing
    let body_limit = state.config.limits.max_video_bytes
        + state.config.limits.max_image_bytes
        + 1024 * 1024;

    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/analyze", post(api_analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn api_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backend": state.config.backend.kind,
        "model": state.config.backend.model,
    }))
}

/// Multipart upload: a part named `treadView` and/or `sidewallView`
async fn api_analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let requests = match read_requests(&mut multipart).await {
        Ok(requests) => requests,
        Err(e) => {
            let status = status_for(e.kind());
            return (status, Json(json!({"error": e.to_string(), "errorKind": e.kind()})));
        }
    };

    let report = state.pipeline.run(requests, AnalysisState::new()).await;

    let status = match (report.status(), &report.error) {
        (CompletionStatus::Failed, Some(e)) => status_for(e.kind()),
        _ => StatusCode::OK,
    };
    (status, Json(report.to_response()))
}

async fn read_requests(multipart: &mut Multipart) -> Result<Vec<ViewRequest>> {
    let mut requests = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TyrescanError::Input(format!("bad multipart body: {}", e)))?
    {
        let Some(view) = field.name().and_then(ViewType::parse) else {
            continue;
        };

        let kind = field
            .content_type()
            .and_then(MediaKind::from_mime)
            .or_else(|| field.file_name().and_then(|n| MediaKind::from_path(Path::new(n))))
            .ok_or_else(|| {
                TyrescanError::Input(format!("{}: cannot tell whether the upload is an image or a video", view))
            })?;

        let data = field
            .bytes()
            .await
            .map_err(|e| TyrescanError::Input(format!("{}: upload interrupted: {}", view, e)))?;

        requests.push(ViewRequest::new(view, MediaAsset::new(data.to_vec(), kind)));
    }

    Ok(requests)
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Input => StatusCode::BAD_REQUEST,
        ErrorKind::EmptyVideo | ErrorKind::Decode => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Upstream | ErrorKind::NoJsonFound | ErrorKind::Schema => StatusCode::BAD_GATEWAY,
    }
}

/// Start the web server with the configured pipeline
pub async fn start_server(config: AppConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(&config)?;
    let state = Arc::new(AppState {
        pipeline,
        config: config.clone(),
    });

    let addr = format!("{}:{}", config.web.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router).await
        .map_err(|e| TyrescanError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
