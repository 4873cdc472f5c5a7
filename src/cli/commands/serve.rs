//! HTTP API server for integration with other systems.
//!
//! Exposes the pipeline over REST: full generation runs and research-only runs.

use crate::cli::Output;
use crate::config::{parse_override, Settings};
use crate::orchestrator::Pipeline;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared application state.
struct AppState {
    config_path: Option<PathBuf>,
    base_overrides: Vec<(String, toml::Value)>,
    pipeline: Pipeline,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: &str,
    port: u16,
    config_path: Option<PathBuf>,
    base_overrides: Vec<(String, toml::Value)>,
    settings: Settings,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(settings)?;

    let state = Arc::new(AppState {
        config_path,
        base_overrides,
        pipeline,
    });

    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Reelsmith API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Config", "GET  /config");
    Output::kv("Generate", "POST /generate");
    Output::kv("Research", "POST /research");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/config", get(config))
        .route("/generate", post(generate))
        .route("/research", post(research))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct GenerateRequest {
    topic: String,
    /// Dot-notation config overrides for this run only.
    #[serde(default)]
    overrides: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ResearchRequest {
    topic: String,
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.pipeline.settings().clone())
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> impl IntoResponse {
    if req.topic.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "topic must not be empty");
    }

    info!(topic = %req.topic, overrides = req.overrides.len(), "Generate request");

    let result = if req.overrides.is_empty() {
        state.pipeline.run(&req.topic).await
    } else {
        let pipeline = match pipeline_with_overrides(&state, &req.overrides) {
            Ok(pipeline) => pipeline,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        };
        pipeline.run(&req.topic).await
    };

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result)).into_response()
}

async fn research(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResearchRequest>,
) -> impl IntoResponse {
    if req.topic.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "topic must not be empty");
    }

    match state.pipeline.research(&req.topic).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Build a one-off pipeline with request overrides on top of the server's own.
fn pipeline_with_overrides(
    state: &AppState,
    overrides: &HashMap<String, serde_json::Value>,
) -> crate::Result<Pipeline> {
    let mut all = state.base_overrides.clone();
    for (key, value) in overrides {
        let value = match value {
            serde_json::Value::String(s) => parse_override(&format!("{}={}", key, s))?.1,
            other => toml::Value::try_from(other).map_err(|e| {
                crate::ReelsmithError::Config(format!("Override '{}' is not representable: {}", key, e))
            })?,
        };
        all.push((key.clone(), value));
    }
    let settings = Settings::load_with_overrides(state.config_path.as_ref(), &all)?;
    Pipeline::new(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityCheckSettings;
    use crate::orchestrator::testing;

    /// Serve the real router with in-process pipeline components on an ephemeral port.
    async fn spawn_server(dir: &std::path::Path) -> String {
        let state = Arc::new(AppState {
            config_path: None,
            base_overrides: Vec::new(),
            pipeline: testing::pipeline(dir, testing::llm(), QualityCheckSettings::default()),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_generate_route_runs_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_server(dir.path()).await;

        let response = reqwest::Client::new()
            .post(format!("{}/generate", base))
            .json(&serde_json::json!({ "topic": "gadget" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert!(body["video_path"].as_str().unwrap().ends_with("Gadget_Launch.mp4"));
        assert!(body["metadata_path"]
            .as_str()
            .unwrap()
            .ends_with("Gadget_Launch_metadata.json"));
        assert_eq!(body["metadata"]["title"], "Gadget Launch Explained");
    }

    #[tokio::test]
    async fn test_generate_route_rejects_blank_topic() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_server(dir.path()).await;

        let response = reqwest::Client::new()
            .post(format!("{}/generate", base))
            .json(&serde_json::json!({ "topic": "  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "topic must not be empty");
    }

    #[tokio::test]
    async fn test_health() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_generate_request_overrides_default_to_empty() {
        let req: GenerateRequest = serde_json::from_str(r#"{"topic": "Rust"}"#).unwrap();
        assert_eq!(req.topic, "Rust");
        assert!(req.overrides.is_empty());

        let req: GenerateRequest = serde_json::from_str(
            r#"{"topic": "Rust", "overrides": {"script.target_minutes": 2}}"#,
        )
        .unwrap();
        assert_eq!(req.overrides["script.target_minutes"], serde_json::json!(2));
    }

    #[test]
    fn test_error_response_status() {
        let response = error_response(StatusCode::BAD_REQUEST, "bad");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
