//! HTTP answering server.
//!
//! Exposes the answer pipeline over HTTP with an incrementally flushed
//! event-stream response.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ask` | Answer a question as a `data: <json>` event stream |
//! | `GET`  | `/health`  | Health check (returns version) |
//!
//! Each `/api/ask` frame is either `{"delta": "..."}` or the terminal
//! `{"done": true, "source": ..., "sourceMeta": [...], "cached": ...,
//! "usedLocalGeneration": ...}`. A stream that ends without a done
//! frame failed mid-generation; callers must treat it as an error.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based polling-place clients.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Args;
use futures::{Stream, StreamExt};
use pollkit_answer::{AnswerEvent, AnswerStream, AskRequest, QaService};
use pollkit_core::{AppConfig, AppError, AppResult};
use pollkit_llm::GenerationBackend;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Run the HTTP answering service
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (overrides config)
    #[arg(short, long, env = "POLLKIT_BIND")]
    pub bind: Option<String>,
}

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    service: Arc<QaService>,
}

impl ServeCommand {
    /// Execute the serve command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = super::build_service(config)?;
        let app = router(service);

        tracing::info!("Listening on {}", config.bind);

        let listener = tokio::net::TcpListener::bind(&config.bind).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

fn router(service: Arc<QaService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ask", post(ask_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(AppState { service })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ask_handler(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Response {
    match state.service.clone().answer(request) {
        Ok(stream) => (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(event_frames(stream)),
        )
            .into_response(),
        Err(AppError::InvalidInput(message)) => {
            error_response(StatusCode::BAD_REQUEST, "bad_request", &message)
        }
        Err(e) => {
            tracing::error!("Failed to start answer pipeline: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error",
            )
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": { "code": code, "message": message }
        })),
    )
        .into_response()
}

/// Encode answer events as `data: <json>\n\n` frames.
///
/// A mid-stream error terminates the frame stream without a done frame.
fn event_frames(stream: AnswerStream) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream
        .take_while(|item| {
            if let Err(e) = item {
                tracing::error!("Answer stream failed mid-flight: {}", e);
            }
            futures::future::ready(item.is_ok())
        })
        .filter_map(|item| async move { Some(Ok(encode_frame(&item.ok()?))) })
}

fn encode_frame(event: &AnswerEvent) -> Bytes {
    let frame = match event {
        AnswerEvent::Delta(text) => serde_json::json!({ "delta": text }),
        AnswerEvent::Done {
            cited_source,
            source_meta,
            was_cached,
            backend,
        } => serde_json::json!({
            "done": true,
            "source": cited_source,
            "sourceMeta": source_meta,
            "cached": was_cached,
            "usedLocalGeneration": *backend == Some(GenerationBackend::Local),
        }),
    };

    Bytes::from(format!("data: {}\n\n", frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState {
            service: crate::commands::build_service(&AppConfig::default()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_empty_question_is_bad_request() {
        let response = ask_handler(State(test_state()), Json(AskRequest::new("   "))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_question_takes_the_same_path() {
        let request: AskRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        let response = ask_handler(State(test_state()), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_encode_delta_frame() {
        let frame = encode_frame(&AnswerEvent::Delta("Arrive by 5:30 AM.".to_string()));
        let text = String::from_utf8(frame.to_vec()).unwrap();

        assert!(text.starts_with("data: "));
        assert!(text.ends_with("\n\n"));

        let json: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(json["delta"], "Arrive by 5:30 AM.");
    }

    #[test]
    fn test_encode_done_frame() {
        let frame = encode_frame(&AnswerEvent::Done {
            cited_source: "Poll Worker Training Manual 2026, Section 1".to_string(),
            source_meta: Vec::new(),
            was_cached: false,
            backend: Some(GenerationBackend::Local),
        });
        let text = String::from_utf8(frame.to_vec()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim()).unwrap();

        assert_eq!(json["done"], true);
        assert_eq!(json["source"], "Poll Worker Training Manual 2026, Section 1");
        assert_eq!(json["cached"], false);
        assert_eq!(json["usedLocalGeneration"], true);
        assert!(json["sourceMeta"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_cached_done_frame_marks_no_local_generation() {
        let frame = encode_frame(&AnswerEvent::Done {
            cited_source: String::new(),
            source_meta: Vec::new(),
            was_cached: true,
            backend: None,
        });
        let text = String::from_utf8(frame.to_vec()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(text.trim_start_matches("data: ").trim()).unwrap();

        assert_eq!(json["cached"], true);
        assert_eq!(json["usedLocalGeneration"], false);
    }
}
