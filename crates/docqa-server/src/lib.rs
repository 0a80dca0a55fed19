//! HTTP service boundary over [`QaService`].
//!
//! - `GET /health` → `{"status":"ok"}`
//! - `POST /query {question, top_k?}` → `{answer, contexts}`
//!
//! Malformed requests (bad JSON, `top_k == 0`, blank question) answer 422.
//! Every other failure, including a corpus embedded with a different model,
//! answers 500. Both carry a `{"detail": message}` body.

use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use docqa_core::error::{Error, Result};
use docqa_core::types::Answer;
use docqa_rag::QaService;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

/// Maps a pipeline failure to an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, detail: err.to_string() }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self { status: StatusCode::UNPROCESSABLE_ENTITY, detail: rejection.body_text() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "query failed");
        } else {
            tracing::debug!(status = %self.status, detail = %self.detail, "query rejected");
        }
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

pub fn router(service: Arc<QaService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .with_state(service)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: Arc<QaService>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, router(service)).with_graceful_shutdown(shutdown).await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn query(
    State(service): State<Arc<QaService>>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> std::result::Result<Json<Answer>, ApiError> {
    let Json(request) = payload?;
    let answer = service.ask(&request.question, request.top_k).await?;
    Ok(Json(answer))
}
