use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use docqa_core::chunker::ChunkingConfig;
use docqa_core::error::{Error, Result};
use docqa_core::loader::FsLoader;
use docqa_core::traits::GenerationProvider;
use docqa_core::types::{Answer, CompletionRequest};
use docqa_embed::{Embedder, FakeEmbeddings};
use docqa_rag::{Ingestor, QaService, Retriever, Synthesizer, DONT_KNOW_ANSWER};
use docqa_server::{health, query, serve, ErrorBody, QueryRequest};
use docqa_vector::CorpusStore;

struct Echo;

#[async_trait]
impl GenerationProvider for Echo {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Ok("grounded answer [1]".into())
    }
}

struct Down;

#[async_trait]
impl GenerationProvider for Down {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(Error::Provider("HTTP 500: upstream exploded".into()))
    }
}

fn embedder(dim: usize) -> Embedder {
    Embedder::new(Arc::new(FakeEmbeddings::new(dim)))
}

fn service_with(
    storage: &Path,
    generator: Arc<dyn GenerationProvider>,
    dim: usize,
    default_top_k: usize,
) -> Arc<QaService> {
    let retriever = Retriever::new(embedder(dim), CorpusStore::new(storage));
    let synthesizer = Synthesizer::new(generator, "test-model", 0.2);
    Arc::new(QaService::new(retriever, synthesizer, default_top_k))
}

fn service(storage: &Path, generator: Arc<dyn GenerationProvider>) -> Arc<QaService> {
    service_with(storage, generator, 32, 5)
}

async fn ingest(dir: &Path, storage: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("guide.txt"),
        "The reactor must be vented every morning before the shift starts.",
    )
    .unwrap();
    let chunking = ChunkingConfig::new(40, 10).unwrap();
    Ingestor::new(Arc::new(FsLoader::new()), embedder(32), CorpusStore::new(storage), chunking)
        .run(dir)
        .await
        .unwrap();
}

fn request(
    question: &str,
    top_k: Option<usize>,
) -> std::result::Result<Json<QueryRequest>, JsonRejection> {
    Ok(Json(QueryRequest { question: question.into(), top_k }))
}

async fn body_of(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A server bound to an ephemeral local port, stopped when dropped.
struct Running {
    addr: SocketAddr,
    _stop: oneshot::Sender<()>,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn spawn(service: Arc<QaService>) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let shutdown = async move {
            let _ = stopped.await;
        };
        serve(listener, service, shutdown).await.unwrap();
    });
    Running { addr, _stop: stop }
}

#[tokio::test]
async fn health_reports_ok() {
    let Json(body) = health().await;
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn query_returns_answer_and_ranked_contexts() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = tmp.path().join("storage");
    ingest(&tmp.path().join("docs"), &storage).await;

    let state = State(service(&storage, Arc::new(Echo)));
    let Json(answer) = query(state, request("when is the reactor vented?", Some(2))).await.unwrap();
    assert_eq!(answer.answer, "grounded answer [1]");
    assert_eq!(answer.contexts.len(), 2);
    assert_eq!(answer.contexts[0].rank, 1);
    assert!(answer.contexts[0].chunk_id.starts_with("guide.txt::chunk_"));
}

#[tokio::test]
async fn empty_store_gives_the_fixed_answer() {
    let tmp = tempfile::tempdir().unwrap();
    let state = State(service(tmp.path(), Arc::new(Echo)));
    let Json(answer) = query(state, request("anything?", None)).await.unwrap();
    assert_eq!(answer.answer, DONT_KNOW_ANSWER);
    assert!(answer.contexts.is_empty());
}

#[tokio::test]
async fn invalid_top_k_is_unprocessable() {
    let tmp = tempfile::tempdir().unwrap();
    let state = State(service(tmp.path(), Arc::new(Echo)));
    let err = query(state, request("anything?", Some(0))).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_of(err.into_response()).await;
    let detail: ErrorBody = serde_json::from_value(body).unwrap();
    assert!(detail.detail.contains("top_k"));
}

#[tokio::test]
async fn provider_failure_is_a_server_error_with_its_message() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = tmp.path().join("storage");
    ingest(&tmp.path().join("docs"), &storage).await;

    let state = State(service(&storage, Arc::new(Down)));
    let err = query(state, request("reactor?", None)).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_of(response).await;
    assert!(body["detail"].as_str().unwrap().contains("upstream exploded"));
}

#[tokio::test]
async fn corrupt_store_is_a_server_error() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = tmp.path().join("storage");
    ingest(&tmp.path().join("docs"), &storage).await;
    let generation = CorpusStore::new(&storage).current_generation().unwrap().unwrap();
    fs::write(storage.join(generation).join("chunks.json"), "[]").unwrap();

    let state = State(service(&storage, Arc::new(Echo)));
    let err = query(state, request("reactor?", None)).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn switching_embedding_models_is_a_server_error() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = tmp.path().join("storage");
    ingest(&tmp.path().join("docs"), &storage).await;

    // Corpus embedded at 32 dims, queries embedded at 16.
    let state = State(service_with(&storage, Arc::new(Echo), 16, 5));
    let err = query(state, request("reactor?", None)).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_of(err.into_response()).await;
    assert!(body["detail"].as_str().unwrap().contains("Dimension mismatch"));
}

#[tokio::test]
async fn router_serves_health_over_http() {
    let tmp = tempfile::tempdir().unwrap();
    let server = spawn(service(tmp.path(), Arc::new(Echo))).await;

    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn router_query_without_top_k_uses_the_default() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = tmp.path().join("storage");
    ingest(&tmp.path().join("docs"), &storage).await;
    let server = spawn(service_with(&storage, Arc::new(Echo), 32, 2)).await;

    let response = reqwest::Client::new()
        .post(server.url("/query"))
        .json(&serde_json::json!({ "question": "when is the reactor vented?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let answer: Answer = response.json().await.unwrap();
    assert_eq!(answer.answer, "grounded answer [1]");
    assert_eq!(answer.contexts.len(), 2);
    assert_eq!(answer.contexts.iter().map(|c| c.rank).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn router_rejects_malformed_json_with_a_detail() {
    let tmp = tempfile::tempdir().unwrap();
    let server = spawn(service(tmp.path(), Arc::new(Echo))).await;

    let response = reqwest::Client::new()
        .post(server.url("/query"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = response.json().await.unwrap();
    assert!(!body.detail.is_empty());
}

#[tokio::test]
async fn router_rejects_zero_top_k() {
    let tmp = tempfile::tempdir().unwrap();
    let server = spawn(service(tmp.path(), Arc::new(Echo))).await;

    let response = reqwest::Client::new()
        .post(server.url("/query"))
        .json(&serde_json::json!({ "question": "x", "top_k": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = response.json().await.unwrap();
    assert!(body.detail.contains("top_k"));
}
