//! HTTP boundary over the query engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/get?msg=...` | Answer a question |
//! | `POST` | `/get` | Answer a question (form field `msg`) |
//!
//! # Response contract
//!
//! ```json
//! { "message": "the synthesized answer" }
//! { "error": "query must not be empty" }
//! ```
//!
//! An empty or missing `msg` is a 400. A request axum cannot decode (wrong
//! content type, malformed body) keeps axum's 4xx status but still answers
//! with the JSON error shape. Every other failure is a 500.
//!
//! The engine is opened once at start-up and shared by every request. All
//! origins, methods, and headers are permitted.

use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Form, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::QueryError;
use crate::query::{open_engine, QueryEngine};

#[derive(Clone)]
struct AppState {
    engine: Arc<QueryEngine>,
}

/// Builds the router around an already-open engine.
pub fn router(engine: Arc<QueryEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/get", get(handle_get_query).post(handle_get_form))
        .layer(cors)
        .with_state(AppState { engine })
}

/// `docq serve`: opens the configured collection (creating it when absent)
/// and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = open_engine(config, true).await?;
    tracing::info!(
        collection = %engine.collection().name,
        embedding = %engine.collection().profile,
        "query engine ready"
    );

    let app = router(Arc::new(engine));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("docq listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Responses ============

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let status = match err {
            QueryError::EmptyQuery => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /get ============

#[derive(Deserialize)]
struct MsgParams {
    #[serde(default)]
    msg: Option<String>,
}

async fn handle_get_query(
    State(state): State<AppState>,
    params: Result<Query<MsgParams>, QueryRejection>,
) -> Result<Json<MessageBody>, AppError> {
    let Query(params) = params?;
    answer(&state, params.msg).await
}

async fn handle_get_form(
    State(state): State<AppState>,
    params: Result<Form<MsgParams>, FormRejection>,
) -> Result<Json<MessageBody>, AppError> {
    let Form(params) = params?;
    answer(&state, params.msg).await
}

async fn answer(state: &AppState, msg: Option<String>) -> Result<Json<MessageBody>, AppError> {
    let msg = msg.unwrap_or_default();
    match state.engine.query(&msg).await {
        Ok(answer) => Ok(Json(MessageBody {
            message: answer.text,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "query failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionError, Completer};
    use crate::embedding::{Embedder, HashEmbedder};
    use crate::index::IndexBuilder;
    use crate::models::Document;
    use crate::store::{MemoryVectorStore, VectorStore};
    use async_trait::async_trait;
    use serde_json::Value;

    struct FirstContext;

    #[async_trait]
    impl Completer for FirstContext {
        fn model_name(&self) -> &str {
            "first-context"
        }

        async fn complete(&self, _query: &str, context: &[Document]) -> Result<String, CompletionError> {
            Ok(context.first().map(|d| d.text.clone()).unwrap_or_default())
        }
    }

    async fn serve(texts: &[&str]) -> String {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(64));
        let builder = IndexBuilder::new(store.clone(), embedder.clone());
        if !texts.is_empty() {
            builder
                .build(texts.iter().map(|t| Document::new(*t)).collect(), "kb")
                .await
                .unwrap();
        } else {
            store
                .open_or_create("kb", embedder.profile())
                .await
                .unwrap();
        }
        let engine = QueryEngine::open(store, "kb", embedder, Arc::new(FirstContext), 1)
            .await
            .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(Arc::new(engine))).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn health_reports_version() {
        let base = serve(&["a"]).await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn get_with_query_string_answers() {
        let base = serve(&["alpha beta", "gamma delta"]).await;
        let resp = reqwest::get(format!("{}/get?msg=gamma%20delta", base))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "gamma delta");
    }

    #[tokio::test]
    async fn post_form_answers() {
        let base = serve(&["alpha beta", "gamma delta"]).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/get", base))
            .form(&[("msg", "alpha beta")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "alpha beta");
    }

    #[tokio::test]
    async fn empty_message_is_bad_request() {
        let base = serve(&["a"]).await;
        let resp = reqwest::get(format!("{}/get?msg=", base)).await.unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("empty"));

        let resp = reqwest::get(format!("{}/get", base)).await.unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn undecodable_post_still_answers_json() {
        let base = serve(&["a"]).await;
        let client = reqwest::Client::new();

        let resp = client.post(format!("{}/get", base)).send().await.unwrap();
        assert!(resp.status().is_client_error(), "status {}", resp.status());
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());

        let resp = client
            .post(format!("{}/get", base))
            .header("content-type", "application/json")
            .body(r#"{"msg": "a"}"#)
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_client_error(), "status {}", resp.status());
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Content-Type"));
    }

    #[tokio::test]
    async fn empty_collection_is_server_error() {
        let base = serve(&[]).await;
        let resp = reqwest::get(format!("{}/get?msg=anything", base))
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
    }
}
