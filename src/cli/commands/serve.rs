//! HTTP API server for integration with other systems.
//!
//! All requests share one session registry, so concurrent loads of the same
//! content are coalesced and the live set stays bounded.

use crate::cli::{preflight, App, Output};
use crate::config::Settings;
use crate::content::{ContentId, ContentItem};
use crate::error::EarshotError;
use crate::rag::SourceCitation;
use crate::source::parse_input;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let state = Arc::new(App::new(settings)?);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Earshot API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Load", "POST   /items");
    Output::kv("Live items", "GET    /items");
    Output::kv("Search", "POST   /items/{id}/search");
    Output::kv("Ask", "POST   /items/{id}/ask");
    Output::kv("Unload", "DELETE /items/{id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

fn router(state: Arc<App>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/items", post(load_item).get(list_items))
        .route("/items/{id}", axum::routing::delete(unload_item))
        .route("/items/{id}/search", post(search))
        .route("/items/{id}/ask", post(ask))
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct LoadRequest {
    /// YouTube URL/ID or local file path
    input: String,
}

#[derive(Serialize)]
struct ItemInfo {
    id: String,
    title: String,
    duration_seconds: f64,
    chunk_count: usize,
}

impl From<&ContentItem> for ItemInfo {
    fn from(item: &ContentItem) -> Self {
        Self {
            id: item.id().to_string(),
            title: item.title().to_string(),
            duration_seconds: item.duration_seconds(),
            chunk_count: item.index().len(),
        }
    }
}

#[derive(Serialize)]
struct ItemListResponse {
    items: Vec<ItemInfo>,
    capacity: usize,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SourceCitation>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceCitation>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error with its HTTP status.
struct ApiError(EarshotError);

impl From<EarshotError> for ApiError {
    fn from(err: EarshotError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

fn status_for(err: &EarshotError) -> StatusCode {
    match err.root() {
        EarshotError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        EarshotError::NotLoaded(_) => StatusCode::NOT_FOUND,
        EarshotError::GenerationUnavailable(_) | EarshotError::ToolNotFound(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EarshotError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        EarshotError::Acquisition { .. }
        | EarshotError::Transcription { .. }
        | EarshotError::IndexingIncomplete { .. }
        | EarshotError::Embedding(_)
        | EarshotError::Generation(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn load_item(
    State(state): State<Arc<App>>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<ItemInfo>, ApiError> {
    let source = parse_input(&req.input)?;
    if state.registry().get(&source.id).is_none() && state.cache().get(&source.id)?.is_none() {
        preflight::check(source.kind, state.settings()).await?;
    }

    // Dropping the request drops this waiter; the load stops once no waiter remains.
    let item = state.registry().acquire(&source).await?;
    Ok(Json(ItemInfo::from(item.as_ref())))
}

async fn list_items(State(state): State<Arc<App>>) -> Json<ItemListResponse> {
    Json(ItemListResponse {
        items: state
            .registry()
            .items()
            .iter()
            .map(|item| ItemInfo::from(item.as_ref()))
            .collect(),
        capacity: state.registry().capacity(),
    })
}

async fn unload_item(State(state): State<Arc<App>>, Path(id): Path<String>) -> Response {
    if state.registry().evict(&ContentId::new(&id)) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        ApiError(EarshotError::NotLoaded(id)).into_response()
    }
}

async fn search(
    State(state): State<Arc<App>>,
    Path(id): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let k = req.k.unwrap_or(state.settings().retrieval.top_k);
    let chunks = state
        .registry()
        .search(&ContentId::new(id), &req.query, k)
        .await?;

    Ok(Json(SearchResponse {
        results: chunks
            .iter()
            .enumerate()
            .map(|(i, scored)| SourceCitation::new(i + 1, scored))
            .collect(),
    }))
}

async fn ask(
    State(state): State<Arc<App>>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let answer = state.engine().ask(&ContentId::new(id), &req.question).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}
