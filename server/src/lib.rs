use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use parking_lot::Mutex;
use plotsim_core::persist::{load_index, load_text, IndexPaths};
use plotsim_core::{DocCatalog, DocId, DocMeta, SimilarityEngine, SimilarityOptions, VectorStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_dir: String,
    pub similarity: SimilarityOptions,
    /// Queries running longer than this answer with an empty list.
    pub query_timeout: Duration,
}

impl ServerConfig {
    pub fn new(index_dir: impl Into<String>) -> Self {
        Self { index_dir: index_dir.into(), similarity: SimilarityOptions::default(), query_timeout: DEFAULT_QUERY_TIMEOUT }
    }
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { 20 }

#[derive(Deserialize)]
pub struct SimilarParams {
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 5 }

#[derive(Serialize)]
pub struct MovieRow {
    pub doc_id: DocId,
    pub title: String,
    pub genres: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Serialize)]
pub struct MovieDetail {
    pub doc_id: DocId,
    #[serde(flatten)]
    pub meta: DocMeta,
    pub summary: Option<String>,
}

#[derive(Serialize)]
pub struct SimilarResponse {
    pub doc_id: DocId,
    pub took_s: f64,
    pub results: Vec<SimilarHit>,
}

#[derive(Serialize)]
pub struct SimilarHit {
    pub doc_id: DocId,
    pub title: String,
    pub score: f32,
}

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    pub docs: Arc<DocCatalog>,
    pub store: VectorStore,
    pub similarity: SimilarityOptions,
    pub query_timeout: Duration,
    /// Similarity queries run one at a time.
    pub query_gate: Arc<Mutex<()>>,
}

pub fn build_app(index_dir: String) -> Result<Router> {
    build_app_with(ServerConfig::new(index_dir))
}

pub fn build_app_with(config: ServerConfig) -> Result<Router> {
    let index_paths = IndexPaths::new(&config.index_dir);
    let (docs, store) = load_index(&index_paths)?;
    tracing::info!(docs = docs.len(), vectors = store.len()?, "index loaded");
    let app_state = AppState {
        index_paths_root: PathBuf::from(&config.index_dir),
        docs: Arc::new(docs),
        store,
        similarity: config.similarity,
        query_timeout: config.query_timeout,
        query_gate: Arc::new(Mutex::new(())),
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/movies", get(list_handler))
        .route("/movies/:doc_id", get(movie_handler))
        .route("/movies/:doc_id/similar", get(similar_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

/// Title search, or the most recent movies when the query is blank.
pub async fn list_handler(State(state): State<AppState>, Query(params): Query<ListParams>) -> Json<Vec<MovieRow>> {
    let limit = params.limit.clamp(1, 500);
    let rows = if params.q.trim().is_empty() {
        state.docs.recent(limit)
    } else {
        state.docs.search_titles(params.q.trim(), limit)
    };
    Json(
        rows.into_iter()
            .map(|(doc_id, meta)| MovieRow { doc_id, title: meta.title.clone(), genres: meta.genres.clone(), release_date: meta.release_date.clone() })
            .collect(),
    )
}

pub async fn movie_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<MovieDetail>, (StatusCode, Json<serde_json::Value>)> {
    let meta = state
        .docs
        .get(doc_id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": format!("document {doc_id} not found") }))))?;
    let paths = IndexPaths::new(&state.index_paths_root);
    let summary = meta.text_path.as_deref().and_then(|rel| load_text(&paths, rel).ok());
    Ok(Json(MovieDetail { doc_id, meta: meta.clone(), summary }))
}

pub async fn similar_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>, Query(params): Query<SimilarParams>) -> Json<SimilarResponse> {
    let start = Instant::now();
    let k = params.k.clamp(1, 100);
    let timeout = state.query_timeout;

    let task = tokio::task::spawn_blocking(move || {
        let _gate = state.query_gate.lock();
        let engine = SimilarityEngine::new(&state.store, state.docs.as_ref(), state.similarity);
        engine.top_n_or_empty(doc_id, k)
    });
    // A timed out scan keeps running on its blocking thread; its result is dropped.
    let neighbors = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(neighbors)) => neighbors,
        Ok(Err(e)) => {
            tracing::warn!(doc_id, error = %e, "similarity task failed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(doc_id, timeout_ms = timeout.as_millis() as u64, "similarity query timed out");
            Vec::new()
        }
    };

    let results = neighbors
        .into_iter()
        .map(|n| SimilarHit { doc_id: n.doc_id, title: n.label, score: n.score })
        .collect();
    Json(SimilarResponse { doc_id, took_s: start.elapsed().as_secs_f64(), results })
}
