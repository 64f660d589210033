//! HTTP route handlers for the library/document/chunk API.

use crate::distance::Metric;
use crate::error::{EntityKind, VectorDbError};
use crate::models::{Chunk, ChunkUpdate, Document, DocumentUpdate, Library, LibraryUpdate, Metadata};
use crate::search::{Algorithm, SearchRequest, SearchResult, SearchScope};
use crate::server::AppState;
use crate::store::{Store, StoreStats};
use crate::vector::Vector;
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use uuid::Uuid;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-key";

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct CreateLibraryRequest {
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub metadata: Metadata,
    /// Existing chunks of the same library to attach, in order.
    #[serde(default)]
    pub chunk_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct CreateChunkRequest {
    pub text: String,
    pub embedding: Vector,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Deserialize)]
pub struct SearchBody {
    pub query_embedding: Vector,
    pub k: i64,
    /// `cosine` (default) or `l2`. Parsed after deserialization so an
    /// unknown name is a 400 like every other bad argument.
    pub metric: Option<String>,
    /// `brute` (default) or `vptree`.
    pub algorithm: Option<String>,
    pub filter: Option<Metadata>,
}

impl SearchBody {
    fn into_request(self, scope: SearchScope) -> Result<SearchRequest, VectorDbError> {
        let k = usize::try_from(self.k)
            .ok()
            .filter(|k| *k > 0)
            .ok_or_else(|| VectorDbError::invalid("k must be greater than zero"))?;
        let metric = match self.metric {
            Some(name) => name.parse()?,
            None => Metric::Cosine,
        };
        let algorithm = match self.algorithm {
            Some(name) => name.parse()?,
            None => Algorithm::default(),
        };
        Ok(SearchRequest {
            query_embedding: self.query_embedding,
            k,
            metric,
            algorithm,
            scope,
            filter: self.filter,
        })
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(flatten)]
    pub counts: StoreStats,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub total_searches: u64,
    pub brute_searches: u64,
    pub vptree_searches: u64,
    pub total_creates: u64,
    pub total_deletes: u64,
    pub avg_search_latency_us: f64,
    pub p50_search_latency_us: f64,
    pub p95_search_latency_us: f64,
    pub p99_search_latency_us: f64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Missing or invalid API key".to_string(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<VectorDbError> for ApiError {
    fn from(err: VectorDbError) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else if err.is_invalid_argument() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/libraries", post(create_library).get(list_libraries))
        .route(
            "/libraries/{library_id}",
            get(get_library).patch(update_library).delete(delete_library),
        )
        .route("/libraries/{library_id}/search", post(search_library))
        .route(
            "/libraries/{library_id}/documents",
            post(create_document).get(list_documents),
        )
        .route(
            "/libraries/{library_id}/documents/{document_id}",
            get(get_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .route(
            "/libraries/{library_id}/documents/{document_id}/search",
            post(search_document),
        )
        .route(
            "/libraries/{library_id}/documents/{document_id}/chunks",
            post(create_chunk).get(list_chunks),
        )
        .route(
            "/libraries/{library_id}/documents/{document_id}/chunks/{chunk_id}",
            get(get_chunk).patch(update_chunk).delete(delete_chunk),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ))
        .with_state(state)
}

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if let Some(expected) = &state.api_key {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(ApiError::unauthorized());
        }
    }
    Ok(next.run(request).await)
}

// --- Path scoping ---

fn document_in(store: &Store, library_id: Uuid, document_id: Uuid) -> Result<Document, VectorDbError> {
    store.get_library(library_id)?;
    let document = store.get_document(document_id)?;
    if document.library_id != library_id {
        return Err(VectorDbError::not_found(EntityKind::Document, document_id));
    }
    Ok(document)
}

fn chunk_in(
    store: &Store,
    library_id: Uuid,
    document_id: Uuid,
    chunk_id: Uuid,
) -> Result<Chunk, VectorDbError> {
    let chunk = store.get_chunk(chunk_id)?;
    if chunk.library_id != library_id || chunk.document_id != Some(document_id) {
        return Err(VectorDbError::not_found(EntityKind::Chunk, chunk_id));
    }
    Ok(chunk)
}

// --- Handlers ---

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        counts: state.store().stats(),
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let metrics = state.metrics.read();
    let percentiles = metrics.percentiles_search_latency_us(&[50.0, 95.0, 99.0]);

    Json(MetricsResponse {
        total_searches: metrics.total_searches(),
        brute_searches: metrics.searches(Algorithm::Brute),
        vptree_searches: metrics.searches(Algorithm::VpTree),
        total_creates: metrics.total_creates(),
        total_deletes: metrics.total_deletes(),
        avg_search_latency_us: metrics.avg_search_latency_us(),
        p50_search_latency_us: percentiles[0],
        p95_search_latency_us: percentiles[1],
        p99_search_latency_us: percentiles[2],
    })
}

async fn create_library(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLibraryRequest>,
) -> (StatusCode, Json<Library>) {
    let library = state.store().create_library(req.name, req.metadata);
    state.metrics.write().record_create();
    (StatusCode::CREATED, Json(library))
}

async fn list_libraries(State(state): State<Arc<AppState>>) -> Json<Vec<Library>> {
    Json(state.store().list_libraries())
}

async fn get_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> ApiResult<Json<Library>> {
    Ok(Json(state.store().get_library(library_id)?))
}

async fn update_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(update): Json<LibraryUpdate>,
) -> ApiResult<Json<Library>> {
    Ok(Json(state.store().update_library(library_id, update)?))
}

async fn delete_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store().delete_library(library_id)?;
    state.metrics.write().record_delete();
    Ok(StatusCode::NO_CONTENT)
}

async fn create_document(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let store = state.store();
    let mut document = store.create_document(library_id, req.metadata)?;
    state.metrics.write().record_create();
    if !req.chunk_ids.is_empty() {
        document = store.attach_chunks(document.id, &req.chunk_ids)?;
    }
    Ok((StatusCode::CREATED, Json(document)))
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(state.store().list_documents(library_id)?))
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Document>> {
    Ok(Json(document_in(state.store(), library_id, document_id)?))
}

async fn update_document(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
    Json(update): Json<DocumentUpdate>,
) -> ApiResult<Json<Document>> {
    let store = state.store();
    document_in(store, library_id, document_id)?;
    Ok(Json(store.update_document(document_id, update)?))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let store = state.store();
    document_in(store, library_id, document_id)?;
    store.delete_document(document_id)?;
    state.metrics.write().record_delete();
    Ok(StatusCode::NO_CONTENT)
}

async fn create_chunk(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateChunkRequest>,
) -> ApiResult<(StatusCode, Json<Chunk>)> {
    let chunk = state.store().create_chunk(
        library_id,
        Some(document_id),
        req.text,
        req.embedding,
        req.metadata,
    )?;
    state.metrics.write().record_create();
    Ok((StatusCode::CREATED, Json(chunk)))
}

async fn list_chunks(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Chunk>>> {
    let store = state.store();
    document_in(store, library_id, document_id)?;
    Ok(Json(store.list_chunks(library_id, document_id)))
}

async fn get_chunk(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id, chunk_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<Chunk>> {
    Ok(Json(chunk_in(state.store(), library_id, document_id, chunk_id)?))
}

async fn update_chunk(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id, chunk_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(update): Json<ChunkUpdate>,
) -> ApiResult<Json<Chunk>> {
    let store = state.store();
    chunk_in(store, library_id, document_id, chunk_id)?;
    Ok(Json(store.update_chunk(chunk_id, update)?))
}

async fn delete_chunk(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id, chunk_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let store = state.store();
    chunk_in(store, library_id, document_id, chunk_id)?;
    store.delete_chunk(chunk_id)?;
    state.metrics.write().record_delete();
    Ok(StatusCode::NO_CONTENT)
}

async fn search_library(
    State(state): State<Arc<AppState>>,
    Path(library_id): Path<Uuid>,
    Json(body): Json<SearchBody>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let request = body.into_request(SearchScope::Library(library_id))?;
    run_search(state, request).await
}

async fn search_document(
    State(state): State<Arc<AppState>>,
    Path((library_id, document_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SearchBody>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let request = body.into_request(SearchScope::Document {
        library_id,
        document_id,
    })?;
    run_search(state, request).await
}

/// Scoring is CPU-bound, so it runs on the blocking pool.
async fn run_search(
    state: Arc<AppState>,
    request: SearchRequest,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let engine = state.engine.clone();
    let algorithm = request.algorithm;
    let start = Instant::now();

    let results = tokio::task::spawn_blocking(move || engine.search(&request))
        .await
        .map_err(|e| ApiError::internal(format!("search task failed: {e}")))??;

    state.metrics.write().record_search(algorithm, start.elapsed());
    Ok(Json(results))
}
