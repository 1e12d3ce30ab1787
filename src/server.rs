//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Browser UI (upload, preview, search table) |
//! | `POST` | `/api/upload` | Multipart upload, field `file` |
//! | `GET`  | `/api/search` | `q`, `page`, `pageSize` query parameters |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "No file provided" }
//! ```
//!
//! Missing or malformed request input is `400`. Parse, insert, and store
//! failures are `500` with the underlying message.

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::StreamReader;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::error::{IngestError, StoreError, ValidationError};
use crate::ingest::{ingest_csv, IngestOptions};
use crate::models::SearchPage;
use crate::pg_store::PgStore;
use crate::search::{search_rows, SearchParams};
use crate::source::{decode_source, SourceMeta};
use crate::store::RowStore;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RowStore>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/api/upload", post(handle_upload))
        .route("/api/search", get(handle_search))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// `csv-search serve`: bind `[server].bind` and serve against PostgreSQL.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn RowStore> = Arc::new(PgStore::new(db::shared_pool(&config.db).clone()));
    let listener = TcpListener::bind(&config.server.bind).await?;
    serve(listener, Arc::new(config.clone()), store).await
}

/// Serve on an already-bound listener until Ctrl-C.
pub async fn serve(
    listener: TcpListener,
    config: Arc<Config>,
    store: Arc<dyn RowStore>,
) -> anyhow::Result<()> {
    let app = router(AppState { config, store });
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler error that renders as `{ "error": message }`.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

// ============ GET / ============

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
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

// ============ POST /api/upload ============

#[derive(Serialize)]
struct UploadResponse {
    ok: bool,
    rows: u64,
}

/// Streams the `file` field through the ingestion pipeline.
///
/// The request body is only read as fast as batches are committed.
async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart =
        multipart.map_err(|e| ValidationError::Malformed(e.body_text()))?;

    state.store.ensure_schema().await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::Malformed(e.body_text()))?
    {
        let file_name = match (field.name(), field.file_name()) {
            (Some("file"), Some(name)) => name.to_string(),
            _ => continue,
        };
        let content_encoding = field
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let meta = SourceMeta {
            content_type: field.content_type().unwrap_or_default().to_string(),
            content_encoding: content_encoding.to_string(),
            name_hint: file_name,
        };

        info!(file = %meta.name_hint, content_type = %meta.content_type, "upload started");
        let body = StreamReader::new(Box::pin(field.map_err(std::io::Error::other)));
        let options = IngestOptions::from(&state.config.ingest);

        let summary = ingest_csv(state.store.as_ref(), decode_source(body, &meta), &options)
            .await
            .map_err(|e| {
                error!(file = %meta.name_hint, "upload failed: {}", e);
                e
            })?;

        info!(
            file = %meta.name_hint,
            rows = summary.rows,
            batches = summary.batches,
            "upload finished"
        );
        return Ok(Json(UploadResponse {
            ok: true,
            rows: summary.rows,
        }));
    }

    Err(ValidationError::MissingFile.into())
}

// ============ GET /api/search ============

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, AppError> {
    state.store.ensure_schema().await?;

    let request = params.page_request(&state.config.search);
    let page = search_rows(state.store.as_ref(), params.query(), request)
        .await
        .map_err(|e| {
            error!("search failed: {}", e);
            e
        })?;
    Ok(Json(page))
}
