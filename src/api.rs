//! HTTP API: request/response types, error mapping, and all route handlers.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::{GenerationError, ImportError};
use crate::figma::FigmaClient;
use crate::generate::GenerationRequest;
use crate::pdf::PdfExtractor;
use crate::preview;
use crate::session::Coordinator;
use crate::settings::ToolSettings;
use crate::sse::Frame;
use crate::vector_store::{FileObject, VectorStoreClient};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub figma: FigmaClient,
    pub pdf: PdfExtractor,
    pub vector_stores: VectorStoreClient,
    pub settings: Mutex<ToolSettings>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            coordinator: Arc::new(Coordinator::new(config.clone())),
            figma: FigmaClient::new(),
            pdf: PdfExtractor::new(&config),
            vector_stores: VectorStoreClient::new(&config),
            settings: Mutex::new(ToolSettings::default()),
        }
    }

    fn require_api_key(&self) -> Result<String, ApiError> {
        Ok(self.coordinator.config().require_api_key()?.to_string())
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(flatten)]
    pub request: GenerationRequest,
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub components: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractPdfRequest {
    #[serde(default)]
    pub pdf: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaImportRequest {
    #[serde(default)]
    pub figma_token: String,
    #[serde(default)]
    pub figma_url: String,
}

#[derive(Deserialize)]
pub struct CreateVectorStoreRequest {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    pub file_object: FileObject,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFileRequest {
    pub vector_store_id: String,
    pub file_id: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message, "success": false }))).into_response()
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match &err {
            GenerationError::SessionNotFound { .. } => ApiError::NotFound(err.to_string()),
            GenerationError::TurnInFlight => ApiError::Conflict(err.to_string()),
            _ if err.is_validation() => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        if err.is_validation() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(session_shell))
        .route("/api/sessions/{id}/messages", get(session_messages))
        .route("/api/sessions/{id}/code", get(session_code))
        .route("/api/sessions/{id}/preview", get(session_preview))
        .route("/api/extract_pdf", post(extract_pdf))
        .route("/api/figma", post(figma_import))
        .route("/api/vector_stores/list", get(list_vector_stores))
        .route("/api/vector_stores/create", post(create_vector_store))
        .route("/api/vector_stores/upload_file", post(upload_file))
        .route("/api/vector_stores/add_file", post(add_file))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// Stream one generation turn as server-sent events.
///
/// With a `sessionId` the coordinator runs the full chat turn (transcript,
/// context, partition) around the stream; without one the generation is
/// stateless. Either way the stream carries `response.start`, periodic
/// `response.progress`, and exactly one of `response.completed` /
/// `response.error`.
async fn generate(
    State(state): State<SharedState>,
    Json(body): Json<GenerateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let rx = match body.session_id {
        Some(id) => state.coordinator.submit(id, body.request.prompt)?,
        None => state.coordinator.stream_detached(body.request)?,
    };

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let frame = Frame::from_event(&event);
        let data = serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
        Some((Ok::<Event, Infallible>(Event::default().data(data)), rx))
    });

    Ok(Sse::new(stream))
}

async fn create_session(
    State(state): State<SharedState>,
    Json(req): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let id = state.coordinator.create_session(req.components);
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

async fn session_messages(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.coordinator.messages(id)?;
    let turn = state.coordinator.turn_state(id)?;
    Ok(Json(json!({ "messages": messages, "turnState": turn })))
}

async fn session_code(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let partition = state.coordinator.partition(id)?;
    Ok(Json(partition))
}

/// Serve the host page: a sandboxed iframe over the session's preview
/// document plus the host-side watchdog and `postMessage` listener.
async fn session_shell(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // 404 for sessions that never existed, same as the other surfaces.
    state.coordinator.turn_state(id)?;
    Ok(Html(preview::render_shell(&format!(
        "/api/sessions/{id}/preview"
    ))))
}

/// Serve the sandbox preview document for a session's current partition.
/// Always assembled fresh; each load fully replaces prior content.
async fn session_preview(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let partition = state.coordinator.partition(id)?;
    Ok(Html(preview::render_document(&partition)))
}

#[tracing::instrument(skip_all, fields(filename = %req.filename))]
async fn extract_pdf(
    State(state): State<SharedState>,
    Json(req): Json<ExtractPdfRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.pdf.trim().is_empty() {
        return Err(ImportError::MissingPdf.into());
    }
    let api_key = state.require_api_key()?;
    let result = state.pdf.extract(&api_key, &req.pdf, &req.filename).await?;
    Ok(Json(result))
}

async fn figma_import(
    State(state): State<SharedState>,
    Json(req): Json<FigmaImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let components = state
        .figma
        .import_components(&req.figma_token, &req.figma_url)
        .await?;
    Ok(Json(json!({ "components": components })))
}

async fn list_vector_stores(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = state.require_api_key()?;
    let stores = state.vector_stores.list(&api_key).await?;
    Ok(Json(stores))
}

async fn create_vector_store(
    State(state): State<SharedState>,
    Json(req): Json<CreateVectorStoreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = state.require_api_key()?;
    let store = state.vector_stores.create(&api_key, &req.name).await?;
    Ok(Json(store))
}

async fn upload_file(
    State(state): State<SharedState>,
    Json(req): Json<UploadFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = state.require_api_key()?;
    let uploaded = state
        .vector_stores
        .upload_file(&api_key, &req.file_object)
        .await?;
    Ok(Json(uploaded))
}

async fn add_file(
    State(state): State<SharedState>,
    Json(req): Json<AddFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = state.require_api_key()?;
    let attached = state
        .vector_stores
        .add_file(&api_key, &req.vector_store_id, &req.file_id)
        .await?;
    Ok(Json(attached))
}

async fn get_settings(State(state): State<SharedState>) -> impl IntoResponse {
    let settings = state.settings.lock().expect("settings lock poisoned").clone();
    Json(settings)
}

async fn put_settings(
    State(state): State<SharedState>,
    Json(new_settings): Json<ToolSettings>,
) -> impl IntoResponse {
    let mut settings = state.settings.lock().expect("settings lock poisoned");
    *settings = new_settings;
    Json(settings.clone())
}
