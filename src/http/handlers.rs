use super::state::AppState;
use crate::error::{BackendError, SessionError};
use crate::recognition::{BackendKind, RecognitionBackend, RecognitionConfig};
use crate::session::{EventRecord, SessionHandle, SessionState, SessionStats};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Host slot (e.g. the game object) the session reports to
    pub slot: String,
    pub backend: BackendKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub handle: SessionHandle,
    pub slot: String,
    pub backend: BackendKind,
    pub state: SessionState,
}

#[derive(Debug, Deserialize)]
pub struct LoadModelRequest {
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Session error rendered as a JSON response
pub struct ApiError(SessionError);

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SessionError::UnknownHandle(_) => StatusCode::NOT_FOUND,
            SessionError::Released | SessionError::Conflict(_) => StatusCode::CONFLICT,
            SessionError::Backend(BackendError::Busy) => StatusCode::CONFLICT,
            SessionError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            SessionError::Backend(BackendError::ModelLoad(_) | BackendError::Unsupported(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected ({}): {}", status, self.0);
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions
/// Create a session for a slot, or return the slot's existing one
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    info!("Creating {} session for slot '{}'", req.backend, req.slot);

    let factory = state.factory.clone();
    let handle = state
        .registry
        .create(&req.slot, || factory.build(&req.slot, req.backend))
        .await?;
    let session = state.registry.get(handle).await?;

    // Preload the configured model; the host can still load one explicitly
    if let (RecognitionBackend::Streaming(backend), Some(path)) = (session.backend(), factory.default_model()) {
        if !backend.is_model_loaded() {
            if let Err(e) = session.load_model(path).await {
                warn!("Default model not loaded for session {}: {}", handle, e);
            }
        }
    }

    Ok(Json(SessionResponse {
        handle,
        slot: session.slot().to_string(),
        backend: session.kind(),
        state: session.state(),
    }))
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionStats>> {
    Json(state.registry.list().await)
}

/// POST /sessions/:handle/model
pub async fn load_model(
    State(state): State<AppState>,
    Path(handle): Path<SessionHandle>,
    Json(req): Json<LoadModelRequest>,
) -> Result<StatusCode, ApiError> {
    if req.path.as_os_str().is_empty() {
        return Err(SessionError::from(BackendError::ModelLoad("model path is empty".into())).into());
    }
    state.registry.load_model(handle, req.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /sessions/:handle/start
/// Body is an optional recognition config (server defaults otherwise)
pub async fn start_session(
    State(state): State<AppState>,
    Path(handle): Path<SessionHandle>,
    body: Bytes,
) -> Response {
    let config = if body.is_empty() {
        state.defaults.clone()
    } else {
        match serde_json::from_slice::<RecognitionConfig>(&body) {
            Ok(config) => config,
            Err(e) => return bad_request(format!("Invalid recognition config: {}", e)),
        }
    };

    match state.registry.start(handle, config).await {
        Ok(()) => session_response(&state, handle).await,
        Err(e) => ApiError(e).into_response(),
    }
}

/// POST /sessions/:handle/stop
pub async fn stop_session(State(state): State<AppState>, Path(handle): Path<SessionHandle>) -> Response {
    match state.registry.stop(handle).await {
        Ok(()) => session_response(&state, handle).await,
        Err(e) => ApiError(e).into_response(),
    }
}

/// DELETE /sessions/:handle
pub async fn release_session(
    State(state): State<AppState>,
    Path(handle): Path<SessionHandle>,
) -> Result<StatusCode, ApiError> {
    state.registry.release(handle).await?;
    info!("Session {} released via HTTP", handle);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/:handle
pub async fn get_session(
    State(state): State<AppState>,
    Path(handle): Path<SessionHandle>,
) -> Result<Json<SessionStats>, ApiError> {
    Ok(Json(state.registry.stats(handle).await?))
}

/// GET /sessions/:handle/events
/// Events delivered so far, oldest first
pub async fn get_events(
    State(state): State<AppState>,
    Path(handle): Path<SessionHandle>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    Ok(Json(state.registry.get(handle).await?.events()))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn session_response(state: &AppState, handle: SessionHandle) -> Response {
    match state.registry.get(handle).await {
        Ok(session) => Json(SessionResponse {
            handle,
            slot: session.slot().to_string(),
            backend: session.kind(),
            state: session.state(),
        })
        .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
