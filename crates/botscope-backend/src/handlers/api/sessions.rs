use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};

use botscope::data::{
    ClearStatus, CreateSession, NewSession, Session, SessionCreated, SessionPatch, SessionRef,
    SessionSummary,
};
use botscope::id::SessionId;
use botscope::log;
use botscope::serde::de::DeserializeOwned;
use botscope::serde_json;

use crate::errors::ApiError;
use crate::services::SessionService;

type ApiResult<T> = Result<T, ApiError>;

// Bodies are read as JSON whatever the Content-Type says.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    Ok(serde_json::from_slice(body)?)
}

/// Handler to list every session as `{id, timestamp}`, most recent first
pub async fn list(
    State(state): State<Arc<crate::AppState>>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    let sessions = state.sessions.list().await?;
    log::info!("Retrieving all sessions, count: {}", sessions.len());
    Ok(Json(sessions))
}

/// Handler to add a full session record
pub async fn add(
    State(state): State<Arc<crate::AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SessionCreated>)> {
    let payload: NewSession = parse_body(&body)?;
    let session = state.sessions.create(payload).await?;
    log::info!(
        "Added session with ID {} at {}",
        session.id,
        session.timestamp.as_epoch_seconds()
    );
    Ok(created("Session added", session.id))
}

/// Handler to create a session from minimal input, generating id and timestamp
pub async fn create(
    State(state): State<Arc<crate::AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SessionCreated>)> {
    let payload: CreateSession = parse_body(&body)?;
    let session = state.sessions.create(payload.into()).await?;
    log::info!(
        "Created session with ID {} at {}",
        session.id,
        session.timestamp.as_epoch_seconds()
    );
    Ok(created("Session created", session.id))
}

/// Handler to apply a partial update. An unreadable body counts as an empty patch.
pub async fn partial(
    State(state): State<Arc<crate::AppState>>,
    body: Bytes,
) -> ApiResult<Json<SessionRef>> {
    let patch = parse_body::<SessionPatch>(&body).unwrap_or_else(|e| {
        log::warn!("Unreadable partial update, applying it as empty: {}", e);
        SessionPatch::default()
    });
    let session_id = state.sessions.patch(patch).await?;
    log::debug!("Applied partial update to session {}", session_id);
    Ok(Json(SessionRef { session_id }))
}

/// Handler to get a session by ID, or a placeholder for unknown IDs
pub async fn get(
    State(state): State<Arc<crate::AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Session>> {
    let session = state.sessions.get(&SessionId::from(session_id)).await?;
    Ok(Json(session))
}

/// Handler to drop every stored session
pub async fn clear(State(state): State<Arc<crate::AppState>>) -> ApiResult<Json<ClearStatus>> {
    state.sessions.clear().await?;
    log::info!("Cleared all sessions");
    Ok(Json(ClearStatus::cleared()))
}

/// Handler to start a fresh, empty session
pub async fn start(State(state): State<Arc<crate::AppState>>) -> ApiResult<Json<SessionRef>> {
    let session_id = state.sessions.create_empty().await?;
    log::info!("Started empty session {}", session_id);
    Ok(Json(SessionRef { session_id }))
}

fn created(message: &str, id: SessionId) -> (StatusCode, Json<SessionCreated>) {
    let body = SessionCreated {
        message: message.to_string(),
        id,
    };
    (StatusCode::CREATED, Json(body))
}
