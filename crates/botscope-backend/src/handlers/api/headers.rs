use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};

use botscope::data::{HeaderSnapshot, HeadersQuery};
use botscope::log;

use crate::errors::ApiError;
use crate::services::SessionService;

/// Flattens request headers into a name to value map. Names come out
/// lower-case; for a repeated header the first value wins.
pub fn snapshot(headers: &HeaderMap) -> HeaderSnapshot {
    let mut snapshot = HeaderSnapshot::new();
    for (name, value) in headers {
        snapshot
            .entry(name.as_str().to_string())
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    snapshot
}

/// Handler echoing the caller's request headers, saving them to a session when
/// `session_id` is given
pub async fn capture(
    State(state): State<Arc<crate::AppState>>,
    Query(query): Query<HeadersQuery>,
    headers: HeaderMap,
) -> Result<Json<HeaderSnapshot>, ApiError> {
    let headers = snapshot(&headers);
    log::debug!("Request headers: {:?}", headers);

    let session_id = query.session_id();
    if let Some(session_id) = session_id {
        log::info!("Saving header snapshot to session {}", session_id);
    }
    let headers = state.sessions.capture_headers(session_id, headers).await?;
    Ok(Json(headers))
}
