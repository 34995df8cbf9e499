use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::handlers::{api, health};

// Open policy: any origin, method and header.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/sessions",
            get(api::sessions::list)
                .post(api::sessions::add)
                .delete(api::sessions::clear),
        )
        .route("/sessions/create", post(api::sessions::create))
        .route("/sessions/partial", post(api::sessions::partial))
        .route("/sessions/{id}", get(api::sessions::get))
        .route("/session", get(api::sessions::start))
        .route("/headers", get(api::headers::capture))
}

/// Setup the routes for the server and configure CORS and request tracing
pub fn setup_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::get))
        .nest("/api", api_routes())
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
