use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::{DateTime, TimeDelta, Utc};

use botscope::data::{HealthResponse, HealthStatus, ServiceInfo, UptimeInfo};
use botscope::log;

use crate::services::SessionService;

fn human_readable_uptime(uptime: TimeDelta) -> String {
    let uptime_seconds = uptime.num_seconds();
    let days = uptime.num_days();
    let hours = (uptime_seconds % 86400) / 3600;
    let minutes = (uptime_seconds % 3600) / 60;
    let secs = uptime_seconds % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {secs}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

fn service_uptime(started_at: DateTime<Utc>) -> UptimeInfo {
    let uptime = Utc::now().signed_duration_since(started_at);
    UptimeInfo {
        seconds: uptime.num_seconds(),
        human: human_readable_uptime(uptime),
    }
}

pub async fn get(State(state): State<Arc<crate::AppState>>) -> Json<HealthResponse> {
    let active_sessions = state.sessions.count().await.unwrap_or_default();

    let health_response = HealthResponse {
        status: HealthStatus::Healthy,
        timestamp: Utc::now().to_rfc3339(),
        started_at: state.started_at.to_rfc3339(),
        uptime: service_uptime(state.started_at),
        services: ServiceInfo {
            sessions: "up".to_string(),
            active_sessions,
        },
    };

    log::debug!("Health check: {:?}", health_response);

    Json(health_response)
}
