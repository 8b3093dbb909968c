use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use foodcourt_entitlement::EntitlementService;
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    store: &'static str,
    timestamp: DateTime<Utc>,
}

/// 200 while the store answers, 503 otherwise.
pub async fn health(State(service): State<EntitlementService>) -> (StatusCode, Json<Health>) {
    let (status, store) = match service.check_store().await {
        Ok(()) => (StatusCode::OK, "reachable"),
        Err(err) => {
            warn!("health check failed: {err}");
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable")
        }
    };
    let body = Health {
        status: if status.is_success() { "OK" } else { "DEGRADED" },
        store,
        timestamp: Utc::now(),
    };
    (status, Json(body))
}
