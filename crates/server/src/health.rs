use axum::Json;
use http::StatusCode;

#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum HealthState {
    /// The process is up and serving.
    Healthy,
    /// The process accepts chat requests.
    Ready,
}

/// Liveness: answers as long as the server runs.
pub(crate) async fn health() -> (StatusCode, Json<HealthState>) {
    (StatusCode::OK, Json(HealthState::Healthy))
}

/// Readiness: the relay holds no state that could make it unready once bound.
pub(crate) async fn readiness() -> (StatusCode, Json<HealthState>) {
    (StatusCode::OK, Json(HealthState::Ready))
}
