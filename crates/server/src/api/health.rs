use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use stowage_lifecycle::MetricsSnapshot;

use super::AppState;
use super::schemas::{HealthResponse, MetricsResponse};

fn build_metrics_response(snap: &MetricsSnapshot) -> MetricsResponse {
    MetricsResponse {
        uploads: snap.uploads,
        deletes: snap.deletes,
        sweeps: snap.sweeps,
        sweep_failures: snap.sweep_failures,
        attachments_expired: snap.attachments_expired,
        metadata_purged: snap.metadata_purged,
        deletion_failures: snap.deletion_failures,
        pins_succeeded: snap.pins_succeeded,
        pins_failed: snap.pins_failed,
        missing_found: snap.missing_found,
    }
}

/// `GET /health` -- service status together with a metrics snapshot.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.service.metrics().snapshot();
    let body = HealthResponse {
        status: "ok".into(),
        metrics: build_metrics_response(&snap),
    };
    (StatusCode::OK, Json(body))
}
