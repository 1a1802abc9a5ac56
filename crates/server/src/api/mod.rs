pub mod attachments;
pub mod health;
pub mod schemas;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

use stowage_lifecycle::AttachmentService;

/// Room for multipart framing on top of the upload limit.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The attachment service.
    pub service: Arc<AttachmentService>,
    /// `max-age` sent with every attachment and thumbnail.
    pub cache_duration_seconds: u64,
}

/// Build the Axum router with all routes.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .service
        .config()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health::health))
        .route("/upload", post(attachments::upload))
        .route("/thumb/{size}/{id}", get(attachments::thumbnail))
        .route("/{id}/{filename}", get(attachments::download))
        .route("/{id}", delete(attachments::delete))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
