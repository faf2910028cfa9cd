mod error;
mod export;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::export::ExportService;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use export::{ExportPdfRequest, PreviewRequest, PreviewResponse};
pub use middleware::{REQUEST_ID_HEADER, RequestContext, log_responses, set_request_context};

pub const EXPORT_STATUS_HEADER: &str = "x-pdf-export";

#[derive(Clone)]
pub struct HttpState {
    pub export: Arc<ExportService>,
}

impl HttpState {
    pub fn new(export: Arc<ExportService>) -> Self {
        Self { export }
    }
}

pub fn build_router(state: HttpState, body_limit: usize) -> Router {
    Router::new()
        .route("/api/export/pdf", post(export::export_pdf))
        .route("/api/preview", post(export::preview))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}

/// `204` while the process is up. An unprovisioned capture backend does not
/// fail the check; it is flagged in a header and reported on export.
async fn health(State(state): State<HttpState>) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    if !state.export.is_available() {
        response
            .headers_mut()
            .insert(EXPORT_STATUS_HEADER, HeaderValue::from_static("unavailable"));
    }
    response
}
