use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

use crate::application::{
    export::{PdfExport, PdfOptionsOverride},
    render::{MarkdownValidation, validate_markdown, word_count},
};

use super::{HttpState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ExportPdfRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub options: Option<PdfOptionsOverride>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub html: String,
    pub word_count: usize,
    pub diagram_count: usize,
    pub validation: MarkdownValidation,
}

pub async fn export_pdf(
    State(state): State<HttpState>,
    payload: Result<Json<ExportPdfRequest>, JsonRejection>,
) -> Result<PdfExport, ApiError> {
    let Json(payload) = payload.map_err(malformed_body)?;
    let export = state
        .export
        .export_pdf(&payload.title, &payload.content, payload.options.as_ref())
        .await?;
    Ok(export)
}

pub async fn preview(
    State(state): State<HttpState>,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let Json(payload) = payload.map_err(malformed_body)?;
    let rendered = state.export.preview(&payload.content);
    Ok(Json(PreviewResponse {
        html: rendered.html,
        word_count: word_count(&payload.content),
        diagram_count: rendered.diagram_count,
        validation: validate_markdown(&payload.content),
    }))
}

/// Bodies that never reach the façade still answer in the API error shape.
fn malformed_body(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("Malformed request body", Some(rejection.body_text()))
}
