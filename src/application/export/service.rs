use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::{counter, histogram};
use time::{Date, OffsetDateTime};
use tracing::{info, warn};

use crate::application::render::{MarkdownRenderer, RenderedMarkdown, markdown_renderer};

use super::{
    capture::{CaptureError, PdfCaptureService},
    diagram::DiagramSettings,
    document::wrap_document,
    error::ExportError,
    filename::{pdf_filename_on, pdf_headers},
    options::{PdfOptions, PdfOptionsOverride},
};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 500_000;

const METRIC_EXPORT_TOTAL: &str = "markfolio_export_pdf_total";
const METRIC_EXPORT_FAILED: &str = "markfolio_export_pdf_failed_total";
const METRIC_EXPORT_MS: &str = "markfolio_export_pdf_ms";

/// A finished export, ready to hand to an HTTP response or write to disk.
#[derive(Debug, Clone)]
pub struct PdfExport {
    pub bytes: Bytes,
    pub filename: String,
    pub headers: HeaderMap,
}

impl IntoResponse for PdfExport {
    fn into_response(self) -> Response {
        (StatusCode::OK, self.headers, Body::from(self.bytes)).into_response()
    }
}

/// Entry point for every export: render, sanitize, wrap, capture.
pub struct ExportService {
    renderer: Arc<MarkdownRenderer>,
    capture: PdfCaptureService,
    diagrams: DiagramSettings,
    pdf_defaults: PdfOptions,
}

impl ExportService {
    pub fn new(
        capture: PdfCaptureService,
        diagrams: DiagramSettings,
        pdf_defaults: PdfOptions,
    ) -> Self {
        Self {
            renderer: markdown_renderer(),
            capture,
            diagrams,
            pdf_defaults,
        }
    }

    pub fn is_available(&self) -> bool {
        self.capture.is_available()
    }

    pub async fn export_pdf(
        &self,
        title: &str,
        markdown: &str,
        options: Option<&PdfOptionsOverride>,
    ) -> Result<PdfExport, ExportError> {
        self.export_pdf_on(title, markdown, options, OffsetDateTime::now_utc().date())
            .await
    }

    /// As [`ExportService::export_pdf`], dating the filename with `date`.
    pub async fn export_pdf_on(
        &self,
        title: &str,
        markdown: &str,
        options: Option<&PdfOptionsOverride>,
        date: Date,
    ) -> Result<PdfExport, ExportError> {
        let started_at = Instant::now();
        counter!(METRIC_EXPORT_TOTAL).increment(1);

        let result = self.run_export(title, markdown, options, date).await;
        histogram!(METRIC_EXPORT_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(export) => info!(
                target = "application::export",
                op = "export::pdf",
                result = "ok",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                filename = %export.filename,
                pdf_bytes = export.bytes.len(),
                "PDF exported"
            ),
            Err(err) => {
                let reason = if err.is_validation() {
                    "validation"
                } else if err.is_unavailable() {
                    "unavailable"
                } else {
                    "capture"
                };
                counter!(METRIC_EXPORT_FAILED, "reason" => reason).increment(1);
                warn!(
                    target = "application::export",
                    op = "export::pdf",
                    result = "error",
                    reason,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "PDF export failed"
                );
            }
        }

        result
    }

    /// Sanitized fragment for in-browser previews. Never carries script.
    pub fn preview_html(&self, markdown: &str) -> String {
        self.renderer.render_html(markdown)
    }

    pub fn preview(&self, markdown: &str) -> RenderedMarkdown {
        self.renderer.render(markdown)
    }

    async fn run_export(
        &self,
        title: &str,
        markdown: &str,
        options: Option<&PdfOptionsOverride>,
        date: Date,
    ) -> Result<PdfExport, ExportError> {
        validate_input(title, markdown)?;

        if !self.capture.is_available() {
            return Err(CaptureError::Unavailable.into());
        }

        let rendered = self.renderer.render(markdown);
        let document = wrap_document(&rendered, title, &self.diagrams)?;
        let options = match options {
            Some(overrides) => self.pdf_defaults.merged_with(overrides),
            None => self.pdf_defaults.clone(),
        };

        let bytes = self.capture.capture(&document, &options).await?;
        let filename = pdf_filename_on(title, date);
        let headers = pdf_headers(&filename);

        Ok(PdfExport {
            bytes,
            filename,
            headers,
        })
    }
}

fn validate_input(title: &str, markdown: &str) -> Result<(), ExportError> {
    check_length("title", title, MAX_TITLE_CHARS)?;
    check_length("content", markdown, MAX_CONTENT_CHARS)
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ExportError> {
    if value.is_empty() {
        return Err(ExportError::validation(field, "must not be empty"));
    }
    let count = value.chars().count();
    if count > max {
        return Err(ExportError::validation(
            field,
            format!("must be at most {max} characters (got {count})"),
        ));
    }
    Ok(())
}
