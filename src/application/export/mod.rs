//! PDF export pipeline: wrap sanitized markdown into a print document and
//! capture it through a headless browser.
//!
//! [`ExportService`] is the only entry point callers should use. Capture and
//! wrapping are exposed for tests and alternative backends.

mod capture;
mod diagram;
mod document;
mod error;
mod filename;
mod options;
mod service;

pub use capture::{
    BackendError, BrowserSession, CaptureBackend, CaptureError, CaptureTimeouts, PdfCaptureService,
};
pub use diagram::{
    DEFAULT_DIAGRAM_SCRIPT_URL, DiagramProbe, DiagramProgress, DiagramSettings, DiagramState,
    DiagramTheme, NetworkSnapshot, READINESS_FLAG, decode_reply,
};
pub use document::{PrintDocument, wrap_document};
pub use error::ExportError;
pub use filename::{pdf_filename, pdf_filename_on, pdf_headers};
pub use options::{
    CssLength, LengthUnit, MarginOverride, PageMargin, PdfFormat, PdfOptions, PdfOptionsError,
    PdfOptionsOverride,
};
pub use service::{ExportService, MAX_CONTENT_CHARS, MAX_TITLE_CHARS, PdfExport};
