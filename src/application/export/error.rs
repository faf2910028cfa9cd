use thiserror::Error;

use super::capture::CaptureError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{field} {reason}")]
    Validation {
        field: &'static str,
        reason: String,
    },
    #[error("failed to build print document: {message}")]
    Template { message: String },
    #[error("Failed to generate PDF: {0}")]
    Capture(#[from] CaptureError),
}

impl ExportError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// The capture backend is not provisioned; nothing was attempted.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ExportError::Capture(CaptureError::Unavailable))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ExportError::Validation { .. })
    }
}
