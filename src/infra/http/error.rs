use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::{
    error::{ErrorReport, HttpError},
    export::ExportError,
};

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const UNAVAILABLE: &str = "export_unavailable";
    pub const EXPORT_FAILED: &str = "export_failed";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ExportError> for ApiError {
    fn from(error: ExportError) -> Self {
        // Only validation problems are the caller's to fix; everything else
        // keeps its detail in the report.
        let hint = error.is_validation().then(|| error.to_string());
        let code = if error.is_validation() {
            codes::INVALID_INPUT
        } else if error.is_unavailable() {
            codes::UNAVAILABLE
        } else {
            codes::EXPORT_FAILED
        };

        let http = HttpError::from(error);
        Self {
            status: http.status(),
            code,
            message: http.public_message(),
            hint,
            report: Some(http.into_report()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}
