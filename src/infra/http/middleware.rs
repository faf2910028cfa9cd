use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Adopt the caller's `x-request-id` when it is short and printable, otherwise
/// mint one. The id is echoed on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id =
        inbound_request_id(request.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let acceptable = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    acceptable.then(|| value.to_string())
}

/// Log every 4xx/5xx with the [`ErrorReport`] the handler attached, if any.
/// Successful requests are logged at debug level only.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if !(status.is_client_error() || status.is_server_error()) {
        let bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        debug!(
            target = "markfolio::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            bytes,
            request_id = %request_id,
            "request served",
        );
        return response;
    }

    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .map(String::as_str)
        .unwrap_or("no diagnostic available");

    if status.is_server_error() {
        error!(
            target = "markfolio::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail = %detail,
            chain = ?messages,
            request_id = %request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "markfolio::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail = %detail,
            chain = ?messages,
            request_id = %request_id,
            "client request error",
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn adopts_well_formed_inbound_ids() {
        assert_eq!(
            inbound_request_id(&headers_with("req-42.a_b")).as_deref(),
            Some("req-42.a_b")
        );
    }

    #[test]
    fn rejects_missing_or_odd_inbound_ids() {
        assert!(inbound_request_id(&HeaderMap::new()).is_none());
        assert!(inbound_request_id(&headers_with("   ")).is_none());
        assert!(inbound_request_id(&headers_with("has space")).is_none());
        assert!(inbound_request_id(&headers_with(&"x".repeat(65))).is_none());
    }
}
