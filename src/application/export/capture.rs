//! Drives a headless browser session from loaded document to PDF bytes.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use super::{
    diagram::{
        DiagramProbe, DiagramProgress, DiagramState, DiagramTheme, NetworkSnapshot, decode_reply,
    },
    document::PrintDocument,
    options::PdfOptions,
};

const METRIC_DIAGRAM_WAIT_TIMEOUT: &str = "markfolio_diagram_wait_timeout_total";

/// Failure reported by a backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Launches browser sessions. One session serves exactly one capture.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BackendError>;
}

/// A single page in a launched browser.
#[async_trait]
pub trait BrowserSession: Send {
    async fn load(&mut self, html: &str) -> Result<(), BackendError>;

    /// Evaluate a JavaScript expression in the page and return its value.
    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value, BackendError>;

    async fn print_to_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, BackendError>;

    /// Release the browser. Called exactly once, on every exit path.
    async fn close(&mut self) -> Result<(), BackendError>;
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Browser rendering not available")]
    Unavailable,
    #[error("failed to launch browser: {0}")]
    Launch(BackendError),
    #[error("failed to load document: {0}")]
    Load(BackendError),
    #[error("failed to print document: {0}")]
    Print(BackendError),
    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout {
        stage: &'static str,
        after: Duration,
    },
}

/// Bounds for every wait inside a capture. None of them is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimeouts {
    pub launch: Duration,
    pub load: Duration,
    pub network_idle_window: Duration,
    pub network_poll_interval: Duration,
    pub diagram_library: Duration,
    pub diagram_library_poll_interval: Duration,
    pub diagram_render: Duration,
    pub diagram_poll_interval: Duration,
    pub diagram_settle: Duration,
    pub pdf: Duration,
}

impl Default for CaptureTimeouts {
    fn default() -> Self {
        Self {
            launch: Duration::from_secs(30),
            load: Duration::from_secs(30),
            network_idle_window: Duration::from_millis(500),
            network_poll_interval: Duration::from_millis(100),
            diagram_library: Duration::from_secs(20),
            diagram_library_poll_interval: Duration::from_millis(100),
            diagram_render: Duration::from_secs(30),
            diagram_poll_interval: Duration::from_millis(500),
            diagram_settle: Duration::from_millis(500),
            pdf: Duration::from_secs(30),
        }
    }
}

/// How the diagram wait ended. Only ever logged; capture continues regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiagramWait {
    Rendered,
    Failed,
    LibraryTimeout,
    RenderTimeout,
    ProbeError,
}

impl DiagramWait {
    fn as_str(self) -> &'static str {
        match self {
            DiagramWait::Rendered => "rendered",
            DiagramWait::Failed => "failed",
            DiagramWait::LibraryTimeout => "library_timeout",
            DiagramWait::RenderTimeout => "render_timeout",
            DiagramWait::ProbeError => "probe_error",
        }
    }
}

pub struct PdfCaptureService {
    backend: Option<Arc<dyn CaptureBackend>>,
    timeouts: CaptureTimeouts,
    theme: DiagramTheme,
}

impl PdfCaptureService {
    pub fn new(
        backend: Option<Arc<dyn CaptureBackend>>,
        timeouts: CaptureTimeouts,
        theme: DiagramTheme,
    ) -> Self {
        Self {
            backend,
            timeouts,
            theme,
        }
    }

    /// A service without a provisioned backend; every capture reports
    /// [`CaptureError::Unavailable`].
    pub fn unavailable() -> Self {
        Self::new(None, CaptureTimeouts::default(), DiagramTheme::default())
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn capture(
        &self,
        document: &PrintDocument,
        options: &PdfOptions,
    ) -> Result<Bytes, CaptureError> {
        let Some(backend) = self.backend.as_ref() else {
            warn!(
                target = "application::export::capture",
                op = "capture::launch",
                result = "unavailable",
                "Capture backend is not provisioned"
            );
            return Err(CaptureError::Unavailable);
        };

        let started_at = Instant::now();
        let mut session = bounded("launch", self.timeouts.launch, backend.launch())
            .await?
            .map_err(CaptureError::Launch)?;

        let result = self.run(session.as_mut(), document, options).await;

        if let Err(err) = session.close().await {
            warn!(
                target = "application::export::capture",
                op = "capture::close",
                result = "error",
                error = %err,
                "Failed to close browser session"
            );
        }

        match &result {
            Ok(bytes) => info!(
                target = "application::export::capture",
                op = "capture",
                result = "ok",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                pdf_bytes = bytes.len(),
                "Document captured"
            ),
            Err(err) => warn!(
                target = "application::export::capture",
                op = "capture",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "Document capture failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        document: &PrintDocument,
        options: &PdfOptions,
    ) -> Result<Bytes, CaptureError> {
        bounded("load", self.timeouts.load, session.load(&document.html))
            .await?
            .map_err(CaptureError::Load)?;

        bounded(
            "network idle",
            self.timeouts.load,
            self.wait_for_network_idle(session),
        )
        .await??;

        if document.has_diagrams {
            let started_at = Instant::now();
            let outcome = self.wait_for_diagrams(session).await;
            let elapsed_ms = started_at.elapsed().as_millis() as u64;
            if outcome == DiagramWait::Rendered {
                debug!(
                    target = "application::export::capture",
                    op = "capture::diagrams",
                    result = outcome.as_str(),
                    elapsed_ms,
                    "Diagrams rendered"
                );
            } else {
                warn!(
                    target = "application::export::capture",
                    op = "capture::diagrams",
                    result = outcome.as_str(),
                    elapsed_ms,
                    "Diagram rendering incomplete; continuing capture"
                );
            }
        }

        let pdf = bounded("print", self.timeouts.pdf, session.print_to_pdf(options))
            .await?
            .map_err(CaptureError::Print)?;

        Ok(Bytes::from(pdf))
    }

    /// Wait until the document finished loading and no new resources have
    /// appeared for the quiescence window.
    async fn wait_for_network_idle(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<(), CaptureError> {
        let mut settled: Option<u64> = None;
        let mut stable_since = Instant::now();

        loop {
            let snapshot: NetworkSnapshot = probe(session, DiagramProbe::network())
                .await
                .map_err(CaptureError::Load)?;
            let now = Instant::now();

            if snapshot.is_loaded() && settled == Some(snapshot.resources) {
                if now.duration_since(stable_since) >= self.timeouts.network_idle_window {
                    return Ok(());
                }
            } else {
                settled = snapshot.is_loaded().then_some(snapshot.resources);
                stable_since = now;
            }

            sleep(self.timeouts.network_poll_interval).await;
        }
    }

    async fn wait_for_diagrams(&self, session: &mut dyn BrowserSession) -> DiagramWait {
        let library = timeout(self.timeouts.diagram_library, async {
            loop {
                let present: bool = probe(session, DiagramProbe::library_present()).await?;
                if present {
                    return Ok::<_, BackendError>(());
                }
                sleep(self.timeouts.diagram_library_poll_interval).await;
            }
        })
        .await;

        match library {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    target = "application::export::capture",
                    op = "capture::diagrams",
                    error = %err,
                    "Diagram library probe failed"
                );
                return DiagramWait::ProbeError;
            }
            Err(_) => {
                counter!(METRIC_DIAGRAM_WAIT_TIMEOUT, "phase" => "library").increment(1);
                return DiagramWait::LibraryTimeout;
            }
        }

        match probe::<bool>(session, &DiagramProbe::kick_render(self.theme)).await {
            Ok(true) => debug!(
                target = "application::export::capture",
                op = "capture::diagrams",
                "Started diagram render from capture"
            ),
            Ok(false) => {}
            Err(err) => debug!(
                target = "application::export::capture",
                op = "capture::diagrams",
                error = %err,
                "Diagram render kick failed"
            ),
        }

        let progress_probe = DiagramProbe::progress();
        let rendered = timeout(self.timeouts.diagram_render, async {
            loop {
                let progress: DiagramProgress = probe(session, &progress_probe).await?;
                if progress.is_complete() {
                    return Ok::<_, BackendError>(DiagramWait::Rendered);
                }
                if progress.state() == DiagramState::Failed {
                    return Ok(DiagramWait::Failed);
                }
                sleep(self.timeouts.diagram_poll_interval).await;
            }
        })
        .await;

        let outcome = match rendered {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(
                    target = "application::export::capture",
                    op = "capture::diagrams",
                    error = %err,
                    "Diagram progress probe failed"
                );
                DiagramWait::ProbeError
            }
            Err(_) => {
                counter!(METRIC_DIAGRAM_WAIT_TIMEOUT, "phase" => "render").increment(1);
                DiagramWait::RenderTimeout
            }
        };

        sleep(self.timeouts.diagram_settle).await;
        outcome
    }
}

async fn probe<T: DeserializeOwned>(
    session: &mut dyn BrowserSession,
    expression: &str,
) -> Result<T, BackendError> {
    let value = session.evaluate(expression).await?;
    decode_reply(value).map_err(|err| BackendError::new(err.to_string()))
}

async fn bounded<F: Future>(
    stage: &'static str,
    limit: Duration,
    future: F,
) -> Result<F::Output, CaptureError> {
    timeout(limit, future)
        .await
        .map_err(|_| CaptureError::Timeout {
            stage,
            after: limit,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_service_rejects_immediately() {
        let service = PdfCaptureService::unavailable();
        assert!(!service.is_available());
        let err = service
            .capture(&PrintDocument::new("<p>x</p>", false), &PdfOptions::default())
            .await
            .expect_err("no backend");
        assert!(matches!(err, CaptureError::Unavailable));
        assert_eq!(err.to_string(), "Browser rendering not available");
    }

    #[test]
    fn timeout_error_names_stage() {
        let err = CaptureError::Timeout {
            stage: "print",
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "print timed out after 30000ms");
    }

    #[test]
    fn default_timeouts_are_bounded() {
        let timeouts = CaptureTimeouts::default();
        assert_eq!(timeouts.diagram_library, Duration::from_secs(20));
        assert_eq!(timeouts.diagram_render, Duration::from_secs(30));
        assert_eq!(timeouts.diagram_poll_interval, Duration::from_millis(500));
        assert_eq!(timeouts.pdf, Duration::from_secs(30));
    }
}
