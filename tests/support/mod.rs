#![allow(dead_code)]

use std::{
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use markfolio::application::export::{
    BackendError, BrowserSession, CaptureBackend, CaptureTimeouts, DiagramProbe, DiagramSettings,
    DiagramTheme, ExportService, PdfCaptureService, PdfOptions,
};
use serde_json::{Value, json};
use tracing::subscriber::DefaultGuard;

pub const FAKE_PDF: &[u8] = b"%PDF-1.7 fake";

/// How the scripted page behaves once loaded.
#[derive(Debug, Clone, Copy)]
pub struct PageScript {
    pub library_present: bool,
    pub diagrams_render: bool,
    /// The bootstrap reports a terminal failure once rendering starts.
    pub diagrams_fail: bool,
    /// Network polls during which the resource count keeps growing.
    /// `u32::MAX` never settles.
    pub network_churn: u32,
    pub fail_print: bool,
    /// Printing never completes.
    pub hang_print: bool,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            library_present: true,
            diagrams_render: true,
            diagrams_fail: false,
            network_churn: 0,
            fail_print: false,
            hang_print: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub launches: usize,
    pub closes: usize,
    pub documents: Vec<String>,
    pub expressions: Vec<String>,
    pub printed_with: Vec<PdfOptions>,
}

impl Recorded {
    pub fn evaluated(&self, expression: &str) -> usize {
        self.expressions
            .iter()
            .filter(|candidate| candidate.as_str() == expression)
            .count()
    }
}

/// Scripted backend standing in for a real browser.
#[derive(Clone, Default)]
pub struct FakeBackend {
    script: PageScript,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeBackend {
    pub fn new(script: PageScript) -> Self {
        Self {
            script,
            recorded: Arc::default(),
        }
    }

    pub fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("recorded state")
    }

    pub fn capture_service(&self) -> PdfCaptureService {
        PdfCaptureService::new(
            Some(Arc::new(self.clone()) as Arc<dyn CaptureBackend>),
            CaptureTimeouts::default(),
            DiagramTheme::default(),
        )
    }

    pub fn export_service(&self) -> ExportService {
        ExportService::new(
            self.capture_service(),
            DiagramSettings::default(),
            PdfOptions::default(),
        )
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BackendError> {
        self.recorded().launches += 1;
        Ok(Box::new(FakeSession {
            script: self.script,
            recorded: Arc::clone(&self.recorded),
            kicked: false,
            network_polls: 0,
        }))
    }
}

struct FakeSession {
    script: PageScript,
    recorded: Arc<Mutex<Recorded>>,
    kicked: bool,
    network_polls: u32,
}

impl FakeSession {
    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("recorded state")
    }

    fn reply(&mut self, expression: &str) -> Result<Value, BackendError> {
        if expression == DiagramProbe::network() {
            let resources = 2 + self.network_polls.min(self.script.network_churn);
            self.network_polls = self.network_polls.saturating_add(1);
            return Ok(json!({ "readyState": "complete", "resources": resources })
                .to_string()
                .into());
        }
        if expression == DiagramProbe::library_present() {
            return Ok(Value::String(self.script.library_present.to_string()));
        }
        if expression == DiagramProbe::progress() {
            let done = self.kicked && self.script.diagrams_render;
            let reply = if self.kicked && self.script.diagrams_fail {
                json!({ "ready": false, "total": 1, "pending": 1 })
            } else if done {
                json!({ "ready": true, "total": 1, "pending": 0 })
            } else {
                json!({ "ready": null, "total": 1, "pending": 1 })
            };
            return Ok(Value::String(reply.to_string()));
        }
        if expression.contains("markfolioDiagramsStarted") {
            let started = !self.kicked;
            self.kicked = true;
            return Ok(Value::String(started.to_string()));
        }
        Err(BackendError::new(format!("unscripted expression: {expression}")))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn load(&mut self, document: &str) -> Result<(), BackendError> {
        self.recorded().documents.push(document.to_string());
        Ok(())
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Value, BackendError> {
        self.recorded().expressions.push(expression.to_string());
        self.reply(expression)
    }

    async fn print_to_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, BackendError> {
        self.recorded().printed_with.push(options.clone());
        if self.script.hang_print {
            std::future::pending::<()>().await;
        }
        if self.script.fail_print {
            return Err(BackendError::new("printing crashed"));
        }
        Ok(FAKE_PDF.to_vec())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.recorded().closes += 1;
        Ok(())
    }
}

/// Formatted log output captured from the current thread.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route events on this thread into a buffer until the guard drops.
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
