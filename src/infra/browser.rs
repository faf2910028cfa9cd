//! Local Chrome/Chromium capture backend built on `headless_chrome`.
//!
//! The crate's API is blocking, so every browser call runs on the blocking
//! pool. Documents are loaded from a temporary file so relative resources and
//! large payloads behave the same as a normal navigation.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab, types::PrintToPdfOptions};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::application::export::{
    BackendError, BrowserSession, CaptureBackend, PdfOptions,
};

#[derive(Debug, Clone)]
pub struct HeadlessChromeBackend {
    executable: PathBuf,
    sandbox: bool,
    idle_timeout: Duration,
}

impl HeadlessChromeBackend {
    pub fn new(executable: PathBuf, sandbox: bool, idle_timeout: Duration) -> Self {
        Self {
            executable,
            sandbox,
            idle_timeout,
        }
    }

    /// Resolve the browser executable from configuration or the usual install
    /// locations. `None` means capture is not provisioned on this host.
    pub fn detect(
        configured: Option<&Path>,
        sandbox: bool,
        idle_timeout: Duration,
    ) -> Option<Self> {
        let executable = match configured {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => {
                warn!(
                    target = "infra::browser",
                    path = %path.display(),
                    "Configured browser executable does not exist"
                );
                return None;
            }
            None => match headless_chrome::browser::default_executable() {
                Ok(path) => path,
                Err(err) => {
                    info!(
                        target = "infra::browser",
                        error = %err,
                        "No Chrome/Chromium executable found; PDF export disabled"
                    );
                    return None;
                }
            },
        };

        info!(
            target = "infra::browser",
            path = %executable.display(),
            sandbox,
            "Using headless browser for PDF capture"
        );
        Some(Self::new(executable, sandbox, idle_timeout))
    }
}

#[async_trait]
impl CaptureBackend for HeadlessChromeBackend {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BackendError> {
        let backend = self.clone();
        let (browser, tab) = blocking(move || {
            let options = LaunchOptions::default_builder()
                .path(Some(backend.executable))
                .headless(true)
                .sandbox(backend.sandbox)
                .idle_browser_timeout(backend.idle_timeout)
                .build()
                .map_err(|err| BackendError::new(format!("invalid launch options: {err}")))?;
            let browser = Browser::new(options).map_err(backend_error)?;
            let tab = browser.new_tab().map_err(backend_error)?;
            Ok((browser, tab))
        })
        .await?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
            document: None,
        }))
    }
}

struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    document: Option<NamedTempFile>,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn load(&mut self, html: &str) -> Result<(), BackendError> {
        let html = html.to_string();
        let file = blocking(move || {
            let mut file = tempfile::Builder::new()
                .prefix("markfolio-")
                .suffix(".html")
                .tempfile()
                .map_err(backend_error)?;
            file.write_all(html.as_bytes()).map_err(backend_error)?;
            file.flush().map_err(backend_error)?;
            Ok(file)
        })
        .await?;

        let url = file_url(file.path());
        self.document = Some(file);

        let tab = Arc::clone(&self.tab);
        blocking(move || {
            tab.navigate_to(&url).map_err(backend_error)?;
            tab.wait_until_navigated().map_err(backend_error)?;
            Ok(())
        })
        .await
    }

    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value, BackendError> {
        let tab = Arc::clone(&self.tab);
        let expression = expression.to_string();
        blocking(move || {
            let object = tab.evaluate(&expression, false).map_err(backend_error)?;
            Ok(object.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    async fn print_to_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>, BackendError> {
        let tab = Arc::clone(&self.tab);
        let print = print_options(options);
        blocking(move || tab.print_to_pdf(Some(print)).map_err(backend_error)).await
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        let tab = Arc::clone(&self.tab);
        let browser = self.browser.take();
        let document = self.document.take();
        blocking(move || {
            let closed = tab.close(false).map(|_| ()).map_err(backend_error);
            // Dropping the browser terminates the process.
            drop(browser);
            drop(document);
            closed
        })
        .await
    }
}

fn print_options(options: &PdfOptions) -> PrintToPdfOptions {
    let (paper_width, paper_height) = options.format.dimensions_in();
    PrintToPdfOptions {
        landscape: Some(false),
        display_header_footer: Some(options.display_header_footer),
        print_background: Some(options.print_background),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(options.margin.top.to_inches()),
        margin_bottom: Some(options.margin.bottom.to_inches()),
        margin_left: Some(options.margin.left.to_inches()),
        margin_right: Some(options.margin.right.to_inches()),
        header_template: options.header_template.clone(),
        footer_template: options.footer_template.clone(),
        prefer_css_page_size: Some(false),
        ..Default::default()
    }
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn backend_error(err: impl std::fmt::Display) -> BackendError {
    BackendError::new(err.to_string())
}

async fn blocking<T, F>(task: F) -> Result<T, BackendError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| BackendError::new(format!("browser task failed: {err}")))?
}
