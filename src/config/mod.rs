//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::export::{
    CaptureTimeouts, CssLength, DEFAULT_DIAGRAM_SCRIPT_URL, DiagramSettings, DiagramTheme,
    PageMargin, PdfFormat, PdfOptions,
};

pub use cli::{CaptureOverrides, CliArgs, Command, ExportArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "markfolio";
const ENV_PREFIX: &str = "MARKFOLIO";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 4 * 1024 * 1024;
const DEFAULT_BROWSER_IDLE_SECS: u64 = 60;
const DEFAULT_LAUNCH_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_LOAD_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_NETWORK_IDLE_MS: u64 = 500;
const DEFAULT_NETWORK_POLL_MS: u64 = 100;
const DEFAULT_PDF_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_LIBRARY_POLL_MS: u64 = 100;
const DEFAULT_LIBRARY_POLL_ATTEMPTS: u64 = 50;
const DEFAULT_DIAGRAM_LIBRARY_WAIT_MS: u64 = 20_000;
const DEFAULT_DIAGRAM_RENDER_WAIT_MS: u64 = 30_000;
const DEFAULT_DIAGRAM_POLL_MS: u64 = 500;
const DEFAULT_DIAGRAM_SETTLE_MS: u64 = 500;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub capture: CaptureSettings,
    pub diagrams: DiagramSettings,
    pub pdf: PdfOptions,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub enabled: bool,
    pub chrome_path: Option<PathBuf>,
    pub sandbox: bool,
    pub idle_timeout: Duration,
    pub timeouts: CaptureTimeouts,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Export(args)) => raw.apply_capture_overrides(&args.capture),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    capture: RawCaptureSettings,
    diagrams: RawDiagramSettings,
    pdf: RawPdfSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(limit) = overrides.server_max_request_bytes {
            self.server.max_request_bytes = Some(limit);
        }

        self.apply_capture_overrides(&overrides.capture);
    }

    fn apply_capture_overrides(&mut self, overrides: &CaptureOverrides) {
        if let Some(path) = overrides.chrome_path.as_ref() {
            self.capture.chrome_path = Some(path.clone());
        }
        if let Some(enabled) = overrides.capture_enabled {
            self.capture.enabled = Some(enabled);
        }
        if let Some(url) = overrides.diagram_script_url.as_ref() {
            self.diagrams.script_url = Some(url.clone());
        }
        if let Some(format) = overrides.pdf_format.as_ref() {
            self.pdf.format = Some(format.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            capture,
            diagrams,
            pdf,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let (diagrams, diagram_waits) = build_diagram_settings(diagrams)?;
        let capture = build_capture_settings(capture, diagram_waits)?;
        let pdf = build_pdf_settings(pdf)?;

        Ok(Self {
            server,
            logging,
            capture,
            diagrams,
            pdf,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let max_request_bytes = NonZeroU64::new(
        server
            .max_request_bytes
            .unwrap_or(DEFAULT_MAX_REQUEST_BYTES),
    )
    .ok_or_else(|| LoadError::invalid("server.max_request_bytes", "must be greater than zero"))?;

    Ok(ServerSettings {
        addr,
        max_request_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

/// Waits the capture service applies to diagram rendering; configured next to
/// the rest of the diagram settings.
struct DiagramWaits {
    library: Duration,
    library_poll: Duration,
    render: Duration,
    poll: Duration,
    settle: Duration,
}

fn build_diagram_settings(
    diagrams: RawDiagramSettings,
) -> Result<(DiagramSettings, DiagramWaits), LoadError> {
    let script_url = diagrams
        .script_url
        .map(|url| url.trim().to_string())
        .unwrap_or_else(|| DEFAULT_DIAGRAM_SCRIPT_URL.to_string());
    if script_url.is_empty() {
        return Err(LoadError::invalid("diagrams.script_url", "must not be empty"));
    }

    let theme = match diagrams.theme {
        Some(theme) => DiagramTheme::from_str(&theme)
            .map_err(|err| LoadError::invalid("diagrams.theme", err.to_string()))?,
        None => DiagramTheme::default(),
    };

    let library_poll_interval = millis(
        diagrams.library_poll_interval_ms,
        DEFAULT_LIBRARY_POLL_MS,
        "diagrams.library_poll_interval_ms",
    )?;
    let library_poll_attempts = non_zero_u32(
        diagrams
            .library_poll_attempts
            .unwrap_or(DEFAULT_LIBRARY_POLL_ATTEMPTS),
        "diagrams.library_poll_attempts",
    )?;

    let waits = DiagramWaits {
        library: millis(
            diagrams.library_wait_ms,
            DEFAULT_DIAGRAM_LIBRARY_WAIT_MS,
            "diagrams.library_wait_ms",
        )?,
        library_poll: library_poll_interval,
        render: millis(
            diagrams.render_wait_ms,
            DEFAULT_DIAGRAM_RENDER_WAIT_MS,
            "diagrams.render_wait_ms",
        )?,
        poll: millis(
            diagrams.poll_interval_ms,
            DEFAULT_DIAGRAM_POLL_MS,
            "diagrams.poll_interval_ms",
        )?,
        settle: Duration::from_millis(diagrams.settle_ms.unwrap_or(DEFAULT_DIAGRAM_SETTLE_MS)),
    };

    Ok((
        DiagramSettings {
            script_url,
            theme,
            library_poll_interval,
            library_poll_attempts: library_poll_attempts.get(),
        },
        waits,
    ))
}

fn build_capture_settings(
    capture: RawCaptureSettings,
    diagrams: DiagramWaits,
) -> Result<CaptureSettings, LoadError> {
    let chrome_path = capture
        .chrome_path
        .filter(|path| !path.as_os_str().is_empty());

    let timeouts = CaptureTimeouts {
        launch: millis(
            capture.launch_timeout_ms,
            DEFAULT_LAUNCH_TIMEOUT_MS,
            "capture.launch_timeout_ms",
        )?,
        load: millis(
            capture.load_timeout_ms,
            DEFAULT_LOAD_TIMEOUT_MS,
            "capture.load_timeout_ms",
        )?,
        network_idle_window: millis(
            capture.network_idle_ms,
            DEFAULT_NETWORK_IDLE_MS,
            "capture.network_idle_ms",
        )?,
        network_poll_interval: millis(
            capture.network_poll_ms,
            DEFAULT_NETWORK_POLL_MS,
            "capture.network_poll_ms",
        )?,
        diagram_library: diagrams.library,
        diagram_library_poll_interval: diagrams.library_poll,
        diagram_render: diagrams.render,
        diagram_poll_interval: diagrams.poll,
        diagram_settle: diagrams.settle,
        pdf: millis(
            capture.pdf_timeout_ms,
            DEFAULT_PDF_TIMEOUT_MS,
            "capture.pdf_timeout_ms",
        )?,
    };

    let idle_secs = capture
        .browser_idle_seconds
        .unwrap_or(DEFAULT_BROWSER_IDLE_SECS);
    if idle_secs == 0 {
        return Err(LoadError::invalid(
            "capture.browser_idle_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CaptureSettings {
        enabled: capture.enabled.unwrap_or(true),
        chrome_path,
        sandbox: capture.sandbox.unwrap_or(false),
        idle_timeout: Duration::from_secs(idle_secs),
        timeouts,
    })
}

fn build_pdf_settings(pdf: RawPdfSettings) -> Result<PdfOptions, LoadError> {
    let defaults = PdfOptions::default();

    let format = match pdf.format {
        Some(format) => PdfFormat::from_str(&format)
            .map_err(|err| LoadError::invalid("pdf.format", err.to_string()))?,
        None => defaults.format,
    };

    let uniform = match pdf.margin {
        Some(margin) => Some(parse_length(&margin, "pdf.margin")?),
        None => None,
    };
    let side = |value: Option<String>, key: &'static str, fallback: CssLength| match value {
        Some(value) => parse_length(&value, key),
        None => Ok(uniform.unwrap_or(fallback)),
    };
    let margin = PageMargin {
        top: side(pdf.margin_top, "pdf.margin_top", defaults.margin.top)?,
        right: side(pdf.margin_right, "pdf.margin_right", defaults.margin.right)?,
        bottom: side(pdf.margin_bottom, "pdf.margin_bottom", defaults.margin.bottom)?,
        left: side(pdf.margin_left, "pdf.margin_left", defaults.margin.left)?,
    };

    Ok(PdfOptions {
        format,
        margin,
        display_header_footer: pdf
            .display_header_footer
            .unwrap_or(defaults.display_header_footer),
        header_template: pdf.header_template,
        footer_template: pdf.footer_template,
        print_background: pdf.print_background.unwrap_or(defaults.print_background),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCaptureSettings {
    enabled: Option<bool>,
    chrome_path: Option<PathBuf>,
    sandbox: Option<bool>,
    browser_idle_seconds: Option<u64>,
    launch_timeout_ms: Option<u64>,
    load_timeout_ms: Option<u64>,
    network_idle_ms: Option<u64>,
    network_poll_ms: Option<u64>,
    pdf_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDiagramSettings {
    script_url: Option<String>,
    theme: Option<String>,
    library_poll_interval_ms: Option<u64>,
    library_poll_attempts: Option<u64>,
    library_wait_ms: Option<u64>,
    render_wait_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPdfSettings {
    format: Option<String>,
    margin: Option<String>,
    margin_top: Option<String>,
    margin_right: Option<String>,
    margin_bottom: Option<String>,
    margin_left: Option<String>,
    display_header_footer: Option<bool>,
    header_template: Option<String>,
    footer_template: Option<String>,
    print_background: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_length(value: &str, key: &'static str) -> Result<CssLength, LoadError> {
    CssLength::from_str(value).map_err(|err| LoadError::invalid(key, err.to_string()))
}

/// A non-zero millisecond duration, falling back to `default` when unset.
fn millis(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    let value = value.unwrap_or(default);
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
