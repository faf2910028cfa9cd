use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the markfolio binary.
#[derive(Debug, Parser)]
#[command(
    name = "markfolio",
    version,
    about = "Markdown preview and PDF export service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MARKFOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP export service.
    Serve(Box<ServeArgs>),
    /// Export a markdown file to PDF.
    Export(ExportArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CaptureOverrides {
    /// Override the Chrome/Chromium executable used for capture.
    #[arg(long = "chrome-path", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub chrome_path: Option<PathBuf>,

    /// Enable or disable PDF capture.
    #[arg(
        long = "capture-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub capture_enabled: Option<bool>,

    /// Override the diagram library script URL injected into print documents.
    #[arg(long = "diagram-script-url", value_name = "URL")]
    pub diagram_script_url: Option<String>,

    /// Override the default page format (A4|Letter|Legal).
    #[arg(long = "pdf-format", value_name = "FORMAT")]
    pub pdf_format: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub capture: CaptureOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the maximum request body size in bytes.
    #[arg(long = "server-max-request-bytes", value_name = "BYTES")]
    pub server_max_request_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub capture: CaptureOverrides,

    /// Document title; defaults to the input file name.
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Where to write the PDF; defaults to a dated name derived from the title.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Markdown file to export.
    #[arg(value_name = "INPUT", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,
}
