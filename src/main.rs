use std::{path::PathBuf, process, sync::Arc};

use markfolio::{
    application::{
        error::AppError,
        export::{CaptureBackend, ExportService, PdfCaptureService},
    },
    config,
    infra::{
        browser::HeadlessChromeBackend,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let export = Arc::new(build_export_service(&settings));

    match command {
        config::Command::Serve(_) => run_serve(settings, export).await,
        config::Command::Export(args) => run_export(export, args).await,
    }
}

fn build_export_service(settings: &config::Settings) -> ExportService {
    let capture = &settings.capture;
    let backend: Option<Arc<dyn CaptureBackend>> = if capture.enabled {
        HeadlessChromeBackend::detect(
            capture.chrome_path.as_deref(),
            capture.sandbox,
            capture.idle_timeout,
        )
        .map(|backend| Arc::new(backend) as Arc<dyn CaptureBackend>)
    } else {
        info!(target = "markfolio::startup", "PDF capture disabled by configuration");
        None
    };

    let capture_service = PdfCaptureService::new(
        backend,
        capture.timeouts,
        settings.diagrams.theme,
    );

    ExportService::new(
        capture_service,
        settings.diagrams.clone(),
        settings.pdf.clone(),
    )
}

async fn run_serve(settings: config::Settings, export: Arc<ExportService>) -> Result<(), AppError> {
    if !export.is_available() {
        warn!(
            target = "markfolio::startup",
            "Serving without a capture backend; PDF export requests will fail with 503"
        );
    }

    let body_limit = usize::try_from(settings.server.max_request_bytes.get())
        .map_err(|_| AppError::validation("server.max_request_bytes exceeds addressable memory"))?;
    let router = http::build_router(HttpState::new(export), body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "markfolio::startup",
        addr = %settings.server.addr,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "markfolio::startup", error = %err, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!(target = "markfolio::startup", "Shutdown signal received");
}

async fn run_export(export: Arc<ExportService>, args: config::ExportArgs) -> Result<(), AppError> {
    if !export.is_available() {
        return Err(InfraError::browser(
            "no Chrome/Chromium executable found; pass --chrome-path or set capture.chrome_path",
        )
        .into());
    }

    let markdown = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let title = match args.title {
        Some(title) => title,
        None => default_title(&args.input)?,
    };

    let pdf = export.export_pdf(&title, &markdown, None).await?;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&pdf.filename));

    tokio::fs::write(&output, &pdf.bytes)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "markfolio::export",
        input = %args.input.display(),
        output = %output.display(),
        bytes = pdf.bytes.len(),
        "PDF written"
    );

    Ok(())
}

fn default_title(input: &std::path::Path) -> Result<String, AppError> {
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::validation("--title is required when the input has no file name"))
}
