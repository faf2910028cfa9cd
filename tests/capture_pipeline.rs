mod support;

use axum::http::header::CONTENT_DISPOSITION;
use markfolio::application::export::{
    CaptureError, DEFAULT_DIAGRAM_SCRIPT_URL, DiagramProbe, DiagramSettings, ExportError,
    ExportService, PdfCaptureService, PdfFormat, PdfOptions, PdfOptionsOverride, PrintDocument,
};
use support::{FAKE_PDF, FakeBackend, PageScript, capture_logs};
use time::macros::date;

const DIAGRAM_DOCUMENT: &str = "# Flow\n\n```mermaid\ngraph TD\n  A --> B\n```\n";

#[tokio::test(start_paused = true)]
async fn plain_document_never_probes_for_diagrams() {
    let backend = FakeBackend::new(PageScript::default());
    let export = backend.export_service();

    let pdf = export
        .export_pdf_on("Notes", "just text", None, date!(2026 - 10 - 16))
        .await
        .expect("export succeeds");

    assert_eq!(pdf.bytes.as_ref(), FAKE_PDF);
    let recorded = backend.recorded();
    assert_eq!(recorded.evaluated(DiagramProbe::library_present()), 0);
    assert_eq!(recorded.evaluated(&DiagramProbe::progress()), 0);
    assert!(recorded.evaluated(DiagramProbe::network()) > 0);
    assert!(!recorded.documents[0].contains(DEFAULT_DIAGRAM_SCRIPT_URL));
}

#[tokio::test(start_paused = true)]
async fn diagrams_are_waited_for_before_printing() {
    let backend = FakeBackend::new(PageScript::default());
    let export = backend.export_service();

    let pdf = export
        .export_pdf_on("Flow", DIAGRAM_DOCUMENT, None, date!(2026 - 10 - 16))
        .await
        .expect("export succeeds");

    assert_eq!(pdf.bytes.as_ref(), FAKE_PDF);
    let recorded = backend.recorded();
    let document = &recorded.documents[0];
    assert!(document.contains(DEFAULT_DIAGRAM_SCRIPT_URL));
    assert!(document.contains("class=\"mermaid\""));
    assert!(document.contains("A --&gt; B"));
    assert!(recorded.evaluated(DiagramProbe::library_present()) >= 1);
    assert!(recorded.evaluated(&DiagramProbe::progress()) >= 1);
    assert_eq!(recorded.printed_with.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_diagram_library_still_produces_pdf() {
    let backend = FakeBackend::new(PageScript {
        library_present: false,
        ..PageScript::default()
    });
    let export = backend.export_service();

    let pdf = export
        .export_pdf_on("Flow", DIAGRAM_DOCUMENT, None, date!(2026 - 10 - 16))
        .await
        .expect("diagram failures are not fatal");

    assert_eq!(pdf.bytes.as_ref(), FAKE_PDF);
    let recorded = backend.recorded();
    assert!(recorded.evaluated(DiagramProbe::library_present()) > 1);
    assert_eq!(recorded.evaluated(&DiagramProbe::progress()), 0);
    assert_eq!(recorded.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_diagram_render_still_produces_pdf() {
    let backend = FakeBackend::new(PageScript {
        diagrams_render: false,
        ..PageScript::default()
    });

    let bytes = backend
        .capture_service()
        .capture(
            &PrintDocument::new("<div class=\"mermaid\">graph TD</div>", true),
            &PdfOptions::default(),
        )
        .await
        .expect("render timeout is not fatal");

    assert_eq!(bytes.as_ref(), FAKE_PDF);
    assert!(backend.recorded().evaluated(&DiagramProbe::progress()) > 1);
}

#[tokio::test(start_paused = true)]
async fn session_is_closed_when_printing_fails() {
    let backend = FakeBackend::new(PageScript {
        fail_print: true,
        ..PageScript::default()
    });

    let err = backend
        .capture_service()
        .capture(&PrintDocument::new("<p>hello</p>", false), &PdfOptions::default())
        .await
        .expect_err("print failure surfaces");

    assert!(matches!(err, CaptureError::Print(_)));
    let recorded = backend.recorded();
    assert_eq!(recorded.launches, 1);
    assert_eq!(recorded.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn print_failure_maps_to_generic_export_error() {
    let backend = FakeBackend::new(PageScript {
        fail_print: true,
        ..PageScript::default()
    });

    let err = backend
        .export_service()
        .export_pdf_on("Report", "body", None, date!(2026 - 10 - 16))
        .await
        .expect_err("print failure surfaces");

    assert!(!err.is_validation());
    assert!(!err.is_unavailable());
    assert!(err.to_string().starts_with("Failed to generate PDF"));
}

#[tokio::test]
async fn invalid_requests_never_launch_a_browser() {
    let backend = FakeBackend::new(PageScript::default());
    let export = backend.export_service();

    let err = export
        .export_pdf_on("", "body", None, date!(2026 - 10 - 16))
        .await
        .expect_err("empty title rejected");
    assert!(err.is_validation());

    let long_title = "t".repeat(201);
    let err = export
        .export_pdf_on(&long_title, "body", None, date!(2026 - 10 - 16))
        .await
        .expect_err("long title rejected");
    assert!(err.is_validation());

    let err = export
        .export_pdf_on("Report", "", None, date!(2026 - 10 - 16))
        .await
        .expect_err("empty content rejected");
    assert!(err.is_validation());

    assert_eq!(backend.recorded().launches, 0);
}

#[tokio::test]
async fn unprovisioned_capture_reports_unavailable() {
    let export = ExportService::new(
        PdfCaptureService::unavailable(),
        DiagramSettings::default(),
        PdfOptions::default(),
    );

    assert!(!export.is_available());
    let err = export
        .export_pdf_on("Report", "body", None, date!(2026 - 10 - 16))
        .await
        .expect_err("no backend");
    assert!(err.is_unavailable());
    assert!(matches!(err, ExportError::Capture(CaptureError::Unavailable)));
}

#[tokio::test(start_paused = true)]
async fn export_names_and_heads_the_download() {
    let backend = FakeBackend::new(PageScript::default());
    let export = backend.export_service();

    let pdf = export
        .export_pdf_on(
            "Report",
            "# Title\n\nHello **world**",
            None,
            date!(2026 - 10 - 16),
        )
        .await
        .expect("export succeeds");

    assert_eq!(pdf.filename, "report_2026-10-16.pdf");
    assert_eq!(
        pdf.headers[CONTENT_DISPOSITION],
        "attachment; filename=\"report_2026-10-16.pdf\""
    );

    let recorded = backend.recorded();
    let document = &recorded.documents[0];
    assert!(document.contains("<title>Report</title>"));
    assert!(document.contains("<h1>Title</h1>"));
    assert!(document.contains("<strong>world</strong>"));
}

#[tokio::test(start_paused = true)]
async fn caller_options_override_defaults() {
    let backend = FakeBackend::new(PageScript::default());
    let overrides = PdfOptionsOverride {
        format: Some(PdfFormat::Letter),
        print_background: Some(false),
        ..PdfOptionsOverride::default()
    };

    backend
        .export_service()
        .export_pdf_on("Report", "body", Some(&overrides), date!(2026 - 10 - 16))
        .await
        .expect("export succeeds");

    let recorded = backend.recorded();
    let printed = &recorded.printed_with[0];
    assert_eq!(printed.format, PdfFormat::Letter);
    assert!(!printed.print_background);
    assert_eq!(printed.margin, PdfOptions::default().margin);
}

#[tokio::test(start_paused = true)]
async fn hostile_markdown_is_inert_in_the_print_document() {
    let backend = FakeBackend::new(PageScript::default());
    let markdown = "<script>alert(1)</script>\n\n<img src=x onerror=\"alert(2)\">\n\n[x](javascript:alert(3))";

    backend
        .export_service()
        .export_pdf_on("Report", markdown, None, date!(2026 - 10 - 16))
        .await
        .expect("export succeeds");

    let recorded = backend.recorded();
    let document = &recorded.documents[0];
    assert!(!document.contains("alert(1)"));
    assert!(!document.contains("onerror"));
    assert!(!document.contains("javascript:"));
    assert!(!document.contains("<script"));
}

#[tokio::test(start_paused = true)]
async fn diagram_mentions_in_code_never_load_the_library() {
    let backend = FakeBackend::new(PageScript::default());
    let markdown = "Charts use `<div class=\"mermaid\">` containers:\n\n```html\n<div class=\"mermaid\">graph TD</div>\n```\n";

    backend
        .export_service()
        .export_pdf_on("Notes", markdown, None, date!(2026 - 10 - 16))
        .await
        .expect("export succeeds");

    let recorded = backend.recorded();
    let document = &recorded.documents[0];
    assert!(document.contains("class=\"mermaid\""));
    assert!(!document.contains("<script"));
    assert_eq!(recorded.evaluated(DiagramProbe::library_present()), 0);
    assert_eq!(recorded.evaluated(&DiagramProbe::progress()), 0);
}

#[tokio::test(start_paused = true)]
async fn network_that_never_settles_times_out_and_closes() {
    let backend = FakeBackend::new(PageScript {
        network_churn: u32::MAX,
        ..PageScript::default()
    });

    let err = backend
        .capture_service()
        .capture(&PrintDocument::new("<p>hello</p>", false), &PdfOptions::default())
        .await
        .expect_err("network idle is bounded");

    assert!(matches!(
        err,
        CaptureError::Timeout {
            stage: "network idle",
            ..
        }
    ));
    assert_eq!(err.to_string(), "network idle timed out after 30000ms");
    let recorded = backend.recorded();
    assert!(recorded.printed_with.is_empty());
    assert_eq!(recorded.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn printing_waits_for_resource_count_to_settle() {
    let quiet = FakeBackend::new(PageScript::default());
    quiet
        .capture_service()
        .capture(&PrintDocument::new("<p>hello</p>", false), &PdfOptions::default())
        .await
        .expect("quiet page prints");

    let busy = FakeBackend::new(PageScript {
        network_churn: 5,
        ..PageScript::default()
    });
    busy.capture_service()
        .capture(&PrintDocument::new("<p>hello</p>", false), &PdfOptions::default())
        .await
        .expect("busy page prints once idle");

    let quiet_polls = quiet.recorded().evaluated(DiagramProbe::network());
    let busy_polls = busy.recorded().evaluated(DiagramProbe::network());
    assert_eq!(quiet_polls, 6);
    assert_eq!(busy_polls, quiet_polls + 5);
    assert_eq!(busy.recorded().printed_with.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_print_times_out_and_closes() {
    let backend = FakeBackend::new(PageScript {
        hang_print: true,
        ..PageScript::default()
    });

    let err = backend
        .capture_service()
        .capture(&PrintDocument::new("<p>hello</p>", false), &PdfOptions::default())
        .await
        .expect_err("print is bounded");

    assert!(matches!(err, CaptureError::Timeout { stage: "print", .. }));
    assert_eq!(err.to_string(), "print timed out after 30000ms");
    let recorded = backend.recorded();
    assert_eq!(recorded.printed_with.len(), 1);
    assert_eq!(recorded.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_diagram_render_stops_waiting_and_prints() {
    let backend = FakeBackend::new(PageScript {
        diagrams_fail: true,
        ..PageScript::default()
    });

    let bytes = backend
        .capture_service()
        .capture(
            &PrintDocument::new("<div class=\"mermaid\">graph TD</div>", true),
            &PdfOptions::default(),
        )
        .await
        .expect("diagram failure is not fatal");

    assert_eq!(bytes.as_ref(), FAKE_PDF);
    let recorded = backend.recorded();
    assert_eq!(recorded.evaluated(&DiagramProbe::progress()), 1);
    assert_eq!(recorded.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn incomplete_diagram_wait_is_logged() {
    let (logs, _guard) = capture_logs();
    let backend = FakeBackend::new(PageScript {
        library_present: false,
        ..PageScript::default()
    });

    backend
        .capture_service()
        .capture(
            &PrintDocument::new("<div class=\"mermaid\">graph TD</div>", true),
            &PdfOptions::default(),
        )
        .await
        .expect("library timeout is not fatal");

    let output = logs.contents();
    assert!(
        output.contains("Diagram rendering incomplete; continuing capture"),
        "missing warning in: {output}"
    );
    assert!(output.contains("library_timeout"), "missing outcome in: {output}");
}
