//! Wraps a sanitized fragment into the standalone document handed to capture.

use askama::Template;

use crate::application::render::{DIAGRAM_CLASS, RenderedMarkdown};

use super::{
    diagram::{DiagramSettings, READINESS_FLAG, STARTED_FLAG},
    error::ExportError,
};

#[derive(Template)]
#[template(path = "export/document.html")]
struct DocumentTemplate<'a> {
    title: &'a str,
    fragment: &'a str,
    include_diagrams: bool,
    script_url: &'a str,
    selector: String,
    theme: &'static str,
    poll_interval_ms: u64,
    poll_attempts: u32,
    readiness_flag: &'static str,
    started_flag: &'static str,
}

/// Standalone page handed to capture. `has_diagrams` comes from the renderer's
/// fence count, never from the markup itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintDocument {
    pub html: String,
    pub has_diagrams: bool,
}

impl PrintDocument {
    pub fn new(html: impl Into<String>, has_diagrams: bool) -> Self {
        Self {
            html: html.into(),
            has_diagrams,
        }
    }
}

/// Build the full print document. The diagram script and its bootstrap are
/// only emitted when the renderer rewrote at least one diagram fence.
pub fn wrap_document(
    rendered: &RenderedMarkdown,
    title: &str,
    diagrams: &DiagramSettings,
) -> Result<PrintDocument, ExportError> {
    let has_diagrams = rendered.contains_diagrams();
    let template = DocumentTemplate {
        title,
        fragment: &rendered.html,
        include_diagrams: has_diagrams,
        script_url: &diagrams.script_url,
        selector: format!(".{DIAGRAM_CLASS}"),
        theme: diagrams.theme.as_str(),
        poll_interval_ms: diagrams.library_poll_interval.as_millis() as u64,
        poll_attempts: diagrams.library_poll_attempts,
        readiness_flag: READINESS_FLAG,
        started_flag: STARTED_FLAG,
    };

    let html = template.render().map_err(|err| ExportError::Template {
        message: err.to_string(),
    })?;
    Ok(PrintDocument { html, has_diagrams })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DiagramSettings {
        DiagramSettings::default()
    }

    fn fragment(html: &str, diagram_count: usize) -> RenderedMarkdown {
        RenderedMarkdown {
            html: html.to_string(),
            diagram_count,
        }
    }

    #[test]
    fn wraps_fragment_in_markdown_body() {
        let document =
            wrap_document(&fragment("<h1>Hi</h1>", 0), "Notes", &settings()).expect("wrap");
        assert!(!document.has_diagrams);
        let html = document.html;
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Notes</title>"));
        assert!(html.contains("<div class=\"markdown-body\">\n    <h1>Hi</h1>"));
    }

    #[test]
    fn omits_diagram_script_without_containers() {
        let document =
            wrap_document(&fragment("<p>plain</p>", 0), "Notes", &settings()).expect("wrap");
        assert!(!document.html.contains("<script"));
        assert!(!document.html.contains("mermaid.min.js"));
    }

    #[test]
    fn diagram_markup_without_rendered_fences_gets_no_script() {
        let mentions = "<p><code>&lt;div class=\"mermaid\"&gt;</code> and <span class=\"mermaid\">x</span></p>";
        let document =
            wrap_document(&fragment(mentions, 0), "Notes", &settings()).expect("wrap");
        assert!(!document.has_diagrams);
        assert!(!document.html.contains("<script"));
    }

    #[test]
    fn injects_script_and_bootstrap_for_diagrams() {
        let rendered = fragment("<div class=\"mermaid\">graph TD; A--&gt;B</div>", 1);
        let document = wrap_document(&rendered, "Flow", &settings()).expect("wrap");
        assert!(document.has_diagrams);
        let document = document.html;
        assert!(document.contains(
            "<script src=\"https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js\"></script>"
        ));
        assert!(document.contains("window.mermaidReady = ready;"));
        assert!(document.contains("var attempts = 50;"));
        assert!(document.contains("var interval = 100;"));
        assert!(document.contains("startOnLoad: false"));
    }

    #[test]
    fn escapes_title() {
        let document = wrap_document(
            &fragment("<p>x</p>", 0),
            "</title><script>alert(1)</script>",
            &settings(),
        )
        .expect("wrap")
        .html;
        assert!(!document.contains("<script>alert(1)</script>"));
        assert!(document.contains("&lt;/title&gt;"));
    }
}
