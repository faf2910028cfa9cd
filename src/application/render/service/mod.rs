mod config;
mod rewrite;
mod sanitizer;

use std::{sync::Arc, time::Instant};

use comrak::{Arena, format_html, nodes::AstNode, parse_document};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::application::render::types::{RenderError, RenderedMarkdown};

pub(crate) use config::default_options;
use rewrite::rewrite_ast;

pub(crate) use rewrite::DIAGRAM_CLASS;
pub use sanitizer::HtmlSanitizer;

/// Comrak-based markdown renderer with diagram fences rewritten into
/// containers and Ammonia sanitisation applied to everything it returns.
pub struct MarkdownRenderer {
    options: comrak::Options<'static>,
    sanitizer: HtmlSanitizer,
}

impl MarkdownRenderer {
    fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: HtmlSanitizer::new(),
        }
    }

    /// Render markdown to a sanitized fragment. Never fails: formatter errors
    /// are logged and yield empty output so previews and exports keep going.
    pub fn render(&self, markdown: &str) -> RenderedMarkdown {
        if markdown.is_empty() {
            return RenderedMarkdown::empty();
        }

        let started_at = Instant::now();
        match self.render_stages(markdown) {
            Ok((raw_html, diagram_count)) => {
                let html = self.sanitizer.sanitize(&raw_html);
                debug!(
                    target = "application::render",
                    op = "render::markdown",
                    result = "ok",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    input_bytes = markdown.len(),
                    output_bytes = html.len(),
                    diagram_count,
                    "Markdown rendered"
                );
                RenderedMarkdown {
                    html,
                    diagram_count,
                }
            }
            Err(err) => {
                warn!(
                    target = "application::render",
                    op = "render::markdown",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    input_bytes = markdown.len(),
                    error = %err,
                    "Markdown rendering failed; returning empty output"
                );
                RenderedMarkdown::empty()
            }
        }
    }

    /// Sanitized HTML only.
    pub fn render_html(&self, markdown: &str) -> String {
        self.render(markdown).html
    }

    /// Render markdown while skipping the sanitisation stage. Intended for
    /// diagnostics when refining sanitizer rules; never expose the result.
    pub fn render_unsanitized(&self, markdown: &str) -> Result<String, RenderError> {
        self.render_stages(markdown).map(|(html, _)| html)
    }

    fn render_stages(&self, markdown: &str) -> Result<(String, usize), RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        let outcome = rewrite_ast(root);
        let html = render_html_stage(root, &self.options)?;
        Ok((html, outcome.diagram_count))
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

static MARKDOWN_RENDERER: Lazy<Arc<MarkdownRenderer>> =
    Lazy::new(|| Arc::new(MarkdownRenderer::new()));

/// Access the shared renderer instance, configured once on first use.
pub fn markdown_renderer() -> Arc<MarkdownRenderer> {
    Arc::clone(&MARKDOWN_RENDERER)
}

fn render_html_stage<'a>(
    root: &'a AstNode<'a>,
    options: &comrak::Options<'static>,
) -> Result<String, RenderError> {
    let mut html = String::new();
    format_html(root, options, &mut html).map_err(|err| RenderError::Markdown {
        message: err.to_string(),
    })?;
    Ok(html)
}
