use serde::Serialize;
use thiserror::Error;

/// Sanitized fragment plus the facts the export pipeline needs about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMarkdown {
    /// Allow-listed HTML, safe to hand to a preview or capture surface.
    pub html: String,
    /// Number of diagram fences rewritten into containers.
    pub diagram_count: usize,
}

impl RenderedMarkdown {
    pub fn empty() -> Self {
        Self {
            html: String::new(),
            diagram_count: 0,
        }
    }

    pub fn contains_diagrams(&self) -> bool {
        self.diagram_count > 0
    }
}

/// Internal failure of the markdown stage. Callers of the renderer never see
/// it; it is logged and collapsed into empty output.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown formatting failed: {message}")]
    Markdown { message: String },
}
