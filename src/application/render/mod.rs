//! Markdown rendering and sanitisation.
//!
//! The pipeline is pure: markdown in, allow-listed HTML out. Nothing rendered
//! here reaches a browser surface without passing through [`HtmlSanitizer`].

mod service;
mod text;
mod types;

pub(crate) use service::DIAGRAM_CLASS;
pub use service::{HtmlSanitizer, MarkdownRenderer, markdown_renderer};
pub use text::{MarkdownValidation, markdown_to_plain_text, validate_markdown, word_count};
pub use types::{RenderError, RenderedMarkdown};
