//! Plain-text helpers used by the editor surfaces (word counts, quick lint).

use comrak::{
    Arena,
    nodes::{AstNode, NodeValue},
    parse_document,
};
use serde::Serialize;

use super::service::default_options;

const EMPTY_CONTENT: &str = "Markdown content is empty";
const UNCLOSED_FENCE: &str = "Unclosed code block detected";
const UNMATCHED_BRACKETS: &str = "Unmatched brackets in links";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Strip markdown formatting, keeping the readable text. Fenced code blocks
/// and raw HTML are dropped; link text and inline code are kept.
pub fn markdown_to_plain_text(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }

    let options = default_options();
    let arena = Arena::new();
    let root = parse_document(&arena, markdown, &options);

    let mut blocks = Vec::new();
    collect_blocks(root, &mut blocks);
    blocks
        .into_iter()
        .map(|block| block.trim().to_string())
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn word_count(markdown: &str) -> usize {
    markdown_to_plain_text(markdown).split_whitespace().count()
}

/// Cheap structural checks surfaced next to the editor; not a parser.
pub fn validate_markdown(markdown: &str) -> MarkdownValidation {
    let mut errors = Vec::new();

    if markdown.trim().is_empty() {
        errors.push(EMPTY_CONTENT.to_string());
    }

    if markdown.matches("```").count() % 2 != 0 {
        errors.push(UNCLOSED_FENCE.to_string());
    }

    if markdown.matches('[').count() != markdown.matches(']').count() {
        errors.push(UNMATCHED_BRACKETS.to_string());
    }

    MarkdownValidation {
        valid: errors.is_empty(),
        errors,
    }
}

fn collect_blocks<'a>(node: &'a AstNode<'a>, blocks: &mut Vec<String>) {
    let mut child = node.first_child();
    while let Some(next) = child {
        let is_leaf_block = {
            let data = next.data.borrow();
            match &data.value {
                NodeValue::CodeBlock(_) | NodeValue::HtmlBlock(_) | NodeValue::ThematicBreak => {
                    None
                }
                NodeValue::Paragraph | NodeValue::Heading(_) | NodeValue::TableCell => Some(true),
                _ => Some(false),
            }
        };

        match is_leaf_block {
            None => {}
            Some(true) => blocks.push(collect_inline_text(next)),
            Some(false) => collect_blocks(next, blocks),
        }
        child = next.next_sibling();
    }
}

fn collect_inline_text(node: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
    }

    let mut text = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        walk(next, &mut text);
        child = next.next_sibling();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting_but_keeps_text() {
        let text = markdown_to_plain_text(
            "# Jane Doe\n\n**Senior** engineer at [Acme](https://acme.test).\n\n- Rust\n- `tokio`\n\n> quoted",
        );
        assert_eq!(
            text,
            "Jane Doe\nSenior engineer at Acme.\nRust\ntokio\nquoted"
        );
    }

    #[test]
    fn drops_fenced_code_blocks() {
        let text = markdown_to_plain_text("Intro\n\n```rust\nfn main() {}\n```\n\nOutro");
        assert_eq!(text, "Intro\nOutro");
    }

    #[test]
    fn counts_words_of_plain_text() {
        assert_eq!(word_count("## Skills\n\n*Rust*, Go and **SQL**"), 5);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn validation_reports_each_problem() {
        let report = validate_markdown("   ");
        assert!(!report.valid);
        assert_eq!(report.errors, vec![EMPTY_CONTENT.to_string()]);

        let report = validate_markdown("```rust\nfn main() {}\n[link(x");
        assert_eq!(
            report.errors,
            vec![UNCLOSED_FENCE.to_string(), UNMATCHED_BRACKETS.to_string()]
        );
    }

    #[test]
    fn validation_accepts_well_formed_markdown() {
        let report = validate_markdown("# Title\n\n[site](https://example.com)\n\n```\ncode\n```");
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }
}
