use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};

/// Info-string keyword that turns a fenced block into a diagram container.
pub(crate) const DIAGRAM_LANGUAGE: &str = "mermaid";

/// Class carried by every diagram container; the wrapper and the capture
/// service both key off it.
pub(crate) const DIAGRAM_CLASS: &str = "mermaid";

#[derive(Debug, Default)]
pub(crate) struct RewriteOutcome {
    pub(crate) diagram_count: usize,
}

/// Replace diagram fences with container divs in place. Other code blocks are
/// left for comrak to escape.
pub(crate) fn rewrite_ast<'a>(root: &'a AstNode<'a>) -> RewriteOutcome {
    let mut outcome = RewriteOutcome::default();
    visit_nodes(root, &mut outcome);
    outcome
}

fn visit_nodes<'a>(node: &'a AstNode<'a>, outcome: &mut RewriteOutcome) {
    if let Some((info, literal)) = extract_code_block(node) {
        let language = info.split_whitespace().next().unwrap_or_default();
        if language.eq_ignore_ascii_case(DIAGRAM_LANGUAGE) {
            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: diagram_container(&literal),
            });
            outcome.diagram_count += 1;
        }
    }

    let mut child = node.first_child();
    while let Some(next) = child {
        visit_nodes(next, outcome);
        child = next.next_sibling();
    }
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}

/// The diagram text reaches the DOM unchanged; only the characters that could
/// close the container or open a tag are entity-encoded.
fn diagram_container(source: &str) -> String {
    let mut html = String::with_capacity(source.len() + 32);
    html.push_str("<div class=\"");
    html.push_str(DIAGRAM_CLASS);
    html.push_str("\">");
    for ch in source.trim_end_matches('\n').chars() {
        match ch {
            '&' => html.push_str("&amp;"),
            '<' => html.push_str("&lt;"),
            '>' => html.push_str("&gt;"),
            other => html.push(other),
        }
    }
    html.push_str("</div>\n");
    html
}
