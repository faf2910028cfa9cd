use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
};

use ammonia::Builder as AmmoniaBuilder;

/// Elements that may appear in a sanitized fragment. SVG primitives are listed
/// so diagrams that were already expanded to vector markup keep their shape.
const ALLOWED_TAGS: &[&str] = &[
    "a",
    "abbr",
    "blockquote",
    "br",
    "code",
    "dd",
    "del",
    "div",
    "dl",
    "dt",
    "em",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "i",
    "img",
    "kbd",
    "li",
    "mark",
    "ol",
    "p",
    "pre",
    "s",
    "span",
    "strong",
    "sub",
    "sup",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "u",
    "ul",
    "svg",
    "g",
    "path",
    "rect",
    "circle",
    "ellipse",
    "line",
    "polyline",
    "polygon",
    "text",
    "tspan",
    "marker",
    "defs",
    "title",
    "desc",
    "linearGradient",
    "lineargradient",
    "stop",
    "clipPath",
    "clippath",
];

/// Removed unconditionally, even if a future edit lists them in [`ALLOWED_TAGS`].
const DENIED_TAGS: &[&str] = &[
    "script",
    "style",
    "iframe",
    "object",
    "embed",
    "form",
    "input",
    "button",
    "select",
    "textarea",
    "option",
    "frame",
    "frameset",
    "link",
    "meta",
    "base",
    "noscript",
    "template",
];

/// Denied tags whose children are dropped along with the tag itself.
const DENIED_CONTENT_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "textarea", "select",
];

const GENERIC_ATTRIBUTES: &[&str] = &["class", "id", "title"];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "target", "rel"]),
    ("img", &["src", "alt", "width", "height"]),
    ("th", &["colspan", "rowspan", "align"]),
    ("td", &["colspan", "rowspan", "align"]),
    (
        "svg",
        &[
            "viewBox",
            "xmlns",
            "width",
            "height",
            "preserveAspectRatio",
            "version",
        ],
    ),
    ("g", &["transform", "fill", "stroke", "opacity"]),
    (
        "path",
        &[
            "d",
            "fill",
            "stroke",
            "stroke-width",
            "stroke-linecap",
            "stroke-linejoin",
            "stroke-dasharray",
            "marker-end",
            "marker-start",
            "opacity",
            "transform",
        ],
    ),
    (
        "rect",
        &[
            "x",
            "y",
            "width",
            "height",
            "rx",
            "ry",
            "fill",
            "stroke",
            "stroke-width",
            "opacity",
            "transform",
        ],
    ),
    (
        "circle",
        &["cx", "cy", "r", "fill", "stroke", "stroke-width", "opacity"],
    ),
    (
        "ellipse",
        &[
            "cx",
            "cy",
            "rx",
            "ry",
            "fill",
            "stroke",
            "stroke-width",
            "opacity",
        ],
    ),
    (
        "line",
        &["x1", "x2", "y1", "y2", "stroke", "stroke-width", "opacity"],
    ),
    (
        "polyline",
        &["points", "fill", "stroke", "stroke-width", "opacity"],
    ),
    (
        "polygon",
        &["points", "fill", "stroke", "stroke-width", "opacity"],
    ),
    (
        "text",
        &[
            "x",
            "y",
            "dx",
            "dy",
            "fill",
            "text-anchor",
            "dominant-baseline",
            "font-size",
            "font-family",
            "transform",
        ],
    ),
    ("tspan", &["x", "y", "dx", "dy", "font-size", "fill"]),
    (
        "marker",
        &[
            "refX",
            "refY",
            "orient",
            "markerWidth",
            "markerHeight",
            "markerUnits",
            "viewBox",
        ],
    ),
    (
        "linearGradient",
        &["gradientUnits", "x1", "x2", "y1", "y2"],
    ),
    (
        "lineargradient",
        &["gradientUnits", "x1", "x2", "y1", "y2"],
    ),
    ("stop", &["offset", "stop-color", "stop-opacity"]),
];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "tel", "data"];

/// Allow-list HTML sanitizer applied to every rendered fragment before any
/// surface (preview or capture) sees it.
pub struct HtmlSanitizer {
    builder: AmmoniaBuilder<'static>,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        Self {
            builder: build_sanitizer(),
        }
    }

    /// Remove everything outside the allow-list. Never fails; rejected markup
    /// is dropped silently.
    pub fn sanitize(&self, html: &str) -> String {
        if html.is_empty() {
            return String::new();
        }
        preserve_pre_leading_newlines(self.builder.clean(html).to_string())
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let denied: HashSet<&'static str> = DENIED_TAGS.iter().copied().collect();
    let tags: HashSet<&'static str> = ALLOWED_TAGS
        .iter()
        .copied()
        .filter(|tag| !denied.contains(tag))
        .collect();
    builder.tags(tags);
    builder.clean_content_tags(DENIED_CONTENT_TAGS.iter().copied().collect());

    builder.generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect());
    let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = TAG_ATTRIBUTES
        .iter()
        .filter(|(tag, _)| !denied.contains(tag))
        .map(|(tag, attributes)| (*tag, attributes.iter().copied().collect()))
        .collect();
    builder.tag_attributes(tag_attributes);

    builder.url_schemes(URL_SCHEMES.iter().copied().collect());
    // `rel` is author-controlled through the allow-list, so ammonia must not inject its own.
    builder.link_rel(None);
    builder.strip_comments(true);

    builder.attribute_filter(|_element, attribute, value| {
        if is_denied_attribute(attribute) {
            return None;
        }
        if is_url_attribute(attribute) && !is_allowed_url(value) {
            return None;
        }
        Some(Cow::Borrowed(value))
    });

    builder
}

/// The HTML parser drops one newline directly after a `<pre>` start tag, so a
/// serialized block whose text opens with a newline needs one more to read
/// back unchanged.
fn preserve_pre_leading_newlines(html: String) -> String {
    if !html.contains("<pre") {
        return html;
    }

    let mut out = String::with_capacity(html.len() + 8);
    let mut rest = html.as_str();
    while let Some(start) = rest.find("<pre") {
        let name_end = start + "<pre".len();
        let after_name = &rest[name_end..];
        if !after_name.starts_with(['>', ' ']) {
            out.push_str(&rest[..name_end]);
            rest = after_name;
            continue;
        }
        let Some(close) = start_tag_end(after_name) else {
            break;
        };
        let (tag, tail) = rest.split_at(name_end + close + 1);
        out.push_str(tag);
        if tail.starts_with('\n') {
            out.push('\n');
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Offset of the `>` closing a start tag. Serialized attribute values are
/// always double-quoted and may contain `>`.
fn start_tag_end(attributes: &str) -> Option<usize> {
    let mut quoted = false;
    for (index, c) in attributes.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '>' if !quoted => return Some(index),
            _ => {}
        }
    }
    None
}

fn is_denied_attribute(attribute: &str) -> bool {
    let lower = attribute.to_ascii_lowercase();
    lower.starts_with("on")
        || lower == "style"
        || lower == "srcdoc"
        || lower == "formaction"
        || lower == "xlink:href"
}

fn is_url_attribute(attribute: &str) -> bool {
    attribute.eq_ignore_ascii_case("href") || attribute.eq_ignore_ascii_case("src")
}

/// Scheme checks already happen in ammonia; this narrows `data:` to images and
/// rejects script schemes hidden behind whitespace or control characters.
fn is_allowed_url(value: &str) -> bool {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if normalized.starts_with("javascript:") || normalized.starts_with("vbscript:") {
        return false;
    }

    if normalized.starts_with("data:") {
        return normalized.starts_with("data:image/") && !normalized.starts_with("data:image/svg");
    }

    true
}
