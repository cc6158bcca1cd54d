//! Visible-text extraction from HTML

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node};

/// Elements whose text never renders
const HIDDEN_ELEMENTS: [&str; 6] = ["script", "style", "noscript", "template", "head", "svg"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Extract the visible text of an HTML document
///
/// Text nodes are whitespace-collapsed and joined with newlines; text inside
/// script, style and similar elements is skipped. Returns an empty string when the
/// page has no visible text.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<String> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| HIDDEN_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }

        let collapsed = WHITESPACE.replace_all(text, " ");
        let trimmed = collapsed.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    lines.join("\n")
}
