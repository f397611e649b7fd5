//! Content extraction functionality for the crawler module

use regex::Regex;
use scraper::{Html, Node, Selector};
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Elements whose text is never rendered
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements rendered on their own line; text in different blocks is space-separated
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "main", "nav", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

/// Extract the visible text of an HTML document
///
/// Text nodes are concatenated in document order, with a space wherever the
/// enclosing block element changes, so `<p>1</p><p>2</p>` reads `1 2` while
/// inline markup such as `Ac<b>me</b>` stays joined. Then every run of
/// whitespace (newlines, tabs, carriage returns, repeated spaces) is collapsed
/// to a single space and the ends are trimmed.
///
/// # Arguments
///
/// * `html` - The raw response body
///
/// # Returns
///
/// The normalized text, empty if the page has none
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut text = String::new();
    let mut current_block = None;
    for node in document.tree.root().descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        if node
            .ancestors()
            .any(|ancestor| is_element_in(INVISIBLE_ELEMENTS, ancestor.value()))
        {
            continue;
        }

        let block = node
            .ancestors()
            .find(|ancestor| is_element_in(BLOCK_ELEMENTS, ancestor.value()))
            .map(|ancestor| ancestor.id());
        if current_block.is_some() && block != current_block {
            text.push(' ');
        }
        current_block = block;
        text.push_str(fragment);
    }

    collapse_whitespace(&text)
}

fn is_element_in(names: &[&str], node: &Node) -> bool {
    node.as_element()
        .is_some_and(|el| names.contains(&el.name()))
}

/// Collapse every whitespace run to a single space and trim
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Raw `href` values of every anchor in the document, in document order
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}
