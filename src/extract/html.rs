//! HTML sources reduced to their visible text and image references.

use super::ImageRef;
use scraper::{Html, Node, Selector};
use std::path::Path;
use std::sync::LazyLock;

static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector"));
static IMAGES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("image selector"));

/// Elements whose text never reaches a segment.
const HIDDEN: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

/// Elements that start a new line of text.
const BLOCKS: [&str; 20] = [
    "p", "div", "br", "li", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "pre",
    "blockquote", "section", "article", "header", "footer", "table",
];

/// Visible text of an HTML document plus the images it references.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct HtmlPage {
    pub(crate) text: String,
    pub(crate) images: Vec<ImageRef>,
}

pub(crate) fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

/// Parse `source` and keep the body text, one line per block element.
pub(crate) fn parse_html(source: &str) -> HtmlPage {
    let document = Html::parse_document(source);
    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    for node in root.descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|element| HIDDEN.contains(&element.name()))
                });
                if !hidden {
                    raw.push_str(text);
                    raw.push(' ');
                }
            }
            Node::Element(element) if BLOCKS.contains(&element.name()) => raw.push('\n'),
            _ => {}
        }
    }

    let text = raw
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let images = root
        .select(&IMAGES)
        .filter_map(|image| image.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| ImageRef {
            path: src.to_string(),
        })
        .collect();

    HtmlPage { text, images }
}
