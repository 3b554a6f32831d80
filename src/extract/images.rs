use super::ImageRef;
use regex::Regex;
use std::sync::LazyLock;

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
        .expect("markdown image pattern compiles")
});

static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#)
        .expect("html image pattern compiles")
});

/// Find Markdown `![alt](path)` and HTML `<img src="path">` references, in source order.
pub fn detect_images(text: &str) -> Vec<ImageRef> {
    let mut found: Vec<(usize, &str)> = MARKDOWN_IMAGE
        .captures_iter(text)
        .chain(HTML_IMAGE.captures_iter(text))
        .filter_map(|captures| captures.get(1))
        .map(|path| (path.start(), path.as_str()))
        .collect();
    found.sort_by_key(|(offset, _)| *offset);
    found
        .into_iter()
        .map(|(_, path)| ImageRef {
            path: path.to_string(),
        })
        .collect()
}
