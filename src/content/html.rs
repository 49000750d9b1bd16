//! HTML to plain text using scraper's DOM.

use scraper::{Html, Node, Selector};

use super::{clean_text, ExtractedDocument};

/// Elements whose text is never visible
const SKIPPED: &[&str] = &["script", "style", "noscript", "head", "template", "svg"];

/// Elements that start a new line in the extracted text
const BLOCKS: &[&str] = &[
    "p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    "header", "footer", "blockquote", "pre", "table", "ul", "ol",
];

pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn extract(html: &[u8]) -> ExtractedDocument {
        Self::extract_from_str(&String::from_utf8_lossy(html))
    }

    pub fn extract_from_str(html: &str) -> ExtractedDocument {
        let document = Html::parse_document(html);

        let mut text = String::new();
        for node in document.root_element().descendants() {
            match node.value() {
                Node::Element(el) if BLOCKS.contains(&el.name()) => text.push('\n'),
                Node::Text(t) => {
                    let hidden = node.ancestors().any(|a| {
                        a.value()
                            .as_element()
                            .is_some_and(|e| SKIPPED.contains(&e.name()))
                    });
                    if !hidden {
                        text.push_str(t);
                    }
                }
                _ => {}
            }
        }

        let content = clean_text(
            &text
                .lines()
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        let mut doc = ExtractedDocument::new(content);
        if let Ok(selector) = Selector::parse("title") {
            if let Some(title) = document.select(&selector).next() {
                doc = doc.with_title(title.text().collect::<String>());
            }
        }
        doc
    }
}
