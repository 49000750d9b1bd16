//! Text extraction from uploaded files and fetched URLs.

mod html;
mod pdf;

use anyhow::Result;
use std::path::Path;

pub use html::HtmlExtractor;
pub use pdf::PdfExtractor;

/// Extracted document text with an optional detected title
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub content: String,
    pub title: Option<String>,
}

impl ExtractedDocument {
    pub fn new(content: String) -> Self {
        Self {
            content,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        let title = title.trim();
        if !title.is_empty() {
            self.title = Some(title.to_string());
        }
        self
    }
}

/// Supported content types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Text,
    Pdf,
    Html,
    Unknown,
}

impl ContentType {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_lowercase();
        if mime.contains("application/pdf") {
            ContentType::Pdf
        } else if mime.contains("text/html") || mime.contains("application/xhtml") {
            ContentType::Html
        } else if mime.starts_with("text/") || mime.contains("json") || mime.contains("markdown") {
            ContentType::Text
        } else {
            ContentType::Unknown
        }
    }

    pub fn from_extension(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("pdf") => ContentType::Pdf,
            Some("html" | "htm" | "xhtml") => ContentType::Html,
            Some("txt" | "md" | "markdown" | "rst" | "text" | "csv" | "json" | "log") => {
                ContentType::Text
            }
            _ => ContentType::Unknown,
        }
    }

    /// Detect from the MIME type first, then the file name / URL path.
    pub fn detect(mime: Option<&str>, name: &str) -> Self {
        let from_mime = mime.map(Self::from_mime).unwrap_or(ContentType::Unknown);
        if from_mime != ContentType::Unknown {
            return from_mime;
        }
        let path = name.split(['?', '#']).next().unwrap_or(name);
        Self::from_extension(path)
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Text => "text/plain",
            ContentType::Pdf => "application/pdf",
            ContentType::Html => "text/html",
            ContentType::Unknown => "application/octet-stream",
        }
    }
}

/// Extract text from raw bytes. Unknown types are treated as UTF-8 text.
pub fn extract_from_bytes(bytes: &[u8], content_type: ContentType) -> Result<ExtractedDocument> {
    let doc = match content_type {
        ContentType::Pdf => PdfExtractor::extract(bytes)?,
        ContentType::Html => HtmlExtractor::extract(bytes),
        ContentType::Text | ContentType::Unknown => {
            if content_type == ContentType::Unknown && looks_binary(bytes) {
                anyhow::bail!("Unsupported binary file type");
            }
            ExtractedDocument::new(clean_text(&String::from_utf8_lossy(bytes)))
        }
    };

    if doc.content.trim().is_empty() {
        anyhow::bail!("Document contains no extractable text");
    }
    Ok(doc)
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(1024).any(|&b| b == 0)
}

/// Trim every line and collapse runs of blank lines into one.
pub fn clean_text(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_prefers_mime() {
        assert_eq!(ContentType::detect(Some("application/pdf"), "x.txt"), ContentType::Pdf);
        assert_eq!(
            ContentType::detect(Some("text/html; charset=utf-8"), "page"),
            ContentType::Html
        );
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            ContentType::detect(Some("application/octet-stream"), "Report.PDF"),
            ContentType::Pdf
        );
        assert_eq!(ContentType::detect(None, "notes.md"), ContentType::Text);
        assert_eq!(
            ContentType::detect(None, "https://x.org/paper.pdf?download=1"),
            ContentType::Pdf
        );
        assert_eq!(ContentType::detect(None, "archive.zip"), ContentType::Unknown);
    }

    #[test]
    fn test_clean_text_collapses_blank_runs() {
        let text = "  Title  \n\n\n\n  para one\nline two \n\n\npara two\n\n";
        assert_eq!(clean_text(text), "Title\n\npara one\nline two\n\npara two");
    }

    #[test]
    fn test_extract_plain_text() {
        let doc = extract_from_bytes(b"hello\n\n\nworld", ContentType::Text).unwrap();
        assert_eq!(doc.content, "hello\n\nworld");
        assert!(doc.title.is_none());
    }

    #[test]
    fn test_extract_empty_is_error() {
        assert!(extract_from_bytes(b"   \n  ", ContentType::Text).is_err());
    }

    #[test]
    fn test_unknown_binary_rejected() {
        assert!(extract_from_bytes(&[0x50, 0x4b, 0x00, 0x01], ContentType::Unknown).is_err());
    }
}
