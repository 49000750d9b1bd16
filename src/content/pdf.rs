//! PDF text extraction via pdf-extract.

use anyhow::{Context, Result};

use super::{clean_text, ExtractedDocument};

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .context("Failed to extract text from PDF")?;

        let cleaned = clean_text(&text);
        if cleaned.is_empty() {
            anyhow::bail!("PDF contains no extractable text (may be image-only)");
        }

        let title = guess_title(&cleaned);
        let mut doc = ExtractedDocument::new(cleaned);
        if let Some(t) = title {
            doc = doc.with_title(t);
        }
        Ok(doc)
    }
}

/// First reasonably sized line among the opening few that is not a URL or
/// a bare page number.
fn guess_title(text: &str) -> Option<String> {
    text.lines()
        .take(5)
        .map(str::trim)
        .find(|line| {
            (10..=200).contains(&line.len())
                && !line.starts_with("http")
                && !line.starts_with("www.")
                && !line.chars().all(|c| c.is_numeric() || c.is_whitespace())
        })
        .map(str::to_string)
}
