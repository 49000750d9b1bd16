//! Paragraph-based chunker.
//!
//! Four-tier splitting strategy:
//! 1. Split at blank lines (paragraph boundaries)
//! 2. Merge small paragraphs up to the character budget
//! 3. If a paragraph is still too large, split at single newlines
//! 4. Last resort: split a single oversized line at character boundaries

use super::ChunkOutput;

/// Maximum non-whitespace characters per chunk.
pub const CHAR_BUDGET: usize = 1500;

pub fn chunk_paragraphs(content: &str) -> Vec<ChunkOutput> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = content.lines().collect();
    let segments = split_at_blank_lines(&lines);

    let mut chunks = Vec::new();
    // (start line index, end line index, non-whitespace chars)
    let mut current: Option<(usize, usize, usize)> = None;

    for seg in &segments {
        let seg_chars = count_chars(&lines[seg.start..=seg.end]);

        if seg_chars > CHAR_BUDGET {
            if let Some((start, end, _)) = current.take() {
                chunks.push(make_chunk(&lines, start, end));
            }
            split_large_segment(&lines, seg.start, seg.end, &mut chunks);
            continue;
        }

        current = match current {
            Some((start, end, chars)) if chars + seg_chars > CHAR_BUDGET => {
                chunks.push(make_chunk(&lines, start, end));
                Some((seg.start, seg.end, seg_chars))
            }
            Some((start, _, chars)) => Some((start, seg.end, chars + seg_chars)),
            None => Some((seg.start, seg.end, seg_chars)),
        };
    }

    if let Some((start, end, _)) = current {
        chunks.push(make_chunk(&lines, start, end));
    }

    chunks
}

fn count_chars(lines: &[&str]) -> usize {
    lines
        .iter()
        .flat_map(|l| l.chars())
        .filter(|c| !c.is_whitespace())
        .count()
}

fn make_chunk(lines: &[&str], start: usize, end: usize) -> ChunkOutput {
    ChunkOutput {
        content: lines[start..=end].join("\n"),
        start_line: start + 1,
        end_line: end + 1,
    }
}

struct Segment {
    start: usize,
    end: usize,
}

fn split_at_blank_lines(lines: &[&str]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut seg_start = None;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if let Some(start) = seg_start.take() {
                segments.push(Segment { start, end: i - 1 });
            }
        } else if seg_start.is_none() {
            seg_start = Some(i);
        }
    }

    if let Some(start) = seg_start {
        segments.push(Segment {
            start,
            end: lines.len() - 1,
        });
    }

    segments
}

fn split_large_segment(lines: &[&str], start: usize, end: usize, chunks: &mut Vec<ChunkOutput>) {
    let mut chunk_start = start;
    let mut chars = 0usize;

    for i in start..=end {
        let line_chars = count_chars(&lines[i..=i]);

        if line_chars > CHAR_BUDGET {
            if i > chunk_start {
                chunks.push(make_chunk(lines, chunk_start, i - 1));
            }
            split_long_line(lines[i], i + 1, chunks);
            chunk_start = i + 1;
            chars = 0;
            continue;
        }

        if chars + line_chars > CHAR_BUDGET && i > chunk_start {
            chunks.push(make_chunk(lines, chunk_start, i - 1));
            chunk_start = i;
            chars = line_chars;
        } else {
            chars += line_chars;
        }
    }

    if chunk_start <= end {
        chunks.push(make_chunk(lines, chunk_start, end));
    }
}

/// Cut a single line into pieces of at most `CHAR_BUDGET` characters,
/// preferring to break at whitespace.
fn split_long_line(line: &str, line_no: usize, chunks: &mut Vec<ChunkOutput>) {
    let mut rest = line.trim();
    while !rest.is_empty() {
        let hard_end = rest
            .char_indices()
            .nth(CHAR_BUDGET)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let cut = if hard_end < rest.len() {
            rest[..hard_end]
                .rfind(char::is_whitespace)
                .filter(|&i| i > 0)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };
        chunks.push(ChunkOutput {
            content: rest[..cut].trim_end().to_string(),
            start_line: line_no,
            end_line: line_no,
        });
        rest = rest[cut..].trim_start();
    }
}
