//! Overlapping character-window chunker.
//!
//! Splits each page of a [`Document`] into windows of at most `chunk_size`
//! characters. Consecutive windows of the same page share exactly
//! `chunk_overlap` characters, so the page text can be rebuilt by dropping
//! the first `chunk_overlap` characters of every chunk but the first.
//!
//! # Algorithm
//!
//! 1. Window `i` starts at `s` and may end anywhere in `(s + overlap, s + size]`.
//! 2. The end is the latest break inside that range, trying separators in
//!    order: paragraph (`\n\n`), line (`\n`), sentence (`. `, `! `, `? `),
//!    then word (` `). The separator stays with the chunk it ends.
//! 3. Without any separator the window is cut at `s + size`.
//! 4. The next window starts at `end - overlap`.
//!
//! Sizes are counted in `char`s, never bytes, so multi-byte text is never
//! split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use research_assistant::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 800, 160);
//! assert_eq!(chunks.len(), 1);
//! ```

use crate::models::{Chunk, ChunkMetadata, Document};

/// Preferred break points, strongest first.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// Chunk every page of a document. Pages keep their own `page` metadata and
/// whitespace-only pages produce nothing.
pub fn chunk_document(document: &Document, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in &document.pages {
        if page.text.trim().is_empty() {
            continue;
        }
        for text in chunk_text(&page.text, chunk_size, chunk_overlap) {
            chunks.push(Chunk {
                text,
                metadata: ChunkMetadata {
                    source: document.source.clone(),
                    page: page.number,
                    title: document.title.clone(),
                },
            });
        }
    }
    chunks
}

/// Split `text` into overlapping windows.
///
/// Callers guarantee `chunk_overlap < chunk_size` (checked at config load);
/// an invalid pair degrades to a single chunk rather than looping.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if chunk_size == 0 || chunk_overlap >= chunk_size {
        return vec![text.to_string()];
    }

    // bounds[p] is the byte offset of char p; bounds[n] == text.len()
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let limit = start + chunk_size;
        let end = if limit >= n {
            n
        } else {
            find_break(text, &bounds, start, start + chunk_overlap, limit).unwrap_or(limit)
        };

        chunks.push(text[bounds[start]..bounds[end]].to_string());

        if end == n {
            break;
        }
        start = end - chunk_overlap;
    }

    chunks
}

/// Latest char position in `(floor, limit]` right after a separator,
/// searching separator groups strongest first.
fn find_break(text: &str, bounds: &[usize], start: usize, floor: usize, limit: usize) -> Option<usize> {
    let window_start = bounds[start];
    let window = &text[window_start..bounds[limit]];

    for group in SEPARATORS {
        let best = group
            .iter()
            .filter_map(|sep| window.rfind(sep).map(|i| window_start + i + sep.len()))
            .max();
        if let Some(byte) = best {
            if let Ok(pos) = bounds.binary_search(&byte) {
                if pos > floor {
                    return Some(pos);
                }
            }
        }
    }
    None
}
