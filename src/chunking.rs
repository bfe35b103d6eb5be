//! Boundary-aware text chunking for the generation pipeline.
//!
//! Splits extracted source text into overlapping windows sized for a single
//! model prompt. Each window prefers to end at the last paragraph break inside
//! it, then the last sentence terminator, then the raw size boundary. The next
//! window starts `overlap` bytes before the previous end so spans near a cut
//! stay visible to the model.

use thiserror::Error;

/// Errors produced while splitting source text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// A zero chunk size cannot hold any text.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// An overlap at or above the chunk size would prevent forward progress.
    #[error("overlap {overlap} must be smaller than chunk size {max_size}")]
    InvalidOverlap {
        /// Requested overlap in bytes.
        overlap: usize,
        /// Configured maximum chunk size in bytes.
        max_size: usize,
    },
}

/// Split `text` into ordered chunks of at most `max_size` bytes.
///
/// Texts that already fit return as a single untouched chunk. Larger texts are
/// windowed deterministically: identical inputs always produce identical
/// output. Chunks are trimmed of surrounding whitespace and empty results are
/// dropped.
pub fn chunk_text(
    text: &str,
    max_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if max_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= max_size {
        return Err(ChunkingError::InvalidOverlap { overlap, max_size });
    }
    if text.len() <= max_size {
        return Ok(vec![text.to_string()]);
    }

    let len = text.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let raw_end = floor_char_boundary(text, (start + max_size).min(len));
        let mut end = raw_end;

        if raw_end < len {
            end = preferred_boundary(&text[start..raw_end])
                .map(|offset| start + offset)
                .unwrap_or(raw_end);
            // A boundary at or before the window start cannot advance the scan.
            if end <= start {
                end = raw_end;
            }
        }

        let chunk = text[start..end].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= len {
            break;
        }

        let mut next_start = floor_char_boundary(text, end.saturating_sub(overlap));
        if next_start <= start {
            next_start = end;
        }
        start = next_start;
    }

    Ok(chunks)
}

/// Pick the best cut point inside a window, as a byte offset from its start.
///
/// Prefers the last paragraph break strictly inside the window, then cuts just
/// after the last sentence terminator. Returns `None` when neither exists.
fn preferred_boundary(window: &str) -> Option<usize> {
    if let Some(position) = window.rfind("\n\n") {
        if position > 0 {
            return Some(position);
        }
    }
    window.rfind('.').map(|position| position + 1)
}

/// Largest index `<= at` that lands on a UTF-8 character boundary.
fn floor_char_boundary(text: &str, at: usize) -> usize {
    let mut index = at.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through_untouched() {
        let text = "  short text with padding  ";
        let chunks = chunk_text(text, 100, 10).expect("chunks");
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn identical_inputs_yield_identical_chunks() {
        let text = "First sentence. Second sentence. Third sentence. Fourth sentence.";
        let first = chunk_text(text, 30, 5).expect("chunks");
        let second = chunk_text(text, 30, 5).expect("chunks");
        assert_eq!(first, second);
        assert!(first.len() > 1);
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = "First paragraph body.\n\nSecond paragraph body that keeps going for a while longer.";
        let chunks = chunk_text(text, 40, 4).expect("chunks");
        assert_eq!(chunks[0], "First paragraph body.");
    }

    #[test]
    fn falls_back_to_sentence_breaks() {
        let text = "A tidy first sentence. More prose follows without any paragraph breaks in it at all";
        let chunks = chunk_text(text, 40, 4).expect("chunks");
        assert_eq!(chunks[0], "A tidy first sentence.");
    }

    #[test]
    fn falls_back_to_raw_window_without_separators() {
        let text = "x".repeat(100);
        let chunks = chunk_text(&text, 40, 10).expect("chunks");
        assert_eq!(chunks[0].len(), 40);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn every_word_survives_chunking() {
        let text = (0..200)
            .map(|index| format!("word{index}."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 120, 30).expect("chunks");
        for index in 0..200 {
            let needle = format!("word{index}.");
            assert!(
                chunks.iter().any(|chunk| chunk.contains(&needle)),
                "missing {needle}"
            );
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "abcdefghij".repeat(20);
        let chunks = chunk_text(&text, 50, 10).expect("chunks");
        for pair in chunks.windows(2) {
            let tail = &pair[0][pair[0].len() - 10..];
            assert!(pair[1].starts_with(tail));
        }
    }

    #[test]
    fn rejects_overlap_at_or_above_chunk_size() {
        assert_eq!(
            chunk_text("some text", 10, 10),
            Err(ChunkingError::InvalidOverlap {
                overlap: 10,
                max_size: 10
            })
        );
        assert_eq!(
            chunk_text("some text", 0, 0),
            Err(ChunkingError::InvalidChunkSize)
        );
    }

    #[test]
    fn respects_utf8_boundaries() {
        let text = "日本語のテキスト。".repeat(30);
        let chunks = chunk_text(&text, 50, 8).expect("chunks");
        for chunk in &chunks {
            assert!(chunk.len() <= 50);
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn early_paragraph_break_still_advances() {
        // Paragraph break near the window start must not stall the scan.
        let mut text = String::from("a.\n\n");
        text.push_str(&"b".repeat(200));
        let chunks = chunk_text(&text, 50, 40).expect("chunks");
        let joined: String = chunks.concat();
        assert!(joined.contains(&"b".repeat(50)));
    }
}
