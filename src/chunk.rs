//! Sliding-window text chunker.
//!
//! Splits message bodies into fixed-size, overlapping windows so no
//! semantic unit is silently truncated at a boundary. Window size and
//! overlap come from configuration (defaults 500 / 50). Both are
//! measured in bytes, with window edges snapped to UTF-8 character
//! boundaries so a code point is never split.
//!
//! Windows prefer to end on a sentence boundary (`.` or newline) when
//! one falls past the halfway point of the window. Each chunk receives
//! a deterministic id derived from its message id and index, plus a
//! SHA-256 hash of its text for staleness detection in the embedding
//! pipeline — re-chunking unchanged content yields identical ids and
//! hashes.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split a message body into overlapping chunks.
///
/// `chunk_chars` and `overlap` are byte budgets; edges snap to char
/// boundaries, so chunks may run a few bytes short of the budget.
///
/// # Guarantees
///
/// - At least one chunk is always returned (even for empty text).
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - Chunk ids are deterministic: `"{message_id}_chunk_{index}"`.
/// - `offset` is the byte offset of the chunk text within `text`.
pub fn chunk_message(message_id: &str, text: &str, chunk_chars: usize, overlap: usize) -> Vec<Chunk> {
    if text.len() <= chunk_chars {
        return vec![make_chunk(message_id, 0, 0, text.trim())];
    }

    let mut chunks = Vec::new();
    let mut chunk_index: i64 = 0;
    let mut start = 0usize;

    while start < text.len() {
        let mut end = snap_to_char_boundary(text, (start + chunk_chars).min(text.len()));

        // Prefer a sentence boundary, but only when it lands past the
        // halfway point of the window.
        if end < text.len() {
            let window = &text[start..end];
            let break_point = window.rfind('.').max(window.rfind('\n'));
            if let Some(bp) = break_point {
                if bp > chunk_chars / 2 {
                    end = start + bp + 1;
                }
            }
        }

        let piece = &text[start..end];
        let trimmed = piece.trim_start();
        let lead = piece.len() - trimmed.len();
        let trimmed = trimmed.trim_end();
        if !trimmed.is_empty() {
            chunks.push(make_chunk(
                message_id,
                chunk_index,
                (start + lead) as i64,
                trimmed,
            ));
            chunk_index += 1;
        }

        if end >= text.len() {
            break;
        }
        // Step back by the overlap, but always make forward progress:
        // the next start snaps forward to the following char boundary,
        // so it strictly increases even for tiny windows over
        // multibyte text.
        let next = end.saturating_sub(overlap);
        let mut next_start = next.max(start + 1);
        while next_start < text.len() && !text.is_char_boundary(next_start) {
            next_start += 1;
        }
        start = next_start;
    }

    if chunks.is_empty() {
        chunks.push(make_chunk(message_id, 0, 0, text.trim()));
    }

    chunks
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn make_chunk(message_id: &str, index: i64, offset: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: format!("{}_chunk_{}", message_id, index),
        message_id: message_id.to_string(),
        chunk_index: index,
        offset,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_message("m1", "Meeting tomorrow at 2pm.", 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "m1_chunk_0");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Meeting tomorrow at 2pm.");
    }

    #[test]
    fn test_empty_text() {
        let chunks = chunk_message("m1", "", 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_long_text_overlapping_windows() {
        let text = "word ".repeat(300); // 1500 chars
        let chunks = chunk_message("m1", &text, 500, 50);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert!(c.text.len() <= 500);
        }
    }

    #[test]
    fn test_windows_overlap() {
        let text = "abcdefghij".repeat(100); // 1000 chars, no sentence breaks
        let chunks = chunk_message("m1", &text, 400, 50);
        assert!(chunks.len() >= 2);
        // Second window starts before the first one ends.
        assert!(chunks[1].offset < chunks[0].offset + chunks[0].text.len() as i64);
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let mut text = "x".repeat(380);
        text.push('.');
        text.push(' ');
        text.push_str(&"y".repeat(300));
        let chunks = chunk_message("m1", &text, 500, 50);
        // First chunk should end at the period, not mid-run of 'y'.
        assert!(chunks[0].text.ends_with('.'));
    }

    #[test]
    fn test_deterministic_ids_and_hashes() {
        let text = "First sentence. Second sentence. ".repeat(40);
        let a = chunk_message("m1", &text, 500, 50);
        let b = chunk_message("m1", &text, 500, 50);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.text, y.text);
        }
    }

    #[test]
    fn test_multibyte_utf8() {
        let text = "généralités — résumé préliminaire. ".repeat(40);
        let chunks = chunk_message("m1", &text, 200, 30);
        assert!(!chunks.is_empty());
        for c in &chunks {
            // Slicing never split a code point.
            assert!(c.text.is_char_boundary(0));
        }
    }

    #[test]
    fn test_tiny_window_over_multibyte_text_terminates() {
        // A window smaller than two 2-byte chars plus near-total
        // overlap must still advance through the text.
        let text = "é".repeat(50);
        let chunks = chunk_message("m1", &text, 4, 3);
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= text.chars().count());
        for pair in chunks.windows(2) {
            assert!(pair[1].offset > pair[0].offset);
        }
    }

    #[test]
    fn test_offsets_point_into_source() {
        let text = "Budget review next week. Please send the quarterly numbers. ".repeat(20);
        let chunks = chunk_message("m1", &text, 300, 40);
        for c in &chunks {
            let start = c.offset as usize;
            assert_eq!(&text[start..start + c.text.len()], c.text);
        }
    }
}
