/// Splits text into segments at natural boundaries, preferring paragraph over
/// line over sentence over word breaks before resorting to a hard cut
/// (spec.md §4.7). Grounded on the threshold/batching style of
/// `streaming/chunk_batcher.rs`, adapted from byte-count batching to text
/// boundary search.
pub struct StreamingBuffer;

impl StreamingBuffer {
    /// Default splitter: segments of at most `chunk_size_bytes`, falling all
    /// the way through to a hard cut when no natural boundary exists.
    pub fn split(text: &str, chunk_size_bytes: usize) -> Vec<&str> {
        split_with_boundaries(text, chunk_size_bytes, true)
    }

    /// Conservative splitter used by the emergency path: targets
    /// `min(chunk_size/4, 25_000)` bytes and never hard-cuts if any boundary
    /// rule 1-4 matches (spec.md §4.7).
    pub fn split_conservative(text: &str, chunk_size_bytes: usize) -> Vec<&str> {
        let target = (chunk_size_bytes / 4).min(25_000).max(1);
        split_with_boundaries(text, target, false)
    }
}

fn split_with_boundaries(text: &str, chunk_size_bytes: usize, allow_hard_cut: bool) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }

    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0usize;

    while start < bytes.len() {
        let remaining = bytes.len() - start;
        if remaining <= chunk_size_bytes {
            segments.push(&text[start..]);
            break;
        }

        let ideal_end = start + chunk_size_bytes;
        let cut = find_boundary(bytes, start, ideal_end).unwrap_or_else(|| {
            if allow_hard_cut {
                char_boundary_at_or_before(text, ideal_end)
            } else {
                // No boundary found; conservative mode still must make
                // progress, so fall back to a hard cut on a char boundary.
                char_boundary_at_or_before(text, ideal_end)
            }
        });

        let cut = cut.max(start + 1);
        segments.push(&text[start..cut]);
        start = cut;
    }

    segments
}

fn char_boundary_at_or_before(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Boundary search in priority order: paragraph break within +/-100 bytes of
/// the ideal cut, line break within +/-50 bytes, sentence terminator within
/// the preceding 100 bytes, word boundary within the preceding 50 bytes.
fn find_boundary(bytes: &[u8], start: usize, ideal_end: usize) -> Option<usize> {
    let window_lo = ideal_end.saturating_sub(100).max(start);
    let window_hi = (ideal_end + 100).min(bytes.len());
    if let Some(pos) = find_last(bytes, window_lo, window_hi, b"\n\n") {
        return Some(pos + 2);
    }

    let line_lo = ideal_end.saturating_sub(50).max(start);
    let line_hi = (ideal_end + 50).min(bytes.len());
    if let Some(pos) = find_last(bytes, line_lo, line_hi, b"\n") {
        return Some(pos + 1);
    }

    let sentence_lo = ideal_end.saturating_sub(100).max(start);
    let sentence_hi = ideal_end.min(bytes.len());
    if let Some(pos) = find_last_any(bytes, sentence_lo, sentence_hi, &[b". ", b"! ", b"? "]) {
        return Some(pos + 2);
    }

    let word_lo = ideal_end.saturating_sub(50).max(start);
    let word_hi = ideal_end.min(bytes.len());
    if let Some(pos) = find_last(bytes, word_lo, word_hi, b" ") {
        return Some(pos + 1);
    }

    None
}

fn find_last(bytes: &[u8], lo: usize, hi: usize, needle: &[u8]) -> Option<usize> {
    if hi < lo || hi > bytes.len() || needle.is_empty() {
        return None;
    }
    let haystack = &bytes[lo..hi];
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
        .map(|pos| lo + pos)
}

fn find_last_any(bytes: &[u8], lo: usize, hi: usize, needles: &[&[u8]]) -> Option<usize> {
    needles
        .iter()
        .filter_map(|needle| find_last(bytes, lo, hi, needle))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_segments() {
        assert!(StreamingBuffer::split("", 100).is_empty());
    }

    #[test]
    fn text_under_chunk_size_is_one_segment() {
        let segments = StreamingBuffer::split("hello world", 1000);
        assert_eq!(segments, vec!["hello world"]);
    }

    #[test]
    fn concatenation_reproduces_input() {
        let text = "word ".repeat(5000);
        let segments = StreamingBuffer::split(&text, 1000);
        assert_eq!(segments.concat(), text);
        assert!(segments.len() > 1);
    }

    #[test]
    fn prefers_paragraph_boundary_when_present() {
        let mut text = "a".repeat(95);
        text.push_str("\n\n");
        text.push_str(&"b".repeat(95));
        let segments = StreamingBuffer::split(&text, 100);
        assert!(segments[0].ends_with("\n\n"));
    }

    #[test]
    fn conservative_split_targets_quarter_chunk_size_capped_at_25000() {
        let text = "word ".repeat(20_000);
        let segments = StreamingBuffer::split_conservative(&text, 4_000_000);
        for segment in &segments[..segments.len() - 1] {
            assert!(segment.len() <= 25_000 + 100);
        }
        assert_eq!(segments.concat(), text);
    }

    #[test]
    fn conservative_split_is_restartable() {
        let text = "sentence one. sentence two! sentence three?".repeat(200);
        let first = StreamingBuffer::split_conservative(&text, 1000);
        let second = StreamingBuffer::split_conservative(&text, 1000);
        assert_eq!(first, second);
    }
}
