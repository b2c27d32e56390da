//! Sliding-window text chunking for the knowledge base ingest pipeline.

const TARGET_CHARS: usize = 800;
const OVERLAP_CHARS: usize = 200;
const MIN_CHARS: usize = 100;
/// How far past `TARGET_CHARS` to look for a sentence boundary before
/// giving up and cutting mid-sentence.
const BOUNDARY_SEARCH_WINDOW: usize = 150;

/// Splits `text` into overlapping chunks, snapping each boundary to the
/// nearest sentence end (`.`, `!`, `?` followed by whitespace or end of
/// text) within a small search window. The final chunk is merged into its
/// predecessor if it would otherwise fall below `MIN_CHARS`.
pub fn chunk_text(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= TARGET_CHARS {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let target_end = (start + TARGET_CHARS).min(chars.len());
        let end = if target_end >= chars.len() {
            chars.len()
        } else {
            find_sentence_boundary(&chars, target_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        chunks.push(chunk.trim().to_string());

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(OVERLAP_CHARS);
        // Guard against a boundary search that failed to make forward
        // progress (e.g. no whitespace anywhere nearby).
        if start >= end {
            start = end;
        }
    }

    // A trailing chunk shorter than MIN_CHARS reads better merged into its
    // predecessor than standing alone.
    if chunks.len() > 1 {
        let last_len = chunks.last().unwrap().chars().count();
        if last_len < MIN_CHARS {
            let last = chunks.pop().unwrap();
            let prev = chunks.last_mut().unwrap();
            prev.push(' ');
            prev.push_str(&last);
        }
    }

    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Looks forward (then backward) from `target` for a sentence-ending
/// punctuation mark followed by whitespace, within `BOUNDARY_SEARCH_WINDOW`
/// chars either side. Falls back to `target` (a hard cut) if none is found.
fn find_sentence_boundary(chars: &[char], target: usize) -> usize {
    let forward_limit = (target + BOUNDARY_SEARCH_WINDOW).min(chars.len());
    for i in target..forward_limit.saturating_sub(1) {
        if is_sentence_end(chars[i]) && chars[i + 1].is_whitespace() {
            return i + 2;
        }
    }
    let backward_limit = target.saturating_sub(BOUNDARY_SEARCH_WINDOW);
    for i in (backward_limit..target.saturating_sub(1)).rev() {
        if is_sentence_end(chars[i]) && chars[i + 1].is_whitespace() {
            return i + 2;
        }
    }
    target
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("A short paragraph about nothing in particular.");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_text("   ").is_empty());
    }

    #[test]
    fn long_text_splits_on_sentence_boundaries() {
        let sentence = "This is one sentence that is reasonably long. ";
        let text = sentence.repeat(80);
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(!c.is_empty());
        }
        // Every chunk but possibly the last should end on a sentence mark.
        for c in &chunks[..chunks.len() - 1] {
            let trimmed = c.trim_end();
            assert!(trimmed.ends_with('.'));
        }
    }

    #[test]
    fn chunks_overlap_so_context_is_not_lost_at_boundaries() {
        let sentence = "Alpha beta gamma delta epsilon zeta eta theta. ";
        let text = sentence.repeat(60);
        let chunks = chunk_text(&text);
        assert!(chunks.len() >= 2);
        let first_tail: Vec<&str> = chunks[0].split_whitespace().rev().take(3).collect();
        let second_head: Vec<&str> = chunks[1].split_whitespace().take(20).collect();
        assert!(first_tail
            .iter()
            .any(|w| second_head.contains(&w.trim_end_matches('.'))));
    }
}
