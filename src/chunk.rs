//! Paragraph-boundary text chunker with character overlap.
//!
//! Splits document text into segments that respect a `max_chars` upper
//! bound. Splitting occurs on blank-line boundaries to preserve semantic
//! coherence; when a chunk closes, the trailing `overlap_chars` characters
//! seed the next one so context carries across the cut. Paragraphs larger
//! than the bound are hard-split at character boundaries, each split
//! carrying the same trailing overlap forward.
//!
//! Lengths are counted in `char`s, never bytes, so multibyte input cannot
//! be split inside a code point.

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Whitespace-only paragraphs are discarded before chunking; empty input
/// (after trimming) yields an empty vector, not an error. Callers must
/// supply `max_chars > 0` and `overlap_chars < max_chars` (enforced by
/// config validation).
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    debug_assert!(max_chars > 0);
    debug_assert!(overlap_chars < max_chars);

    let mut chunks: Vec<String> = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        let para_len = char_len(para);
        let joined = if buf.is_empty() {
            para_len
        } else {
            char_len(&buf) + 2 + para_len // +2 for the \n\n separator
        };

        // Close the current buffer and seed the next one with its tail.
        if joined > max_chars && !buf.is_empty() {
            let seed = tail_chars(&buf, overlap_chars).to_string();
            chunks.push(std::mem::take(&mut buf));
            buf = seed;
        }

        // At this point the buffer holds at most the overlap seed. If the
        // paragraph still does not fit alongside it, hard-split at the
        // character boundary until the remainder does.
        let sep = if buf.is_empty() { 0 } else { 2 };
        if char_len(&buf) + sep + para_len > max_chars {
            let mut piece = std::mem::take(&mut buf);
            let mut rest = para;
            while char_len(&piece) + char_len(rest) > max_chars {
                let room = max_chars - char_len(&piece);
                let (head, tail) = split_at_chars(rest, room);
                piece.push_str(head);
                let seed = tail_chars(&piece, overlap_chars).to_string();
                chunks.push(piece);
                piece = seed;
                rest = tail;
            }
            piece.push_str(rest);
            buf = piece;
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(para);
        }
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }

    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `s` after the first `n` characters, at a char boundary.
fn split_at_chars(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, ""),
    }
}

/// The last `n` characters of `s` (all of `s` when shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let len = char_len(s);
    if len <= n {
        s
    } else {
        split_at_chars(s, len - n).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 700, 80);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 700, 80).is_empty());
        assert!(chunk_text("   \n\n  \n\n ", 700, 80).is_empty());
    }

    #[test]
    fn paragraphs_under_limit_merge() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = chunk_text(text, 700, 80);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("First paragraph."));
        assert!(chunks[0].contains("Third paragraph."));
    }

    #[test]
    fn two_paragraph_overlap_scenario() {
        let chunks = chunk_text("Para1.\n\nPara2.", 12, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "Para1.");
        // Chunk 1 carries the tail of chunk 0 plus the next paragraph.
        assert_eq!(chunks[1], "ara1.Para2.");
    }

    #[test]
    fn every_chunk_within_bound() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {} with some filler words.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        for max in [24, 40, 120] {
            for overlap in [0, 5, 10] {
                for chunk in chunk_text(&text, max, overlap) {
                    assert!(
                        chunk.chars().count() <= max,
                        "chunk of {} chars exceeds max {}",
                        chunk.chars().count(),
                        max
                    );
                }
            }
        }
    }

    #[test]
    fn no_paragraph_silently_dropped() {
        let paragraphs: Vec<String> = (0..20).map(|i| format!("Unit{:02}content", i)).collect();
        let text = paragraphs.join("\n\n");
        let joined = chunk_text(&text, 30, 6).join("");
        for para in &paragraphs {
            assert!(joined.contains(para), "missing paragraph {}", para);
        }
    }

    #[test]
    fn oversized_paragraph_hard_split_carries_overlap() {
        let para = "abcdefghijklmnopqrstuvwxyz0123456789";
        let chunks = chunk_text(para, 10, 3);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
        // Each continuation starts with the previous chunk's last 3 chars.
        for pair in chunks.windows(2) {
            let len = pair[0].chars().count();
            let tail: String = pair[0].chars().skip(len - 3).collect();
            assert!(pair[1].starts_with(&tail), "{:?} !~ {:?}", pair[1], tail);
        }
    }

    #[test]
    fn multibyte_input_splits_on_char_boundaries() {
        let para = "ééééééééééééééééééééééééé";
        let chunks = chunk_text(para, 7, 2);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 7);
            assert!(chunk.chars().all(|c| c == 'é'));
        }
    }

    #[test]
    fn zero_overlap_produces_disjoint_chunks() {
        let text = "one two three four\n\nfive six seven eight\n\nnine ten eleven twelve";
        let chunks = chunk_text(text, 20, 0);
        let rebuilt = chunks.join("\n\n");
        assert!(rebuilt.contains("one two three four"));
        assert!(rebuilt.contains("nine ten eleven twelve"));
    }

    #[test]
    fn deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta and a somewhat longer closing paragraph.";
        let a = chunk_text(text, 18, 4);
        let b = chunk_text(text, 18, 4);
        assert_eq!(a, b);
    }
}
