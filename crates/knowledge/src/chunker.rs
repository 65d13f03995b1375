//! Overlapping text splitter.
//!
//! Windows are at most `chunk_size` characters. A window ends at the latest
//! paragraph break in its second half, else a line break, else a sentence
//! end, else a space; the next window starts `overlap` characters before
//! that point.

/// Separators tried in order of preference.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split `text` into trimmed, non-empty chunks.
///
/// Sizes are in characters, not bytes, so multi-byte text never splits
/// inside a code point.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let hard_end = (start + chunk_size).min(len);
        let end = if hard_end < len {
            find_break(&chars, start, hard_end)
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= len {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Latest separator end in `(start + half, hard_end]`, or `hard_end`.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let floor = start + (hard_end - start) / 2;

    for sep in SEPARATORS {
        let sep: Vec<char> = sep.chars().collect();
        let mut pos = hard_end;
        while pos >= floor + sep.len() {
            if chars[pos - sep.len()..pos] == sep[..] {
                return pos;
            }
            pos -= 1;
        }
    }

    hard_end
}
