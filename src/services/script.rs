/// Upper bound on characters per synthesis request.
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 4500;

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Splits text after each run of `.`, `!` or `?` (plus the whitespace that follows it).
/// A sentence needs at least one word character before its terminator, so leading
/// punctuation such as an ellipsis stays attached to the sentence it opens.
/// Concatenating the result gives back the input exactly.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut has_content = false;
    let mut after_terminator = false;

    for (i, c) in text.char_indices() {
        if is_terminator(c) {
            after_terminator = has_content;
        } else if !c.is_whitespace() {
            if after_terminator {
                sentences.push(&text[start..i]);
                start = i;
                after_terminator = false;
            }
            has_content = true;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Packs sentences greedily into segments of at most `max_chars` characters,
/// joined by a single space. A sentence longer than `max_chars` becomes a segment
/// of its own and is never cut. Blank input yields no segments.
pub fn chunk_by_sentences(text: &str, max_chars: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let len = sentence.chars().count();

        if !current.is_empty() && current_len + 1 + len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}
