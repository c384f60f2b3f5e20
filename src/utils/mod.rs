//! Shared helpers for swe-playground.

/// The last `max_chars` characters of `text`.
///
/// Used to keep agent, test and build output short enough for logs and
/// follow-up prompts.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    text.char_indices()
        .nth(count - max_chars)
        .map_or("", |(i, _)| &text[i..])
}
