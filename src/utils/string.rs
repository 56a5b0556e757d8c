//! UTF-8 safe string previews.
//!
//! Slicing a `str` by byte index panics inside multibyte characters, so
//! previews count chars instead.

/// First `n` chars of `s`.
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// First `n` chars of `s`, with `...` appended when something was cut.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().nth(n).is_some() {
        prefix.push_str("...");
    }
    prefix
}

/// Collapse a possibly multi-line string onto one line for log fields.
pub fn one_line(s: &str, n: usize) -> String {
    preview(&s.split_whitespace().collect::<Vec<_>>().join(" "), n)
}
