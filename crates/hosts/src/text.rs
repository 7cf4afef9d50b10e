//! Small helpers for shaping upstream text into tool output.

use std::borrow::Cow;

/// Collapse every run of whitespace into a single space.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop HTML tags, keeping their text content.
pub(crate) fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Plain text from an HTML fragment.
pub(crate) fn html_to_text(html: &str) -> String {
    let text = collapse_whitespace(&strip_tags(html));
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

/// At most `max` characters of `text`, never splitting a character.
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// `text` cut to `max` characters with `...` appended when shortened.
pub(crate) fn ellipsize(text: &str, max: usize) -> Cow<'_, str> {
    let cut = truncate(text, max);
    if cut.len() == text.len() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{cut}..."))
    }
}

/// Wikipedia-style title: spaces become underscores.
pub(crate) fn wiki_title(title: &str) -> String {
    title.trim().replace(' ', "_")
}
