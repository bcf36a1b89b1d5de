// crates/citypop-core/src/text.rs

//! Text folding and cell cleanup shared by the normalizer, the merge engine
//! and the HTML adapter.

/// Convert a string into a folded key suitable for matching.
///
/// This performs:
/// 1\) Transliterate Unicode → ASCII (e.g. `São Paulo` -> `Sao Paulo`)
/// 2\) Normalize to lowercase
///
/// # Examples
///
/// ```rust
/// use citypop_core::text::fold_key;
///
/// assert_eq!(fold_key("São Paulo"), "sao paulo");
/// assert_eq!(fold_key("Łódź"), "lodz");
/// ```
pub fn fold_key(s: &str) -> String {
    deunicode::deunicode(s).to_lowercase()
}

/// Remove `[ ... ]` citation markers (e.g. `[1]`, `[note 3]`, `[citation needed]`).
/// No nesting; an unterminated `[` drops the rest of the string.
pub fn strip_citations(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_bracket = false;
    for ch in s.chars() {
        match ch {
            '[' => in_bracket = true,
            ']' if in_bracket => in_bracket = false,
            _ if !in_bracket => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Collapse sequences of whitespace into a single space and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

/// Minimal HTML entity decoding for the handful of entities crawled tables use.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Full cleanup for a text cell: entities, citations, whitespace.
pub fn clean_text(s: &str) -> String {
    normalize_ws(&strip_citations(&decode_entities(s)))
}
