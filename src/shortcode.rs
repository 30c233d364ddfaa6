//! Native `[gallery]` shortcode construction and post body rewriting.

use regex::{NoExpand, Regex};
use std::sync::LazyLock;

static LEGACY_SHORTCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[nggallery[^\]]*\]").expect("legacy shortcode pattern is valid")
});

/// Build the native gallery shortcode.
///
/// Attachments that were on the post before migration are excluded so
/// they don't show up twice.
pub fn build_gallery_shortcode(exclude: &[u64]) -> String {
    let mut attrs: Vec<(&str, String)> = Vec::new();
    if !exclude.is_empty() {
        let ids = exclude
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        attrs.push(("exclude", ids));
    }

    let mut shortcode = String::from("[gallery");
    for (key, value) in attrs {
        shortcode.push_str(&format!(" {}=\"{}\"", esc_attr(key), esc_attr(&value)));
    }
    shortcode.push(']');
    shortcode
}

/// Replace every legacy `[nggallery ...]` shortcode with `replacement`.
///
/// The replacement is inserted literally; `$` has no special meaning.
pub fn rewrite_content(content: &str, replacement: &str) -> String {
    LEGACY_SHORTCODE_RE
        .replace_all(content, NoExpand(replacement))
        .into_owned()
}

/// Whether `content` still contains `marker`, ignoring ASCII case.
pub fn contains_marker(content: &str, marker: &str) -> bool {
    content
        .to_ascii_lowercase()
        .contains(&marker.to_ascii_lowercase())
}

/// Escape a value for use inside a double-quoted HTML attribute.
pub fn esc_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
