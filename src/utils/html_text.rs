//! Plain-text fallback generation from HTML bodies.

use regex::Regex;
use std::sync::LazyLock;

static HIDDEN_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)>").unwrap());
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|table)>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

/// Converts an HTML body into readable plain text.
///
/// Drops `script`/`style`/`head` blocks, turns block-level closings and `<br>`
/// into line breaks, strips the remaining tags, decodes the common entities
/// and collapses runs of whitespace.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(html_to_text("<p>Hello</p><p>World</p>"), "Hello\nWorld");
/// ```
pub fn html_to_text(html: &str) -> String {
    let text = HIDDEN_BLOCK.replace_all(html, "");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = INLINE_SPACE.replace_all(&text, " ");

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");

    BLANK_LINES
        .replace_all(joined.trim(), "\n\n")
        .into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
