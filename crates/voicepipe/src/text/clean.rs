use once_cell::sync::Lazy;
use regex::Regex;

static RE_THINKING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think(ing)?>.*?(\n</think(ing)?>|$)").unwrap());

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[\w\. ~/\-]+\n(.*?)(\n```|$)").unwrap());

static RE_MARKDOWN_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#+\s+(.*?)$").unwrap());

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

static RE_PAREN_ASIDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").unwrap());

static RE_EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        "[",
        "\u{1F600}-\u{1F64F}", // emoticons
        "\u{1F300}-\u{1F5FF}", // symbols & pictographs
        "\u{1F680}-\u{1F6FF}", // transport & map symbols
        "\u{1F1E0}-\u{1F1FF}", // flags
        "\u{1F900}-\u{1F9FF}", // supplemental symbols
        "\u{2705}\u{1F916}\u{2728}",
        "]+",
    ))
    .unwrap()
});

/// Strip non-speech content from assistant output.
///
/// Removes, in order: thinking-block tags with their content (an
/// unterminated block runs to the end of the string), fenced code blocks
/// (including unterminated ones), markdown header hashes (the header text
/// is kept), `**bold**` markers, parenthesized asides, and emoji. The
/// result is trimmed. Cleaning already-clean text is a no-op.
pub fn clean_for_speech(content: &str) -> String {
    let content = RE_THINKING.replace_all(content, "");
    let content = RE_CODE_FENCE.replace_all(&content, "");
    let content = RE_MARKDOWN_HEADER.replace_all(&content, "$1");
    let content = RE_BOLD.replace_all(&content, "$1");
    let content = RE_PAREN_ASIDE.replace_all(&content, "");
    let content = RE_EMOJI.replace_all(&content, "");
    content.trim().to_string()
}
