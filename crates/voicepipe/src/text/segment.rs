use once_cell::sync::Lazy;
use regex::Regex;

static RE_LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\d+\.|-|\*)\s+").unwrap());

static RE_DECIMAL_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+").unwrap());

static RE_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.(\d+)").unwrap());

/// Placeholder substituted for the `.` inside decimal numbers while
/// sentence-splitting. A private-use codepoint, so it cannot collide with
/// payload text and cannot leak into the output.
const DECIMAL_MARK: char = '\u{E000}';

/// Split cleaned text into speakable chunks.
///
/// Respects paragraph breaks, markdown list items (`-`, `*`, `1.`), and
/// decimal numbers (3.14 is never split at its internal period). Sentences
/// are split on `.`, `!`, or `?` followed by whitespace or end of input,
/// with the punctuation kept attached.
///
/// Returns the ordered chunks; an empty string marks a paragraph break
/// between (but not after) paragraphs.
pub fn split_text(text: &str) -> Vec<String> {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut result = Vec::new();

    for (index, paragraph) in paragraphs.iter().enumerate() {
        let lines: Vec<&str> = paragraph.split('\n').collect();

        // Spoken list labels sound wrong with a trailing "dot", but only
        // strip periods when every non-empty line in the paragraph ends
        // with one; mixed paragraphs are left untouched.
        let all_lines_end_with_period = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .all(|line| line.ends_with('.'));

        for line in &lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if RE_LIST_ITEM.is_match(line) {
                let item = if all_lines_end_with_period {
                    line.trim_end_matches('.')
                } else {
                    line
                };
                result.push(normalize_list_item(item));
                continue;
            }

            // A line leading with a decimal number is emitted whole.
            if RE_DECIMAL_LINE.is_match(line) {
                result.push(line.to_string());
                continue;
            }

            result.extend(split_sentences(line));
        }

        if index + 1 < paragraphs.len() {
            result.push(String::new());
        }
    }

    while result.last().is_some_and(|chunk| chunk.is_empty()) {
        result.pop();
    }

    result
}

/// Normalize `*` bullets to `-` so every list item is read the same way.
fn normalize_list_item(item: &str) -> String {
    if item.starts_with('*') {
        item.replacen('*', "-", 1)
    } else {
        item.to_string()
    }
}

/// Split a single line into sentences, preserving terminal punctuation.
fn split_sentences(line: &str) -> Vec<String> {
    let protected = RE_DECIMAL.replace_all(line, format!("${{1}}{DECIMAL_MARK}${{2}}").as_str());

    let chars: Vec<char> = protected.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let boundary = matches!(c, '.' | '!' | '?')
            && chars.get(i + 1).is_none_or(|next| next.is_whitespace());
        if boundary {
            push_sentence(&mut sentences, &chars[start..=i]);
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }

    if start < chars.len() {
        push_sentence(&mut sentences, &chars[start..]);
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, chars: &[char]) {
    let sentence: String = chars
        .iter()
        .collect::<String>()
        .replace(DECIMAL_MARK, ".")
        .trim()
        .to_string();
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}
