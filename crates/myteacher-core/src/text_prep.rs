//! Text preparation — word segmentation, punctuation cleaning, transcript
//! merging, and translation response parsing.
//!
//! Pure functions, no I/O.

use regex::Regex;
use std::sync::LazyLock;

// Characters stripped from a clicked word before it is translated.
static RE_WORD_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,/#!$%^&*;:{}=\-_`~()]").unwrap());

/// True when `text` has nothing but whitespace.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Split a paragraph into whitespace-delimited tokens. Punctuation stays
/// attached: `"Hello, world!"` → `["Hello,", "world!"]`.
pub fn split_words(paragraph: &str) -> Vec<String> {
    paragraph.split_whitespace().map(str::to_string).collect()
}

/// Strip the punctuation set from a token and trim it. May return an empty
/// string (e.g. for `"--"`).
pub fn clean_word(word: &str) -> String {
    RE_WORD_PUNCT.replace_all(word, "").trim().to_string()
}

/// Append a dictated transcript to existing text, separated by one space.
pub fn append_transcript(existing: &str, transcript: &str) -> String {
    if existing.is_empty() {
        transcript.to_string()
    } else {
        format!("{existing} {transcript}")
    }
}

/// Primary language subtag of a BCP-47 tag: `hi-IN` → `hi`.
pub fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Extract the translated string from a `translate_a/single` response body.
///
/// The response is a nested array; the first translated segment lives at
/// `[0][0][0]`. Any other shape is an error.
pub fn parse_translation(body: &str) -> Result<String, String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;

    value
        .get(0)
        .and_then(|v| v.get(0))
        .and_then(|v| v.get(0))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| "unexpected response shape: no string at [0][0][0]".to_string())
}
