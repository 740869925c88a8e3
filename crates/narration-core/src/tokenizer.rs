//! Narration text tokenization.
//!
//! Text is split into alternating runs of non-whitespace (words) and
//! whitespace. Offsets are char positions into the normalized text because
//! the alignment payload is indexed per character, not per byte.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+|\s+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Token {
    pub text: String,
    pub is_word: bool,
    /// First char offset, inclusive.
    pub char_start: usize,
    /// Last char offset, inclusive.
    pub char_end: usize,
    /// Position within the token sequence; whitespace runs are counted too.
    pub index: usize,
}

impl Token {
    pub fn char_len(&self) -> usize {
        self.char_end + 1 - self.char_start
    }
}

/// Replace non-breaking spaces and trim surrounding whitespace.
pub fn normalize(text: &str) -> String {
    text.replace('\u{00A0}', " ").trim().to_string()
}

/// Tokenize `text` after normalizing it. Concatenating the token texts
/// yields `normalize(text)` exactly.
pub fn tokenize(text: &str) -> Vec<Token> {
    let normalized = normalize(text);
    let mut tokens = Vec::new();
    let mut cursor = 0usize;

    for (index, run) in RE_TOKEN.find_iter(&normalized).enumerate() {
        let run = run.as_str();
        let len = run.chars().count();
        let is_word = !run.chars().next().is_some_and(char::is_whitespace);
        tokens.push(Token {
            text: run.to_string(),
            is_word,
            char_start: cursor,
            char_end: cursor + len - 1,
            index,
        });
        cursor += len;
    }

    tokens
}

/// Word tokens only, in order.
pub fn words(tokens: &[Token]) -> impl Iterator<Item = &Token> {
    tokens.iter().filter(|token| token.is_word)
}
