//! Per-word timings derived from per-character forced alignment.

use crate::error::NarrationError;
use crate::tokenizer::Token;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ts_rs::TS;

/// Timing of one word token, in milliseconds of audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct AlignmentEntry {
    pub token_index: usize,
    pub word: String,
    pub start_ms: f64,
    pub end_ms: f64,
}

/// Character-level alignment as returned by the narration service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrationPayload {
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(rename = "character_start_times_seconds")]
    pub character_start_times_sec: Vec<f64>,
    #[serde(rename = "character_end_times_seconds")]
    pub character_end_times_sec: Vec<f64>,
}

impl NarrationPayload {
    /// Parse the `alignment` field, which the service sends either as a
    /// nested object or as a JSON document encoded in a string.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, NarrationError> {
        let parsed = match value {
            serde_json::Value::String(encoded) => serde_json::from_str::<Self>(&encoded),
            other => serde_json::from_value::<Self>(other),
        };
        parsed.map_err(|err| NarrationError::data(format!("malformed alignment payload: {err}")))
    }
}

/// A word that could not be timed because its char range fell outside the
/// payload's timing arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedToken {
    pub token_index: usize,
    pub word: String,
    pub char_start: usize,
    pub char_end: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentBuild {
    pub entries: Vec<AlignmentEntry>,
    pub skipped: Vec<SkippedToken>,
}

impl AlignmentBuild {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Walk `tokens` with a running char cursor and emit one entry per word whose
/// first and last chars both have timings. Whitespace only advances the
/// cursor. Words outside the arrays are skipped with a warning and the
/// cursor still advances past them.
pub fn build_alignment(tokens: &[Token], payload: &NarrationPayload) -> AlignmentBuild {
    let starts = &payload.character_start_times_sec;
    let ends = &payload.character_end_times_sec;
    let mut build = AlignmentBuild::default();
    let mut cursor = 0usize;

    for token in tokens {
        let len = token.char_len();
        if !token.is_word {
            cursor += len;
            continue;
        }

        let last = cursor + len - 1;
        let timing = match (starts.get(cursor), ends.get(last)) {
            (Some(start), Some(end)) if start.is_finite() && end.is_finite() => {
                Some((*start, *end))
            }
            _ => None,
        };

        match timing {
            Some((start_sec, end_sec)) => {
                let start_ms = start_sec * 1000.0;
                let mut end_ms = end_sec * 1000.0;
                if end_ms < start_ms {
                    debug!(
                        token_index = token.index,
                        start_ms, end_ms, "Raising inverted word end to its start"
                    );
                    end_ms = start_ms;
                }
                build.entries.push(AlignmentEntry {
                    token_index: token.index,
                    word: token.text.clone(),
                    start_ms,
                    end_ms,
                });
            }
            None => {
                warn!(
                    token_index = token.index,
                    word = %token.text,
                    char_start = cursor,
                    char_end = last,
                    start_len = starts.len(),
                    end_len = ends.len(),
                    "Word falls outside alignment timings; skipping"
                );
                build.skipped.push(SkippedToken {
                    token_index: token.index,
                    word: token.text.clone(),
                    char_start: cursor,
                    char_end: last,
                });
            }
        }
        cursor += len;
    }

    debug!(
        entries = build.entries.len(),
        skipped = build.skipped.len(),
        "Built word alignment"
    );
    build
}
