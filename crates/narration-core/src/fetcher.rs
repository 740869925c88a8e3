//! Alignment + audio retrieval from the narration service.
//!
//! One POST per narration input. The response carries a character-level
//! alignment and base64 audio; the audio is persisted to the cache so the
//! playback engine can open it by path.

use crate::alignment::{AlignmentEntry, NarrationPayload, SkippedToken, build_alignment};
use crate::cache;
use crate::cancellation::CancellationToken;
use crate::config::NarratorConfig;
use crate::error::NarrationError;
use crate::storage::{AudioStore, LocalAudioStore};
use crate::tokenizer::{Token, normalize, tokenize};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The tuple identifying one narration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationInput {
    pub text: String,
    pub story_id: String,
    pub page_number: u32,
    pub language: String,
}

impl NarrationInput {
    pub fn new(
        text: impl Into<String>,
        story_id: impl Into<String>,
        page_number: u32,
        language: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            story_id: story_id.into(),
            page_number,
            language: language.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedNarration {
    pub tokens: Vec<Token>,
    pub alignment: Vec<AlignmentEntry>,
    pub skipped: Vec<SkippedToken>,
    pub audio_uri: PathBuf,
}

/// Source of alignment + audio for a narration input. Implementations are
/// called from a worker thread and may be called again before an earlier
/// call returns.
pub trait NarrationFetcher: Send + Sync {
    fn fetch(
        &self,
        input: &NarrationInput,
        cancel: &CancellationToken,
    ) -> Result<FetchedNarration, NarrationError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NarrationRequestBody<'a> {
    text: &'a str,
    story_id: &'a str,
    page_no: u32,
    language: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NarrationResponseBody {
    #[serde(default)]
    alignment: Option<serde_json::Value>,
    #[serde(default)]
    audio_base64: Option<String>,
}

/// Validate a success response body and split it into payload and audio.
pub fn parse_response(body: &str) -> Result<(NarrationPayload, String), NarrationError> {
    let parsed: NarrationResponseBody = serde_json::from_str(body)
        .map_err(|err| NarrationError::data(format!("response is not valid JSON: {err}")))?;
    let alignment = parsed
        .alignment
        .ok_or_else(|| NarrationError::data("response is missing the alignment field"))?;
    let audio = parsed
        .audio_base64
        .filter(|audio| !audio.trim().is_empty())
        .ok_or_else(|| NarrationError::data("response is missing the audioBase64 field"))?;
    let payload = NarrationPayload::from_json_value(alignment)?;
    Ok((payload, audio))
}

pub struct HttpNarrationFetcher {
    client: Client,
    url: String,
    cache_root: PathBuf,
    store: Arc<dyn AudioStore>,
}

impl HttpNarrationFetcher {
    pub fn new(config: &NarratorConfig) -> Result<Self, NarrationError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| NarrationError::network(format!("building HTTP client: {err}")))?;
        Ok(Self {
            client,
            url: config.narration_url(),
            cache_root: config.audio_cache_dir(),
            store: Arc::new(LocalAudioStore),
        })
    }

    pub fn with_store(mut self, store: Arc<dyn AudioStore>) -> Self {
        self.store = store;
        self
    }

    fn request(&self, input: &NarrationInput, text: &str) -> Result<String, NarrationError> {
        let body = serde_json::to_vec(&NarrationRequestBody {
            text,
            story_id: &input.story_id,
            page_no: input.page_number,
            language: &input.language,
        })
        .map_err(|err| NarrationError::data(format!("encoding request: {err}")))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|err| NarrationError::network(format!("sending request: {err}")))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|err| NarrationError::network(format!("reading response: {err}")))?;
        if !status.is_success() {
            warn!(%status, url = %self.url, "Narration request rejected");
            return Err(NarrationError::network(format!(
                "narration request failed with status {status}: {text}"
            )));
        }
        Ok(text)
    }
}

impl NarrationFetcher for HttpNarrationFetcher {
    fn fetch(
        &self,
        input: &NarrationInput,
        cancel: &CancellationToken,
    ) -> Result<FetchedNarration, NarrationError> {
        let text = normalize(&input.text);
        info!(
            story_id = %input.story_id,
            page = input.page_number,
            language = %input.language,
            chars = text.chars().count(),
            "Requesting narration"
        );

        cancel.check_cancelled("send")?;
        let body = self.request(input, &text)?;
        cancel.check_cancelled("receive")?;

        let (payload, audio) = parse_response(&body)?;
        let tokens = tokenize(&text);
        let build = build_alignment(&tokens, &payload);
        if build.is_partial() {
            warn!(
                skipped = build.skipped.len(),
                timed = build.entries.len(),
                "Alignment payload does not cover every word"
            );
        }

        let path = cache::audio_path(
            &self.cache_root,
            &input.story_id,
            input.page_number,
            &input.language,
            &text,
        );
        self.store.write_base64(&path, &audio)?;
        if !self.store.exists(&path)? {
            return Err(NarrationError::Storage {
                message: format!("audio file missing after write: {}", path.display()),
            });
        }
        cancel.check_cancelled("write")?;

        debug!(path = %path.display(), words = build.entries.len(), "Narration ready");
        Ok(FetchedNarration {
            tokens,
            alignment: build.entries,
            skipped: build.skipped,
            audio_uri: path,
        })
    }
}
