//! File-system capability used by the fetcher to persist narration audio.

use crate::error::NarrationError;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub trait AudioStore: Send + Sync {
    /// Decode `data` as base64 and write the bytes to `path`.
    fn write_base64(&self, path: &Path, data: &str) -> Result<(), NarrationError>;

    fn exists(&self, path: &Path) -> Result<bool, NarrationError>;
}

/// Writes audio to the local filesystem. Files are written to a temp sibling
/// and renamed into place so a reader never sees a half-written file.
#[derive(Debug, Clone, Default)]
pub struct LocalAudioStore;

impl AudioStore for LocalAudioStore {
    fn write_base64(&self, path: &Path, data: &str) -> Result<(), NarrationError> {
        let bytes = BASE64_STANDARD
            .decode(data.trim())
            .map_err(|err| NarrationError::data(format!("invalid base64 audio: {err}")))?;
        if bytes.is_empty() {
            return Err(NarrationError::data("audio payload decoded to zero bytes"));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| NarrationError::storage("creating audio cache dir", err))?;
        }

        let temp_path = unique_temp_path(path);
        fs::write(&temp_path, &bytes)
            .map_err(|err| NarrationError::storage("writing narration audio", err))?;
        if fs::rename(&temp_path, path).is_err() {
            let copied = fs::copy(&temp_path, path);
            let _ = fs::remove_file(&temp_path);
            copied.map_err(|err| NarrationError::storage("moving narration audio", err))?;
        }
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote narration audio");
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool, NarrationError> {
        path.try_exists()
            .map_err(|err| NarrationError::storage("checking narration audio", err))
    }
}

fn unique_temp_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nonce = SEQ.fetch_add(1, Ordering::Relaxed);
    let ts_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut temp_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("narration.mp3")
        .to_string();
    temp_name.push_str(&format!(".tmp-{ts_nanos}-{nonce}"));
    path.with_file_name(temp_name)
}
