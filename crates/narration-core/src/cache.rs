//! Cache-scoped locations for decoded narration audio.
//!
//! Files live under the configured cache directory, named by a hash of the
//! narration input so the same page in the same language always maps to the
//! same file and unusual characters never reach the filesystem.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const AUDIO_EXTENSION: &str = "mp3";

/// Stable audio path for one (story, page, language, text) tuple.
pub fn audio_path(
    cache_root: &Path,
    story_id: &str,
    page_number: u32,
    language: &str,
    text: &str,
) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(story_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(page_number.to_le_bytes());
    hasher.update(language.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    story_dir(cache_root, story_id).join(format!("narration-{hash}.{AUDIO_EXTENSION}"))
}

/// Per-story directory, hashed so story ids with path separators stay inside
/// the cache root.
pub fn story_dir(cache_root: &Path, story_id: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(story_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    cache_root.join(&hash[..16])
}
