//! Configuration loading for the narrator.
//!
//! Settings are read from `conf/config.toml` if present. Missing or invalid
//! entries fall back to defaults so narration can still start.

use crate::playback::PlaybackRate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NarratorConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_narration_path")]
    pub narration_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_audio_cache_dir")]
    pub audio_cache_dir: String,
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_auto_advance")]
    pub auto_advance: bool,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        NarratorConfig {
            api_base_url: default_api_base_url(),
            narration_path: default_narration_path(),
            request_timeout_secs: default_request_timeout_secs(),
            default_language: default_language(),
            audio_cache_dir: default_audio_cache_dir(),
            playback_rate: default_playback_rate(),
            tick_interval_ms: default_tick_interval_ms(),
            auto_advance: default_auto_advance(),
            log_level: default_log_level(),
        }
    }
}

impl NarratorConfig {
    /// Full URL of the alignment/audio endpoint.
    pub fn narration_url(&self) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        let path = self.narration_path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.clamp(10, 1000))
    }

    pub fn audio_cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.audio_cache_dir)
    }

    pub fn initial_rate(&self) -> PlaybackRate {
        PlaybackRate::clamped(self.playback_rate)
    }
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> NarratorConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded narrator config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return NarratorConfig::default();
        }
    };

    match toml::from_str::<NarratorConfig>(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            NarratorConfig::default()
        }
    }
}

fn default_api_base_url() -> String {
    "https://kahanijsondata.azurewebsites.net".to_string()
}

fn default_narration_path() -> String {
    "/narration".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_language() -> String {
    "English".to_string()
}

fn default_audio_cache_dir() -> String {
    ".cache/narration".to_string()
}

fn default_playback_rate() -> f32 {
    1.0
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_auto_advance() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Debug
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
