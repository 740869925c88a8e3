//! Error taxonomy for the narration engine.
//!
//! Every variant carries an already-rendered message so results can cross
//! the fetch worker's channel and be shown to a reader unchanged.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrationError {
    /// The request could not be sent, or the service answered with a
    /// non-success status.
    #[error("network error: {message}")]
    Network { message: String },

    /// The response was missing a field or carried malformed data.
    #[error("data error: {message}")]
    Data { message: String },

    /// Writing or verifying the local audio file failed.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// The audio engine rejected a load/play/pause/rate request.
    #[error("playback error: {message}")]
    Playback { message: String },

    /// The operation was abandoned because its input was replaced.
    #[error("operation cancelled at stage={stage}")]
    Cancelled { stage: &'static str },
}

impl NarrationError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: format!("{context}: {err}"),
        }
    }

    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Short message suitable for showing to a reader.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { .. } => format!("Could not reach the narration service ({self})"),
            Self::Data { .. } => format!("The narration service sent unusable data ({self})"),
            Self::Storage { .. } => format!("Could not save the narration audio ({self})"),
            Self::Playback { .. } => format!("Could not play the narration ({self})"),
            Self::Cancelled { .. } => "Narration was cancelled".to_string(),
        }
    }
}
