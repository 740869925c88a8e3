//! Narration synchronization engine for the Kahani story reader.
//!
//! Pipeline, leaf first:
//! - [`tokenizer`] splits page text into word and whitespace tokens.
//! - [`alignment`] turns per-character timings into per-word timings.
//! - [`fetcher`] requests alignment + audio and stores the audio locally.
//! - [`playback`] owns the single live audio handle; [`audio`] plays it.
//! - [`highlight`] maps a playback position to the live word.
//! - [`session`] runs the state machine that ties them together.

pub mod alignment;
pub mod audio;
pub mod bindings;
pub mod cache;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod highlight;
pub mod playback;
pub mod session;
pub mod storage;
pub mod tokenizer;

#[cfg(test)]
mod test_support;

pub use alignment::{AlignmentBuild, AlignmentEntry, NarrationPayload, build_alignment};
pub use error::NarrationError;
pub use fetcher::{FetchedNarration, HttpNarrationFetcher, NarrationFetcher, NarrationInput};
pub use highlight::{HIGHLIGHT_TOLERANCE_MS, resolve};
pub use playback::{AudioEngine, AudioHandle, PlaybackController, PlaybackRate, PlaybackTick};
pub use session::{NarrationSession, NarrationSnapshot, SessionState, SessionUpdate};
pub use tokenizer::{Token, tokenize};
