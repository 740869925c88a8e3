//! Single-slot ownership of one audio handle on top of an audio engine.

use crate::error::NarrationError;
use std::path::Path;
use tracing::{debug, info, warn};

/// Slowest supported narration rate.
pub const MIN_PLAYBACK_RATE: f32 = 0.5;
/// Fastest supported narration rate.
pub const MAX_PLAYBACK_RATE: f32 = 2.0;
pub const PLAYBACK_RATE_STEP: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackRate(f32);

impl Default for PlaybackRate {
    fn default() -> Self {
        Self(1.0)
    }
}

impl PlaybackRate {
    pub fn clamped(rate: f32) -> Self {
        if rate.is_finite() {
            Self(rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE))
        } else {
            Self::default()
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn faster(self) -> Self {
        Self::clamped(self.0 + PLAYBACK_RATE_STEP)
    }

    pub fn slower(self) -> Self {
        Self::clamped(self.0 - PLAYBACK_RATE_STEP)
    }
}

/// Opaque identifier for a loaded sound inside an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    pub rate: f32,
    pub should_play: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub position_ms: f64,
    pub is_playing: bool,
    pub did_finish: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackTick {
    pub handle: AudioHandle,
    pub position_ms: f64,
    pub is_playing: bool,
    pub did_finish: bool,
}

/// Audio engine capability. Engines may hold several sounds; ownership rules
/// are enforced by [`PlaybackController`].
pub trait AudioEngine {
    fn load(&mut self, uri: &Path, options: LoadOptions) -> Result<AudioHandle, NarrationError>;
    fn play(&mut self, handle: AudioHandle) -> Result<(), NarrationError>;
    fn pause(&mut self, handle: AudioHandle) -> Result<(), NarrationError>;
    fn set_rate(&mut self, handle: AudioHandle, rate: f32) -> Result<(), NarrationError>;
    fn unload(&mut self, handle: AudioHandle) -> Result<(), NarrationError>;
    fn status(&mut self, handle: AudioHandle) -> Result<PlaybackStatus, NarrationError>;
}

type TickCallback = Box<dyn FnMut(PlaybackTick)>;

pub struct PlaybackController<E: AudioEngine> {
    engine: E,
    active: Option<AudioHandle>,
    on_tick: Option<TickCallback>,
}

impl<E: AudioEngine> PlaybackController<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            active: None,
            on_tick: None,
        }
    }

    pub fn active(&self) -> Option<AudioHandle> {
        self.active
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Register the receiver of position ticks, replacing any previous one.
    pub fn subscribe(&mut self, on_tick: impl FnMut(PlaybackTick) + 'static) {
        self.on_tick = Some(Box::new(on_tick));
    }

    /// Load `uri` as the only active sound. Any previous handle is unloaded
    /// first, whether or not it was playing.
    pub fn load(
        &mut self,
        uri: &Path,
        rate: PlaybackRate,
        should_play: bool,
    ) -> Result<AudioHandle, NarrationError> {
        self.unload();
        let handle = self.engine.load(
            uri,
            LoadOptions {
                rate: rate.value(),
                should_play,
            },
        )?;
        info!(
            handle = handle.0,
            path = %uri.display(),
            rate = rate.value(),
            should_play,
            "Loaded narration audio"
        );
        self.active = Some(handle);
        Ok(handle)
    }

    pub fn play(&mut self, handle: AudioHandle) -> Result<(), NarrationError> {
        self.ensure_active(handle, "play")?;
        debug!(handle = handle.0, "Resuming playback");
        self.engine.play(handle)
    }

    pub fn pause(&mut self, handle: AudioHandle) -> Result<(), NarrationError> {
        self.ensure_active(handle, "pause")?;
        debug!(handle = handle.0, "Pausing playback");
        self.engine.pause(handle)
    }

    /// Applies in place; the sound is not reloaded.
    pub fn set_rate(&mut self, handle: AudioHandle, rate: PlaybackRate) -> Result<(), NarrationError> {
        self.ensure_active(handle, "set_rate")?;
        debug!(handle = handle.0, rate = rate.value(), "Changing playback rate");
        self.engine.set_rate(handle, rate.value())
    }

    /// Release the active handle if there is one. Safe to call repeatedly;
    /// engine failures are logged and swallowed.
    pub fn unload(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };
        match self.engine.unload(handle) {
            Ok(()) => debug!(handle = handle.0, "Unloaded narration audio"),
            Err(err) => warn!(handle = handle.0, "Ignoring failure while unloading audio: {err}"),
        }
    }

    /// Query the active sound and hand a tick to the subscriber.
    pub fn poll(&mut self) -> Option<PlaybackTick> {
        let handle = self.active?;
        let status = match self.engine.status(handle) {
            Ok(status) => status,
            Err(err) => {
                warn!(handle = handle.0, "Failed to read playback status: {err}");
                return None;
            }
        };
        let tick = PlaybackTick {
            handle,
            position_ms: status.position_ms,
            is_playing: status.is_playing,
            did_finish: status.did_finish,
        };
        if let Some(on_tick) = self.on_tick.as_mut() {
            on_tick(tick);
        }
        Some(tick)
    }

    fn ensure_active(&self, handle: AudioHandle, op: &str) -> Result<(), NarrationError> {
        if self.active == Some(handle) {
            Ok(())
        } else {
            Err(NarrationError::playback(format!(
                "cannot {op}: audio handle {} is not loaded",
                handle.0
            )))
        }
    }
}

impl<E: AudioEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        self.unload();
    }
}
