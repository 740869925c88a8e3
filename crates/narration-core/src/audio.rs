//! `rodio`-backed audio engine.
//!
//! Each loaded file gets its own `Sink`. The output stream is opened on
//! first load and kept for the engine's lifetime. Rodio does not report a
//! playback position here, so it is tracked as rate-scaled wall time between
//! play/pause/rate changes.

use crate::error::NarrationError;
use crate::playback::{AudioEngine, AudioHandle, LoadOptions, PlaybackStatus};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

struct LoadedSound {
    sink: Sink,
    rate: f32,
    /// Media position accumulated up to `started_at`.
    elapsed_ms: f64,
    started_at: Option<Instant>,
}

impl LoadedSound {
    fn position_ms(&self) -> f64 {
        let running = self
            .started_at
            .map(|started| started.elapsed().as_secs_f64() * 1000.0 * self.rate as f64)
            .unwrap_or(0.0);
        self.elapsed_ms + running
    }

    fn fold_running_time(&mut self) {
        self.elapsed_ms = self.position_ms();
        self.started_at = self.started_at.map(|_| Instant::now());
    }
}

#[derive(Default)]
pub struct RodioEngine {
    output: Option<(OutputStream, OutputStreamHandle)>,
    sounds: HashMap<AudioHandle, LoadedSound>,
    next_id: u64,
}

impl RodioEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn output_handle(&mut self) -> Result<&OutputStreamHandle, NarrationError> {
        if self.output.is_none() {
            let output = OutputStream::try_default()
                .map_err(|err| NarrationError::playback(format!("opening audio output: {err}")))?;
            info!("Opened audio output stream");
            self.output = Some(output);
        }
        match &self.output {
            Some((_, handle)) => Ok(handle),
            None => Err(NarrationError::playback("audio output unavailable")),
        }
    }

    fn sound(&mut self, handle: AudioHandle) -> Result<&mut LoadedSound, NarrationError> {
        self.sounds
            .get_mut(&handle)
            .ok_or_else(|| NarrationError::playback(format!("unknown audio handle {}", handle.0)))
    }
}

impl AudioEngine for RodioEngine {
    fn load(&mut self, uri: &Path, options: LoadOptions) -> Result<AudioHandle, NarrationError> {
        let file = File::open(uri).map_err(|err| {
            NarrationError::playback(format!("opening {}: {err}", uri.display()))
        })?;
        let source = Decoder::new(BufReader::new(file)).map_err(|err| {
            NarrationError::playback(format!("decoding {}: {err}", uri.display()))
        })?;
        let sink = Sink::try_new(self.output_handle()?)
            .map_err(|err| NarrationError::playback(format!("creating sink: {err}")))?;

        sink.pause();
        sink.set_speed(options.rate);
        sink.append(source);
        let started_at = if options.should_play {
            sink.play();
            Some(Instant::now())
        } else {
            None
        };

        self.next_id += 1;
        let handle = AudioHandle(self.next_id);
        self.sounds.insert(
            handle,
            LoadedSound {
                sink,
                rate: options.rate,
                elapsed_ms: 0.0,
                started_at,
            },
        );
        debug!(handle = handle.0, path = %uri.display(), "Decoded narration audio");
        Ok(handle)
    }

    fn play(&mut self, handle: AudioHandle) -> Result<(), NarrationError> {
        let sound = self.sound(handle)?;
        if sound.started_at.is_none() {
            sound.started_at = Some(Instant::now());
        }
        sound.sink.play();
        Ok(())
    }

    fn pause(&mut self, handle: AudioHandle) -> Result<(), NarrationError> {
        let sound = self.sound(handle)?;
        sound.sink.pause();
        sound.fold_running_time();
        sound.started_at = None;
        Ok(())
    }

    fn set_rate(&mut self, handle: AudioHandle, rate: f32) -> Result<(), NarrationError> {
        let sound = self.sound(handle)?;
        sound.fold_running_time();
        sound.rate = rate;
        sound.sink.set_speed(rate);
        Ok(())
    }

    fn unload(&mut self, handle: AudioHandle) -> Result<(), NarrationError> {
        let sound = self
            .sounds
            .remove(&handle)
            .ok_or_else(|| NarrationError::playback(format!("unknown audio handle {}", handle.0)))?;
        sound.sink.stop();
        Ok(())
    }

    fn status(&mut self, handle: AudioHandle) -> Result<PlaybackStatus, NarrationError> {
        let sound = self.sound(handle)?;
        let did_finish = sound.sink.empty();
        Ok(PlaybackStatus {
            position_ms: sound.position_ms(),
            is_playing: sound.started_at.is_some() && !did_finish,
            did_finish,
        })
    }
}
