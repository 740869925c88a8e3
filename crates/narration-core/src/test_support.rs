//! Fakes shared by the unit tests.

use crate::alignment::{NarrationPayload, build_alignment};
use crate::cancellation::CancellationToken;
use crate::error::NarrationError;
use crate::fetcher::{FetchedNarration, NarrationFetcher, NarrationInput};
use crate::playback::{AudioEngine, AudioHandle, LoadOptions, PlaybackStatus};
use crate::storage::AudioStore;
use crate::tokenizer::{normalize, tokenize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(PathBuf),
    Play(AudioHandle),
    Pause(AudioHandle),
    SetRate(AudioHandle, f32),
    Unload(AudioHandle),
}

#[derive(Debug, Default)]
pub struct EngineLog {
    pub calls: Vec<EngineCall>,
    pub fail_load: bool,
    pub fail_play: bool,
    pub fail_unload: bool,
    pub position_ms: f64,
    pub finished: bool,
    pub playing: bool,
    pub last_rate: Option<f32>,
    next_id: u64,
}

impl EngineLog {
    pub fn unloads_of(&self, handle: AudioHandle) -> usize {
        self.calls
            .iter()
            .filter(|call| **call == EngineCall::Unload(handle))
            .count()
    }

    pub fn load_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Load(_)))
            .count()
    }

    pub fn unload_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Unload(_)))
            .count()
    }
}

/// Records every call; behaviour is steered through the shared log.
#[derive(Default)]
pub struct FakeEngine {
    log: Rc<RefCell<EngineLog>>,
}

impl FakeEngine {
    pub fn log(&self) -> Rc<RefCell<EngineLog>> {
        Rc::clone(&self.log)
    }
}

impl AudioEngine for FakeEngine {
    fn load(&mut self, uri: &Path, options: LoadOptions) -> Result<AudioHandle, NarrationError> {
        let mut log = self.log.borrow_mut();
        log.calls.push(EngineCall::Load(uri.to_path_buf()));
        if log.fail_load {
            return Err(NarrationError::playback("decoder rejected file"));
        }
        log.next_id += 1;
        log.playing = options.should_play;
        log.finished = false;
        log.position_ms = 0.0;
        log.last_rate = Some(options.rate);
        Ok(AudioHandle(log.next_id))
    }

    fn play(&mut self, handle: AudioHandle) -> Result<(), NarrationError> {
        let mut log = self.log.borrow_mut();
        log.calls.push(EngineCall::Play(handle));
        if log.fail_play {
            return Err(NarrationError::playback("output device lost"));
        }
        log.playing = true;
        Ok(())
    }

    fn pause(&mut self, handle: AudioHandle) -> Result<(), NarrationError> {
        let mut log = self.log.borrow_mut();
        log.calls.push(EngineCall::Pause(handle));
        log.playing = false;
        Ok(())
    }

    fn set_rate(&mut self, handle: AudioHandle, rate: f32) -> Result<(), NarrationError> {
        let mut log = self.log.borrow_mut();
        log.calls.push(EngineCall::SetRate(handle, rate));
        log.last_rate = Some(rate);
        Ok(())
    }

    fn unload(&mut self, handle: AudioHandle) -> Result<(), NarrationError> {
        let mut log = self.log.borrow_mut();
        log.calls.push(EngineCall::Unload(handle));
        log.playing = false;
        if log.fail_unload {
            return Err(NarrationError::playback("engine already released"));
        }
        Ok(())
    }

    fn status(&mut self, _handle: AudioHandle) -> Result<PlaybackStatus, NarrationError> {
        let log = self.log.borrow();
        Ok(PlaybackStatus {
            position_ms: log.position_ms,
            is_playing: log.playing,
            did_finish: log.finished,
        })
    }
}

/// Narration where char `i` spans `[i * 100ms, (i + 1) * 100ms]`.
pub fn fake_narration(text: &str) -> FetchedNarration {
    let normalized = normalize(text);
    let count = normalized.chars().count();
    let payload = NarrationPayload {
        characters: normalized.chars().map(|c| c.to_string()).collect(),
        character_start_times_sec: (0..count).map(|i| i as f64 * 0.1).collect(),
        character_end_times_sec: (0..count).map(|i| (i + 1) as f64 * 0.1).collect(),
    };
    let tokens = tokenize(&normalized);
    let build = build_alignment(&tokens, &payload);
    FetchedNarration {
        tokens,
        alignment: build.entries,
        skipped: build.skipped,
        audio_uri: PathBuf::from(format!(
            "/tmp/fake-narration-{}.mp3",
            normalized.replace(char::is_whitespace, "_")
        )),
    }
}

/// Answers immediately: fails for texts registered with `fail`, otherwise
/// returns `fake_narration`.
#[derive(Default)]
pub struct ScriptedFetcher {
    failures: Mutex<HashMap<String, NarrationError>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn fail(&self, text: &str, err: NarrationError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(text.to_string(), err);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NarrationFetcher for ScriptedFetcher {
    fn fetch(
        &self,
        input: &NarrationInput,
        _cancel: &CancellationToken,
    ) -> Result<FetchedNarration, NarrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failures
            .lock()
            .ok()
            .and_then(|failures| failures.get(&input.text).cloned());
        match failure {
            Some(err) => Err(err),
            None => Ok(fake_narration(&input.text)),
        }
    }
}

/// Blocks each fetch until the test opens the gate registered for its text.
/// The cancellation token is deliberately ignored so stale completions still
/// reach the session.
#[derive(Default)]
pub struct GatedFetcher {
    gates: Mutex<HashMap<String, mpsc::Receiver<()>>>,
}

impl GatedFetcher {
    pub fn gate(&self, text: &str) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut gates) = self.gates.lock() {
            gates.insert(text.to_string(), rx);
        }
        tx
    }
}

impl NarrationFetcher for GatedFetcher {
    fn fetch(
        &self,
        input: &NarrationInput,
        _cancel: &CancellationToken,
    ) -> Result<FetchedNarration, NarrationError> {
        let gate = self
            .gates
            .lock()
            .ok()
            .and_then(|mut gates| gates.remove(&input.text));
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        Ok(fake_narration(&input.text))
    }
}

/// Accepts writes but never reports the file as present.
pub struct MissingFileStore;

impl AudioStore for MissingFileStore {
    fn write_base64(&self, _path: &Path, _data: &str) -> Result<(), NarrationError> {
        Ok(())
    }

    fn exists(&self, _path: &Path) -> Result<bool, NarrationError> {
        Ok(false)
    }
}
