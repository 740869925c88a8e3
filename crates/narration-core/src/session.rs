//! Narration session: ties fetch, alignment, playback and highlighting
//! together for one (text, page, language) input at a time.
//!
//! The session is driven from a single thread. Fetches run on worker
//! threads and report back through the session's inbound channel, tagged
//! with the generation that started them; playback ticks arrive through the
//! same channel, so every state change is applied in delivery order.

use crate::alignment::AlignmentEntry;
use crate::cancellation::CancellationToken;
use crate::error::NarrationError;
use crate::fetcher::{FetchedNarration, NarrationFetcher, NarrationInput};
use crate::highlight;
use crate::playback::{AudioEngine, PlaybackController, PlaybackRate, PlaybackTick};
use crate::tokenizer::{Token, tokenize};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Finished,
    Error,
}

#[derive(Debug)]
pub enum SessionEvent {
    FetchCompleted {
        generation: u64,
        result: Result<FetchedNarration, NarrationError>,
    },
    Tick(PlaybackTick),
}

/// Changes reported to the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    State(SessionState),
    Highlight(Option<usize>),
    Rate(f32),
    Error(String),
    Finished,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct NarrationSnapshot {
    pub state: SessionState,
    pub story_id: Option<String>,
    pub page_number: Option<u32>,
    pub language: Option<String>,
    pub tokens: Vec<Token>,
    pub highlighted_token: Option<usize>,
    pub rate: f32,
    pub error: Option<String>,
}

pub struct NarrationSession<E: AudioEngine> {
    fetcher: Arc<dyn NarrationFetcher>,
    playback: PlaybackController<E>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    input: Option<NarrationInput>,
    tokens: Vec<Token>,
    alignment: Vec<AlignmentEntry>,
    audio_uri: Option<PathBuf>,
    rate: PlaybackRate,
    highlighted: Option<usize>,
    state: SessionState,
    generation: u64,
    cancel: Option<CancellationToken>,
    last_error: Option<String>,
}

impl<E: AudioEngine> NarrationSession<E> {
    pub fn new(fetcher: Arc<dyn NarrationFetcher>, engine: E, rate: PlaybackRate) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let mut playback = PlaybackController::new(engine);
        let tick_tx = events_tx.clone();
        playback.subscribe(move |tick| {
            let _ = tick_tx.send(SessionEvent::Tick(tick));
        });
        Self {
            fetcher,
            playback,
            events_tx,
            events_rx,
            input: None,
            tokens: Vec::new(),
            alignment: Vec::new(),
            audio_uri: None,
            rate,
            highlighted: None,
            state: SessionState::Idle,
            generation: 0,
            cancel: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn rate(&self) -> PlaybackRate {
        self.rate
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn alignment(&self) -> &[AlignmentEntry] {
        &self.alignment
    }

    pub fn input(&self) -> Option<&NarrationInput> {
        self.input.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn engine(&self) -> &E {
        self.playback.engine()
    }

    /// Sender for feeding events from outside, e.g. a host audio callback
    /// that reports ticks itself. Events are applied by `poll` or `wait`.
    pub fn events(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Start narrating `input`. Any in-flight fetch is abandoned and the
    /// current sound is unloaded before the new fetch begins.
    pub fn set_input(&mut self, input: NarrationInput) -> Vec<SessionUpdate> {
        if self.input.as_ref() == Some(&input)
            && matches!(
                self.state,
                SessionState::Loading
                    | SessionState::Ready
                    | SessionState::Playing
                    | SessionState::Paused
            )
        {
            debug!(
                story_id = %input.story_id,
                page = input.page_number,
                state = ?self.state,
                "Skipping duplicate narration input"
            );
            return Vec::new();
        }

        let mut updates = Vec::new();
        self.abandon_in_flight();
        self.playback.unload();
        self.set_highlight(None, &mut updates);
        self.alignment.clear();
        self.audio_uri = None;
        self.last_error = None;
        self.tokens = tokenize(&input.text);
        self.input = Some(input.clone());
        self.set_state(SessionState::Loading, &mut updates);

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        let generation = self.generation;
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.events_tx.clone();
        info!(
            story_id = %input.story_id,
            page = input.page_number,
            language = %input.language,
            generation,
            tokens = self.tokens.len(),
            "Scheduling narration fetch"
        );
        let spawned = thread::Builder::new()
            .name(format!("narration-fetch-{generation}"))
            .spawn(move || {
                let result = fetcher.fetch(&input, &cancel);
                let _ = tx.send(SessionEvent::FetchCompleted { generation, result });
            });
        if let Err(err) = spawned {
            self.fail(
                NarrationError::network(format!("starting fetch worker: {err}")),
                &mut updates,
            );
        }
        updates
    }

    pub fn play(&mut self) -> Vec<SessionUpdate> {
        match self.state {
            SessionState::Ready | SessionState::Paused | SessionState::Finished => {}
            SessionState::Playing => return Vec::new(),
            state => {
                debug!(?state, "Ignoring play request; narration not ready");
                return Vec::new();
            }
        }

        let mut updates = Vec::new();
        let result = match (self.playback.active(), self.audio_uri.clone()) {
            (Some(handle), _) => self.playback.play(handle),
            (None, Some(uri)) => self.playback.load(&uri, self.rate, true).map(|_| ()),
            (None, None) => Err(NarrationError::playback("no narration audio available")),
        };
        match result {
            Ok(()) => self.set_state(SessionState::Playing, &mut updates),
            Err(err) => self.fail(err, &mut updates),
        }
        updates
    }

    pub fn pause(&mut self) -> Vec<SessionUpdate> {
        if self.state != SessionState::Playing {
            debug!(state = ?self.state, "Ignoring pause request");
            return Vec::new();
        }
        let Some(handle) = self.playback.active() else {
            return Vec::new();
        };

        let mut updates = Vec::new();
        match self.playback.pause(handle) {
            Ok(()) => self.set_state(SessionState::Paused, &mut updates),
            Err(err) => self.fail(err, &mut updates),
        }
        updates
    }

    pub fn toggle_play_pause(&mut self) -> Vec<SessionUpdate> {
        if self.state == SessionState::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn faster(&mut self) -> Vec<SessionUpdate> {
        self.set_rate(self.rate.faster())
    }

    pub fn slower(&mut self) -> Vec<SessionUpdate> {
        self.set_rate(self.rate.slower())
    }

    /// Accepted while `Ready`, `Playing` or `Paused`; never changes state.
    pub fn set_rate(&mut self, rate: PlaybackRate) -> Vec<SessionUpdate> {
        if !matches!(
            self.state,
            SessionState::Ready | SessionState::Playing | SessionState::Paused
        ) {
            debug!(state = ?self.state, "Ignoring rate change");
            return Vec::new();
        }
        if rate == self.rate {
            return Vec::new();
        }

        let mut updates = Vec::new();
        self.rate = rate;
        info!(rate = rate.value(), "Adjusted narration rate");
        updates.push(SessionUpdate::Rate(rate.value()));
        if let Some(handle) = self.playback.active() {
            if let Err(err) = self.playback.set_rate(handle, rate) {
                self.fail(err, &mut updates);
            }
        }
        updates
    }

    /// Read the engine position once, then apply every queued event.
    pub fn poll(&mut self) -> Vec<SessionUpdate> {
        self.playback.poll();
        self.drain()
    }

    /// Block up to `timeout` for the next event, then apply it and anything
    /// queued behind it.
    pub fn wait(&mut self, timeout: Duration) -> Vec<SessionUpdate> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                let mut updates = self.handle_event(event);
                updates.extend(self.drain());
                updates
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<SessionUpdate> {
        match event {
            SessionEvent::FetchCompleted { generation, result } => {
                self.on_fetch_completed(generation, result)
            }
            SessionEvent::Tick(tick) => self.on_tick(tick),
        }
    }

    /// Cancel outstanding work, release the sound and return to `Idle`.
    /// Runs on drop; safe to call more than once.
    pub fn teardown(&mut self) {
        self.abandon_in_flight();
        self.playback.unload();
        self.input = None;
        self.tokens.clear();
        self.alignment.clear();
        self.audio_uri = None;
        self.highlighted = None;
        self.last_error = None;
        if self.state != SessionState::Idle {
            info!(state = ?self.state, "Tearing down narration session");
            self.state = SessionState::Idle;
        }
    }

    pub fn snapshot(&self) -> NarrationSnapshot {
        NarrationSnapshot {
            state: self.state,
            story_id: self.input.as_ref().map(|input| input.story_id.clone()),
            page_number: self.input.as_ref().map(|input| input.page_number),
            language: self.input.as_ref().map(|input| input.language.clone()),
            tokens: self.tokens.clone(),
            highlighted_token: self.highlighted,
            rate: self.rate.value(),
            error: self.last_error.clone(),
        }
    }

    fn drain(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            updates.extend(self.handle_event(event));
        }
        updates
    }

    fn on_fetch_completed(
        &mut self,
        generation: u64,
        result: Result<FetchedNarration, NarrationError>,
    ) -> Vec<SessionUpdate> {
        if generation != self.generation || self.state != SessionState::Loading {
            debug!(
                generation,
                current = self.generation,
                state = ?self.state,
                "Ignoring stale narration fetch"
            );
            return Vec::new();
        }
        self.cancel = None;

        let mut updates = Vec::new();
        match result {
            Ok(fetched) => {
                if !fetched.skipped.is_empty() {
                    warn!(
                        skipped = fetched.skipped.len(),
                        "Some words have no timing and will not highlight"
                    );
                }
                info!(
                    generation,
                    words = fetched.alignment.len(),
                    path = %fetched.audio_uri.display(),
                    "Narration ready"
                );
                self.tokens = fetched.tokens;
                self.alignment = fetched.alignment;
                self.audio_uri = Some(fetched.audio_uri);
                self.set_state(SessionState::Ready, &mut updates);
            }
            Err(err) if err.is_cancelled() => {
                debug!(generation, "Narration fetch reported cancellation");
            }
            Err(err) => self.fail(err, &mut updates),
        }
        updates
    }

    fn on_tick(&mut self, tick: PlaybackTick) -> Vec<SessionUpdate> {
        if self.playback.active() != Some(tick.handle)
            || !matches!(self.state, SessionState::Playing | SessionState::Paused)
        {
            debug!(handle = tick.handle.0, state = ?self.state, "Ignoring stale playback tick");
            return Vec::new();
        }

        let mut updates = Vec::new();
        if tick.did_finish {
            if self.state != SessionState::Playing {
                debug!(state = ?self.state, "Ignoring finish tick outside playback");
                return updates;
            }
            info!(position_ms = tick.position_ms, "Narration finished");
            self.playback.unload();
            self.set_highlight(None, &mut updates);
            self.set_state(SessionState::Finished, &mut updates);
            updates.push(SessionUpdate::Finished);
            return updates;
        }

        let live = highlight::resolve(&self.alignment, tick.position_ms);
        self.set_highlight(live, &mut updates);
        updates
    }

    fn abandon_in_flight(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            debug!(generation = self.generation, "Cancelling in-flight narration fetch");
            cancel.cancel();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    fn fail(&mut self, err: NarrationError, updates: &mut Vec<SessionUpdate>) {
        warn!(state = ?self.state, "Narration failed: {err}");
        self.playback.unload();
        self.set_highlight(None, updates);
        let message = err.user_message();
        self.last_error = Some(message.clone());
        self.set_state(SessionState::Error, updates);
        updates.push(SessionUpdate::Error(message));
    }

    fn set_state(&mut self, state: SessionState, updates: &mut Vec<SessionUpdate>) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Narration state change");
            self.state = state;
            updates.push(SessionUpdate::State(state));
        }
    }

    fn set_highlight(&mut self, highlighted: Option<usize>, updates: &mut Vec<SessionUpdate>) {
        if self.highlighted != highlighted {
            self.highlighted = highlighted;
            updates.push(SessionUpdate::Highlight(highlighted));
        }
    }
}

impl<E: AudioEngine> Drop for NarrationSession<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::AudioHandle;
    use crate::test_support::{EngineCall, EngineLog, FakeEngine, GatedFetcher, ScriptedFetcher};
    use std::cell::RefCell;
    use std::rc::Rc;

    const WAIT: Duration = Duration::from_secs(5);

    fn input(text: &str) -> NarrationInput {
        NarrationInput::new(text, "lion-and-mouse", 1, "English")
    }

    fn session_with(
        fetcher: Arc<dyn NarrationFetcher>,
    ) -> (NarrationSession<FakeEngine>, Rc<RefCell<EngineLog>>) {
        let engine = FakeEngine::default();
        let log = engine.log();
        (
            NarrationSession::new(fetcher, engine, PlaybackRate::default()),
            log,
        )
    }

    fn ready_session(text: &str) -> (NarrationSession<FakeEngine>, Rc<RefCell<EngineLog>>) {
        let (mut session, log) = session_with(Arc::new(ScriptedFetcher::default()));
        session.set_input(input(text));
        let updates = session.wait(WAIT);
        assert!(updates.contains(&SessionUpdate::State(SessionState::Ready)));
        (session, log)
    }

    fn playing_session(text: &str) -> (NarrationSession<FakeEngine>, Rc<RefCell<EngineLog>>) {
        let (mut session, log) = ready_session(text);
        assert_eq!(
            session.play(),
            vec![SessionUpdate::State(SessionState::Playing)]
        );
        (session, log)
    }

    fn tick_at(
        session: &mut NarrationSession<FakeEngine>,
        log: &Rc<RefCell<EngineLog>>,
        ms: f64,
    ) -> Vec<SessionUpdate> {
        log.borrow_mut().position_ms = ms;
        session.poll()
    }

    #[test]
    fn input_moves_through_loading_to_ready() {
        let (mut session, _log) = session_with(Arc::new(ScriptedFetcher::default()));
        let updates = session.set_input(input("Hi cat"));
        assert_eq!(updates, vec![SessionUpdate::State(SessionState::Loading)]);
        assert_eq!(session.tokens().len(), 3);

        let updates = session.wait(WAIT);
        assert_eq!(updates, vec![SessionUpdate::State(SessionState::Ready)]);
        assert_eq!(session.alignment().len(), 2);
        assert_eq!(session.highlighted(), None);
    }

    #[test]
    fn ticks_drive_the_highlight_while_playing() {
        let (mut session, log) = playing_session("Hi cat");
        assert_eq!(log.borrow().load_count(), 1);
        assert_eq!(log.borrow().last_rate, Some(1.0));

        // "Hi" spans 0-200ms, "cat" 300-600ms.
        assert_eq!(
            tick_at(&mut session, &log, 100.0),
            vec![SessionUpdate::Highlight(Some(0))]
        );
        assert!(tick_at(&mut session, &log, 150.0).is_empty());
        assert_eq!(
            tick_at(&mut session, &log, 450.0),
            vec![SessionUpdate::Highlight(Some(2))]
        );
        assert_eq!(
            tick_at(&mut session, &log, 1000.0),
            vec![SessionUpdate::Highlight(None)]
        );
    }

    #[test]
    fn pause_and_resume_reuse_the_loaded_sound() {
        let (mut session, log) = playing_session("Hi cat");
        assert_eq!(
            session.pause(),
            vec![SessionUpdate::State(SessionState::Paused)]
        );
        assert_eq!(
            session.play(),
            vec![SessionUpdate::State(SessionState::Playing)]
        );

        let log = log.borrow();
        assert_eq!(log.load_count(), 1);
        assert!(log.calls.iter().any(|c| matches!(c, EngineCall::Pause(_))));
        assert!(log.calls.iter().any(|c| matches!(c, EngineCall::Play(_))));
    }

    #[test]
    fn toggle_alternates_between_play_and_pause() {
        let (mut session, _log) = ready_session("Hi cat");
        session.toggle_play_pause();
        assert_eq!(session.state(), SessionState::Playing);
        session.toggle_play_pause();
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[test]
    fn finishing_unloads_and_clears_the_highlight() {
        let (mut session, log) = playing_session("Hi cat");
        tick_at(&mut session, &log, 450.0);
        assert_eq!(session.highlighted(), Some(2));

        log.borrow_mut().finished = true;
        let updates = session.poll();
        assert_eq!(
            updates,
            vec![
                SessionUpdate::Highlight(None),
                SessionUpdate::State(SessionState::Finished),
                SessionUpdate::Finished,
            ]
        );
        assert_eq!(log.borrow().unload_count(), 1);

        // Replaying loads the page audio again.
        session.play();
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(log.borrow().load_count(), 2);
    }

    #[test]
    fn finish_tick_while_paused_keeps_the_session_paused() {
        let (mut session, log) = playing_session("Hi cat");
        session.pause();
        let handle = session.playback.active().expect("loaded");

        let tick = PlaybackTick {
            handle,
            position_ms: 600.0,
            is_playing: false,
            did_finish: true,
        };
        assert!(session.handle_event(SessionEvent::Tick(tick)).is_empty());
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(log.borrow().unload_count(), 0);
        assert_eq!(
            session.play(),
            vec![SessionUpdate::State(SessionState::Playing)]
        );
    }

    #[test]
    fn externally_sent_ticks_are_applied_in_order() {
        let (mut session, log) = playing_session("Hi cat");
        let handle = session.playback.active().expect("loaded");
        tick_at(&mut session, &log, 100.0);
        assert_eq!(session.highlighted(), Some(0));

        let sender = session.events();
        sender
            .send(SessionEvent::Tick(PlaybackTick {
                handle,
                position_ms: 450.0,
                is_playing: true,
                did_finish: false,
            }))
            .expect("session is listening");
        assert_eq!(session.wait(WAIT), vec![SessionUpdate::Highlight(Some(2))]);
        assert_eq!(session.highlighted(), Some(2));
    }

    #[test]
    fn rate_changes_clamp_and_apply_in_place() {
        let (mut session, log) = ready_session("Hi cat");
        for _ in 0..6 {
            session.faster();
        }
        assert_eq!(session.rate().value(), 2.0);
        for _ in 0..6 {
            session.slower();
        }
        assert_eq!(session.rate().value(), 0.5);
        assert_eq!(session.state(), SessionState::Ready);

        session.play();
        assert_eq!(log.borrow().last_rate, Some(0.5));
        assert_eq!(session.faster(), vec![SessionUpdate::Rate(0.75)]);
        assert_eq!(session.state(), SessionState::Playing);
        let handle = session.playback.active().expect("loaded");
        assert!(log.borrow().calls.contains(&EngineCall::SetRate(handle, 0.75)));
    }

    #[test]
    fn requests_outside_their_states_are_ignored() {
        let gated = Arc::new(GatedFetcher::default());
        let gate = gated.gate("Hi cat");
        let (mut session, log) = session_with(gated);
        session.set_input(input("Hi cat"));

        assert!(session.play().is_empty());
        assert!(session.pause().is_empty());
        assert!(session.faster().is_empty());
        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(session.rate().value(), 1.0);
        assert_eq!(log.borrow().load_count(), 0);

        let _ = gate.send(());
        session.wait(WAIT);
        assert!(session.pause().is_empty());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn fetch_failure_surfaces_an_error() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.fail("Hi cat", NarrationError::network("status 500: boom"));
        let (mut session, log) = session_with(fetcher);
        session.set_input(input("Hi cat"));

        let updates = session.wait(WAIT);
        assert!(updates.contains(&SessionUpdate::State(SessionState::Error)));
        assert!(updates.iter().any(|u| matches!(u, SessionUpdate::Error(msg) if msg.contains("boom"))));
        assert!(session.last_error().is_some());
        assert!(session.play().is_empty());
        assert_eq!(log.borrow().load_count(), 0);
    }

    #[test]
    fn playback_failure_moves_to_error_and_releases_the_sound() {
        let (mut session, log) = playing_session("Hi cat");
        session.pause();
        log.borrow_mut().fail_play = true;

        let updates = session.play();
        assert!(updates.contains(&SessionUpdate::State(SessionState::Error)));
        assert_eq!(log.borrow().unload_count(), 1);
        assert!(session.snapshot().error.is_some());
    }

    #[test]
    fn stale_fetch_results_are_discarded() {
        let gated = Arc::new(GatedFetcher::default());
        let first_gate = gated.gate("Once upon a time");
        let second_gate = gated.gate("Hi cat");
        let (mut session, _log) = session_with(gated);

        session.set_input(input("Once upon a time"));
        session.set_input(input("Hi cat"));

        let _ = second_gate.send(());
        let updates = session.wait(WAIT);
        assert_eq!(updates, vec![SessionUpdate::State(SessionState::Ready)]);

        let _ = first_gate.send(());
        let updates = session.wait(WAIT);
        assert!(updates.is_empty());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.alignment().len(), 2);
        assert_eq!(session.tokens()[2].text, "cat");
    }

    #[test]
    fn changing_input_unloads_the_old_sound_exactly_once() {
        let (mut session, log) = playing_session("Once upon a time");
        let first = session.playback.active().expect("first sound");
        tick_at(&mut session, &log, 50.0);
        assert_eq!(session.highlighted(), Some(0));

        let updates = session.set_input(input("Hi cat"));
        assert_eq!(
            updates,
            vec![
                SessionUpdate::Highlight(None),
                SessionUpdate::State(SessionState::Loading),
            ]
        );
        assert_eq!(log.borrow().unloads_of(first), 1);

        session.wait(WAIT);
        session.play();
        session.teardown();
        drop(session);

        let log = log.borrow();
        assert_eq!(log.unloads_of(first), 1);
        assert_eq!(log.unload_count(), 2);
    }

    #[test]
    fn ticks_from_replaced_sounds_are_ignored() {
        let (mut session, _log) = playing_session("Hi cat");
        let stale = PlaybackTick {
            handle: AudioHandle(999),
            position_ms: 100.0,
            is_playing: true,
            did_finish: true,
        };
        assert!(session.handle_event(SessionEvent::Tick(stale)).is_empty());
        assert_eq!(session.state(), SessionState::Playing);
    }

    #[test]
    fn teardown_discards_in_flight_fetches() {
        let gated = Arc::new(GatedFetcher::default());
        let gate = gated.gate("Hi cat");
        let (mut session, log) = session_with(gated);
        session.set_input(input("Hi cat"));

        session.teardown();
        assert_eq!(session.state(), SessionState::Idle);

        let _ = gate.send(());
        assert!(session.wait(WAIT).is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.tokens().is_empty());
        assert_eq!(log.borrow().load_count(), 0);
    }

    #[test]
    fn duplicate_input_is_not_refetched() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let (mut session, _log) = session_with(Arc::clone(&fetcher) as Arc<dyn NarrationFetcher>);
        session.set_input(input("Hi cat"));
        assert!(session.set_input(input("Hi cat")).is_empty());
        session.wait(WAIT);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn unload_failures_do_not_block_replacement() {
        let (mut session, log) = playing_session("Hi cat");
        log.borrow_mut().fail_unload = true;

        let updates = session.set_input(input("Once upon a time"));
        assert!(updates.contains(&SessionUpdate::State(SessionState::Loading)));
        session.wait(WAIT);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn snapshot_reflects_the_current_page() {
        let (mut session, log) = playing_session("Hi cat");
        tick_at(&mut session, &log, 100.0);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Playing);
        assert_eq!(snapshot.story_id.as_deref(), Some("lion-and-mouse"));
        assert_eq!(snapshot.page_number, Some(1));
        assert_eq!(snapshot.highlighted_token, Some(0));
        assert_eq!(snapshot.tokens.len(), 3);
        assert_eq!(snapshot.rate, 1.0);

        let json = serde_json::to_value(&snapshot).expect("snapshot serializes");
        assert_eq!(json["state"], "playing");
    }
}
