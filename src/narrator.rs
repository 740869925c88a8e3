//! Terminal consumer: drives one narration session through a story and
//! prints the live word as the highlight moves.

use crate::story::Story;
use narration_core::fetcher::NarrationInput;
use narration_core::playback::AudioEngine;
use narration_core::session::{NarrationSession, SessionState, SessionUpdate};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePlay,
    Faster,
    Slower,
    NextPage,
    PrevPage,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "p" | "play" | "pause" => Some(Self::TogglePlay),
            "+" | "faster" => Some(Self::Faster),
            "-" | "slower" => Some(Self::Slower),
            "n" | "next" => Some(Self::NextPage),
            "b" | "back" => Some(Self::PrevPage),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

pub struct Narrator<E: AudioEngine> {
    session: NarrationSession<E>,
    story: Story,
    language: String,
    page: usize,
    auto_advance: bool,
    /// Start playback as soon as the current page is ready.
    play_when_ready: bool,
    done: bool,
}

impl<E: AudioEngine> Narrator<E> {
    pub fn new(
        session: NarrationSession<E>,
        story: Story,
        language: String,
        page: usize,
        auto_advance: bool,
    ) -> Self {
        let page = page.min(story.len().saturating_sub(1));
        Self {
            session,
            story,
            language,
            page,
            auto_advance,
            play_when_ready: true,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Show and start narrating `page`, clamped to the last page.
    pub fn open_page(&mut self, page: usize) {
        let page = page.min(self.story.len().saturating_sub(1));
        self.page = page;
        let Some(text) = self.story.pages.get(page).cloned() else {
            warn!(page = page + 1, "Story has no such page");
            return;
        };
        println!("-- page {} of {} --", page + 1, self.story.len());
        println!("{text}");
        let input = NarrationInput::new(text, self.story.id.clone(), page as u32 + 1, &self.language);
        let updates = self.session.set_input(input);
        self.apply(updates);
    }

    pub fn handle_command(&mut self, command: Command) {
        debug!(?command, "Received command");
        let updates = match command {
            Command::TogglePlay => {
                self.play_when_ready = self.session.state() != SessionState::Playing;
                self.session.toggle_play_pause()
            }
            Command::Faster => self.session.faster(),
            Command::Slower => self.session.slower(),
            Command::NextPage => {
                self.open_page(self.story.next_page(self.page));
                Vec::new()
            }
            Command::PrevPage => {
                self.open_page(self.story.prev_page(self.page));
                Vec::new()
            }
            Command::Quit => {
                self.done = true;
                Vec::new()
            }
        };
        self.apply(updates);
    }

    /// Advance the session: read the playback position and apply queued
    /// events, waiting up to `interval` for a fetch to land.
    pub fn step(&mut self, interval: std::time::Duration) {
        let mut updates = self.session.poll();
        updates.extend(self.session.wait(interval));
        self.apply(updates);
    }

    pub fn shutdown(&mut self) {
        self.session.teardown();
        info!(page = self.page + 1, "Narration stopped");
    }

    fn apply(&mut self, updates: Vec<SessionUpdate>) {
        for update in updates {
            match update {
                SessionUpdate::State(SessionState::Ready) if self.play_when_ready => {
                    let follow_up = self.session.play();
                    self.apply(follow_up);
                }
                SessionUpdate::State(state) => debug!(?state, "Narration state"),
                SessionUpdate::Highlight(Some(index)) => {
                    if let Some(token) = self.session.tokens().get(index) {
                        println!("  > {}", token.text);
                    }
                }
                SessionUpdate::Highlight(None) => {}
                SessionUpdate::Rate(rate) => println!("  (speed {rate:.2}x)"),
                SessionUpdate::Error(message) => {
                    warn!(page = self.page + 1, "{message}");
                    println!("  ! {message}");
                }
                SessionUpdate::Finished => self.on_page_finished(),
            }
        }
    }

    fn on_page_finished(&mut self) {
        if self.story.is_last_page(self.page) {
            println!("-- the end --");
            self.done = true;
        } else if self.auto_advance {
            self.open_page(self.page + 1);
        }
    }
}
