//! Entry point for the terminal story narrator.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load configuration from `conf/config.toml`.
//! - Wire the HTTP fetcher and the rodio engine into a narration session.
//! - Pump the session until the story ends, `q` is entered, or Ctrl+C.

mod narrator;
mod story;

use crate::narrator::{Command, Narrator};
use crate::story::Story;
use anyhow::{Context, Result, anyhow};
use narration_core::audio::RodioEngine;
use narration_core::config::load_config;
use narration_core::fetcher::HttpNarrationFetcher;
use narration_core::session::NarrationSession;
use std::env;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

struct Args {
    story_path: PathBuf,
    story_id: Option<String>,
    language: Option<String>,
    page: usize,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args()?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());

    let story = Story::load(&args.story_path, args.story_id)?;
    let language = args
        .language
        .unwrap_or_else(|| config.default_language.clone());
    info!(
        story_id = %story.id,
        pages = story.len(),
        language = %language,
        url = %config.narration_url(),
        rate = config.initial_rate().value(),
        "Starting narrator"
    );

    let fetcher = HttpNarrationFetcher::new(&config).context("Building narration client")?;
    let session = NarrationSession::new(Arc::new(fetcher), RodioEngine::new(), config.initial_rate());
    let mut narrator = Narrator::new(session, story, language, args.page, config.auto_advance);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(err) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C; stopping narration");
        flag.store(true, Ordering::Release);
    }) {
        warn!("Failed to install Ctrl+C signal handler: {err}");
    }

    let commands = spawn_command_reader();
    println!("commands: p play/pause, + faster, - slower, n next page, b previous page, q quit");
    narrator.open_page(narrator.page());

    let interval = config.tick_interval();
    while !narrator.is_done() && !shutdown.load(Ordering::Acquire) {
        while let Ok(command) = commands.try_recv() {
            narrator.handle_command(command);
        }
        narrator.step(interval);
    }

    narrator.shutdown();
    Ok(())
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut story_path = None;
    let mut story_id = None;
    let mut language = None;
    let mut page = 0usize;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--story" => story_id = args.next(),
            "--language" => language = args.next(),
            "--page" => {
                let value = args.next().ok_or_else(|| anyhow!("--page needs a number"))?;
                let number: usize = value
                    .parse()
                    .with_context(|| format!("Invalid page number: {value}"))?;
                page = number.saturating_sub(1);
            }
            _ => story_path = Some(PathBuf::from(arg)),
        }
    }

    let story_path = story_path.ok_or_else(|| {
        anyhow!("Usage: kahani-narrator <story.txt> [--story ID] [--language LANG] [--page N]")
    })?;
    if !story_path.exists() {
        return Err(anyhow!("File not found: {}", story_path.display()));
    }
    Ok(Args {
        story_path,
        story_id,
        language,
        page,
    })
}

/// Read commands from stdin on a background thread.
fn spawn_command_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match Command::parse(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    None => println!("unknown command: {}", line.trim()),
                }
            }
        });
    if let Err(err) = spawned {
        warn!("Failed to start command reader: {err}");
    }
    rx
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        info!("RUST_LOG is set; ignoring config log_level");
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
