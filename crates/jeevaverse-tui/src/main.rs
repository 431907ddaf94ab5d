mod app;
mod handler;
mod theme;
mod tui;
mod ui;

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use jeevaverse_core::{CommandSpeaker, Config, Session, SilentSpeaker, Speaker, Store};

use crate::app::App;
use crate::tui::EventHandler;

/// The terminal belongs to the UI, so logs go to `<data_dir>/jeevaverse/jeevaverse.log`.
fn init_logging() -> Result<()> {
    let log_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("jeevaverse");
    std::fs::create_dir_all(&log_dir)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("jeevaverse.log"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn build_speaker(config: &Config) -> Box<dyn Speaker> {
    match &config.speech_command {
        Some(command) => match CommandSpeaker::new(command) {
            Ok(speaker) => Box::new(speaker),
            Err(e) => {
                log::warn!("Speech disabled: {:#}", e);
                Box::new(SilentSpeaker)
            }
        },
        None => Box::new(CommandSpeaker::platform_default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = init_logging() {
        eprintln!("Logging disabled: {:#}", e);
    }

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Using default config: {:#}", e);
        let mut config = Config::new();
        config.apply_env(|key| std::env::var(key).ok());
        config
    });
    log::info!(
        "Starting with model {:?}, proxy {:?}, key configured: {}",
        config.model,
        config.base_url,
        config.api_key.is_some()
    );

    let store = Arc::new(Store::open(Store::default_path()?)?);
    let session = Session::new(store, build_speaker(&config));
    log::info!("Loaded {} turns", session.log().len());

    let mut app = App::new(config, session);
    app.scroll_chat_to_bottom();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let sender = events.sender();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event, &sender)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    app.session.speaker_mut().cancel();
    result
}
