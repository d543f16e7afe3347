mod app;
mod commands;
mod status;
mod terminal;

use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use capworld_core::{
    callback_context,
    config::{self, AppConfig},
    spawn_ticker, SimulationClock,
};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::{
    app::{App, PROMPT},
    status::StatusLine,
    terminal::{install_panic_hook, FrameRenderer, TerminalModeController},
};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.log_dir)?;
    info!(?config, "starting");

    let mode = Arc::new(TerminalModeController::stdin());
    install_panic_hook(mode.clone());

    let renderer = Arc::new(FrameRenderer::stdout(mode.clone()));
    if !renderer.configure() {
        warn!("continuing without hiding control characters");
    }
    info!(
        ansi = renderer.is_ansi_capable(),
        input_mode = mode.is_engaged(),
        "terminal ready"
    );

    let (callbacks, context) = callback_context();
    let clock = Arc::new(SimulationClock::new(
        config.start_time(),
        config.initial_speed,
        callbacks,
    ));

    let status = Arc::new(StatusLine::new(
        clock.clone(),
        renderer.clone(),
        PROMPT,
        config.currency_symbol.clone(),
        config.starting_balance,
    ));
    let observer = Arc::downgrade(&status);
    clock.set_observer(observer);

    context.spawn();
    spawn_ticker(clock.clone(), config.tick_interval());

    let mut app = App::new(clock, renderer, status);
    let result = app.run().await;

    // Covers early exits from `run`; a second restore is a no-op.
    app.shutdown();
    if let Err(err) = mode.restore() {
        warn!(error = ?err, "failed to restore terminal mode");
    }
    result
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("capworld.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Stdout carries the status frame, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
