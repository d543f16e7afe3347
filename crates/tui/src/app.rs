use std::{
    io::{self, BufRead},
    sync::Arc,
    thread,
};

use anyhow::{Context, Result};
use capworld_core::{SimulationClock, SpeedLevel};
use tokio::{signal, sync::mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    commands::{Command, HELP_TEXT},
    status::{format_money, StatusLine},
    terminal::{CrosstermRows, FrameRenderer, RowSource},
};

pub const PROMPT: &str = "capworld> ";

#[derive(Debug)]
enum AppEvent {
    Line(String),
    Eof,
    Interrupt,
    InputError(io::Error),
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Outcome {
    output: Option<String>,
    quit: bool,
}

impl Outcome {
    fn say(text: impl Into<String>) -> Self {
        Self {
            output: Some(text.into()),
            quit: false,
        }
    }
}

pub struct App<W = io::Stdout, R = CrosstermRows> {
    clock: Arc<SimulationClock>,
    renderer: Arc<FrameRenderer<W, R>>,
    status: Arc<StatusLine<W, R>>,
}

impl App {
    pub async fn run(&mut self) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(16);
        spawn_input_thread(event_tx.clone());
        spawn_interrupt_listener(event_tx);

        loop {
            self.status.render_prompt();

            match event_rx.recv().await {
                Some(AppEvent::Line(line)) => {
                    if !self.handle_line(&line)? {
                        break;
                    }
                }
                Some(AppEvent::Interrupt) => {
                    info!("interrupted");
                    break;
                }
                Some(AppEvent::InputError(err)) => {
                    error!(error = %err, "failed to read input");
                    break;
                }
                Some(AppEvent::Eof) | None => {
                    debug!("input closed");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }
}

impl<W: io::Write + Send, R: RowSource> App<W, R> {
    pub fn new(
        clock: Arc<SimulationClock>,
        renderer: Arc<FrameRenderer<W, R>>,
        status: Arc<StatusLine<W, R>>,
    ) -> Self {
        Self {
            clock,
            renderer,
            status,
        }
    }

    /// Process one input line. Returns `false` once the user asked to quit.
    fn handle_line(&self, line: &str) -> Result<bool> {
        let erased = self
            .renderer
            .suspend()
            .context("failed to suspend status frame")?;
        // The typed line went with the erased prompt row; put it back in the
        // scrollback.
        if erased {
            self.print(&format!("{}{}", self.status.prompt(), line))?;
        }

        let outcome = match line.parse::<Command>() {
            Ok(command) => {
                debug!(?command, "dispatching command");
                self.execute(command)
            }
            Err(err) => Outcome::say(format!("error: {err}")),
        };

        if let Some(text) = outcome.output.as_deref() {
            self.print(text)?;
        }
        self.renderer.resume();
        Ok(!outcome.quit)
    }

    fn execute(&self, command: Command) -> Outcome {
        match command {
            Command::Empty => Outcome::default(),
            Command::Help => Outcome::say(HELP_TEXT),
            Command::Speed(level) => {
                self.clock.set_speed(level);
                if level.is_paused() {
                    Outcome::say("Clock paused.")
                } else {
                    Outcome::say(format!("Speed set to {level}."))
                }
            }
            Command::Pause => {
                self.clock.set_speed(SpeedLevel::Paused);
                Outcome::say("Clock paused.")
            }
            Command::Time => {
                let now = self.clock.current_simulated_time();
                Outcome::say(format!(
                    "It is {} (speed {}).",
                    now.format("%A, %d %B %Y %H:%M"),
                    self.clock.current_speed_level()
                ))
            }
            Command::Balance(None) => Outcome::say(format!(
                "Balance: {}",
                format_money(self.status.balance(), self.status.currency_symbol())
            )),
            Command::Balance(Some(amount)) => {
                self.status.set_balance(amount);
                info!(amount, "balance set");
                Outcome::say(format!(
                    "Balance set to {}.",
                    format_money(amount, self.status.currency_symbol())
                ))
            }
            Command::Quit => Outcome {
                output: Some("Goodbye.".to_string()),
                quit: true,
            },
        }
    }

    fn print(&self, text: &str) -> Result<()> {
        self.renderer
            .print_block(text)
            .context("failed to write to terminal")
    }

    /// Take the frame down and hand the terminal back. Safe to repeat.
    pub fn shutdown(&self) {
        self.clock.clear_observer();
        if let Err(err) = self.renderer.suspend() {
            warn!(error = %err, "failed to clear status frame");
        }
        if let Err(err) = self.renderer.restore() {
            warn!(error = ?err, "failed to restore terminal mode");
        }
        debug!(state = ?self.renderer.state(), "final frame state");
        info!("terminal released");
    }
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            let event = match lines.next() {
                Some(Ok(line)) => AppEvent::Line(line),
                Some(Err(err)) => AppEvent::InputError(err),
                None => AppEvent::Eof,
            };
            let last = !matches!(event, AppEvent::Line(_));
            if sender.blocking_send(event).is_err() || last {
                break;
            }
        }
    });
}

/// Turn Ctrl+C and SIGTERM into [`AppEvent::Interrupt`] so either one runs the
/// normal shutdown.
fn spawn_interrupt_listener(sender: mpsc::Sender<AppEvent>) {
    // Registered before returning so a signal raised right after is not lost.
    #[cfg(unix)]
    let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(error = %err, "could not listen for SIGTERM");
            None
        }
    };

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                warn!(error = %err, "could not listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminated = async {
            match terminate.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminated = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => debug!("received Ctrl+C"),
            () = terminated => info!("received SIGTERM"),
        }
        let _ = sender.send(AppEvent::Interrupt).await;
    });
}
