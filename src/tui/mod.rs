//! Terminal User Interface for slurmtui
//!
//! This module provides the interactive job table. It features:
//! - Periodic refresh of the current queue or the job history
//! - Dual-channel event architecture (priority input, backpressure-aware data)
//! - Keyboard-driven navigation and job actions
//! - Handing the terminal to ssh, tail and friends and taking it back

pub mod app;
pub mod event;
pub mod runtime;
pub mod theme;
pub mod ui;

use std::io::{self, IsTerminal, stdout};
use std::path::PathBuf;

use anyhow::{Result, bail};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use crate::models::Settings;
use crate::tui::app::App;
use crate::tui::runtime::{
    Frontend, InputPump, RefreshControl, TuiRuntime, create_channels, run_event_loop,
    spawn_snapshot_fetcher,
};

/// Terminal capability requirements for TUI mode
#[derive(Debug)]
pub struct TerminalCapabilities {
    pub is_tty: bool,
    pub term_type: String,
    pub supports_alternate_screen: bool,
}

impl TerminalCapabilities {
    /// Detect terminal capabilities
    pub fn detect() -> Self {
        let is_tty = stdout().is_terminal();
        let term_type = std::env::var("TERM").unwrap_or_default();

        // Check for known problematic terminals
        let supports_alternate_screen = !matches!(term_type.as_str(), "dumb" | "" | "unknown");

        Self {
            is_tty,
            term_type,
            supports_alternate_screen,
        }
    }

    /// Check if terminal is suitable for TUI mode
    pub fn is_suitable(&self) -> bool {
        self.is_tty && self.supports_alternate_screen
    }

    /// Get error message for unsuitable terminal
    pub fn error_message(&self) -> String {
        if !self.is_tty {
            "slurmtui requires an interactive terminal (stdout is not a TTY).".to_string()
        } else if !self.supports_alternate_screen {
            format!(
                "Terminal type '{}' may not support full-screen mode.\n\
                 Hint: Set TERM to a supported value (e.g., xterm-256color).",
                if self.term_type.is_empty() {
                    "(unset)"
                } else {
                    &self.term_type
                }
            )
        } else {
            "Unknown terminal capability issue.".to_string()
        }
    }
}

/// The real terminal behind the app.
pub struct TerminalFrontend {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalFrontend {
    fn new() -> Result<Self> {
        Ok(Self {
            terminal: setup_terminal()?,
        })
    }
}

impl Frontend for TerminalFrontend {
    fn draw(&mut self, app: &App) -> Result<()> {
        self.terminal.draw(|frame| ui::render(app, frame))?;
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        self.terminal.show_cursor()?;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        Backend::flush(self.terminal.backend_mut())?;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(self.terminal.backend_mut(), EnterAlternateScreen)?;
        self.terminal.clear()?;
        self.terminal.hide_cursor()?;
        Ok(())
    }
}

/// Run the TUI application
pub async fn run_tui(
    settings: Settings,
    settings_path: Option<PathBuf>,
    config_warnings: Vec<String>,
) -> Result<()> {
    // Check terminal capabilities before attempting TUI mode
    let capabilities = TerminalCapabilities::detect();
    if !capabilities.is_suitable() {
        bail!("{}", capabilities.error_message());
    }

    let mut frontend = TerminalFrontend::new()?;

    // Create dual channels
    let (input_tx, input_rx, data_tx, data_rx) = create_channels();

    // Create runtime and shared state
    let control = RefreshControl::new();
    let mut runtime = TuiRuntime::new();
    let app = App::new(settings, settings_path, config_warnings, control.clone());

    // Spawn background tasks
    let mut input = InputPump::new(input_tx, runtime.cancel_token());
    input.start();

    runtime.track(spawn_snapshot_fetcher(
        data_tx.clone(),
        runtime.cancel_token(),
        control.clone(),
        app.query_receiver(),
        app.settings_receiver(),
    ));

    // Run the main event loop
    let result = run_event_loop(
        app,
        &mut frontend,
        &mut input,
        input_rx,
        data_rx,
        data_tx,
        control,
    )
    .await;

    // Shutdown background tasks
    input.stop().await;
    runtime.shutdown().await;

    // Restore terminal
    restore_terminal(&mut frontend.terminal)?;

    result
}

/// Setup the terminal for TUI mode
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to normal mode
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the TUI with the tokio runtime (entry point from main)
pub fn run(
    settings: Settings,
    settings_path: Option<PathBuf>,
    config_warnings: Vec<String>,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_tui(settings, settings_path, config_warnings))
}
