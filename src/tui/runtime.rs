//! Async runtime and task management for the TUI
//!
//! This module implements the dual-channel event-driven architecture:
//! - Input channel (priority): User input events that are never dropped
//! - Data channel: Fetch results that may be dropped under backpressure
//!
//! The main loop uses `tokio::select!` with bias toward the input channel
//! to prevent input starvation under heavy data update loads.
//!
//! A single fetcher task refreshes whichever listing is active. It never
//! overlaps two fetches, stops fetching while [`RefreshControl`] is paused
//! and can be woken early with [`RefreshControl::request_refresh`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::ExternalCommand;
use crate::models::Settings;
use crate::slurm::{FetchError, Snapshot, SnapshotFetcher, SnapshotMode};
use crate::tui::app::App;
use crate::tui::event::{DataEvent, EventResult, InputEvent};

/// Channel capacities
const INPUT_CHANNEL_CAPACITY: usize = 16;
const DATA_CHANNEL_CAPACITY: usize = 32;

/// How long shutdown waits for background tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// The query the fetcher should run, tagged with the generation it belongs to.
///
/// The app bumps the generation whenever the query or the settings change so
/// that results started under an older query can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveQuery {
    pub generation: u64,
    pub mode: SnapshotMode,
}

// ============================================================================
// Refresh control
// ============================================================================

/// Shared pause/wake switch for the fetcher.
#[derive(Debug, Default)]
pub struct RefreshControl {
    pause_depth: AtomicUsize,
    wake: Notify,
}

impl RefreshControl {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stop starting new fetches until the returned guard is dropped.
    #[must_use]
    pub fn pause(self: &Arc<Self>) -> RefreshPause {
        self.pause_depth.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("refresh paused");
        RefreshPause {
            control: Arc::clone(self),
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause_depth.load(Ordering::SeqCst) > 0
    }

    /// Wake the fetcher now instead of at the end of its interval.
    pub fn request_refresh(&self) {
        self.wake.notify_one();
    }

    async fn wait_for_wake(&self) {
        self.wake.notified().await;
    }
}

/// Resumes refreshing (with an immediate fetch) when dropped.
#[derive(Debug)]
pub struct RefreshPause {
    control: Arc<RefreshControl>,
}

impl Drop for RefreshPause {
    fn drop(&mut self) {
        if self.control.pause_depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            tracing::debug!("refresh resumed");
            self.control.request_refresh();
        }
    }
}

// ============================================================================
// Task tracking
// ============================================================================

/// TUI runtime managing all background tasks
pub struct TuiRuntime {
    cancel_token: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl TuiRuntime {
    /// Create a new TUI runtime
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            task_handles: Vec::new(),
        }
    }

    /// Get a clone of the cancellation token for spawning tasks
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Add a task handle to track
    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.task_handles.push(handle);
    }

    /// Signal shutdown and wait for tasks to complete
    pub async fn shutdown(self) {
        self.cancel_token.cancel();

        let shutdown = async {
            for handle in self.task_handles {
                let _ = handle.await;
            }
        };

        tokio::select! {
            _ = shutdown => {}
            _ = tokio::time::sleep(SHUTDOWN_TIMEOUT) => {
                tracing::warn!("background tasks did not stop in time");
            }
        }
    }
}

impl Default for TuiRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Input
// ============================================================================

/// Spawn the input event reader task
pub fn spawn_input_task(tx: mpsc::Sender<InputEvent>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = EventStream::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = reader.next() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            let input_event = match event {
                                Event::Key(key) => Some(InputEvent::Key(key)),
                                Event::Resize(_, _) => Some(InputEvent::Resize),
                                _ => None,
                            };

                            if let Some(evt) = input_event {
                                if tx.send(evt).await.is_err() {
                                    break; // Receiver dropped
                                }
                            }
                        }
                        Some(Err(e)) => {
                            let is_fatal = matches!(
                                e.kind(),
                                std::io::ErrorKind::BrokenPipe
                                    | std::io::ErrorKind::ConnectionReset
                                    | std::io::ErrorKind::UnexpectedEof
                            );

                            if is_fatal {
                                tracing::info!("Terminal disconnected: {:?}", e);
                                break;
                            } else {
                                tracing::warn!("Terminal event read error: {:?}", e);
                            }
                        }
                        None => break, // Stream ended
                    }
                }
            }
        }
    })
}

/// Owns the input reader task so it can be stopped while a child process
/// needs the terminal, and started again afterwards.
pub struct InputPump {
    tx: mpsc::Sender<InputEvent>,
    parent: CancellationToken,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl InputPump {
    pub fn new(tx: mpsc::Sender<InputEvent>, parent: CancellationToken) -> Self {
        Self {
            tx,
            parent,
            running: None,
        }
    }

    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        let token = self.parent.child_token();
        let handle = spawn_input_task(self.tx.clone(), token.clone());
        self.running = Some((token, handle));
    }

    /// Stop the reader and wait until it no longer touches stdin.
    pub async fn stop(&mut self) {
        if let Some((token, handle)) = self.running.take() {
            token.cancel();
            let _ = handle.await;
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

// ============================================================================
// Fetching
// ============================================================================

/// Helper to forward a fetch result to the data channel.
///
/// Join errors are folded into the same path as fetch errors so the UI
/// always hears back from a fetch.
fn handle_fetch_result(
    result: Result<Result<Snapshot, FetchError>, tokio::task::JoinError>,
    tx: &mpsc::Sender<DataEvent>,
    seq: u64,
    query: &ActiveQuery,
) {
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(seq, "fetch task failed: {}", e);
            Err(FetchError::Spawn {
                tool: query.mode.kind().tool(),
                source: std::io::Error::other(e.to_string()),
            })
        }
    };

    if let Err(e) = &result {
        tracing::debug!(seq, kind = ?query.mode.kind(), "fetch failed: {}", e);
    }

    let event = DataEvent::SnapshotReady {
        seq,
        generation: query.generation,
        kind: query.mode.kind(),
        result,
    };
    if tx.try_send(event).is_err() {
        tracing::warn!(seq, "Could not send snapshot (channel full)");
    }
}

/// Spawn the snapshot fetcher task.
///
/// Runs one fetch immediately, then one per refresh interval. Each fetch is
/// awaited before the next wait begins.
pub fn spawn_snapshot_fetcher(
    tx: mpsc::Sender<DataEvent>,
    cancel: CancellationToken,
    control: Arc<RefreshControl>,
    mut query_rx: watch::Receiver<ActiveQuery>,
    mut settings_rx: watch::Receiver<Arc<Settings>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut settings = Arc::clone(&settings_rx.borrow_and_update());
        let mut fetcher = SnapshotFetcher::from_settings(&settings);
        let mut seq: u64 = 0;

        loop {
            if settings_rx.has_changed().unwrap_or(false) {
                settings = Arc::clone(&settings_rx.borrow_and_update());
                fetcher = SnapshotFetcher::from_settings(&settings);
                tracing::info!(mock = fetcher.is_mock(), "fetcher reconfigured");
            }

            if control.is_paused() {
                tracing::trace!("refresh paused, skipping fetch");
            } else {
                seq += 1;
                let query = query_rx.borrow_and_update().clone();
                let job = fetcher.clone();
                let job_settings = Arc::clone(&settings);
                let mode = query.mode.clone();
                let result = tokio::task::spawn_blocking(move || {
                    job.fetch(&mode, &job_settings.accounts, &job_settings.squeue_args)
                })
                .await;
                handle_fetch_result(result, &tx, seq, &query);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(settings.refresh_interval()) => {}
                _ = control.wait_for_wake() => {}
            }
        }
    })
}

/// Spawn a command that needs no terminal and report its outcome.
pub fn spawn_background_command(
    command: ExternalCommand,
    mock: bool,
    tx: mpsc::Sender<DataEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let label = command.to_string();
        let result = tokio::task::spawn_blocking(move || command.run_captured(mock)).await;
        let (success, message) = match result {
            Ok(Ok(message)) => (true, message),
            Ok(Err(e)) => (false, format!("{e:#}")),
            Err(e) => (false, format!("Task error: {e}")),
        };
        tracing::info!(command = %label, success, "background command finished");
        if tx
            .send(DataEvent::CancelResult { success, message })
            .await
            .is_err()
        {
            tracing::warn!("Could not report command result (receiver dropped)");
        }
    })
}

// ============================================================================
// Suspension
// ============================================================================

/// Something that owns the terminal and can hand it over temporarily.
pub trait Frontend {
    fn draw(&mut self, app: &App) -> Result<()>;
    /// Leave the alternate screen and raw mode.
    fn suspend(&mut self) -> Result<()>;
    /// Re-enter the alternate screen and raw mode and redraw from scratch.
    fn resume(&mut self) -> Result<()>;
}

/// The app is suspended for as long as this value lives.
///
/// Creating it pauses refreshing, stops the input reader and releases the
/// terminal. Dropping it undoes all three, whatever happened in between.
pub struct Suspension<'a, F: Frontend> {
    frontend: &'a mut F,
    input: &'a mut InputPump,
    _pause: RefreshPause,
}

impl<'a, F: Frontend> Suspension<'a, F> {
    pub async fn begin(
        frontend: &'a mut F,
        input: &'a mut InputPump,
        control: &Arc<RefreshControl>,
    ) -> Result<Self> {
        let pause = control.pause();
        input.stop().await;
        if let Err(e) = frontend.suspend() {
            input.start();
            if let Err(restore) = frontend.resume() {
                tracing::error!("Failed to restore the terminal: {:#}", restore);
            }
            return Err(e.context("Failed to release the terminal"));
        }
        Ok(Self {
            frontend,
            input,
            _pause: pause,
        })
    }
}

impl<F: Frontend> Drop for Suspension<'_, F> {
    fn drop(&mut self) {
        if let Err(e) = self.frontend.resume() {
            tracing::error!("Failed to restore the terminal: {:#}", e);
        }
        self.input.start();
    }
}

/// Run `command` with the terminal handed over.
async fn run_suspended<F: Frontend>(
    frontend: &mut F,
    input: &mut InputPump,
    control: &Arc<RefreshControl>,
    command: ExternalCommand,
    mock: bool,
) -> Result<()> {
    let _suspended = Suspension::begin(frontend, input, control).await?;
    tracing::info!(command = %command, "running foreground command");
    tokio::task::spawn_blocking(move || command.run_foreground(mock))
        .await
        .context("Foreground command task failed")?
}

// ============================================================================
// Event loop
// ============================================================================

/// Run the main TUI event loop
pub async fn run_event_loop<F: Frontend>(
    mut app: App,
    frontend: &mut F,
    input: &mut InputPump,
    mut input_rx: mpsc::Receiver<InputEvent>,
    mut data_rx: mpsc::Receiver<DataEvent>,
    data_tx: mpsc::Sender<DataEvent>,
    control: Arc<RefreshControl>,
) -> Result<()> {
    let mut needs_render = true;

    loop {
        if needs_render {
            frontend.draw(&app)?;
            needs_render = false;
        }

        if !app.running {
            break;
        }

        let result = tokio::select! {
            // Bias toward input channel to prevent input starvation
            biased;

            Some(event) = input_rx.recv() => app.handle_input(event),
            Some(data) = data_rx.recv() => app.handle_data(data),
            else => break,
        };

        match result {
            EventResult::Continue => needs_render = true,
            EventResult::Unchanged => {}
            EventResult::Quit => break,
            EventResult::Foreground(command) => {
                let label = command.to_string();
                let outcome =
                    run_suspended(frontend, input, &control, command, app.is_mock()).await;
                app.finish_foreground(&label, outcome);
                needs_render = true;
            }
            EventResult::Background(command) => {
                spawn_background_command(command, app.is_mock(), data_tx.clone());
                needs_render = true;
            }
        }
    }

    Ok(())
}

/// Create the dual channels for the TUI
pub fn create_channels() -> (
    mpsc::Sender<InputEvent>,
    mpsc::Receiver<InputEvent>,
    mpsc::Sender<DataEvent>,
    mpsc::Receiver<DataEvent>,
) {
    let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let (data_tx, data_rx) = mpsc::channel(DATA_CHANNEL_CAPACITY);
    (input_tx, input_rx, data_tx, data_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records what the suspension did to the terminal.
    #[derive(Default)]
    struct RecordingFrontend {
        events: Vec<&'static str>,
        fail_suspend: bool,
    }

    impl Frontend for RecordingFrontend {
        fn draw(&mut self, _app: &App) -> Result<()> {
            self.events.push("draw");
            Ok(())
        }

        fn suspend(&mut self) -> Result<()> {
            self.events.push("suspend");
            if self.fail_suspend {
                anyhow::bail!("no terminal");
            }
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.events.push("resume");
            Ok(())
        }
    }

    fn suspension_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_failed_foreground_command_restores_everything() {
        suspension_runtime().block_on(async {
            let (tx, _rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
            let mut input = InputPump::new(tx, CancellationToken::new());
            input.start();
            let control = RefreshControl::new();
            let mut frontend = RecordingFrontend::default();

            let command = ExternalCommand::Cancel {
                program: "/nonexistent/bin/scancel".into(),
                target: 1,
            };
            let result = run_suspended(&mut frontend, &mut input, &control, command, false).await;

            assert!(result.is_err());
            assert_eq!(frontend.events, ["suspend", "resume"]);
            assert!(!control.is_paused());
            assert!(input.is_running());
            input.stop().await;
        });
    }

    #[test]
    fn test_suspend_failure_resumes_and_unpauses() {
        suspension_runtime().block_on(async {
            let (tx, _rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
            let mut input = InputPump::new(tx, CancellationToken::new());
            input.start();
            let control = RefreshControl::new();
            let mut frontend = RecordingFrontend {
                fail_suspend: true,
                ..RecordingFrontend::default()
            };

            let result = Suspension::begin(&mut frontend, &mut input, &control).await;
            assert!(result.is_err());
            drop(result);

            assert_eq!(frontend.events, ["suspend", "resume"]);
            assert!(!control.is_paused());
            assert!(input.is_running());
            input.stop().await;
        });
    }

    #[test]
    fn test_pause_guard_resumes_on_drop() {
        let control = RefreshControl::new();
        assert!(!control.is_paused());

        let outer = control.pause();
        let inner = control.pause();
        assert!(control.is_paused());

        drop(inner);
        assert!(control.is_paused());
        drop(outer);
        assert!(!control.is_paused());
    }

    #[test]
    fn test_resume_arms_an_immediate_fetch() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let control = RefreshControl::new();
            drop(control.pause());
            // The stored wake-up is consumed without waiting
            tokio::time::timeout(Duration::from_millis(100), control.wait_for_wake())
                .await
                .expect("resume should leave a pending wake-up");
        });
    }

    #[test]
    fn test_fetcher_sends_tagged_snapshots() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let settings = Arc::new(Settings {
                mock: true,
                ..Settings::default()
            });
            let (_settings_tx, settings_rx) = watch::channel(Arc::clone(&settings));
            let (_query_tx, query_rx) = watch::channel(ActiveQuery {
                generation: 7,
                mode: SnapshotMode::Current { all_users: false },
            });
            let (tx, mut rx) = mpsc::channel(DATA_CHANNEL_CAPACITY);
            let cancel = CancellationToken::new();
            let control = RefreshControl::new();

            let handle =
                spawn_snapshot_fetcher(tx, cancel.clone(), Arc::clone(&control), query_rx, settings_rx);

            let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            control.request_refresh();
            let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();

            match (first, second) {
                (
                    DataEvent::SnapshotReady {
                        seq: s1,
                        generation,
                        result,
                        ..
                    },
                    DataEvent::SnapshotReady { seq: s2, .. },
                ) => {
                    assert_eq!(generation, 7);
                    assert!(s2 > s1);
                    assert!(!result.unwrap().is_empty());
                }
                other => panic!("unexpected events: {other:?}"),
            }

            cancel.cancel();
            let _ = handle.await;
        });
    }

    #[test]
    fn test_paused_fetcher_stays_quiet() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let settings = Arc::new(Settings {
                mock: true,
                ..Settings::default()
            });
            let (_settings_tx, settings_rx) = watch::channel(settings);
            let (_query_tx, query_rx) = watch::channel(ActiveQuery {
                generation: 0,
                mode: SnapshotMode::Current { all_users: false },
            });
            let (tx, mut rx) = mpsc::channel(DATA_CHANNEL_CAPACITY);
            let cancel = CancellationToken::new();
            let control = RefreshControl::new();

            let pause = control.pause();
            let handle =
                spawn_snapshot_fetcher(tx, cancel.clone(), Arc::clone(&control), query_rx, settings_rx);

            control.request_refresh();
            let quiet = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
            assert!(quiet.is_err(), "no fetch may start while paused");

            drop(pause);
            let resumed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
            assert!(matches!(resumed, Ok(Some(DataEvent::SnapshotReady { .. }))));

            cancel.cancel();
            let _ = handle.await;
        });
    }
}
