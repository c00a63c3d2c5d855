//! Application state and core logic for the TUI
//!
//! The App owns both job tables, the modal stack and the user-facing
//! feedback. It never blocks: commands that need the terminal or that run
//! `scancel` are handed back to the event loop as [`EventResult`] values.

mod state;

pub use state::{ConfirmIntent, FeedbackState, Modal, ModalStack, Notice, SettingsForm, View};

use std::path::PathBuf;
use std::sync::Arc;

use crossterm::event::KeyEventKind;
use tokio::sync::watch;

use crate::dispatch::{
    ARRAY_DELETE_QUESTION, ActionError, ExternalCommand, LogStream, commit_delete, info_json,
    plan_connect, plan_delete, plan_tail,
};
use crate::formatting::Clock;
use crate::models::{Record, Settings};
use crate::slurm::{
    DataSource, FetchError, Snapshot, SnapshotFetcher, SnapshotKind, SnapshotMode,
};
use crate::table::{RenderContext, TableModel};
use crate::tui::event::{DataEvent, EventResult, InputEvent, KeyAction, KeyContext};
use crate::tui::runtime::{ActiveQuery, RefreshControl};

/// Rows skipped by PageUp/PageDown
const PAGE_SIZE: usize = 10;

/// A fetch result held back while a confirm dialog is open.
#[derive(Debug)]
struct DeferredResult {
    kind: SnapshotKind,
    result: Result<Snapshot, FetchError>,
}

/// Warn when the Slurm tools were not found anywhere.
fn binary_warning(fetcher: &SnapshotFetcher) -> Option<String> {
    match fetcher.source() {
        DataSource::Live(slurm) if slurm.is_unverified_fallback() => Some(format!(
            "squeue not found, trying {}",
            slurm.slurm_bin_path.display()
        )),
        _ => None,
    }
}

/// Main application state
pub struct App {
    // Lifecycle
    pub running: bool,

    pub view: View,
    pub modals: ModalStack,

    pub current: TableModel,
    pub history: TableModel,

    pub feedback: FeedbackState,

    settings: Arc<Settings>,
    settings_path: Option<PathBuf>,
    fetcher: SnapshotFetcher,
    clock: Clock,

    // Staleness tracking for fetch results
    generation: u64,
    last_applied_seq: u64,
    deferred: Option<DeferredResult>,

    // Links to the fetcher task
    query_tx: watch::Sender<ActiveQuery>,
    settings_tx: watch::Sender<Arc<Settings>>,
    control: Arc<RefreshControl>,
}

impl App {
    /// Create the app. `settings_path` is where the settings dialog saves;
    /// `None` keeps edits in memory.
    pub fn new(
        settings: Settings,
        settings_path: Option<PathBuf>,
        mut config_warnings: Vec<String>,
        control: Arc<RefreshControl>,
    ) -> Self {
        let settings = Arc::new(settings);
        let fetcher = SnapshotFetcher::from_settings(&settings);
        config_warnings.extend(binary_warning(&fetcher));
        let clock = fetcher.clock();
        let (query_tx, _) = watch::channel(ActiveQuery {
            generation: 0,
            mode: SnapshotMode::for_kind(SnapshotKind::Current, &settings),
        });
        let (settings_tx, _) = watch::channel(Arc::clone(&settings));

        Self {
            running: true,
            view: View::Current,
            modals: ModalStack::default(),
            current: TableModel::new(SnapshotKind::Current),
            history: TableModel::new(SnapshotKind::Historical),
            feedback: FeedbackState::new(config_warnings),
            settings,
            settings_path,
            fetcher,
            clock,
            generation: 0,
            last_applied_seq: 0,
            deferred: None,
            query_tx,
            settings_tx,
            control,
        }
    }

    /// Receiver for the query the fetcher should run
    pub fn query_receiver(&self) -> watch::Receiver<ActiveQuery> {
        self.query_tx.subscribe()
    }

    /// Receiver for settings changes
    pub fn settings_receiver(&self) -> watch::Receiver<Arc<Settings>> {
        self.settings_tx.subscribe()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.fetcher.is_mock()
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The table for the active view
    #[must_use]
    pub fn active_table(&self) -> &TableModel {
        match self.view {
            View::Current => &self.current,
            View::Historical => &self.history,
        }
    }

    fn active_table_mut(&mut self) -> &mut TableModel {
        match self.view {
            View::Current => &mut self.current,
            View::Historical => &mut self.history,
        }
    }

    fn table_mut(&mut self, kind: SnapshotKind) -> &mut TableModel {
        match kind {
            SnapshotKind::Current => &mut self.current,
            SnapshotKind::Historical => &mut self.history,
        }
    }

    fn render_context(&self, kind: SnapshotKind) -> RenderContext {
        RenderContext {
            now: self.clock.now(),
            all_users: kind == SnapshotKind::Current && self.settings.check_all_jobs,
        }
    }

    /// Get the current error message if it should be shown
    #[must_use]
    pub fn current_error(&self) -> Option<&str> {
        self.feedback.current_error()
    }

    fn key_context(&self) -> KeyContext {
        match self.modals.top() {
            Some(Modal::Confirm { .. }) => KeyContext::Confirm,
            Some(Modal::Info { .. }) => KeyContext::Info,
            Some(Modal::Settings(_)) => KeyContext::Settings,
            Some(Modal::Help) => KeyContext::Help,
            None => match self.view {
                View::Current => KeyContext::Table,
                View::Historical => KeyContext::History,
            },
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Handle an input event
    pub fn handle_input(&mut self, event: InputEvent) -> EventResult {
        match event {
            InputEvent::Key(key_event) => {
                if key_event.kind == KeyEventKind::Release {
                    return EventResult::Unchanged;
                }
                let action = KeyAction::from_key_event(key_event, self.key_context());
                self.handle_action(action)
            }
            InputEvent::Resize => EventResult::Continue,
        }
    }

    /// Handle a key action
    fn handle_action(&mut self, action: KeyAction) -> EventResult {
        if action == KeyAction::Quit {
            self.running = false;
            return EventResult::Quit;
        }

        match self.key_context() {
            KeyContext::Confirm => self.handle_confirm_action(action),
            KeyContext::Info => self.handle_info_action(action),
            KeyContext::Settings => self.handle_settings_action(action),
            KeyContext::Help => match action {
                KeyAction::Escape => {
                    self.modals.pop();
                    EventResult::Continue
                }
                _ => EventResult::Unchanged,
            },
            KeyContext::Table | KeyContext::History => self.handle_table_action(action),
        }
    }

    fn handle_table_action(&mut self, action: KeyAction) -> EventResult {
        if let Some(result) = self.handle_navigation(action) {
            return result;
        }

        match action {
            KeyAction::TailStdout => self.tail(LogStream::Stdout),
            KeyAction::TailStderr => self.tail(LogStream::Stderr),
            KeyAction::Connect => match self.selected_record().and_then(plan_connect) {
                Ok(command) => EventResult::Foreground(command),
                Err(e) => self.warn(e),
            },
            KeyAction::Info => match self.selected_record() {
                Ok(record) => {
                    let modal = Modal::Info {
                        job_id: record.job_id,
                        json: info_json(record),
                        scroll: 0,
                    };
                    self.modals.push(modal);
                    EventResult::Continue
                }
                Err(e) => self.warn(e),
            },
            KeyAction::Delete => self.request_delete(),
            KeyAction::OpenSettings => {
                self.modals
                    .push(Modal::Settings(SettingsForm::from_settings(&self.settings)));
                EventResult::Continue
            }
            KeyAction::OpenHistory => {
                self.switch_view(View::Historical);
                EventResult::Continue
            }
            KeyAction::Escape if self.view == View::Historical => {
                self.switch_view(View::Current);
                EventResult::Continue
            }
            KeyAction::Refresh => {
                self.control.request_refresh();
                self.feedback.set_notice("Refreshing...".to_string());
                EventResult::Continue
            }
            KeyAction::ShowHelp => {
                self.modals.push(Modal::Help);
                EventResult::Continue
            }
            _ => EventResult::Unchanged,
        }
    }

    fn handle_navigation(&mut self, action: KeyAction) -> Option<EventResult> {
        let table = self.active_table_mut();
        match action {
            KeyAction::MoveUp => table.move_up(),
            KeyAction::MoveDown => table.move_down(),
            KeyAction::MoveToTop => table.move_to_top(),
            KeyAction::MoveToBottom => table.move_to_bottom(),
            KeyAction::PageUp => table.page_up(PAGE_SIZE),
            KeyAction::PageDown => table.page_down(PAGE_SIZE),
            _ => return None,
        }
        Some(EventResult::Continue)
    }

    fn selected_record(&self) -> Result<&Record, ActionError> {
        self.active_table()
            .selected_record()
            .ok_or(ActionError::NoJobs)
    }

    fn warn(&mut self, error: ActionError) -> EventResult {
        tracing::info!(duplicate = error.is_duplicate(), "action refused: {}", error);
        self.feedback.set_error(error.to_string());
        EventResult::Continue
    }

    fn tail(&mut self, stream: LogStream) -> EventResult {
        let planned = self
            .selected_record()
            .and_then(|record| plan_tail(record, stream, |path| path.exists()));
        match planned {
            Ok(command) => EventResult::Foreground(command),
            Err(e) => self.warn(e),
        }
    }

    fn request_delete(&mut self) -> EventResult {
        let planned = self.selected_record().and_then(|record| {
            plan_delete(record, self.current.pending()).map(|prompt| (record.clone(), prompt))
        });
        match planned {
            Ok((record, prompt)) => {
                tracing::debug!(job_id = record.job_id, "asking for delete confirmation");
                self.modals.push(Modal::Confirm {
                    prompt: prompt.message,
                    intent: ConfirmIntent::Delete {
                        record,
                        is_array: prompt.is_array,
                    },
                });
                EventResult::Continue
            }
            Err(e) => self.warn(e),
        }
    }

    fn switch_view(&mut self, view: View) {
        if self.view == view {
            return;
        }
        tracing::debug!(from = ?self.view, to = ?view, "switching view");
        self.view = view;
        self.publish_query();
    }

    /// Point the fetcher at the active view and fetch now.
    fn publish_query(&mut self) {
        self.generation += 1;
        self.deferred = None;
        self.query_tx.send_replace(ActiveQuery {
            generation: self.generation,
            mode: SnapshotMode::for_kind(self.view.kind(), &self.settings),
        });
        self.control.request_refresh();
    }

    // ========================================================================
    // Modals
    // ========================================================================

    /// Handle actions in confirm dialog mode
    fn handle_confirm_action(&mut self, action: KeyAction) -> EventResult {
        let answer = match action {
            KeyAction::Yes => true,
            KeyAction::No | KeyAction::Escape => false,
            _ => return EventResult::Unchanged,
        };

        // Take the dialog off the stack first so the answer is acted on once
        let Some(Modal::Confirm { intent, .. }) = self.modals.pop() else {
            return EventResult::Unchanged;
        };

        let result = match intent {
            ConfirmIntent::Delete { record, is_array } => {
                if !answer {
                    EventResult::Continue
                } else if is_array {
                    self.modals.push(Modal::Confirm {
                        prompt: ARRAY_DELETE_QUESTION.to_string(),
                        intent: ConfirmIntent::ArrayScope { record },
                    });
                    EventResult::Continue
                } else {
                    self.commit_delete(&record, false)
                }
            }
            ConfirmIntent::ArrayScope { record } => self.commit_delete(&record, answer),
        };

        self.apply_deferred();
        result
    }

    fn commit_delete(&mut self, record: &Record, whole_array: bool) -> EventResult {
        // Settle any held-back snapshot before marking, so the array members
        // are taken from the newest listing.
        self.apply_deferred();

        let scancel = self.fetcher.tool_path("scancel");
        let (snapshot, pending) = self.current.snapshot_and_pending_mut();
        let command = commit_delete(record, whole_array, snapshot, pending, &scancel);

        let ctx = self.render_context(SnapshotKind::Current);
        self.current.rebuild(&ctx);
        self.feedback.set_notice(format!("Running: {command}"));
        self.control.request_refresh();
        EventResult::Background(command)
    }

    /// Apply a snapshot that arrived while a confirm dialog was open.
    fn apply_deferred(&mut self) {
        if self.modals.has_confirm() {
            return;
        }
        if let Some(DeferredResult { kind, result }) = self.deferred.take() {
            tracing::debug!(?kind, "applying deferred snapshot");
            self.apply_result(kind, result);
        }
    }

    fn handle_info_action(&mut self, action: KeyAction) -> EventResult {
        let Some(Modal::Info { json, scroll, .. }) = self.modals.top_mut() else {
            return EventResult::Unchanged;
        };
        match action {
            KeyAction::Escape => {
                self.modals.pop();
                EventResult::Continue
            }
            KeyAction::PrintJson => EventResult::Foreground(ExternalCommand::PrintJson {
                json: json.clone(),
            }),
            KeyAction::MoveDown => {
                *scroll = scroll.saturating_add(1);
                EventResult::Continue
            }
            KeyAction::MoveUp => {
                *scroll = scroll.saturating_sub(1);
                EventResult::Continue
            }
            KeyAction::PageDown => {
                *scroll = scroll.saturating_add(PAGE_SIZE as u16);
                EventResult::Continue
            }
            KeyAction::PageUp => {
                *scroll = scroll.saturating_sub(PAGE_SIZE as u16);
                EventResult::Continue
            }
            KeyAction::MoveToTop => {
                *scroll = 0;
                EventResult::Continue
            }
            _ => EventResult::Unchanged,
        }
    }

    fn handle_settings_action(&mut self, action: KeyAction) -> EventResult {
        if action == KeyAction::Escape {
            self.modals.pop();
            return EventResult::Continue;
        }
        if action == KeyAction::Save {
            return self.save_settings();
        }

        let Some(form) = self.modals.settings_form_mut() else {
            return EventResult::Unchanged;
        };
        match action {
            KeyAction::NextField => form.select_next(),
            KeyAction::PrevField => form.select_prev(),
            KeyAction::EditChar(c) => form.push_char(c),
            KeyAction::EditBackspace => form.backspace(),
            KeyAction::EditClear => form.clear(),
            _ => return EventResult::Unchanged,
        }
        EventResult::Continue
    }

    fn save_settings(&mut self) -> EventResult {
        let Some(form) = self.modals.settings_form_mut() else {
            return EventResult::Unchanged;
        };
        let settings = match form.apply(&self.settings) {
            Ok(settings) => settings,
            Err(e) => {
                self.feedback.set_error(e.to_string());
                return EventResult::Continue;
            }
        };

        if let Some(path) = &self.settings_path {
            if let Err(e) = settings.save(path) {
                tracing::error!("Failed to save settings: {}", e);
                self.feedback.set_error(e.to_string());
                return EventResult::Continue;
            }
            tracing::info!(path = %path.display(), "settings saved");
        }

        self.modals.pop();
        self.replace_settings(settings);
        self.feedback.set_notice("Settings saved".to_string());
        EventResult::Continue
    }

    /// Swap in new settings and hand them to the fetcher.
    fn replace_settings(&mut self, settings: Settings) {
        let settings = Arc::new(settings);
        self.fetcher = SnapshotFetcher::from_settings(&settings);
        self.clock = self.fetcher.clock();
        self.settings = Arc::clone(&settings);
        self.settings_tx.send_replace(settings);

        for kind in [SnapshotKind::Current, SnapshotKind::Historical] {
            let ctx = self.render_context(kind);
            self.table_mut(kind).rebuild(&ctx);
        }
        self.publish_query();
    }

    /// Called after a foreground command returned and the terminal is back.
    pub fn finish_foreground(&mut self, label: &str, outcome: anyhow::Result<()>) {
        match outcome {
            Ok(()) if self.is_mock() => self.feedback.set_notice(format!("mock: {label}")),
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(command = label, "foreground command failed: {:#}", e);
                self.feedback.set_error(format!("{label}: {e:#}"));
            }
        }
    }

    // ========================================================================
    // Data
    // ========================================================================

    /// Handle a data event
    pub fn handle_data(&mut self, event: DataEvent) -> EventResult {
        match event {
            DataEvent::SnapshotReady {
                seq,
                generation,
                kind,
                result,
            } => {
                if generation != self.generation
                    || kind != self.view.kind()
                    || seq <= self.last_applied_seq
                {
                    tracing::debug!(seq, generation, ?kind, "discarding stale snapshot");
                    return EventResult::Unchanged;
                }
                self.last_applied_seq = seq;

                if self.modals.has_confirm() {
                    tracing::debug!(seq, "confirm open, deferring snapshot");
                    self.deferred = Some(DeferredResult { kind, result });
                    return EventResult::Unchanged;
                }

                self.apply_result(kind, result);
                EventResult::Continue
            }
            DataEvent::CancelResult { success, message } => {
                if success {
                    self.feedback.set_notice(message);
                } else {
                    self.feedback.clear_notice();
                    self.feedback.set_error(message);
                }
                EventResult::Continue
            }
        }
    }

    fn apply_result(&mut self, kind: SnapshotKind, result: Result<Snapshot, FetchError>) {
        let ctx = self.render_context(kind);
        match result {
            Ok(snapshot) => {
                tracing::debug!(?kind, jobs = snapshot.len(), "snapshot applied");
                self.table_mut(kind).apply_snapshot(snapshot, &ctx);
            }
            Err(e) => {
                self.feedback.set_error(e.to_string());
                self.table_mut(kind).apply_failure(&ctx);
            }
        }
    }
}
