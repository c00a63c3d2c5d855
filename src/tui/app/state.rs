//! Application state types for the TUI
//!
//! This module contains the state management types:
//! - The active view (current or past jobs)
//! - The modal stack (Confirm, Info, Settings, Help)
//! - The settings form
//! - Feedback state for errors and notifications

use std::time::{Duration, Instant};

use crate::models::{Record, SETTING_FIELDS, SettingField, Settings, SettingsError};
use crate::slurm::SnapshotKind;

// ============================================================================
// Views
// ============================================================================

/// Which listing fills the main area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Current,
    Historical,
}

impl View {
    #[must_use]
    pub fn kind(self) -> SnapshotKind {
        match self {
            View::Current => SnapshotKind::Current,
            View::Historical => SnapshotKind::Historical,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            View::Current => "Jobs",
            View::Historical => "History",
        }
    }
}

// ============================================================================
// Modals
// ============================================================================

/// What answering a confirm dialog does.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmIntent {
    /// "Delete this job?" On yes, array members get a second question.
    Delete { record: Record, is_array: bool },
    /// "Delete the whole array?" Yes cancels the array, no only the job.
    ArrayScope { record: Record },
}

/// Modal overlay
#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    Confirm {
        prompt: String,
        intent: ConfirmIntent,
    },
    Info {
        job_id: u64,
        json: String,
        scroll: u16,
    },
    Settings(SettingsForm),
    Help,
}

/// Stack of open modals. Keys go to the top one.
#[derive(Debug, Default)]
pub struct ModalStack {
    stack: Vec<Modal>,
}

impl ModalStack {
    pub fn push(&mut self, modal: Modal) {
        self.stack.push(modal);
    }

    pub fn pop(&mut self) -> Option<Modal> {
        self.stack.pop()
    }

    #[must_use]
    pub fn top(&self) -> Option<&Modal> {
        self.stack.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Modal> {
        self.stack.last_mut()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// True while any confirm dialog is waiting for an answer
    #[must_use]
    pub fn has_confirm(&self) -> bool {
        self.stack.iter().any(|m| matches!(m, Modal::Confirm { .. }))
    }

    /// Bottom to top
    pub fn iter(&self) -> impl Iterator<Item = &Modal> {
        self.stack.iter()
    }

    /// The form, if the settings dialog is on top
    pub fn settings_form_mut(&mut self) -> Option<&mut SettingsForm> {
        match self.stack.last_mut() {
            Some(Modal::Settings(form)) => Some(form),
            _ => None,
        }
    }
}

// ============================================================================
// Settings form
// ============================================================================

/// Editable text copy of every setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    values: Vec<String>,
    selected: usize,
}

impl SettingsForm {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            values: SETTING_FIELDS
                .iter()
                .map(|field| settings.field_text(field.key))
                .collect(),
            selected: 0,
        }
    }

    /// Field descriptors with their current text
    pub fn fields(&self) -> impl Iterator<Item = (&'static SettingField, &str)> {
        SETTING_FIELDS.iter().zip(self.values.iter().map(String::as_str))
    }

    #[must_use]
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.values.len().max(1);
    }

    pub fn select_prev(&mut self) {
        let len = self.values.len().max(1);
        self.selected = (self.selected + len - 1) % len;
    }

    /// Move the selection to `key`. Returns false for unknown keys.
    #[cfg(test)]
    pub fn select_key(&mut self, key: &str) -> bool {
        match SETTING_FIELDS.iter().position(|f| f.key == key) {
            Some(index) => {
                self.selected = index;
                true
            }
            None => false,
        }
    }

    pub fn push_char(&mut self, c: char) {
        if let Some(value) = self.values.get_mut(self.selected) {
            value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(value) = self.values.get_mut(self.selected) {
            value.pop();
        }
    }

    pub fn clear(&mut self) {
        if let Some(value) = self.values.get_mut(self.selected) {
            value.clear();
        }
    }

    /// Parse every field on top of `base` and validate the result.
    pub fn apply(&self, base: &Settings) -> Result<Settings, SettingsError> {
        let mut settings = base.clone();
        for (field, text) in self.fields() {
            settings.set_field_text(field.key, text)?;
        }
        settings.validate(true)?;
        Ok(settings)
    }
}

// ============================================================================
// Feedback State
// ============================================================================

/// Transient notification
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub timestamp: Instant,
}

impl Notice {
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.timestamp.elapsed() < Duration::from_secs(2)
    }
}

/// Unified feedback state for errors, warnings, and transient messages
#[derive(Debug)]
pub struct FeedbackState {
    last_error: Option<(String, Instant)>,
    error_display_duration: Duration,
    pub config_warnings: Vec<String>,
    notice: Option<Notice>,
}

impl FeedbackState {
    /// Create a new FeedbackState with config warnings
    pub fn new(config_warnings: Vec<String>) -> Self {
        Self {
            last_error: None,
            error_display_duration: Duration::from_secs(5),
            config_warnings,
            notice: None,
        }
    }

    /// Set an error message to display
    pub fn set_error(&mut self, msg: String) {
        tracing::debug!(message = %msg, "warning shown");
        self.last_error = Some((msg, Instant::now()));
    }

    /// Check if error should still be displayed
    #[must_use]
    pub fn should_show_error(&self) -> bool {
        self.last_error
            .as_ref()
            .map(|(_, t)| t.elapsed() < self.error_display_duration)
            .unwrap_or(false)
    }

    /// Get the current error message if it should be shown
    #[must_use]
    pub fn current_error(&self) -> Option<&str> {
        if self.should_show_error() {
            self.last_error.as_ref().map(|(msg, _)| msg.as_str())
        } else {
            None
        }
    }

    pub fn set_notice(&mut self, message: String) {
        self.notice = Some(Notice {
            message,
            timestamp: Instant::now(),
        });
    }

    #[must_use]
    pub fn current_notice(&self) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| n.is_visible())
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }
}
