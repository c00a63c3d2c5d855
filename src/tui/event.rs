//! Event types for the TUI
//!
//! This module implements a dual-channel event architecture:
//! - InputEvent: Priority channel for user input (never dropped)
//! - DataEvent: Data channel for fetch results (may be dropped under load)

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::dispatch::ExternalCommand;
use crate::slurm::{FetchError, Snapshot, SnapshotKind};

/// Input events from the terminal (priority channel - never dropped)
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Keyboard input
    Key(KeyEvent),
    /// Terminal resize
    Resize,
}

/// Data and control events (data channel - may be dropped under load)
#[derive(Debug)]
pub enum DataEvent {
    /// One fetch finished.
    ///
    /// `seq` grows with every fetch; `generation` is the query generation
    /// the fetch was started under.
    SnapshotReady {
        seq: u64,
        generation: u64,
        kind: SnapshotKind,
        result: Result<Snapshot, FetchError>,
    },

    /// A background `scancel` finished (success or failure)
    CancelResult { success: bool, message: String },
}

/// Result of processing an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResult {
    /// Continue running, UI needs redraw
    Continue,
    /// Continue running, no UI change needed
    Unchanged,
    /// Quit the application
    Quit,
    /// Hand the terminal to a command and wait for it
    Foreground(ExternalCommand),
    /// Run a command off the UI thread and report back on the data channel
    Background(ExternalCommand),
}

/// Which key table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyContext {
    /// Current jobs table
    Table,
    /// Past jobs table
    History,
    Confirm,
    Info,
    Settings,
    Help,
}

/// Key action mappings for the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    // Navigation
    MoveUp,
    MoveDown,
    MoveToTop,
    MoveToBottom,
    PageUp,
    PageDown,

    // Job actions
    TailStdout,
    TailStderr,
    Connect,
    Info,
    Delete,
    OpenSettings,
    OpenHistory,
    Refresh,

    // Confirm dialog
    Yes,
    No,

    // Info dialog
    PrintJson,

    // Settings form
    NextField,
    PrevField,
    Save,
    EditBackspace,
    EditClear,
    EditChar(char),

    // UI
    ShowHelp,
    Escape,
    Quit,

    // Unknown/unhandled
    Unknown,
}

impl KeyAction {
    /// Map a key event to an action based on the active context
    pub fn from_key_event(event: KeyEvent, context: KeyContext) -> Self {
        let KeyEvent {
            code, modifiers, ..
        } = event;

        // Ctrl+C quits from anywhere
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            return KeyAction::Quit;
        }

        match context {
            KeyContext::Settings => Self::settings_key(code, modifiers),
            KeyContext::Confirm => match code {
                KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Yes,
                KeyCode::Char('n') | KeyCode::Char('N') => KeyAction::No,
                KeyCode::Esc | KeyCode::Char('b') | KeyCode::Backspace => KeyAction::Escape,
                KeyCode::Char('q') => KeyAction::Quit,
                _ => KeyAction::Unknown,
            },
            KeyContext::Info => match code {
                KeyCode::Char('s') => KeyAction::PrintJson,
                KeyCode::Esc | KeyCode::Char('b') | KeyCode::Backspace => KeyAction::Escape,
                KeyCode::Char('q') => KeyAction::Quit,
                KeyCode::Char('j') | KeyCode::Down => KeyAction::MoveDown,
                KeyCode::Char('k') | KeyCode::Up => KeyAction::MoveUp,
                KeyCode::PageDown => KeyAction::PageDown,
                KeyCode::PageUp => KeyAction::PageUp,
                KeyCode::Char('g') | KeyCode::Home => KeyAction::MoveToTop,
                _ => KeyAction::Unknown,
            },
            KeyContext::Help => match code {
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::F(1) | KeyCode::Char('q') => {
                    KeyAction::Escape
                }
                _ => KeyAction::Unknown,
            },
            KeyContext::Table | KeyContext::History => {
                if let Some(action) = Self::navigation_key(code, modifiers) {
                    return action;
                }
                let history = context == KeyContext::History;
                match code {
                    KeyCode::Char('q') => KeyAction::Quit,
                    KeyCode::Char('l') => KeyAction::TailStdout,
                    KeyCode::Char('e') => KeyAction::TailStderr,
                    KeyCode::Char('i') => KeyAction::Info,
                    KeyCode::Char('s') => KeyAction::OpenSettings,
                    KeyCode::Char('r') => KeyAction::Refresh,
                    KeyCode::Char('?') | KeyCode::F(1) => KeyAction::ShowHelp,
                    KeyCode::Char('c') if !history => KeyAction::Connect,
                    KeyCode::Char('d') if !history => KeyAction::Delete,
                    KeyCode::Char('o') if !history => KeyAction::OpenHistory,
                    KeyCode::Esc | KeyCode::Char('b') | KeyCode::Backspace if history => {
                        KeyAction::Escape
                    }
                    _ => KeyAction::Unknown,
                }
            }
        }
    }

    fn navigation_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Self> {
        // Ctrl+ combinations must come before bare character matches
        if modifiers.contains(KeyModifiers::CONTROL) {
            return match code {
                KeyCode::Char('d') => Some(KeyAction::PageDown),
                KeyCode::Char('u') => Some(KeyAction::PageUp),
                _ => None,
            };
        }
        Some(match code {
            KeyCode::Char('j') | KeyCode::Down => KeyAction::MoveDown,
            KeyCode::Char('k') | KeyCode::Up => KeyAction::MoveUp,
            KeyCode::Char('g') | KeyCode::Home => KeyAction::MoveToTop,
            KeyCode::Char('G') | KeyCode::End => KeyAction::MoveToBottom,
            KeyCode::PageDown => KeyAction::PageDown,
            KeyCode::PageUp => KeyAction::PageUp,
            _ => return None,
        })
    }

    fn settings_key(code: KeyCode, modifiers: KeyModifiers) -> Self {
        if modifiers.contains(KeyModifiers::CONTROL) {
            return match code {
                KeyCode::Char('s') => KeyAction::Save,
                KeyCode::Char('u') => KeyAction::EditClear,
                _ => KeyAction::Unknown,
            };
        }
        match code {
            KeyCode::Esc => KeyAction::Escape,
            KeyCode::Down | KeyCode::Tab => KeyAction::NextField,
            KeyCode::Up | KeyCode::BackTab => KeyAction::PrevField,
            KeyCode::Backspace => KeyAction::EditBackspace,
            KeyCode::Char(c) => KeyAction::EditChar(c),
            _ => KeyAction::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_table_bindings() {
        let table = KeyContext::Table;
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('l')), table), KeyAction::TailStdout);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('e')), table), KeyAction::TailStderr);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('c')), table), KeyAction::Connect);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('d')), table), KeyAction::Delete);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('o')), table), KeyAction::OpenHistory);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('q')), table), KeyAction::Quit);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Esc), table), KeyAction::Unknown);
    }

    #[test]
    fn test_history_disables_connect_and_delete() {
        let history = KeyContext::History;
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('c')), history), KeyAction::Unknown);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('d')), history), KeyAction::Unknown);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('l')), history), KeyAction::TailStdout);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Esc), history), KeyAction::Escape);
    }

    #[test]
    fn test_confirm_bindings() {
        let confirm = KeyContext::Confirm;
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('y')), confirm), KeyAction::Yes);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('n')), confirm), KeyAction::No);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Esc), confirm), KeyAction::Escape);
        // Job actions are inert behind a confirm
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Char('d')), confirm), KeyAction::Unknown);
    }

    #[test]
    fn test_info_s_prints_json() {
        let event = key(KeyCode::Char('s'));
        assert_eq!(KeyAction::from_key_event(event, KeyContext::Info), KeyAction::PrintJson);
        assert_eq!(KeyAction::from_key_event(event, KeyContext::Table), KeyAction::OpenSettings);
    }

    #[test]
    fn test_settings_typing_and_save() {
        let settings = KeyContext::Settings;
        // Letters are text in the form, even the ones bound elsewhere
        assert_eq!(
            KeyAction::from_key_event(key(KeyCode::Char('q')), settings),
            KeyAction::EditChar('q')
        );
        let save = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(KeyAction::from_key_event(save, settings), KeyAction::Save);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Tab), settings), KeyAction::NextField);
        assert_eq!(KeyAction::from_key_event(key(KeyCode::Up), settings), KeyAction::PrevField);
    }

    #[test]
    fn test_ctrl_c_quits_everywhere() {
        let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        for context in [
            KeyContext::Table,
            KeyContext::History,
            KeyContext::Confirm,
            KeyContext::Info,
            KeyContext::Settings,
            KeyContext::Help,
        ] {
            assert_eq!(KeyAction::from_key_event(event, context), KeyAction::Quit);
        }
    }
}
