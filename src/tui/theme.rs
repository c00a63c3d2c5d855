//! Theme definitions for the TUI
//!
//! This module provides colorblind-safe themes for both dark and light terminals.
//! The default is "dark" but users can pick "light" in the settings or via
//! `SLURMTUI_THEME`.

use ratatui::style::Color;

use crate::models::JobState;

/// Available theme names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeName {
    #[default]
    Dark,
    Light,
}

impl ThemeName {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "light" => ThemeName::Light,
            _ => ThemeName::Dark,
        }
    }
}

/// Color theme for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    // Base colors
    pub fg: Color,
    pub border: Color,
    pub border_focused: Color,

    // Job state colors (colorblind-safe)
    pub running: Color,
    pub pending: Color,
    pub completed: Color,
    pub failed: Color,
    pub cancelled: Color,
    pub timeout: Color,

    // UI elements
    pub selected_bg: Color,
    pub selected_fg: Color,
    pub header_bg: Color,
    pub header_fg: Color,
    pub warn: Color,
    pub highlight: Color,
}

impl Theme {
    /// Create a dark theme (default)
    pub fn dark() -> Self {
        Self {
            fg: Color::White,
            border: Color::DarkGray,
            border_focused: Color::Cyan,

            running: Color::Rgb(0, 200, 0),      // Bright green
            pending: Color::Rgb(255, 180, 0),    // Orange (not yellow - better visibility)
            completed: Color::Rgb(80, 160, 255), // Light blue
            failed: Color::Rgb(255, 80, 80),     // Bright red
            cancelled: Color::DarkGray,
            timeout: Color::Magenta,

            selected_bg: Color::Rgb(60, 60, 80),
            selected_fg: Color::White,
            header_bg: Color::Rgb(40, 80, 120),
            header_fg: Color::White,
            warn: Color::Rgb(255, 180, 0),
            highlight: Color::Cyan,
        }
    }

    /// Create a light theme
    /// Uses darker, more saturated colors for visibility on light backgrounds
    pub fn light() -> Self {
        Self {
            fg: Color::Black,
            border: Color::Rgb(120, 120, 120),
            border_focused: Color::Rgb(0, 100, 180),

            running: Color::Rgb(0, 140, 0),       // Dark green
            pending: Color::Rgb(200, 120, 0),     // Dark orange
            completed: Color::Rgb(0, 80, 180),    // Dark blue
            failed: Color::Rgb(200, 0, 0),        // Dark red
            cancelled: Color::Rgb(100, 100, 100), // Medium gray
            timeout: Color::Rgb(160, 0, 160),     // Dark magenta

            selected_bg: Color::Rgb(200, 220, 255),
            selected_fg: Color::Black,
            header_bg: Color::Rgb(180, 200, 230),
            header_fg: Color::Black,
            warn: Color::Rgb(200, 120, 0),
            highlight: Color::Rgb(0, 100, 180),
        }
    }

    /// Create theme from name string
    pub fn from_name(name: &str) -> Self {
        match ThemeName::parse(name) {
            ThemeName::Dark => Self::dark(),
            ThemeName::Light => Self::light(),
        }
    }

    /// Get color for a job state
    pub fn job_state_color(&self, state: JobState) -> Color {
        match state {
            JobState::Running | JobState::Completing => self.running,
            JobState::Pending | JobState::Suspended => self.pending,
            JobState::Completed => self.completed,
            JobState::Failed
            | JobState::OutOfMemory
            | JobState::NodeFail
            | JobState::BootFail => self.failed,
            JobState::Cancelled | JobState::Preempted => self.cancelled,
            JobState::Timeout | JobState::Deadline => self.timeout,
            JobState::Unknown => self.fg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_from_name() {
        assert_eq!(ThemeName::parse("LIGHT"), ThemeName::Light);
        assert_eq!(Theme::from_name("dark").fg, Theme::dark().fg);
        assert_eq!(Theme::from_name("LIGHT").fg, Theme::light().fg);

        // Unknown defaults to dark
        assert_eq!(ThemeName::parse("solarized"), ThemeName::Dark);
        assert_eq!(Theme::from_name("solarized").fg, Theme::dark().fg);
    }

    #[test]
    fn test_job_state_colors() {
        let theme = Theme::light();
        assert_eq!(theme.job_state_color(JobState::Running), theme.running);
        assert_eq!(theme.job_state_color(JobState::Pending), theme.pending);
        assert_eq!(theme.job_state_color(JobState::OutOfMemory), theme.failed);
        assert_eq!(theme.job_state_color(JobState::Unknown), theme.fg);
    }
}
