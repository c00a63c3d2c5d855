//! UI rendering for the TUI
//!
//! This module handles all rendering using ratatui. The rendering is event-driven -
//! we only render when an event triggers a state change, not at a fixed frame rate.

mod jobs;
mod overlays;
mod widgets;

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, Modal, View};
use crate::tui::event::KeyContext;
use crate::tui::theme::Theme;

use jobs::render_job_table;
use overlays::{
    render_confirm_dialog, render_help_overlay, render_info_popup, render_notice_toast,
    render_settings_form,
};

/// Render the entire TUI
pub fn render(app: &App, frame: &mut Frame) {
    let theme = Theme::from_name(&app.settings().theme);
    let area = frame.area();

    // Main layout: header, content, footer
    let layout = Layout::vertical([
        Constraint::Length(1), // Info bar
        Constraint::Min(0),    // Main content
        Constraint::Length(2), // Status bar
    ])
    .split(area);

    render_info_bar(app, frame, layout[0], &theme);
    render_job_table(
        app.active_table(),
        app.view.label(),
        frame,
        layout[1],
        &theme,
    );
    render_status_bar(app, frame, layout[2], &theme);

    // Overlays, bottom of the stack first
    for modal in app.modals.iter() {
        match modal {
            Modal::Help => render_help_overlay(frame, area, &theme),
            Modal::Confirm { prompt, .. } => render_confirm_dialog(prompt, frame, area, &theme),
            Modal::Info {
                job_id,
                json,
                scroll,
            } => render_info_popup(*job_id, json, *scroll, frame, area, &theme),
            Modal::Settings(form) => render_settings_form(form, frame, area, &theme),
        }
    }

    // Notification toast (always on top)
    if let Some(notice) = app.feedback.current_notice() {
        render_notice_toast(notice, frame, area, &theme);
    }
}

fn render_info_bar(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let settings = app.settings();
    let scope = if settings.check_all_jobs {
        "All Users"
    } else {
        "My Jobs"
    };

    let mut info = format!(
        " slurmtui | {} | {} | every {}s",
        app.view.label(),
        scope,
        settings.refresh_interval().as_secs()
    );
    if !settings.accounts.is_empty() {
        info.push_str(&format!(" | Accounts: {}", settings.accounts.join(",")));
    }
    if app.is_mock() {
        info.push_str(" | MOCK");
    }

    let para = Paragraph::new(info).style(Style::default().fg(theme.border));
    frame.render_widget(para, area);
}

fn keybinds_for(app: &App) -> &'static str {
    let context = match app.modals.top() {
        Some(Modal::Confirm { .. }) => KeyContext::Confirm,
        Some(Modal::Info { .. }) => KeyContext::Info,
        Some(Modal::Settings(_)) => KeyContext::Settings,
        Some(Modal::Help) => KeyContext::Help,
        None if app.view == View::Historical => KeyContext::History,
        None => KeyContext::Table,
    };
    match context {
        KeyContext::Table => {
            " l:stdout  e:stderr  c:connect  i:info  d:delete  o:history  s:settings  ?:help  q:quit "
        }
        KeyContext::History => " l:stdout  e:stderr  i:info  s:settings  Esc:back  ?:help  q:quit ",
        KeyContext::Confirm => " y:yes  n/Esc:no ",
        KeyContext::Info => " j/k:scroll  s:print in terminal  Esc:close  q:quit ",
        KeyContext::Settings => " Up/Down/Tab:move  Ctrl+U:clear  Ctrl+S:save  Esc:discard ",
        KeyContext::Help => " Esc:close ",
    }
}

fn render_status_bar(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let layout = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).split(area);

    // Keybindings line - context-sensitive
    let keybinds_para = Paragraph::new(keybinds_for(app)).style(Style::default().fg(theme.border));
    frame.render_widget(keybinds_para, layout[0]);

    let mut status_parts = Vec::new();

    if !app.modals.is_empty() {
        let mode_name = match app.modals.top() {
            Some(Modal::Confirm { .. }) => "CONFIRM",
            Some(Modal::Info { .. }) => "INFO",
            Some(Modal::Settings(_)) => "SETTINGS",
            _ => "",
        };
        if !mode_name.is_empty() {
            status_parts.push(Span::styled(
                format!(" [{}]", mode_name),
                Style::default().fg(theme.warn).bold(),
            ));
        }
    }

    let table = app.active_table();
    if let Some(snapshot) = table.snapshot() {
        let running = snapshot.running_count();
        status_parts.push(Span::styled(
            " Jobs: ".to_string(),
            Style::default().fg(theme.border),
        ));
        status_parts.push(Span::styled(
            format!("{} listed", snapshot.len()),
            Style::default().fg(theme.fg),
        ));
        if app.view == View::Current {
            status_parts.push(Span::raw(", "));
            status_parts.push(Span::styled(
                format!("{} running", running),
                Style::default().fg(theme.running),
            ));
        }
        if !table.pending().is_empty() {
            status_parts.push(Span::raw(", "));
            status_parts.push(Span::styled(
                format!("{} to be deleted", table.pending().len()),
                Style::default().fg(theme.failed),
            ));
        }
    } else if !table.is_loaded() {
        status_parts.push(Span::styled(" Loading...", Style::default().fg(theme.pending)));
    }

    // Config warnings display (persistent until fixed)
    if !app.feedback.config_warnings.is_empty() {
        let warning_text = if app.feedback.config_warnings.len() == 1 {
            format!(" | WARN: {}", app.feedback.config_warnings[0])
        } else {
            format!(
                " | WARN: {} (+{} more)",
                app.feedback.config_warnings[0],
                app.feedback.config_warnings.len() - 1
            )
        };
        status_parts.push(Span::styled(warning_text, Style::default().fg(theme.warn)));
    }

    // Error display (temporary, auto-dismisses)
    if let Some(error) = app.current_error() {
        let first_line = error.lines().next().unwrap_or_default();
        status_parts.push(Span::styled(
            format!(" | {} ", first_line),
            Style::default().fg(theme.failed),
        ));
    }

    let status_para = Paragraph::new(Line::from(status_parts));
    frame.render_widget(status_para, layout[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStateSet, Record, Settings};
    use crate::slurm::{Snapshot, SnapshotKind};
    use crate::tui::event::DataEvent;
    use crate::tui::runtime::RefreshControl;
    use ratatui::backend::TestBackend;

    fn screen_text(app: &App) -> String {
        let backend = TestBackend::new(140, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> App {
        let settings = Settings {
            mock: true,
            ..Settings::default()
        };
        App::new(settings, None, Vec::new(), RefreshControl::new())
    }

    #[test]
    fn test_render_placeholder_before_and_after_load() {
        let mut app = app();
        assert!(screen_text(&app).contains("Loading jobs..."));

        app.handle_data(DataEvent::SnapshotReady {
            seq: 1,
            generation: app.generation(),
            kind: SnapshotKind::Current,
            result: Ok(Snapshot::new(SnapshotKind::Current, Vec::new(), &[])),
        });
        let text = screen_text(&app);
        assert!(text.contains("No jobs running"));
        assert!(text.contains("0 jobs (0 running)"));
    }

    #[test]
    fn test_render_rows_and_headers() {
        let mut app = app();
        let mut record = Record::new(4242, JobStateSet::parse("RUNNING"));
        record.name = "train".into();
        app.handle_data(DataEvent::SnapshotReady {
            seq: 1,
            generation: app.generation(),
            kind: SnapshotKind::Current,
            result: Ok(Snapshot::new(SnapshotKind::Current, vec![record], &[])),
        });

        let text = screen_text(&app);
        assert!(text.contains("Job id"));
        assert!(text.contains("4242"));
        assert!(text.contains("train"));
        assert!(text.contains("MOCK"));
    }
}
