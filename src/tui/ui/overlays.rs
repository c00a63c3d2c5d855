//! Overlay and popup rendering
//!
//! Handles rendering of help, confirm, job info and settings dialogs, and
//! toast notifications.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::tui::app::{Notice, SettingsForm};
use crate::tui::theme::Theme;

use super::widgets::centered_rect;

fn section(title: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![Span::styled(
        title.to_string(),
        Style::default().fg(theme.highlight).bold(),
    )])
}

pub fn render_help_overlay(frame: &mut Frame, area: Rect, theme: &Theme) {
    let popup_area = centered_rect(60, 80, area);

    // Clear the area first
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(vec![Span::styled(
            "slurmtui - Keyboard Shortcuts",
            Style::default().bold(),
        )]),
        Line::from(""),
        section("Navigation", theme),
        Line::from("  j / Down       Move selection down"),
        Line::from("  k / Up         Move selection up"),
        Line::from("  g / Home       Jump to top"),
        Line::from("  G / End        Jump to bottom"),
        Line::from("  Ctrl+d / PgDn  Page down"),
        Line::from("  Ctrl+u / PgUp  Page up"),
        Line::from(""),
        section("Job Actions", theme),
        Line::from("  l              Follow standard output log"),
        Line::from("  e              Follow standard error log"),
        Line::from("  c              ssh to the job's node (current jobs)"),
        Line::from("  d              Delete job (current jobs)"),
        Line::from("  i              Show job info (s in the dialog prints it)"),
        Line::from(""),
        section("General", theme),
        Line::from("  o              Show past jobs"),
        Line::from("  Esc            Back to current jobs / close dialog"),
        Line::from("  s              Settings (Ctrl+S saves)"),
        Line::from("  r              Refresh now"),
        Line::from("  ?/F1           Show this help"),
        Line::from("  q              Quit application"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press ? or Esc to close this help",
            Style::default().fg(theme.border),
        )]),
    ];

    let help_para = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border_focused))
                .title(" Help "),
        )
        .style(Style::default().fg(theme.fg));

    frame.render_widget(help_para, popup_area);
}

/// Render the confirmation dialog
pub fn render_confirm_dialog(prompt: &str, frame: &mut Frame, area: Rect, theme: &Theme) {
    let popup_area = centered_rect(50, 40, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.warn))
        .title(" Confirm ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let mut lines: Vec<Line> = prompt
        .lines()
        .map(|line| Line::from(Span::styled(format!("  {line}"), Style::default().bold())))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("  Press "),
        Span::styled("[y]", Style::default().fg(theme.warn).bold()),
        Span::raw(" for yes, "),
        Span::styled("[n/Esc]", Style::default().fg(theme.border).bold()),
        Span::raw(" for no"),
    ]));

    let para = Paragraph::new(lines)
        .style(Style::default().fg(theme.fg))
        .wrap(Wrap { trim: false });
    frame.render_widget(para, inner);
}

/// Render the raw job JSON
pub fn render_info_popup(
    job_id: u64,
    json: &str,
    scroll: u16,
    frame: &mut Frame,
    area: Rect,
    theme: &Theme,
) {
    let popup_area = centered_rect(80, 85, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .title(format!(" Job {job_id} "))
        .title_bottom(Line::from(" s: print in terminal | Esc: close ").right_aligned());

    let para = Paragraph::new(json)
        .block(block)
        .style(Style::default().fg(theme.fg))
        .scroll((scroll, 0));
    frame.render_widget(para, popup_area);
}

/// Render the settings form
pub fn render_settings_form(form: &SettingsForm, frame: &mut Frame, area: Rect, theme: &Theme) {
    let popup_area = centered_rect(70, 80, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .title(" Settings ")
        .title_bottom(
            Line::from(" Up/Down: move | Ctrl+S: save | Esc: discard ").right_aligned(),
        );

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let mut lines = Vec::new();
    for (idx, (field, value)) in form.fields().enumerate() {
        let is_selected = idx == form.selected();
        let marker = if is_selected { "> " } else { "  " };
        let value_style = if is_selected {
            Style::default().fg(theme.selected_fg).bg(theme.selected_bg)
        } else {
            Style::default().fg(theme.fg)
        };
        let cursor = if is_selected { "_" } else { "" };

        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(theme.highlight)),
            Span::styled(format!("{:<24}", field.key), Style::default().bold()),
            Span::styled(format!("{value}{cursor}"), value_style),
        ]));
        lines.push(Line::from(Span::styled(
            format!("    {}", field.description),
            Style::default().fg(theme.border),
        )));
    }

    let para = Paragraph::new(lines);
    frame.render_widget(para, inner);
}

/// Render a notification toast
pub fn render_notice_toast(notice: &Notice, frame: &mut Frame, area: Rect, theme: &Theme) {
    // Position toast at bottom-right
    let toast_width = (notice.message.chars().count() + 4).min(60) as u16;
    let toast_area = Rect {
        x: area.width.saturating_sub(toast_width + 2),
        y: area.height.saturating_sub(5),
        width: toast_width.min(area.width),
        height: 3.min(area.height),
    };

    frame.render_widget(Clear, toast_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.running));

    let para = Paragraph::new(format!(" {} ", notice.message))
        .block(block)
        .style(Style::default().fg(theme.fg))
        .alignment(Alignment::Center);

    frame.render_widget(para, toast_area);
}
