//! Job table rendering, shared by the current and history views.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use crate::columns::Column;
use crate::table::TableModel;
use crate::tui::theme::Theme;

use super::widgets::{calculate_scroll_offset, create_table_header};

/// Widest a fixed column may grow
const MAX_COLUMN_WIDTH: u16 = 40;

pub fn render_job_table(table: &TableModel, label: &str, frame: &mut Frame, area: Rect, theme: &Theme) {
    let title = if table.is_loaded() {
        format!(" {} | {} ", label, table.title())
    } else {
        format!(" {label} ")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .title(title);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !table.is_loaded() {
        let para = Paragraph::new("Loading jobs...")
            .style(Style::default().fg(theme.border))
            .alignment(Alignment::Center);
        frame.render_widget(para, inner);
        return;
    }

    let headers: Vec<&str> = table.columns().iter().map(|c| c.header()).collect();
    let header = create_table_header(&headers, theme);

    let available_height = inner.height.saturating_sub(1) as usize; // -1 for header
    let selected = table.cursor();
    let rows = table.rows();
    let scroll_offset = calculate_scroll_offset(selected, available_height, rows.len());

    let state_index = table.columns().iter().position(|c| *c == Column::State);

    let visible: Vec<Row> = rows
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(available_height)
        .map(|(idx, row)| {
            let cells = row.cells.iter().enumerate().map(|(col, text)| {
                let mut style = Style::default();
                if Some(col) == state_index {
                    style = style.fg(theme.job_state_color(row.state));
                    if row.pending_delete {
                        style = style.fg(theme.failed).add_modifier(Modifier::ITALIC);
                    }
                }
                Cell::from(text.as_str()).style(style)
            });

            let mut row_style = Style::default().fg(theme.fg);
            if row.job_id.is_none() {
                row_style = row_style.fg(theme.border);
            }
            if idx == selected {
                row_style = row_style.bg(theme.selected_bg).fg(theme.selected_fg).bold();
            }
            Row::new(cells).style(row_style)
        })
        .collect();

    let widths = column_widths(table);
    let widget = Table::new(visible, widths)
        .header(header)
        .column_spacing(2);

    frame.render_widget(widget, inner);
}

/// Size each column to its widest cell; the name column takes the slack.
fn column_widths(table: &TableModel) -> Vec<Constraint> {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let widest = table
                .rows()
                .iter()
                .filter_map(|row| row.cells.get(idx))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(column.header().len());
            let widest = u16::try_from(widest).unwrap_or(MAX_COLUMN_WIDTH);
            match column {
                Column::Name => Constraint::Min(widest.min(MAX_COLUMN_WIDTH)),
                _ => Constraint::Length(widest.min(MAX_COLUMN_WIDTH)),
            }
        })
        .collect()
}
