use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use super::app::{App, InputField, InputMode};
use crate::clock::Clock;
use crate::models::FilterCategory;
use crate::storage::TaskStore;
use crate::view;

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Filters
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Status
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    render_filters(f, app, chunks[0]);

    let now = app.engine.clock().now();
    let sounding = app.engine.sounding();
    let rows: Vec<Row> = app
        .tasks
        .iter()
        .map(|t| {
            let overdue = view::is_overdue(t, now);
            let style = if sounding == Some(t.id) {
                Style::default().fg(Color::White).bg(Color::Red)
            } else if t.completed {
                Style::default().fg(Color::DarkGray)
            } else if overdue {
                Style::default().fg(Color::Red)
            } else if view::is_today(t, now) {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Green)
            };
            let (done, total) = t.subtask_progress();

            Row::new(vec![
                Cell::from(if t.pinned { "📌" } else { "" }),
                Cell::from(t.title.clone()),
                Cell::from(t.date.clone()),
                Cell::from(t.time.clone()),
                Cell::from(if total > 0 { format!("{}/{}", done, total) } else { String::new() }),
                Cell::from(if t.completed {
                    "Done"
                } else if overdue {
                    "Overdue"
                } else {
                    "Pending"
                }),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(3),
        Constraint::Min(20),
        Constraint::Length(12),
        Constraint::Length(6),
        Constraint::Length(9),
        Constraint::Length(8),
    ];

    let title = if app.search.is_empty() {
        format!("DailyFocus - {}", app.filter.label())
    } else {
        format!("DailyFocus - {} - \"{}\"", app.filter.label(), app.search)
    };
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["", "Title", "Date", "Time", "Subtasks", "Status"])
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                .bottom_margin(1),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, chunks[1], &mut app.state);

    render_status(f, app, chunks[2]);

    let help_text = match app.input_mode {
        InputMode::Normal => "q: Quit | a: Add | n: Title | x: Desc | t: Date | h: Time | s: Subtask | g: Suggest | p: Pin | Space: Done | d: Del | Tab: Filter | /: Search | Esc: Stop alarm | m: Mute | P: Preview",
        InputMode::Editing => "Enter: Save | Esc: Cancel",
        InputMode::Adding => "Enter: Next Step | Esc: Cancel",
        InputMode::Searching => "Type to filter | Enter: Keep | Esc: Clear",
        InputMode::ConfirmDelete => "y: Delete | any other key: Cancel",
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[3]);

    // Render Input Box if needed
    let title = match app.input_mode {
        InputMode::Adding => match app.add_state.step {
            0 => "Add Task: Enter Title",
            1 => "Add Task: Enter Date (YYYY-MM-DD, empty for today)",
            2 => "Add Task: Enter Time (HH:MM, empty for 09:00)",
            3 => "Add Task: Enter Description (Optional)",
            _ => "Add Task",
        },
        InputMode::Editing => match app.input_field {
            InputField::Title => "Edit Title",
            InputField::Description => "Edit Description (empty clears)",
            InputField::Date => "Edit Date (YYYY-MM-DD)",
            InputField::Time => "Edit Time (HH:MM)",
            InputField::Subtask => "New Subtask",
            InputField::None => "Edit",
        },
        InputMode::Searching => "Search",
        InputMode::ConfirmDelete => "Delete this task? (y/N)",
        InputMode::Normal => return,
    };

    let area = centered_rect(60, 3, f.area()); // Fixed height of 3 (border + 1 line)
    f.render_widget(Clear, area); // Clear the area first

    let input = Paragraph::new(app.input_buffer.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(input, area);
}

fn render_filters(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    for (i, &category) in FilterCategory::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" | "));
        }
        let label = format!("{} ({})", category.label(), app.counts.get(category));
        let style = if category == app.filter {
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(label, style));
    }
    let filters = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(filters, area);
}

/// Alarm banner while a reminder rings, otherwise the last status message.
fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let mut flags = Vec::new();
    if app.engine.is_muted() {
        flags.push("🔕 muted");
    }
    if !app.engine.player().is_unlocked() {
        flags.push("press any key to enable sound");
    }

    let (text, style) = match app.engine.sounding() {
        Some(id) => {
            let title = app.store.get(id).map(|t| t.title).unwrap_or_else(|| "Task".into());
            (
                format!("⏰ {} is due! Esc: stop alarm", title),
                Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD),
            )
        }
        None => (
            app.status.clone().unwrap_or_default(),
            Style::default().fg(Color::Yellow),
        ),
    };

    let status = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(flags.join(" | ")));
    f.render_widget(status, area);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let margin = r.height.saturating_sub(height) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(margin),
            Constraint::Length(height),
            Constraint::Length(margin),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
