use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::tracker::status::ActivityColor;
use crate::ui::app::ViewState;

pub fn activity_color(color: ActivityColor) -> Color {
    match color {
        ActivityColor::Green => Color::Green,
        ActivityColor::Red => Color::Red,
    }
}

pub fn draw(view: &ViewState, f: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    let status_style = if view.tracking {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let status_widget = Paragraph::new(Line::from(Span::styled(view.status.clone(), status_style)))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status_widget, chunks[0]);

    let activity_line = match &view.activity {
        Some(activity) => Line::from(Span::styled(
            activity.label.clone(),
            Style::default().fg(activity_color(activity.color)),
        )),
        None => Line::from(Span::styled(
            "Activity Status: -",
            Style::default().fg(Color::DarkGray),
        )),
    };
    let activity_widget = Paragraph::new(activity_line)
        .block(Block::default().borders(Borders::ALL).title("Activity"));
    f.render_widget(activity_widget, chunks[1]);

    // Newest entries at the bottom, like a scrolling log.
    let visible = chunks[2].height.saturating_sub(2) as usize;
    let skip = view.history.len().saturating_sub(visible);
    let items: Vec<ListItem> = view
        .history
        .iter()
        .skip(skip)
        .map(|line| ListItem::new(Line::from(line.clone())))
        .collect();
    let history = List::new(items).block(Block::default().borders(Borders::ALL).title("Log"));
    f.render_widget(history, chunks[2]);

    let enabled = Style::default().fg(Color::Cyan);
    let disabled = Style::default().fg(Color::DarkGray);
    let (start_style, stop_style) = if view.tracking {
        (disabled, enabled)
    } else {
        (enabled, disabled)
    };
    let help = Line::from(vec![
        Span::styled("[s] Start", start_style),
        Span::raw("  "),
        Span::styled("[t] Stop", stop_style),
        Span::raw("  "),
        Span::styled("[q] Quit", enabled),
    ]);
    f.render_widget(Paragraph::new(help), chunks[3]);
}
