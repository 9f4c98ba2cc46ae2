//! Events pane rendering

use super::{clamp_scroll, pane_block};
use crate::trace::TraceEvent;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};

/// Data needed to render the events pane
pub struct EventsRenderData<'a> {
    pub events: &'a [TraceEvent],
    /// Event that produced the shown snapshot
    pub current: Option<usize>,
    /// Events replayed successfully; later ones were never applied
    pub executed: usize,
}

/// Render the events pane
pub fn render_events_pane(
    frame: &mut Frame,
    area: Rect,
    data: EventsRenderData,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Trace ", is_focused);

    if data.events.is_empty() {
        let paragraph = Paragraph::new("(empty trace)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let line_width = data.events.last().map_or(1, |e| e.line.to_string().len());
    let visible_height = clamp_scroll(data.events.len(), area, scroll_offset);

    let items: Vec<ListItem> = data
        .events
        .iter()
        .enumerate()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|(i, event)| {
            let is_current = data.current == Some(i);
            let text_style = if is_current {
                Style::default()
                    .fg(DEFAULT_THEME.fg)
                    .bg(DEFAULT_THEME.current_line_bg)
                    .add_modifier(Modifier::BOLD)
            } else if i == data.executed {
                // first event that failed to replay
                Style::default().fg(DEFAULT_THEME.error)
            } else if i > data.executed {
                Style::default().fg(DEFAULT_THEME.comment)
            } else {
                Style::default().fg(DEFAULT_THEME.fg)
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    if is_current { "▶ " } else { "  " },
                    Style::default().fg(DEFAULT_THEME.address),
                ),
                Span::styled(
                    format!("{:>width$} ", event.line, width = line_width),
                    Style::default().fg(DEFAULT_THEME.comment),
                ),
                Span::styled(event.text.clone(), text_style),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}
