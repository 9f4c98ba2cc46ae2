//! Region pane rendering
//!
//! Shows the report tree of one physical space: reservations at the top
//! level, views of each reservation below them and commits below the views.
//! Commits found through the identity mapping hang directly off their
//! reservation and are dimmed.

use super::{clamp_scroll, pane_block};
use crate::callstack::NativeCallStack;
use crate::ui::theme::DEFAULT_THEME;
use crate::view::report::{ReportRow, Scale};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};

/// Data needed to render the region pane
pub struct RegionsRenderData<'a> {
    /// Rows of the selected space, header excluded
    pub rows: &'a [ReportRow],
    /// None when the space is not registered yet at this step
    pub space_name: Option<&'a str>,
    pub scale: Scale,
}

fn row_style(row: &ReportRow) -> Style {
    match row {
        ReportRow::Space { .. } => Style::default().fg(DEFAULT_THEME.fg),
        ReportRow::Reserved { .. } => Style::default()
            .fg(DEFAULT_THEME.primary)
            .add_modifier(Modifier::BOLD),
        ReportRow::Mapped { .. } => Style::default().fg(DEFAULT_THEME.secondary),
        ReportRow::Committed { identity: false, .. } => Style::default().fg(DEFAULT_THEME.success),
        ReportRow::Committed { identity: true, .. } => Style::default()
            .fg(DEFAULT_THEME.success)
            .add_modifier(Modifier::DIM),
    }
}

fn stack_span(stack: &NativeCallStack) -> Span<'static> {
    let frames: Vec<String> = stack.frames().iter().map(|f| format!("0x{:x}", f)).collect();
    Span::styled(
        format!("  from {}", frames.join(" ")),
        Style::default().fg(DEFAULT_THEME.comment),
    )
}

/// Render the region pane
pub fn render_regions_pane(
    frame: &mut Frame,
    area: Rect,
    data: RegionsRenderData,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let title = match data.space_name {
        Some(name) => format!(" Regions: {} ", name),
        None => " Regions ".to_string(),
    };
    let block = pane_block(&title, is_focused);

    let placeholder = match data.space_name {
        None => Some("(space not registered at this step)"),
        Some(_) if data.rows.is_empty() => Some("(no reserved regions)"),
        Some(_) => None,
    };
    if let Some(text) = placeholder {
        let paragraph = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let visible_height = clamp_scroll(data.rows.len(), area, scroll_offset);

    let items: Vec<ListItem> = data
        .rows
        .iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|row| {
            let mut spans = vec![
                Span::raw(" ".repeat(row.depth() * 2 + 1)),
                Span::styled(row.describe(data.scale), row_style(row)),
            ];
            if let Some(stack) = row.stack().filter(|s| !s.is_empty()) {
                spans.push(stack_span(stack));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}
