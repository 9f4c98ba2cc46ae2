//! Summary pane rendering: one row per tag with current and peak totals

use super::{clamp_scroll, pane_block};
use crate::constants::TAG_COLUMN_WIDTH;
use crate::ui::theme::DEFAULT_THEME;
use crate::view::report::Scale;
use crate::view::summary::VirtualMemorySummary;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};

const AMOUNT_WIDTH: usize = 11;

/// Data needed to render the summary pane
pub struct SummaryRenderData<'a> {
    pub summary: Option<&'a VirtualMemorySummary>,
    pub scale: Scale,
}

fn amount(scale: Scale, bytes: u64) -> String {
    format!("{:>width$}", scale.format(bytes), width = AMOUNT_WIDTH)
}

/// Render the summary pane
pub fn render_summary_pane(
    frame: &mut Frame,
    area: Rect,
    data: SummaryRenderData,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Summary ", is_focused);

    let summary = match data.summary {
        Some(summary) if !summary.rows.is_empty() => summary,
        _ => {
            let paragraph = Paragraph::new("(nothing tracked)")
                .block(block)
                .style(Style::default().fg(DEFAULT_THEME.comment));
            frame.render_widget(paragraph, area);
            return;
        }
    };

    let header_style = Style::default()
        .fg(DEFAULT_THEME.comment)
        .add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::from(Span::styled(
        format!(
            " {:<tag$}{:>w$}{:>w$}{:>w$}{:>w$}",
            "Tag",
            "Reserved",
            "Committed",
            "Peak rsv",
            "Peak cmt",
            tag = TAG_COLUMN_WIDTH,
            w = AMOUNT_WIDTH
        ),
        header_style,
    ))];

    for row in &summary.rows {
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {:<width$}", row.tag.name(), width = TAG_COLUMN_WIDTH),
                Style::default().fg(DEFAULT_THEME.tag_name),
            ),
            Span::styled(amount(data.scale, row.reserved), Style::default().fg(DEFAULT_THEME.fg)),
            Span::styled(amount(data.scale, row.committed), Style::default().fg(DEFAULT_THEME.fg)),
            Span::styled(amount(data.scale, row.peak_reserved), Style::default().fg(DEFAULT_THEME.peak)),
            Span::styled(amount(data.scale, row.peak_committed), Style::default().fg(DEFAULT_THEME.peak)),
        ]));
    }

    lines.push(Line::from(vec![
        Span::styled(
            format!(" {:<width$}", "Total", width = TAG_COLUMN_WIDTH),
            header_style,
        ),
        Span::styled(amount(data.scale, summary.total_reserved()), header_style),
        Span::styled(amount(data.scale, summary.total_committed()), header_style),
    ]));

    let visible_height = clamp_scroll(lines.len(), area, scroll_offset);
    let items: Vec<ListItem> = lines
        .into_iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(ListItem::new)
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}
