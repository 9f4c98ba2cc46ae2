//! TUI pane rendering modules
//!
//! # Pane Modules
//!
//! - [`regions`]: reserved, mapped and committed rows of the selected space
//! - [`summary`]: per-tag reserved/committed table with peaks
//! - [`events`]: trace script with the current step highlighted
//! - [`status`]: status bar with keybindings and step position
//!
//! Each pane module exports a `render_*` function and, where the pane needs
//! more than a couple of inputs, a `*RenderData` struct.

pub mod events;
pub mod regions;
pub mod status;
pub mod summary;

pub use events::{render_events_pane, EventsRenderData};
pub use regions::{render_regions_pane, RegionsRenderData};
pub use status::{render_status_bar, StatusRenderData};
pub use summary::{render_summary_pane, SummaryRenderData};

use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    widgets::{Block, Borders},
};

/// Bordered block with the focus-dependent border style
pub(crate) fn pane_block(title: &str, is_focused: bool) -> Block<'_> {
    let border_style = if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    };

    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style)
}

/// Clamp `scroll_offset` so the last page stays full; returns the visible height
pub(crate) fn clamp_scroll(total_items: usize, area: Rect, scroll_offset: &mut usize) -> usize {
    let visible_height = area.height.saturating_sub(2).max(1) as usize; // Account for borders, min 1

    if total_items > visible_height {
        let max_scroll = total_items - visible_height;
        *scroll_offset = (*scroll_offset).min(max_scroll);
    } else {
        *scroll_offset = 0;
    }
    visible_height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_scroll() {
        let area = Rect::new(0, 0, 40, 12);
        let mut offset = 100;
        assert_eq!(clamp_scroll(30, area, &mut offset), 10);
        assert_eq!(offset, 20);

        let mut offset = 5;
        clamp_scroll(4, area, &mut offset);
        assert_eq!(offset, 0);
    }
}
