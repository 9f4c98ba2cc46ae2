//! Main TUI application state and logic

use crate::constants::SCROLL_STEP;
use crate::trace::Session;
use crate::view::report::Scale;
use crate::view::space::PhysicalMemorySpace;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

/// Lines kept above the current event when the trace pane follows a step
const EVENT_CONTEXT_LINES: usize = 3;

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Regions,
    Summary,
    Events,
}

impl FocusedPane {
    /// Move focus to the next pane (regions -> summary -> events)
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Regions => FocusedPane::Summary,
            FocusedPane::Summary => FocusedPane::Events,
            FocusedPane::Events => FocusedPane::Regions,
        }
    }
}

/// The main application state
pub struct App {
    /// The replayed trace
    pub session: Session,

    /// Unit for every displayed size
    pub scale: Scale,

    /// Space whose regions and summary are shown
    pub selected_space: PhysicalMemorySpace,

    /// Currently focused pane
    pub focused_pane: FocusedPane,

    /// Per-pane scroll offsets
    pub regions_scroll: usize,
    pub summary_scroll: usize,
    pub events_scroll: usize,

    /// Whether the app should quit
    pub should_quit: bool,

    /// Status message to display
    pub status_message: String,
}

impl App {
    /// Create a new app over a replayed session.
    ///
    /// `space` picks the initially shown space by name; unknown names fall
    /// back to the Heap space.
    pub fn new(session: Session, scale: Scale, space: Option<&str>) -> Self {
        let view = session.view();
        let (selected_space, status_message) = match space {
            None => (view.heap(), String::from("Ready!")),
            Some(name) => match view.space_by_name(name) {
                Some(found) => (found, String::from("Ready!")),
                None => (
                    view.heap(),
                    format!("Unknown space '{}', showing {}", name, view.space_name(view.heap())),
                ),
            },
        };

        let mut app = App {
            session,
            scale,
            selected_space,
            focused_pane: FocusedPane::Regions,
            regions_scroll: 0,
            summary_scroll: 0,
            events_scroll: 0,
            should_quit: false,
            status_message,
        };
        app.follow_current_event();
        app
    }

    /// Run the TUI application
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }

        Ok(())
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(size);

        let pane_area = main_chunks[0];
        let status_area = main_chunks[1];

        // Left: regions | Right: summary (top), trace (bottom)
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(pane_area);

        let right_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(columns[1]);

        let snapshot = self.session.current();
        let space = snapshot.and_then(|s| s.summary_for(self.selected_space));
        // None until the selected space is registered
        let space_name = space.map(|s| s.name.as_str());
        let summary = space.map(|s| &s.summary);
        let rows = snapshot.map_or(&[][..], |s| s.rows_for(self.selected_space));
        let current_event = snapshot.and_then(|s| s.event_index);

        super::panes::render_regions_pane(
            frame,
            columns[0],
            super::panes::RegionsRenderData {
                rows,
                space_name,
                scale: self.scale,
            },
            self.focused_pane == FocusedPane::Regions,
            &mut self.regions_scroll,
        );

        super::panes::render_summary_pane(
            frame,
            right_rows[0],
            super::panes::SummaryRenderData {
                summary,
                scale: self.scale,
            },
            self.focused_pane == FocusedPane::Summary,
            &mut self.summary_scroll,
        );

        super::panes::render_events_pane(
            frame,
            right_rows[1],
            super::panes::EventsRenderData {
                events: &self.session.trace().events,
                current: current_event,
                executed: self.session.executed(),
            },
            self.focused_pane == FocusedPane::Events,
            &mut self.events_scroll,
        );

        super::panes::render_status_bar(
            frame,
            status_area,
            super::panes::StatusRenderData {
                message: &self.status_message,
                current_step: self.session.history_position(),
                total_steps: self.session.total_snapshots(),
                space_name: space_name.unwrap_or("-"),
                scale: self.scale,
                replay_failed: self.session.executed() < self.session.trace().len(),
            },
        );
    }

    /// Handle keyboard events
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.cycle_space();
            }
            KeyCode::Left => self.step_backward(),
            KeyCode::Right => self.step_forward(),
            KeyCode::Up => {
                let scroll = self.focused_scroll();
                *scroll = scroll.saturating_sub(SCROLL_STEP);
            }
            KeyCode::Down => {
                // Render clamps the offset against the pane height
                let scroll = self.focused_scroll();
                *scroll = scroll.saturating_add(SCROLL_STEP);
            }
            KeyCode::Enter => {
                self.session.jump_to_end();
                self.status_message = "Jumped to end".to_string();
                self.follow_current_event();
            }
            KeyCode::Backspace => {
                self.session.rewind_to_start();
                self.status_message = "Jumped to start".to_string();
                self.follow_current_event();
            }
            _ => {}
        }
    }

    fn focused_scroll(&mut self) -> &mut usize {
        match self.focused_pane {
            FocusedPane::Regions => &mut self.regions_scroll,
            FocusedPane::Summary => &mut self.summary_scroll,
            FocusedPane::Events => &mut self.events_scroll,
        }
    }

    /// Show the next space of the final replayed state
    fn cycle_space(&mut self) {
        let spaces = self.session.view().spaces();
        let position = spaces
            .iter()
            .position(|(space, _)| *space == self.selected_space)
            .unwrap_or(0);
        if let Some((space, name)) = spaces.get((position + 1) % spaces.len().max(1)) {
            self.selected_space = *space;
            self.regions_scroll = 0;
            self.summary_scroll = 0;
            self.status_message = format!("Showing space '{}'", name);
        }
    }

    /// Scroll the trace pane so the current event is in view
    fn follow_current_event(&mut self) {
        let current = self.session.current().and_then(|s| s.event_index);
        self.events_scroll = current.map_or(0, |i| i.saturating_sub(EVENT_CONTEXT_LINES));
    }

    fn step_forward(&mut self) {
        match self.session.step_forward() {
            Ok(()) => {
                self.status_message = match self.session.current_event() {
                    Some(event) => format!("Applied line {}", event.line),
                    None => "Stepped forward".to_string(),
                };
                self.follow_current_event();
            }
            Err(e) => {
                self.status_message = format!("Cannot step forward: {}", e);
            }
        }
    }

    fn step_backward(&mut self) {
        match self.session.step_backward() {
            Ok(()) => {
                self.status_message = "Stepped backward".to_string();
                self.follow_current_event();
            }
            Err(e) => {
                self.status_message = format!("Cannot step backward: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::parse_trace;
    use crate::view::NmtMode;
    use crossterm::event::KeyModifiers;

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn app(space: Option<&str>) -> App {
        let trace = parse_trace(
            "space Class\n\
             reserve 0x1000 8K Test\n\
             commit Class 0 4K\n",
        )
        .unwrap();
        let mut session = Session::new(trace, NmtMode::Detail, 1 << 20).unwrap();
        session.run().unwrap();
        session.rewind_to_start();
        App::new(session, Scale::KB, space)
    }

    #[test]
    fn test_stepping_and_jumps() {
        let mut app = app(None);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.session.history_position(), 1);
        assert_eq!(app.status_message, "Applied line 1");

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.history_position(), 3);
        press(&mut app, KeyCode::Right);
        assert!(app.status_message.starts_with("Cannot step forward"));

        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.session.history_position(), 0);
    }

    #[test]
    fn test_space_selection() {
        let mut app = app(Some("Class"));
        assert_eq!(app.selected_space.id, 1);
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.selected_space, app.session.view().heap());

        let app = self::app(Some("Nowhere"));
        assert!(app.status_message.starts_with("Unknown space 'Nowhere'"));
    }

    #[test]
    fn test_focus_and_scroll() {
        let mut app = app(None);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focused_pane, FocusedPane::Summary);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.summary_scroll, 1);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.summary_scroll, 0);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
