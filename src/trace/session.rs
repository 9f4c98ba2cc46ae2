//! Trace replay with step history
//!
//! A [`Session`] feeds the events of a [`Trace`] into a fresh
//! [`VirtualMemoryView`], capturing a [`Snapshot`] of the report and the
//! per-space summaries after every step. The history can then be walked
//! forward and backward without replaying anything.

use super::errors::ReplayError;
use super::parse::{Trace, TraceEvent, TraceOp};
use crate::snapshot::{Snapshot, SnapshotManager, SpaceSummary};
use crate::view::space::PhysicalMemorySpace;
use crate::view::{NmtMode, VirtualMemoryView};
use log::{debug, warn};

pub struct Session {
    trace: Trace,
    view: VirtualMemoryView,
    history: SnapshotManager,
    /// Events applied to `view`; can run one ahead of `history` when a
    /// snapshot did not fit
    applied: usize,
    /// Index into `history` currently shown
    position: usize,
}

impl Session {
    /// Create a session with the initial (empty) state captured
    pub fn new(trace: Trace, mode: NmtMode, snapshot_limit: usize) -> Result<Self, ReplayError> {
        let mut session = Session {
            trace,
            view: VirtualMemoryView::initialize(mode),
            history: SnapshotManager::new(snapshot_limit),
            applied: 0,
            position: 0,
        };
        session.capture(None)?;
        Ok(session)
    }

    /// Apply every remaining event, capturing a snapshot after each.
    ///
    /// Stops at the first invalid event; the history up to that point stays
    /// available. An event whose snapshot does not fit stays applied and is
    /// not replayed by a later call.
    pub fn run(&mut self) -> Result<(), ReplayError> {
        while self.applied < self.trace.len() {
            let index = self.applied;
            let event = self.trace.events[index].clone();
            self.apply(&event)?;
            self.applied += 1;
            self.capture(Some(index))?;
        }
        self.position = self.history.len() - 1;
        Ok(())
    }

    /// Number of events applied to the view so far
    pub fn executed(&self) -> usize {
        self.applied
    }

    fn space(&self, name: &str, line: usize) -> Result<PhysicalMemorySpace, ReplayError> {
        self.view
            .space_by_name(name)
            .ok_or_else(|| ReplayError::UnknownSpace {
                name: name.to_string(),
                line,
            })
    }

    fn check_range(start: u64, size: u64, line: usize) -> Result<(), ReplayError> {
        match start.checked_add(size) {
            Some(_) => Ok(()),
            None => Err(ReplayError::AddressOverflow { start, size, line }),
        }
    }

    /// Validate and apply one event to the view
    fn apply(&mut self, event: &TraceEvent) -> Result<(), ReplayError> {
        let line = event.line;
        debug!("line {}: {}", line, event.text);

        match &event.op {
            TraceOp::RegisterSpace { name } => {
                if self.view.space_by_name(name).is_some() {
                    return Err(ReplayError::DuplicateSpace {
                        name: name.clone(),
                        line,
                    });
                }
                self.view.register_space(name);
            }
            TraceOp::Reserve {
                addr,
                size,
                tag,
                stack,
            } => {
                Self::check_range(*addr, *size, line)?;
                self.view.reserve_memory(*addr, *size, *tag, stack);
            }
            TraceOp::Release { addr, size } => {
                Self::check_range(*addr, *size, line)?;
                self.view.release_memory(*addr, *size);
            }
            TraceOp::Commit {
                space,
                offset,
                size,
                stack,
            } => {
                let space = self.space(space, line)?;
                Self::check_range(*offset, *size, line)?;
                self.view.commit_memory_into_space(space, *offset, *size, stack);
            }
            TraceOp::Uncommit {
                space,
                offset,
                size,
            } => {
                let space = self.space(space, line)?;
                Self::check_range(*offset, *size, line)?;
                self.view.uncommit_memory_into_space(space, *offset, *size);
            }
            TraceOp::AddView {
                space,
                addr,
                size,
                offset,
                tag,
                stack,
            } => {
                let space = self.space(space, line)?;
                Self::check_range(*addr, *size, line)?;
                Self::check_range(*offset, *size, line)?;
                self.view
                    .add_view_into_space(space, *addr, *size, *offset, *tag, stack);
            }
            TraceOp::RemoveView { space, addr, size } => {
                let space = self.space(space, line)?;
                Self::check_range(*addr, *size, line)?;
                self.view.remove_view_into_space(space, *addr, *size);
            }
            TraceOp::SetTag { addr, size, tag } => {
                Self::check_range(*addr, *size, line)?;
                self.view.set_tag(*addr, *size, *tag);
            }
        }
        Ok(())
    }

    fn capture(&mut self, event_index: Option<usize>) -> Result<(), ReplayError> {
        let summaries = self
            .view
            .spaces()
            .into_iter()
            .map(|(space, name)| SpaceSummary {
                space,
                name,
                summary: self.view.summary_snapshot(space),
            })
            .collect();
        let snapshot = Snapshot {
            event_index,
            rows: self.view.report_rows(),
            summaries,
        };

        self.history.push(snapshot).map_err(|message| {
            warn!("dropping snapshot: {}", message);
            ReplayError::SnapshotLimitExceeded { message }
        })
    }

    pub fn step_forward(&mut self) -> Result<(), ReplayError> {
        if self.position + 1 >= self.history.len() {
            return Err(ReplayError::HistoryOperationFailed {
                message: "already at the last step".to_string(),
            });
        }
        self.position += 1;
        Ok(())
    }

    pub fn step_backward(&mut self) -> Result<(), ReplayError> {
        if self.position == 0 {
            return Err(ReplayError::HistoryOperationFailed {
                message: "already at the first step".to_string(),
            });
        }
        self.position -= 1;
        Ok(())
    }

    pub fn rewind_to_start(&mut self) {
        self.position = 0;
    }

    pub fn jump_to_end(&mut self) {
        self.position = self.history.len().saturating_sub(1);
    }

    /// Snapshot at the current history position
    pub fn current(&self) -> Option<&Snapshot> {
        self.history.get(self.position)
    }

    /// Trace event that produced the current snapshot
    pub fn current_event(&self) -> Option<&TraceEvent> {
        self.current()
            .and_then(|s| s.event_index)
            .and_then(|i| self.trace.events.get(i))
    }

    pub fn history_position(&self) -> usize {
        self.position
    }

    pub fn total_snapshots(&self) -> usize {
        self.history.len()
    }

    /// Bytes used by the step history and its limit
    pub fn history_memory(&self) -> (usize, usize) {
        (self.history.memory_usage(), self.history.memory_limit())
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// The view in its final replayed state
    pub fn view(&self) -> &VirtualMemoryView {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::parse::parse_trace;
    use crate::tag::MemTag;

    const LIMIT: usize = 16 * 1024 * 1024;

    #[test]
    fn test_run_captures_every_step() {
        let trace = parse_trace(
            "reserve 0x1000 8K Test @0xa\n\
             commit Heap 0x1000 4K @0xb\n\
             release 0x1000 8K\n",
        )
        .unwrap();
        let mut session = Session::new(trace, NmtMode::Detail, LIMIT).unwrap();
        session.run().unwrap();

        assert_eq!(session.total_snapshots(), 4);
        assert_eq!(session.history_position(), 3);
        assert!(session.view().reserved_regions().is_empty());

        session.rewind_to_start();
        assert!(session.current_event().is_none());
        session.step_forward().unwrap();
        assert_eq!(session.current_event().map(|e| e.line), Some(1));

        let heap = session.view().heap();
        let summary = &session.current().unwrap().summary_for(heap).unwrap().summary;
        assert_eq!(summary.reserved(MemTag::Test), 8192);
        assert!(session.step_backward().is_ok());
        assert!(session.step_backward().is_err());
    }

    #[test]
    fn test_unknown_space_stops_replay() {
        let trace = parse_trace("reserve 0 4K Test\ncommit Nowhere 0 4K\n").unwrap();
        let mut session = Session::new(trace, NmtMode::Detail, LIMIT).unwrap();

        let err = session.run().unwrap_err();
        assert_eq!(
            err,
            ReplayError::UnknownSpace {
                name: "Nowhere".to_string(),
                line: 2
            }
        );
        assert_eq!(session.executed(), 1);
    }

    #[test]
    fn test_duplicate_space_and_overflow_rejected() {
        let trace = parse_trace("space Heap\n").unwrap();
        let mut session = Session::new(trace, NmtMode::Detail, LIMIT).unwrap();
        assert!(matches!(session.run(), Err(ReplayError::DuplicateSpace { line: 1, .. })));

        let trace = parse_trace("reserve 0xffffffffffffff00 0x1000 Test\n").unwrap();
        let mut session = Session::new(trace, NmtMode::Detail, LIMIT).unwrap();
        assert!(matches!(session.run(), Err(ReplayError::AddressOverflow { .. })));
    }
}
