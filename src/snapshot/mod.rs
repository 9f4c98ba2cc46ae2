// Snapshot management for stepping through a replayed trace

use crate::view::report::ReportRow;
use crate::view::space::PhysicalMemorySpace;
use crate::view::summary::VirtualMemorySummary;

/// Summary of one physical space at a given step
#[derive(Debug, Clone)]
pub struct SpaceSummary {
    pub space: PhysicalMemorySpace,
    pub name: String,
    pub summary: VirtualMemorySummary,
}

/// State of the view after a step
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Index of the trace event just applied (None for the initial state)
    pub event_index: Option<usize>,
    pub rows: Vec<ReportRow>,
    pub summaries: Vec<SpaceSummary>,
}

impl Snapshot {
    /// Estimate the memory usage of this snapshot in bytes
    pub fn estimated_size(&self) -> usize {
        // Rough: fixed row size plus stack frames
        let row_size: usize = self
            .rows
            .iter()
            .map(|row| 64 + row.stack().map_or(0, |s| s.frames().len() * 8))
            .sum();

        let summary_size: usize = self
            .summaries
            .iter()
            .map(|s| 32 + s.name.len() + s.summary.rows.len() * 40)
            .sum();

        row_size + summary_size
    }

    /// Report rows belonging to `space`, header excluded
    pub fn rows_for(&self, space: PhysicalMemorySpace) -> &[ReportRow] {
        let start = self
            .rows
            .iter()
            .position(|row| matches!(row, ReportRow::Space { space: s, .. } if *s == space));
        let Some(start) = start else {
            return &[];
        };
        let start = start + 1;
        let end = self.rows[start..]
            .iter()
            .position(|row| matches!(row, ReportRow::Space { .. }))
            .map_or(self.rows.len(), |offset| start + offset);
        &self.rows[start..end]
    }

    pub fn summary_for(&self, space: PhysicalMemorySpace) -> Option<&SpaceSummary> {
        self.summaries.iter().find(|s| s.space == space)
    }
}

/// Manages step history for back-and-forth navigation
#[derive(Debug)]
pub struct SnapshotManager {
    snapshots: Vec<Snapshot>,
    max_memory: usize,
    current_memory: usize,
}

impl SnapshotManager {
    pub fn new(max_memory: usize) -> Self {
        SnapshotManager {
            snapshots: Vec::new(),
            max_memory,
            current_memory: 0,
        }
    }

    /// Add a snapshot to history
    pub fn push(&mut self, snapshot: Snapshot) -> Result<(), String> {
        let snapshot_size = snapshot.estimated_size();

        if self.current_memory + snapshot_size > self.max_memory {
            return Err(format!(
                "Snapshot memory limit exceeded: {} + {} > {}",
                self.current_memory, snapshot_size, self.max_memory
            ));
        }

        self.current_memory += snapshot_size;
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Get a snapshot by index
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    /// Get the number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Get current memory usage
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    /// Get max memory limit
    pub fn memory_limit(&self) -> usize {
        self.max_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callstack::NativeCallStack;
    use crate::range::Range;
    use crate::tag::MemTag;

    fn snapshot() -> Snapshot {
        Snapshot {
            event_index: Some(0),
            rows: vec![
                ReportRow::Space {
                    space: PhysicalMemorySpace { id: 0 },
                    name: "Heap".to_string(),
                },
                ReportRow::Reserved {
                    range: Range::new(0, 0x1000),
                    tag: MemTag::Test,
                    stack: NativeCallStack::new(&[1, 2]),
                },
                ReportRow::Space {
                    space: PhysicalMemorySpace { id: 1 },
                    name: "Class".to_string(),
                },
            ],
            summaries: Vec::new(),
        }
    }

    #[test]
    fn test_rows_for_space() {
        let snap = snapshot();
        assert_eq!(snap.rows_for(PhysicalMemorySpace { id: 0 }).len(), 1);
        assert!(snap.rows_for(PhysicalMemorySpace { id: 1 }).is_empty());
        assert!(snap.rows_for(PhysicalMemorySpace { id: 7 }).is_empty());
    }

    #[test]
    fn test_push_respects_memory_limit() {
        let snap = snapshot();
        let size = snap.estimated_size();
        let mut manager = SnapshotManager::new(size * 2);

        assert!(manager.push(snap.clone()).is_ok());
        assert!(manager.push(snap.clone()).is_ok());
        assert!(manager.push(snap).is_err());
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.memory_usage(), size * 2);
    }
}
