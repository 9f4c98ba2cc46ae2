//! Per-tag reserved/committed totals with peak tracking
//!
//! Each physical space keeps a running [`VirtualMemorySnapshot`]. Taking a
//! summary re-accumulates the totals from the region storages, overwrites the
//! current values with them and raises the peaks where the new totals exceed
//! them. Peaks are updated with a compare-and-swap loop so concurrent
//! summaries never lower them.

use crate::tag::MemTag;
use std::sync::atomic::{AtomicU64, Ordering};

/// A size counter that remembers the largest value it has held
#[derive(Debug, Default)]
pub struct MemoryCounter {
    current: AtomicU64,
    peak: AtomicU64,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Acquire)
    }

    /// Overwrite the current value
    pub fn set(&self, size: u64) {
        self.current.store(size, Ordering::Relaxed);
        self.update_peak(size);
    }

    /// Raise the peak to `size` unless someone already raised it further
    pub fn update_peak(&self, size: u64) {
        let mut peak = self.peak.load(Ordering::Relaxed);
        while size > peak {
            match self
                .peak
                .compare_exchange_weak(peak, size, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }
}

/// Running per-tag counters for one physical space
#[derive(Debug)]
pub struct VirtualMemorySnapshot {
    reserved: [MemoryCounter; MemTag::COUNT],
    committed: [MemoryCounter; MemTag::COUNT],
}

impl Default for VirtualMemorySnapshot {
    fn default() -> Self {
        VirtualMemorySnapshot {
            reserved: std::array::from_fn(|_| MemoryCounter::new()),
            committed: std::array::from_fn(|_| MemoryCounter::new()),
        }
    }
}

impl VirtualMemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserved(&self, tag: MemTag) -> &MemoryCounter {
        &self.reserved[tag.index()]
    }

    pub fn committed(&self, tag: MemTag) -> &MemoryCounter {
        &self.committed[tag.index()]
    }

    /// Store freshly accumulated totals, raising peaks as needed.
    ///
    /// The returned current values are the given totals, not a re-read of
    /// the shared counters. Tags that never held memory are skipped.
    pub fn record(
        &self,
        reserved: &[u64; MemTag::COUNT],
        committed: &[u64; MemTag::COUNT],
    ) -> VirtualMemorySummary {
        let rows = MemTag::ALL
            .iter()
            .map(|&tag| {
                let (r, c) = (reserved[tag.index()], committed[tag.index()]);
                self.reserved(tag).set(r);
                self.committed(tag).set(c);
                TagSummary {
                    tag,
                    reserved: r,
                    committed: c,
                    peak_reserved: self.reserved(tag).peak(),
                    peak_committed: self.committed(tag).peak(),
                }
            })
            .filter(|row| row.peak_reserved > 0 || row.peak_committed > 0)
            .collect();
        VirtualMemorySummary { rows }
    }
}

/// Totals for one tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSummary {
    pub tag: MemTag,
    pub reserved: u64,
    pub committed: u64,
    pub peak_reserved: u64,
    pub peak_committed: u64,
}

/// Plain-data result of a summary snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualMemorySummary {
    pub rows: Vec<TagSummary>,
}

impl VirtualMemorySummary {
    pub fn get(&self, tag: MemTag) -> Option<&TagSummary> {
        self.rows.iter().find(|row| row.tag == tag)
    }

    pub fn reserved(&self, tag: MemTag) -> u64 {
        self.get(tag).map_or(0, |row| row.reserved)
    }

    pub fn committed(&self, tag: MemTag) -> u64 {
        self.get(tag).map_or(0, |row| row.committed)
    }

    pub fn total_reserved(&self) -> u64 {
        self.rows.iter().fold(0, |acc, row| acc.saturating_add(row.reserved))
    }

    pub fn total_committed(&self) -> u64 {
        self.rows.iter().fold(0, |acc, row| acc.saturating_add(row.committed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_peak_survives_lower_value() {
        let counter = MemoryCounter::new();
        counter.set(100);
        counter.set(40);
        assert_eq!(counter.current(), 40);
        assert_eq!(counter.peak(), 100);
        counter.set(150);
        assert_eq!(counter.peak(), 150);
    }

    #[test]
    fn test_concurrent_peak_updates_keep_maximum() {
        let counter = Arc::new(MemoryCounter::new());
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for i in 0..1000u64 {
                        counter.update_peak(t * 1000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.peak(), 7999);
    }

    #[test]
    fn test_record_and_summarize() {
        let snapshot = VirtualMemorySnapshot::new();
        let mut reserved = [0u64; MemTag::COUNT];
        let mut committed = [0u64; MemTag::COUNT];
        reserved[MemTag::Test.index()] = 0x2000;
        committed[MemTag::Test.index()] = 0x1000;
        snapshot.record(&reserved, &committed);

        reserved[MemTag::Test.index()] = 0x1000;
        committed[MemTag::Test.index()] = 0;
        let summary = snapshot.record(&reserved, &committed);

        let row = summary.get(MemTag::Test).unwrap();
        assert_eq!(row.reserved, 0x1000);
        assert_eq!(row.committed, 0);
        assert_eq!(row.peak_reserved, 0x2000);
        assert_eq!(row.peak_committed, 0x1000);
        assert!(summary.get(MemTag::GC).is_none());
        assert_eq!(snapshot.reserved(MemTag::Test).current(), 0x1000);
    }

    #[test]
    fn test_totals_saturate() {
        let snapshot = VirtualMemorySnapshot::new();
        let mut reserved = [0u64; MemTag::COUNT];
        reserved[MemTag::Test.index()] = u64::MAX;
        reserved[MemTag::GC.index()] = 1;
        let summary = snapshot.record(&reserved, &[0u64; MemTag::COUNT]);
        assert_eq!(summary.total_reserved(), u64::MAX);
    }
}
