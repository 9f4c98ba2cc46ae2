//! Growable storage for tracked regions
//!
//! Entries are appended in insertion order; callers re-sort with
//! [`RegionStorage::sort_by_start`] and coalesce with [`RegionStorage::merge`]
//! before anything relies on address order.

use crate::callstack::{CallStackStorage, StackIndex};
use crate::range::{
    disjoint, overlap_of, overlaps, split, union_of, OverlapKind, Range, Span, TrackedOffsetRange,
    TrackedRange,
};
use crate::tag::MemTag;
use rustc_hash::FxHashMap;

/// A stored region: a span with provenance that can be coalesced with its
/// neighbours.
pub trait Region: Span {
    fn stack(&self) -> StackIndex;
    fn tag(&self) -> MemTag;
    fn set_tag(&mut self, tag: MemTag);

    /// Extra merge condition beyond touching ranges and equal provenance
    fn compatible_with(&self, _other: &Self) -> bool {
        true
    }

    /// Grow `self` to cover `other`
    fn absorb(&mut self, other: &Self);

    /// Whether `other` may be merged into `self`
    fn can_merge(&self, other: &Self, stacks: &CallStackStorage) -> bool {
        !disjoint(self.range(), other.range())
            && self.tag() == other.tag()
            && stacks.equal_stacks(self.stack(), other.stack())
            && self.compatible_with(other)
    }
}

impl Region for TrackedRange {
    fn stack(&self) -> StackIndex {
        self.stack
    }

    fn tag(&self) -> MemTag {
        self.tag
    }

    fn set_tag(&mut self, tag: MemTag) {
        self.tag = tag;
    }

    fn absorb(&mut self, other: &Self) {
        self.range = union_of(self.range, other.range);
    }
}

impl Region for TrackedOffsetRange {
    fn stack(&self) -> StackIndex {
        self.tracked.stack
    }

    fn tag(&self) -> MemTag {
        self.tracked.tag
    }

    fn set_tag(&mut self, tag: MemTag) {
        self.tracked.tag = tag;
    }

    /// Physical extents must touch as well, with `other` continuing the same
    /// linear mapping
    fn compatible_with(&self, other: &Self) -> bool {
        let virtual_delta = i128::from(other.start()) - i128::from(self.start());
        let physical_delta =
            i128::from(other.physical_address) - i128::from(self.physical_address);
        virtual_delta == physical_delta
            && !disjoint(self.physical_range(), other.physical_range())
    }

    fn absorb(&mut self, other: &Self) {
        let physical = union_of(self.physical_range(), other.physical_range());
        self.tracked.range = union_of(self.tracked.range, other.tracked.range);
        self.physical_address = physical.start();
    }
}

/// Insertion-ordered, explicitly sorted collection of regions
#[derive(Debug, Clone)]
pub struct RegionStorage<R> {
    entries: Vec<R>,
}

impl<R> Default for RegionStorage<R> {
    fn default() -> Self {
        RegionStorage { entries: Vec::new() }
    }
}

impl<R: Region> RegionStorage<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Zero-size entries are dropped.
    pub fn push(&mut self, entry: R) {
        if !entry.range().is_empty() {
            self.entries.push(entry);
        }
    }

    /// Most recently pushed entry, which is not necessarily the highest address
    pub fn last_mut(&mut self) -> Option<&mut R> {
        self.entries.last_mut()
    }

    pub fn sort_by_start(&mut self) {
        self.entries.sort_unstable_by_key(|e| e.start());
    }

    /// Coalesce touching entries with equal tag and stack.
    ///
    /// Expects sorted input. Each entry is merged into the latest surviving
    /// entry with the same provenance when the two touch; since survivors of
    /// one provenance never touch each other, the latest one is the only
    /// candidate an entry further right can reach.
    pub fn merge(&mut self, stacks: &CallStackStorage) {
        let mut merged: Vec<R> = Vec::with_capacity(self.entries.len());
        let mut latest: FxHashMap<(MemTag, StackIndex), usize> = FxHashMap::default();

        for entry in self.entries.drain(..) {
            let key = (entry.tag(), entry.stack());
            if let Some(&j) = latest.get(&key) {
                let candidate = &mut merged[j];
                if candidate.can_merge(&entry, stacks) {
                    candidate.absorb(&entry);
                    continue;
                }
            }
            latest.insert(key, merged.len());
            merged.push(entry);
        }

        self.entries = merged;
    }

    /// Cut `range` out of every entry, keeping the residual pieces.
    ///
    /// Replacement entries are collected into a new sequence that replaces
    /// the old one once the scan is done. Returns the number of entries that
    /// were shortened, split or removed.
    pub fn remove_range(&mut self, range: Range) -> usize {
        let mut touched = 0;
        let mut kept = Vec::with_capacity(self.entries.len() + 1);

        for entry in self.entries.drain(..) {
            let result = split(&entry, range);
            if result.kind == OverlapKind::NoOverlap {
                kept.push(entry);
            } else {
                touched += 1;
                kept.extend(result.into_pieces());
            }
        }

        self.entries = kept;
        touched
    }

    /// Give every byte of `range` covered by an entry the tag `tag`.
    ///
    /// Overlapping entries are split; the overlapping piece keeps its stack.
    pub fn retag_range(&mut self, range: Range, tag: MemTag) -> usize {
        let mut touched = 0;
        let mut kept = Vec::with_capacity(self.entries.len() + 2);

        for entry in self.entries.drain(..) {
            if !overlaps(entry.range(), range) {
                kept.push(entry);
                continue;
            }
            touched += 1;
            let inside = overlap_of(entry.range(), range);
            let mut retagged = entry.subrange(inside.start(), inside.size());
            retagged.set_tag(tag);
            kept.extend(split(&entry, range).into_pieces());
            kept.push(retagged);
        }

        self.entries = kept;
        touched
    }

    /// Entries overlapping `range`, in storage order
    pub fn overlapping(&self, range: Range) -> impl Iterator<Item = &R> {
        self.entries.iter().filter(move |e| overlaps(e.range(), range))
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[R] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callstack::NativeCallStack;

    fn tracked(start: u64, end: u64, stack: StackIndex, tag: MemTag) -> TrackedRange {
        TrackedRange::new(start, end - start, stack, tag)
    }

    fn setup() -> (CallStackStorage, StackIndex, StackIndex) {
        let mut stacks = CallStackStorage::new(true);
        let a = stacks.push(&NativeCallStack::new(&[0xa]));
        let b = stacks.push(&NativeCallStack::new(&[0xb]));
        (stacks, a, b)
    }

    #[test]
    fn test_merge_adjacent_same_provenance() {
        let (stacks, a, _) = setup();
        let mut storage = RegionStorage::new();
        storage.push(tracked(200, 300, a, MemTag::Test));
        storage.push(tracked(0, 100, a, MemTag::Test));
        storage.push(tracked(100, 200, a, MemTag::Test));
        storage.sort_by_start();
        storage.merge(&stacks);

        assert_eq!(storage.as_slice(), &[tracked(0, 300, a, MemTag::Test)]);
    }

    #[test]
    fn test_merge_keeps_different_provenance_apart() {
        let (stacks, a, b) = setup();
        let mut storage = RegionStorage::new();
        storage.push(tracked(0, 100, a, MemTag::Test));
        storage.push(tracked(100, 200, b, MemTag::Test));
        storage.push(tracked(200, 300, a, MemTag::GC));
        storage.sort_by_start();
        storage.merge(&stacks);

        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn test_merge_reaches_past_interleaved_entry() {
        let (stacks, a, b) = setup();
        let mut storage = RegionStorage::new();
        storage.push(tracked(0, 100, a, MemTag::Test));
        storage.push(tracked(10, 20, b, MemTag::Test));
        storage.push(tracked(50, 150, a, MemTag::Test));
        storage.sort_by_start();
        storage.merge(&stacks);

        assert_eq!(
            storage.as_slice(),
            &[tracked(0, 150, a, MemTag::Test), tracked(10, 20, b, MemTag::Test)]
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (stacks, a, b) = setup();
        let mut storage = RegionStorage::new();
        for (i, stack) in [a, b, a, a, b].into_iter().enumerate() {
            let start = i as u64 * 50;
            storage.push(tracked(start, start + 80, stack, MemTag::Test));
        }
        storage.sort_by_start();
        storage.merge(&stacks);
        let once = storage.as_slice().to_vec();
        storage.merge(&stacks);
        assert_eq!(storage.as_slice(), once.as_slice());
    }

    #[test]
    fn test_offset_ranges_need_touching_physical_extents() {
        let (stacks, a, _) = setup();
        let mut storage = RegionStorage::new();
        storage.push(TrackedOffsetRange::new(0, 100, 1000, a, MemTag::Test));
        storage.push(TrackedOffsetRange::new(100, 100, 1100, a, MemTag::Test));
        storage.push(TrackedOffsetRange::new(200, 100, 9000, a, MemTag::Test));
        storage.sort_by_start();
        storage.merge(&stacks);

        assert_eq!(
            storage.as_slice(),
            &[
                TrackedOffsetRange::new(0, 200, 1000, a, MemTag::Test),
                TrackedOffsetRange::new(200, 100, 9000, a, MemTag::Test),
            ]
        );
    }

    #[test]
    fn test_offset_ranges_in_reverse_physical_order_stay_apart() {
        let (stacks, a, _) = setup();
        let mut storage = RegionStorage::new();
        storage.push(TrackedOffsetRange::new(0x1000, 0x1000, 0x501000, a, MemTag::Test));
        storage.push(TrackedOffsetRange::new(0x2000, 0x1000, 0x500000, a, MemTag::Test));
        storage.sort_by_start();
        storage.merge(&stacks);

        assert_eq!(storage.len(), 2);
        assert_eq!(storage.as_slice()[0].physical_address, 0x501000);
    }

    #[test]
    fn test_remove_range_splits_entries() {
        let (_, a, _) = setup();
        let mut storage = RegionStorage::new();
        storage.push(tracked(0, 100, a, MemTag::Test));
        storage.push(tracked(200, 300, a, MemTag::Test));

        let touched = storage.remove_range(Range::from_bounds(50, 250));
        storage.sort_by_start();

        assert_eq!(touched, 2);
        assert_eq!(
            storage.as_slice(),
            &[tracked(0, 50, a, MemTag::Test), tracked(250, 300, a, MemTag::Test)]
        );
    }

    #[test]
    fn test_retag_range_splits_off_new_tag() {
        let (stacks, a, _) = setup();
        let mut storage = RegionStorage::new();
        storage.push(tracked(0, 300, a, MemTag::Test));

        storage.retag_range(Range::from_bounds(100, 200), MemTag::GC);
        storage.sort_by_start();
        storage.merge(&stacks);

        assert_eq!(
            storage.as_slice(),
            &[
                tracked(0, 100, a, MemTag::Test),
                tracked(100, 200, a, MemTag::GC),
                tracked(200, 300, a, MemTag::Test),
            ]
        );
    }

    #[test]
    fn test_zero_size_push_is_dropped() {
        let mut storage: RegionStorage<TrackedRange> = RegionStorage::new();
        storage.push(tracked(10, 10, StackIndex::EMPTY, MemTag::Test));
        assert!(storage.is_empty());
    }
}
