//! Address ranges tracked by the virtual memory view
//!
//! This module provides the value types the view stores:
//! - [`Range`]: a half-open interval `[start, start + size)` of addresses
//! - [`TrackedRange`]: a range plus the call stack and tag that created it
//! - [`TrackedOffsetRange`]: a tracked range mapped onto a physical address
//!
//! The pure range-set functions (overlap, union, split) live in [`ops`].
//!
//! # Physical Offsets
//!
//! A [`TrackedOffsetRange`] maps virtual bytes linearly onto physical bytes:
//! ```text
//! virtual   [start ............ end)
//! physical  [physical_address . physical_end)
//! ```
//! Cutting a sub-range out of it with [`Span::subrange`] slides the physical
//! address by the same delta the virtual start moved.

pub mod ops;

use crate::callstack::StackIndex;
use crate::tag::MemTag;
use std::fmt;

pub use ops::{adjacent, disjoint, overlap_of, overlaps, split, union_of, OverlapKind, SplitResult};

/// Addresses are plain 64-bit ordinals, never dereferenced
pub type Address = u64;

/// Half-open address interval `[start, start + size)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    start: Address,
    size: u64,
}

impl Range {
    /// Create a range. Panics if `start + size` overflows the address space.
    pub fn new(start: Address, size: u64) -> Self {
        assert!(
            start.checked_add(size).is_some(),
            "range end overflows address space: start 0x{:x}, size 0x{:x}",
            start,
            size
        );
        Range { start, size }
    }

    /// Create a range from its bounds (`end` exclusive)
    pub fn from_bounds(start: Address, end: Address) -> Self {
        assert!(end >= start, "range end 0x{:x} before start 0x{:x}", end, start);
        Range {
            start,
            size: end - start,
        }
    }

    /// The empty range at address zero
    pub const fn empty() -> Self {
        Range { start: 0, size: 0 }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn end(&self) -> Address {
        // Construction guarantees this cannot overflow
        self.start + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Check whether `addr` falls inside the range
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end()
    }

    /// Check whether `other` lies entirely inside this range
    pub fn encloses(&self, other: &Range) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:016x} - 0x{:016x})", self.start, self.end())
    }
}

/// Anything that covers an address range and can be cut into a sub-range
/// that keeps its provenance.
pub trait Span: Clone {
    fn range(&self) -> Range;

    /// Copy of `self` restricted to `[start, start + size)`, which must lie
    /// inside `self.range()`.
    fn subrange(&self, start: Address, size: u64) -> Self;

    fn start(&self) -> Address {
        self.range().start()
    }

    fn end(&self) -> Address {
        self.range().end()
    }
}

impl Span for Range {
    fn range(&self) -> Range {
        *self
    }

    fn subrange(&self, start: Address, size: u64) -> Self {
        Range::new(start, size)
    }
}

/// A reserved or committed range with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedRange {
    pub range: Range,
    pub stack: StackIndex,
    pub tag: MemTag,
}

impl TrackedRange {
    pub fn new(start: Address, size: u64, stack: StackIndex, tag: MemTag) -> Self {
        TrackedRange {
            range: Range::new(start, size),
            stack,
            tag,
        }
    }

    pub fn size(&self) -> u64 {
        self.range.size()
    }
}

impl Span for TrackedRange {
    fn range(&self) -> Range {
        self.range
    }

    fn subrange(&self, start: Address, size: u64) -> Self {
        TrackedRange {
            range: Range::new(start, size),
            ..*self
        }
    }
}

/// A tracked virtual range mapped onto a physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedOffsetRange {
    pub tracked: TrackedRange,
    pub physical_address: Address,
}

impl TrackedOffsetRange {
    pub fn new(
        start: Address,
        size: u64,
        physical_address: Address,
        stack: StackIndex,
        tag: MemTag,
    ) -> Self {
        assert!(
            physical_address.checked_add(size).is_some(),
            "physical end overflows address space: physical 0x{:x}, size 0x{:x}",
            physical_address,
            size
        );
        TrackedOffsetRange {
            tracked: TrackedRange::new(start, size, stack, tag),
            physical_address,
        }
    }

    pub fn size(&self) -> u64 {
        self.tracked.range.size()
    }

    pub fn stack(&self) -> StackIndex {
        self.tracked.stack
    }

    pub fn tag(&self) -> MemTag {
        self.tracked.tag
    }

    pub fn physical_end(&self) -> Address {
        self.physical_address + self.size()
    }

    /// The physical extent this view covers
    pub fn physical_range(&self) -> Range {
        Range::new(self.physical_address, self.size())
    }

    /// Translate a virtual address inside this view to its physical address
    pub fn to_physical(&self, addr: Address) -> Option<Address> {
        if self.tracked.range.contains(addr) {
            Some(self.physical_address + (addr - self.tracked.range.start()))
        } else {
            None
        }
    }
}

impl From<TrackedRange> for TrackedOffsetRange {
    /// Identity mapping until a view remaps it
    fn from(tracked: TrackedRange) -> Self {
        TrackedOffsetRange {
            physical_address: tracked.range.start(),
            tracked,
        }
    }
}

impl Span for TrackedOffsetRange {
    fn range(&self) -> Range {
        self.tracked.range
    }

    fn subrange(&self, start: Address, size: u64) -> Self {
        let delta = start - self.tracked.range.start();
        TrackedOffsetRange {
            tracked: self.tracked.subrange(start, size),
            physical_address: self.physical_address + delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        let r = Range::new(0x1000, 0x1000);
        assert_eq!(r.end(), 0x2000);
        assert!(r.contains(0x1fff));
        assert!(!r.contains(0x2000));
        assert!(r.encloses(&Range::new(0x1800, 0x800)));
        assert!(!r.encloses(&Range::new(0x1800, 0x801)));
    }

    #[test]
    #[should_panic(expected = "range end overflows")]
    fn test_range_overflow_is_fatal() {
        let _ = Range::new(u64::MAX, 2);
    }

    #[test]
    fn test_offset_range_defaults_to_identity() {
        let tracked = TrackedRange::new(0x4000, 0x100, StackIndex::EMPTY, MemTag::Test);
        let mapped = TrackedOffsetRange::from(tracked);
        assert_eq!(mapped.physical_address, 0x4000);
        assert_eq!(mapped.physical_end(), 0x4100);
    }

    #[test]
    fn test_subrange_slides_physical_address() {
        let mapped = TrackedOffsetRange::new(0x1000, 0x1000, 0x500000, StackIndex::EMPTY, MemTag::GC);
        let right = mapped.subrange(0x1600, 0xa00);
        assert_eq!(right.physical_address, 0x500600);
        assert_eq!(right.tag(), MemTag::GC);
        assert_eq!(mapped.to_physical(0x1010), Some(0x500010));
        assert_eq!(mapped.to_physical(0x2000), None);
    }
}
