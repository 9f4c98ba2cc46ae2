//! Range-set utilities
//!
//! Pure functions over [`Range`] values. None of them can fail on well-formed
//! ranges; [`split`] reports what happened through [`OverlapKind`] instead.

use super::{Range, Span};

/// `true` if the two ranges share at least one byte
pub fn overlaps(a: Range, b: Range) -> bool {
    a.start().max(b.start()) < a.end().min(b.end())
}

/// `true` if one range ends exactly where the other starts
pub fn adjacent(a: Range, b: Range) -> bool {
    a.start() == b.end() || b.start() == a.end()
}

pub fn disjoint(a: Range, b: Range) -> bool {
    !overlaps(a, b) && !adjacent(a, b)
}

/// Smallest range covering both `a` and `b`. The ranges must touch.
pub fn union_of(a: Range, b: Range) -> Range {
    assert!(
        !disjoint(a, b),
        "union of disjoint ranges {} and {}",
        a,
        b
    );
    Range::from_bounds(a.start().min(b.start()), a.end().max(b.end()))
}

/// Intersection of `a` and `b`, or the empty range if they do not overlap
pub fn overlap_of(a: Range, b: Range) -> Range {
    if !overlaps(a, b) {
        return Range::empty();
    }
    Range::from_bounds(a.start().max(b.start()), a.end().min(b.end()))
}

/// How a removal interacted with the range it was cut out of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapKind {
    EntirelyEnclosed,
    SplitInMiddle,
    ShortenedFromLeft,
    ShortenedFromRight,
    NoOverlap,
}

/// Outcome of [`split`]: the overlap kind plus up to two residual pieces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult<S> {
    pub kind: OverlapKind,
    pieces: [Option<S>; 2],
}

impl<S> SplitResult<S> {
    fn new(kind: OverlapKind, first: Option<S>, second: Option<S>) -> Self {
        SplitResult {
            kind,
            pieces: [first, second],
        }
    }

    /// Number of residual pieces (0, 1 or 2)
    pub fn len(&self) -> usize {
        self.pieces.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Residual pieces in address order
    pub fn pieces(&self) -> impl Iterator<Item = &S> {
        self.pieces.iter().flatten()
    }

    pub fn into_pieces(self) -> impl Iterator<Item = S> {
        self.pieces.into_iter().flatten()
    }
}

/// Subtract `to_remove` from `to_split`.
///
/// With `a..b` the range being split and `c..d` the range removed, the cases
/// are checked in this order:
///
/// ```text
/// EntirelyEnclosed     c <= a, b <= d          -> nothing left
/// SplitInMiddle        a < c, d < b            -> [a, c) and [d, b)
/// ShortenedFromLeft    c <= a < d < b          -> [d, b)
/// ShortenedFromRight   a < c < b <= d          -> [a, c)
/// NoOverlap            otherwise               -> caller keeps to_split
/// ```
///
/// Right-hand pieces slide any physical address by `d - a`.
pub fn split<S: Span>(to_split: &S, to_remove: Range) -> SplitResult<S> {
    let (a, b) = (to_split.start(), to_split.end());
    let (c, d) = (to_remove.start(), to_remove.end());

    if a >= c && b <= d {
        return SplitResult::new(OverlapKind::EntirelyEnclosed, None, None);
    }

    if c > a && d < b {
        let left = to_split.subrange(a, c - a);
        let right = to_split.subrange(d, b - d);
        return SplitResult::new(OverlapKind::SplitInMiddle, Some(left), Some(right));
    }

    if c <= a && a < d && d < b {
        let right = to_split.subrange(d, b - d);
        return SplitResult::new(OverlapKind::ShortenedFromLeft, Some(right), None);
    }

    if a < c && c < b && b <= d {
        let left = to_split.subrange(a, c - a);
        return SplitResult::new(OverlapKind::ShortenedFromRight, Some(left), None);
    }

    SplitResult::new(OverlapKind::NoOverlap, None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callstack::StackIndex;
    use crate::range::TrackedOffsetRange;
    use crate::tag::MemTag;

    fn r(start: u64, end: u64) -> Range {
        Range::from_bounds(start, end)
    }

    fn mapped(start: u64, end: u64, physical: u64) -> TrackedOffsetRange {
        TrackedOffsetRange::new(start, end - start, physical, StackIndex::EMPTY, MemTag::Test)
    }

    #[test]
    fn test_overlap_and_adjacency() {
        assert!(overlaps(r(0, 10), r(5, 15)));
        assert!(!overlaps(r(0, 10), r(10, 20)));
        assert!(adjacent(r(0, 10), r(10, 20)));
        assert!(adjacent(r(10, 20), r(0, 10)));
        assert!(disjoint(r(0, 10), r(11, 20)));
        assert!(!disjoint(r(0, 10), r(10, 20)));
    }

    #[test]
    fn test_union_and_intersection() {
        assert_eq!(union_of(r(0, 10), r(10, 20)), r(0, 20));
        assert_eq!(union_of(r(5, 30), r(0, 10)), r(0, 30));
        assert_eq!(overlap_of(r(0, 10), r(5, 30)), r(5, 10));
        assert!(overlap_of(r(0, 10), r(10, 30)).is_empty());
    }

    #[test]
    #[should_panic(expected = "union of disjoint ranges")]
    fn test_union_of_disjoint_is_fatal() {
        let _ = union_of(r(0, 10), r(20, 30));
    }

    #[test]
    fn test_split_in_middle_keeps_physical_correspondence() {
        let result = split(&mapped(0, 100, 0), r(50, 75));
        assert_eq!(result.kind, OverlapKind::SplitInMiddle);
        let pieces: Vec<_> = result.into_pieces().collect();
        assert_eq!(pieces, vec![mapped(0, 50, 0), mapped(75, 100, 75)]);
    }

    #[test]
    fn test_split_shortened_from_right() {
        let result = split(&mapped(0, 100, 0), r(50, 100));
        assert_eq!(result.kind, OverlapKind::ShortenedFromRight);
        assert_eq!(result.len(), 1);
        assert_eq!(result.pieces().next(), Some(&mapped(0, 50, 0)));
    }

    #[test]
    fn test_split_shortened_from_left() {
        let result = split(&mapped(0, 100, 1000), r(0, 50));
        assert_eq!(result.kind, OverlapKind::ShortenedFromLeft);
        assert_eq!(result.pieces().next(), Some(&mapped(50, 100, 1050)));
    }

    #[test]
    fn test_split_enclosed_and_disjoint() {
        let enclosed = split(&r(10, 20), r(0, 100));
        assert_eq!(enclosed.kind, OverlapKind::EntirelyEnclosed);
        assert!(enclosed.is_empty());

        let exact = split(&r(10, 20), r(10, 20));
        assert_eq!(exact.kind, OverlapKind::EntirelyEnclosed);

        let touching = split(&r(0, 1), r(1, 2));
        assert_eq!(touching.kind, OverlapKind::NoOverlap);
        assert_eq!(touching.len(), 0);
    }
}
