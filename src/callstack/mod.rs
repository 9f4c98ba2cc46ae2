//! Call-stack storage
//!
//! Captured stacks are interned once and referred to by a small
//! [`StackIndex`] handle, so thousands of tracked ranges created from the same
//! call site share one stored stack.
//!
//! Storage is append-only: a handle stays valid for the lifetime of the
//! storage. In summary mode nothing is stored and every push yields
//! [`StackIndex::EMPTY`].

use crate::range::Address;
use rustc_hash::FxHashMap;
use std::fmt;

/// Maximum number of frames kept per stack
pub const NMT_TRACKING_STACK_DEPTH: usize = 4;

/// A captured native call stack, innermost frame first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NativeCallStack {
    frames: Vec<Address>,
}

impl NativeCallStack {
    /// Build a stack from frame addresses, dropping frames past the tracking depth
    pub fn new(frames: &[Address]) -> Self {
        let depth = frames.len().min(NMT_TRACKING_STACK_DEPTH);
        NativeCallStack {
            frames: frames[..depth].to_vec(),
        }
    }

    pub fn empty() -> Self {
        NativeCallStack { frames: Vec::new() }
    }

    pub fn frames(&self) -> &[Address] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for NativeCallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frames: Vec<String> = self.frames.iter().map(|a| format!("0x{:x}", a)).collect();
        write!(f, "[{}]", frames.join(", "))
    }
}

/// Handle to a stack inside [`CallStackStorage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackIndex(u32);

impl StackIndex {
    /// The empty stack, always present
    pub const EMPTY: StackIndex = StackIndex(0);
}

/// Deduplicating, append-only stack store
#[derive(Debug, Clone)]
pub struct CallStackStorage {
    stacks: Vec<NativeCallStack>,
    index: FxHashMap<NativeCallStack, StackIndex>,
    detailed: bool,
}

impl CallStackStorage {
    /// Create a storage. With `detailed == false` stacks are not recorded.
    pub fn new(detailed: bool) -> Self {
        let mut index = FxHashMap::default();
        index.insert(NativeCallStack::empty(), StackIndex::EMPTY);
        CallStackStorage {
            stacks: vec![NativeCallStack::empty()],
            index,
            detailed,
        }
    }

    /// Intern `stack`, returning the handle of an equal stored stack if any
    pub fn push(&mut self, stack: &NativeCallStack) -> StackIndex {
        if !self.detailed {
            return StackIndex::EMPTY;
        }
        if let Some(&idx) = self.index.get(stack) {
            return idx;
        }

        let raw = u32::try_from(self.stacks.len())
            .unwrap_or_else(|_| panic!("call-stack storage exhausted at {} stacks", self.stacks.len()));
        let idx = StackIndex(raw);
        self.stacks.push(stack.clone());
        self.index.insert(stack.clone(), idx);
        idx
    }

    /// Stack stored at `idx`. Panics on a handle this storage never issued.
    pub fn get(&self, idx: StackIndex) -> &NativeCallStack {
        self.stacks
            .get(idx.0 as usize)
            .unwrap_or_else(|| panic!("stack index {} out of range", idx.0))
    }

    /// Compare two handles by the frames they refer to
    pub fn equal_stacks(&self, a: StackIndex, b: StackIndex) -> bool {
        a == b || self.get(a) == self.get(b)
    }

    /// Number of stored stacks, including the empty stack
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_deduplicates() {
        let mut storage = CallStackStorage::new(true);
        let a = storage.push(&NativeCallStack::new(&[0xa]));
        let b = storage.push(&NativeCallStack::new(&[0xb]));
        let a2 = storage.push(&NativeCallStack::new(&[0xa]));

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(storage.get(b).frames(), &[0xb]);
        assert!(storage.equal_stacks(a, a2));
        assert!(!storage.equal_stacks(a, b));
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn test_empty_stack_is_preinterned() {
        let mut storage = CallStackStorage::new(true);
        assert_eq!(storage.push(&NativeCallStack::empty()), StackIndex::EMPTY);
        assert!(storage.get(StackIndex::EMPTY).is_empty());
    }

    #[test]
    fn test_summary_mode_records_nothing() {
        let mut storage = CallStackStorage::new(false);
        let idx = storage.push(&NativeCallStack::new(&[1, 2, 3]));
        assert_eq!(idx, StackIndex::EMPTY);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_frames_truncated_to_tracking_depth() {
        let stack = NativeCallStack::new(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(stack.frames(), &[1, 2, 3, 4]);
    }
}
