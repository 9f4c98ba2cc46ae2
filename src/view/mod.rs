//! The virtual memory view
//!
//! [`VirtualMemoryView`] records the virtual memory life-cycle events of a
//! native process and answers questions about the result:
//! - [`storage`]: sorted, mergeable storage of tracked regions
//! - [`space`]: registry of named physical spaces and their storage
//! - [`summary`]: per-tag totals with lock-free peak tracking
//! - [`report`]: the reserved ⊃ mapped ⊃ committed report tree
//!
//! # Address Spaces
//!
//! Reservations live in the single virtual address space shared by every
//! physical space. Commits and views are tracked per physical space:
//! ```text
//! reserve  [addr, addr+size)                        -> reserved (shared)
//! view     [addr, addr+size) -> space @ offset      -> mapped[space]
//! commit   space [offset, offset+size)              -> committed[space]
//! ```
//!
//! # Locking
//!
//! All state sits behind one `RwLock`. Mutators hold the write lock for the
//! whole call; reports, queries and summaries share the read lock.
//!
//! # Failure Policy
//!
//! Removing something that is not tracked is a silent no-op. Misuse (an
//! unregistered space, an address range that overflows) panics with a
//! message naming the broken invariant.

pub mod report;
pub mod space;
pub mod storage;
pub mod summary;

use crate::callstack::{CallStackStorage, NativeCallStack, StackIndex};
use crate::range::{overlap_of, overlaps, split, Address, Range, TrackedOffsetRange, TrackedRange};
use crate::tag::MemTag;
use log::{debug, trace};
use parking_lot::RwLock;
use report::{ReportRow, Scale};
use space::{PhysicalMemorySpace, SpaceRegistry, HEAP_SPACE_NAME};
use std::io;
use storage::{Region, RegionStorage};
use summary::VirtualMemorySummary;

/// Whether call stacks are recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NmtMode {
    /// Totals only; every region gets the empty stack
    Summary,
    #[default]
    Detail,
}

/// Everything guarded by the view's lock
#[derive(Debug)]
pub(crate) struct VirtualMemory {
    pub(crate) reserved: RegionStorage<TrackedRange>,
    pub(crate) spaces: SpaceRegistry,
    pub(crate) stacks: CallStackStorage,
}

/// Append `entry`, extending the last pushed entry instead when it can absorb
/// it, then restore sorted, merged order.
fn insert_coalescing<R: Region>(storage: &mut RegionStorage<R>, stacks: &CallStackStorage, entry: R) {
    let extended = match storage.last_mut() {
        Some(last) if last.can_merge(&entry, stacks) => {
            last.absorb(&entry);
            true
        }
        _ => false,
    };
    if !extended {
        storage.push(entry);
    }
    normalize(storage, stacks);
}

fn normalize<R: Region>(storage: &mut RegionStorage<R>, stacks: &CallStackStorage) {
    storage.sort_by_start();
    storage.merge(stacks);
}

/// What the view knows about one address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressInfo {
    pub address: Address,
    pub reservations: Vec<RegionInfo>,
    pub views: Vec<ViewInfo>,
    pub committed: Vec<CommitInfo>,
}

impl AddressInfo {
    pub fn is_reserved(&self) -> bool {
        !self.reservations.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        !self.committed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    pub range: Range,
    pub tag: MemTag,
    pub stack: NativeCallStack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewInfo {
    pub space: PhysicalMemorySpace,
    pub range: Range,
    /// Physical address the queried address maps to
    pub physical_address: Address,
    pub tag: MemTag,
    pub stack: NativeCallStack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub space: PhysicalMemorySpace,
    pub range: Range,
    pub stack: NativeCallStack,
}

/// Records reservations, commits and views of one process
#[derive(Debug)]
pub struct VirtualMemoryView {
    mode: NmtMode,
    heap: PhysicalMemorySpace,
    state: RwLock<VirtualMemory>,
}

impl VirtualMemoryView {
    /// Create a view and register the Heap space
    pub fn initialize(mode: NmtMode) -> Self {
        let mut spaces = SpaceRegistry::new();
        let heap = spaces.register(HEAP_SPACE_NAME);
        debug!("virtual memory view initialized in {:?} mode", mode);
        VirtualMemoryView {
            mode,
            heap,
            state: RwLock::new(VirtualMemory {
                reserved: RegionStorage::new(),
                spaces,
                stacks: CallStackStorage::new(mode == NmtMode::Detail),
            }),
        }
    }

    pub fn mode(&self) -> NmtMode {
        self.mode
    }

    /// The space registered at initialization
    pub fn heap(&self) -> PhysicalMemorySpace {
        self.heap
    }

    pub fn register_space(&self, name: &str) -> PhysicalMemorySpace {
        let space = self.state.write().spaces.register(name);
        debug!("registered physical space '{}' as {}", name, space);
        space
    }

    pub fn space_by_name(&self, name: &str) -> Option<PhysicalMemorySpace> {
        self.state.read().spaces.find(name)
    }

    pub fn space_name(&self, space: PhysicalMemorySpace) -> String {
        self.state.read().spaces.get(space).name.clone()
    }

    /// All spaces with their names, in id order
    pub fn spaces(&self) -> Vec<(PhysicalMemorySpace, String)> {
        self.state
            .read()
            .spaces
            .iter()
            .map(|(space, data)| (space, data.name.clone()))
            .collect()
    }

    pub fn reserve_memory(&self, addr: Address, size: u64, tag: MemTag, stack: &NativeCallStack) {
        if size == 0 {
            return;
        }
        let range = Range::new(addr, size);
        trace!("reserve {} for {}", range, tag);

        let mut state = self.state.write();
        let memory = &mut *state;
        let stack = memory.stacks.push(stack);
        let entry = TrackedRange { range, stack, tag };
        insert_coalescing(&mut memory.reserved, &memory.stacks, entry);
    }

    pub fn release_memory(&self, addr: Address, size: u64) {
        if size == 0 {
            return;
        }
        let range = Range::new(addr, size);

        let mut state = self.state.write();
        let memory = &mut *state;
        let touched = memory.reserved.remove_range(range);
        trace!("release {} touched {} reservation(s)", range, touched);
        normalize(&mut memory.reserved, &memory.stacks);
    }

    /// Re-tag the reserved bytes in `[addr, addr + size)`
    pub fn set_tag(&self, addr: Address, size: u64, tag: MemTag) {
        if size == 0 {
            return;
        }
        let range = Range::new(addr, size);

        let mut state = self.state.write();
        let memory = &mut *state;
        let touched = memory.reserved.retag_range(range, tag);
        trace!("tag {} as {} touched {} reservation(s)", range, tag, touched);
        normalize(&mut memory.reserved, &memory.stacks);
    }

    pub fn commit_memory_into_space(
        &self,
        space: PhysicalMemorySpace,
        offset: Address,
        size: u64,
        stack: &NativeCallStack,
    ) {
        if size == 0 {
            return;
        }
        let range = Range::new(offset, size);
        trace!("commit {} in {}", range, space);

        let mut state = self.state.write();
        let memory = &mut *state;
        let stack = memory.stacks.push(stack);
        let data = memory.spaces.get_mut(space);
        let entry = TrackedRange {
            range,
            stack,
            tag: MemTag::None,
        };
        insert_coalescing(&mut data.committed, &memory.stacks, entry);
    }

    pub fn uncommit_memory_into_space(&self, space: PhysicalMemorySpace, offset: Address, size: u64) {
        if size == 0 {
            return;
        }
        let range = Range::new(offset, size);

        let mut state = self.state.write();
        let memory = &mut *state;
        let data = memory.spaces.get_mut(space);
        let touched = data.committed.remove_range(range);
        trace!("uncommit {} in {} touched {} commit(s)", range, space, touched);
        normalize(&mut data.committed, &memory.stacks);
    }

    /// Map `[base_addr, base_addr + size)` onto `space` at `offset`.
    ///
    /// Existing views of the same virtual bytes in this space are cut back to
    /// whatever lies outside the new view; their leftovers keep their own
    /// physical offsets.
    pub fn add_view_into_space(
        &self,
        space: PhysicalMemorySpace,
        base_addr: Address,
        size: u64,
        offset: Address,
        tag: MemTag,
        stack: &NativeCallStack,
    ) {
        if size == 0 {
            return;
        }

        let mut state = self.state.write();
        let memory = &mut *state;
        let stack = memory.stacks.push(stack);
        let entry = TrackedOffsetRange::new(base_addr, size, offset, stack, tag);
        trace!(
            "view {} -> {} in {} for {}",
            entry.tracked.range,
            entry.physical_range(),
            space,
            tag
        );

        let data = memory.spaces.get_mut(space);
        data.mapped.remove_range(entry.tracked.range);
        data.mapped.push(entry);
        normalize(&mut data.mapped, &memory.stacks);
    }

    pub fn remove_view_into_space(&self, space: PhysicalMemorySpace, base_addr: Address, size: u64) {
        if size == 0 {
            return;
        }
        let range = Range::new(base_addr, size);

        let mut state = self.state.write();
        let memory = &mut *state;
        let data = memory.spaces.get_mut(space);
        let touched = data.mapped.remove_range(range);
        trace!("unview {} in {} touched {} view(s)", range, space, touched);
        normalize(&mut data.mapped, &memory.stacks);
    }

    /// Sorted copy of the reserved regions
    pub fn reserved_regions(&self) -> Vec<TrackedRange> {
        self.state.read().reserved.as_slice().to_vec()
    }

    /// Sorted copy of the committed regions of `space`
    pub fn committed_regions(&self, space: PhysicalMemorySpace) -> Vec<TrackedRange> {
        self.state.read().spaces.get(space).committed.as_slice().to_vec()
    }

    /// Sorted copy of the views into `space`
    pub fn mapped_regions(&self, space: PhysicalMemorySpace) -> Vec<TrackedOffsetRange> {
        self.state.read().spaces.get(space).mapped.as_slice().to_vec()
    }

    pub fn stack(&self, idx: StackIndex) -> NativeCallStack {
        self.state.read().stacks.get(idx).clone()
    }

    /// Number of distinct stacks recorded, including the empty stack
    pub fn stack_count(&self) -> usize {
        self.state.read().stacks.len()
    }

    /// Reservations, views and commits covering `addr`.
    ///
    /// Commits are looked up at the physical address each view maps `addr`
    /// to; a space with no view covering `addr` is checked at `addr` itself.
    pub fn query(&self, addr: Address) -> AddressInfo {
        let memory = self.state.read();
        let stack_of = |idx| memory.stacks.get(idx).clone();
        let mut info = AddressInfo {
            address: addr,
            ..AddressInfo::default()
        };

        for reserved in memory.reserved.iter().filter(|r| r.range.contains(addr)) {
            info.reservations.push(RegionInfo {
                range: reserved.range,
                tag: reserved.tag,
                stack: stack_of(reserved.stack),
            });
        }

        for (space, data) in memory.spaces.iter() {
            let mut physical_addrs = Vec::new();
            for view in data.mapped.iter() {
                if let Some(physical) = view.to_physical(addr) {
                    physical_addrs.push(physical);
                    info.views.push(ViewInfo {
                        space,
                        range: view.tracked.range,
                        physical_address: physical,
                        tag: view.tag(),
                        stack: stack_of(view.stack()),
                    });
                }
            }
            if physical_addrs.is_empty() {
                physical_addrs.push(addr);
            }

            for committed in data
                .committed
                .iter()
                .filter(|c| physical_addrs.iter().any(|&p| c.range.contains(p)))
            {
                info.committed.push(CommitInfo {
                    space,
                    range: committed.range,
                    stack: stack_of(committed.stack),
                });
            }
        }

        info
    }

    /// Per-tag totals for `space`.
    ///
    /// Reserved bytes are summed by tag over the shared reservations.
    /// Committed bytes take the tag of the view whose physical extent covers
    /// them, else of the reservation covering them under the identity
    /// mapping, else `None`. Each committed byte is counted once. Totals
    /// saturate at `u64::MAX`.
    pub fn summary_snapshot(&self, space: PhysicalMemorySpace) -> VirtualMemorySummary {
        let memory = self.state.read();
        let data = memory.spaces.get(space);

        let mut reserved = [0u64; MemTag::COUNT];
        for region in memory.reserved.iter() {
            let total = &mut reserved[region.tag.index()];
            *total = total.saturating_add(region.size());
        }

        let mut committed = [0u64; MemTag::COUNT];
        for region in data.committed.iter() {
            let mut remaining = vec![region.range];
            for view in data.mapped.iter() {
                claim(&mut remaining, view.physical_range(), view.tag(), &mut committed);
            }
            for reservation in memory.reserved.iter() {
                claim(&mut remaining, reservation.range, reservation.tag, &mut committed);
            }
            for piece in remaining {
                let total = &mut committed[MemTag::None.index()];
                *total = total.saturating_add(piece.size());
            }
        }

        data.snapshot.record(&reserved, &committed)
    }

    /// Structured report rows for every space
    pub fn report_rows(&self) -> Vec<ReportRow> {
        report::build_rows(&self.state.read())
    }

    /// Write the text report for every space to `out`
    pub fn report<W: io::Write>(&self, out: &mut W, scale: Scale) -> io::Result<()> {
        let rows = self.report_rows();
        report::write_report(&rows, out, scale)
    }
}

/// Attribute the parts of `remaining` inside `source` to `tag` and drop them
/// from `remaining`.
fn claim(remaining: &mut Vec<Range>, source: Range, tag: MemTag, totals: &mut [u64; MemTag::COUNT]) {
    if !remaining.iter().any(|piece| overlaps(*piece, source)) {
        return;
    }
    let mut rest = Vec::with_capacity(remaining.len() + 1);
    for piece in remaining.drain(..) {
        let inside = overlap_of(piece, source);
        if inside.is_empty() {
            rest.push(piece);
            continue;
        }
        let total = &mut totals[tag.index()];
        *total = total.saturating_add(inside.size());
        rest.extend(split(&piece, source).into_pieces());
    }
    *remaining = rest;
}
