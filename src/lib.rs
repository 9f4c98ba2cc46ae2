//! # Introduction
//!
//! nmtview models the virtual memory side of native memory tracking. A
//! [`view::VirtualMemoryView`] records reservations, commits and views into
//! named physical spaces, then reports them as per-tag summaries and as a
//! reserved ⊃ mapped ⊃ committed region tree.
//!
//! ## Pipeline
//!
//! ```text
//! Trace → Parser → Session → VirtualMemoryView → Snapshots → TUI / report
//! ```
//!
//! 1. [`range`]: address ranges, tracked ranges and the split primitive.
//! 2. [`callstack`]: deduplicated native call stacks.
//! 3. [`view`]: region storage, physical spaces, summaries and reports.
//! 4. [`trace`]: the trace script format and its replay [`trace::Session`].
//! 5. [`snapshot`]: step history with a configurable memory limit.
//! 6. [`ui`]: ratatui-based browser; not part of the stable library API.
//!
//! ## Tags
//!
//! Every reservation and view carries a [`tag::MemTag`]. Commits carry none;
//! their tag is resolved at summary time from the view or reservation that
//! covers them.

pub mod callstack;
pub mod constants;
pub mod range;
pub mod snapshot;
pub mod tag;
pub mod trace;
pub mod ui;
pub mod view;
