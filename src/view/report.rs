//! Hierarchical virtual memory report
//!
//! Rows are built per physical space as a three-level tree:
//!
//! ```text
//! reserved range                      (virtual address space)
//!     mapped range -> physical range  (views overlapping the reservation)
//!         committed range             (commits overlapping the view's physical extent)
//! ```
//!
//! A reservation without any view in the space lists the commits that
//! overlap it under the identity mapping instead, flagged as such.
//!
//! [`build_rows`] produces structured rows for programmatic consumers and the
//! TUI; [`write_report`] renders them as indented text.

use super::VirtualMemory;
use crate::callstack::NativeCallStack;
use crate::range::{overlaps, Range};
use crate::tag::MemTag;
use crate::view::space::PhysicalMemorySpace;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Unit used for displayed sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    Bytes,
    #[default]
    KB,
    MB,
    GB,
}

impl Scale {
    pub fn divisor(self) -> u64 {
        match self {
            Scale::Bytes => 1,
            Scale::KB => 1 << 10,
            Scale::MB => 1 << 20,
            Scale::GB => 1 << 30,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Scale::Bytes => "B",
            Scale::KB => "KB",
            Scale::MB => "MB",
            Scale::GB => "GB",
        }
    }

    /// `bytes` in this unit, rounded to nearest
    pub fn amount(self, bytes: u64) -> u64 {
        let divisor = self.divisor();
        bytes / divisor + u64::from(bytes % divisor >= divisor / 2 && divisor > 1)
    }

    pub fn format(self, bytes: u64) -> String {
        format!("{}{}", self.amount(bytes), self.unit())
    }
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "B" | "BYTES" => Ok(Scale::Bytes),
            "K" | "KB" => Ok(Scale::KB),
            "M" | "MB" => Ok(Scale::MB),
            "G" | "GB" => Ok(Scale::GB),
            _ => Err(format!("Unknown scale '{}', expected one of B, KB, MB, GB", s)),
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit())
    }
}

/// One line of the report tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRow {
    Space {
        space: PhysicalMemorySpace,
        name: String,
    },
    Reserved {
        range: Range,
        tag: MemTag,
        stack: NativeCallStack,
    },
    Mapped {
        range: Range,
        physical: Range,
        tag: MemTag,
        stack: NativeCallStack,
    },
    Committed {
        range: Range,
        stack: NativeCallStack,
        /// Found through the identity mapping rather than a view
        identity: bool,
    },
}

impl ReportRow {
    /// Nesting level below the space header
    pub fn depth(&self) -> usize {
        match self {
            ReportRow::Space { .. } => 0,
            ReportRow::Reserved { .. } => 0,
            ReportRow::Mapped { .. } => 1,
            ReportRow::Committed { identity: true, .. } => 1,
            ReportRow::Committed { identity: false, .. } => 2,
        }
    }

    pub fn stack(&self) -> Option<&NativeCallStack> {
        match self {
            ReportRow::Space { .. } => None,
            ReportRow::Reserved { stack, .. }
            | ReportRow::Mapped { stack, .. }
            | ReportRow::Committed { stack, .. } => Some(stack),
        }
    }

    /// Row text without indentation or stack
    pub fn describe(&self, scale: Scale) -> String {
        match self {
            ReportRow::Space { space, name } => {
                format!("Virtual memory map of space '{}' (#{}):", name, space.id)
            }
            ReportRow::Reserved { range, tag, .. } => {
                format!("{} reserved {} for {}", range, scale.format(range.size()), tag)
            }
            ReportRow::Mapped {
                range,
                physical,
                tag,
                ..
            } => format!(
                "{} mapped {} to {} for {}",
                range,
                scale.format(range.size()),
                physical,
                tag
            ),
            ReportRow::Committed {
                range, identity, ..
            } => format!(
                "{} committed {}{}",
                range,
                scale.format(range.size()),
                if *identity { " (identity)" } else { "" }
            ),
        }
    }
}

/// Walk every space and build the reserved ⊃ mapped ⊃ committed tree
pub(crate) fn build_rows(memory: &VirtualMemory) -> Vec<ReportRow> {
    let stack_of = |idx| memory.stacks.get(idx).clone();
    let mut rows = Vec::new();

    for (space, data) in memory.spaces.iter() {
        rows.push(ReportRow::Space {
            space,
            name: data.name.clone(),
        });

        for reserved in memory.reserved.iter() {
            rows.push(ReportRow::Reserved {
                range: reserved.range,
                tag: reserved.tag,
                stack: stack_of(reserved.stack),
            });

            let mut has_view = false;
            for view in data.mapped.overlapping(reserved.range) {
                has_view = true;
                rows.push(ReportRow::Mapped {
                    range: view.tracked.range,
                    physical: view.physical_range(),
                    tag: view.tag(),
                    stack: stack_of(view.stack()),
                });
                for committed in data.committed.overlapping(view.physical_range()) {
                    rows.push(ReportRow::Committed {
                        range: committed.range,
                        stack: stack_of(committed.stack),
                        identity: false,
                    });
                }
            }

            if !has_view {
                for committed in data
                    .committed
                    .iter()
                    .filter(|c| overlaps(c.range, reserved.range))
                {
                    rows.push(ReportRow::Committed {
                        range: committed.range,
                        stack: stack_of(committed.stack),
                        identity: true,
                    });
                }
            }
        }
    }

    rows
}

/// Render report rows as indented text
pub fn write_report<W: Write>(rows: &[ReportRow], out: &mut W, scale: Scale) -> io::Result<()> {
    const INDENT: usize = 4;

    for (i, row) in rows.iter().enumerate() {
        if let ReportRow::Space { .. } = row {
            if i > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", row.describe(scale))?;
            let has_regions = rows
                .get(i + 1)
                .is_some_and(|next| !matches!(next, ReportRow::Space { .. }));
            if !has_regions {
                writeln!(out, "{:indent$}(no reserved regions)", "", indent = INDENT)?;
            }
            continue;
        }

        let indent = (row.depth() + 1) * INDENT;
        writeln!(out, "{:indent$}{}", "", row.describe(scale), indent = indent)?;

        if let Some(stack) = row.stack().filter(|s| !s.is_empty()) {
            writeln!(out, "{:indent$}from", "", indent = indent + INDENT)?;
            for frame in stack.frames() {
                writeln!(out, "{:indent$}0x{:016x}", "", frame, indent = indent + 2 * INDENT)?;
            }
        }
    }

    Ok(())
}
