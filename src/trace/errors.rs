//! Errors raised while replaying a trace
//!
//! Events are validated before they reach the view, so bad input surfaces
//! here instead of tripping the view's invariant checks.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Event names a space that was never registered
    UnknownSpace { name: String, line: usize },

    /// `space` event for a name that already exists
    DuplicateSpace { name: String, line: usize },

    /// `start + size` does not fit in the address space
    AddressOverflow { start: u64, size: u64, line: usize },

    /// Snapshot history limit exceeded
    SnapshotLimitExceeded { message: String },

    /// Stepping past either end of the history
    HistoryOperationFailed { message: String },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::UnknownSpace { name, line } => {
                write!(f, "Unknown physical space '{}' at line {}", name, line)
            }
            ReplayError::DuplicateSpace { name, line } => {
                write!(f, "Physical space '{}' already registered at line {}", name, line)
            }
            ReplayError::AddressOverflow { start, size, line } => {
                write!(
                    f,
                    "Range at 0x{:x} of size 0x{:x} overflows the address space at line {}",
                    start, size, line
                )
            }
            ReplayError::SnapshotLimitExceeded { message } => write!(f, "{}", message),
            ReplayError::HistoryOperationFailed { message } => {
                write!(f, "History operation failed: {}", message)
            }
        }
    }
}

impl std::error::Error for ReplayError {}
