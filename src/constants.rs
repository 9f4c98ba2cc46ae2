// Defaults for the trace browser

/// Snapshot history budget when `--snapshot-limit` is not given (256 MB)
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 256 * 1024 * 1024;

/// Rows moved per ↑/↓ press
pub const SCROLL_STEP: usize = 1;

/// Width reserved for the tag column in the summary pane
pub const TAG_COLUMN_WIDTH: usize = 18;
