//! Trace scripts and their replay
//!
//! - [`parse`]: the line-oriented trace script format
//! - [`session`]: replays a trace into a view, keeping a step history
//! - [`errors`]: replay validation errors

pub mod errors;
pub mod parse;
pub mod session;

pub use errors::ReplayError;
pub use parse::{parse_number, parse_trace, Trace, TraceEvent, TraceOp, TraceParseError};
pub use session::Session;
