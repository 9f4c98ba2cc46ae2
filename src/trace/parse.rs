//! Trace script parser
//!
//! A trace is a line-oriented script of virtual memory events:
//!
//! ```text
//! # comment
//! space Class
//! reserve  0x10000 64K  GC     @0xa,0xb
//! commit   Heap    0x10000 4K  @0xc
//! view     Class   0x10000 16K 0x800000 ClassShared
//! unview   Class   0x10000 4K
//! uncommit Heap    0x10000 4K
//! tag      0x10000 8K   Metaspace
//! release  0x10000 64K
//! ```
//!
//! Numbers are decimal or `0x` hex with an optional `K`, `M` or `G` suffix.
//! Stacks are an optional trailing `@frame,frame,...` list.

use crate::callstack::NativeCallStack;
use crate::range::Address;
use crate::tag::MemTag;
use std::fmt;

/// One parsed trace operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOp {
    RegisterSpace {
        name: String,
    },
    Reserve {
        addr: Address,
        size: u64,
        tag: MemTag,
        stack: NativeCallStack,
    },
    Release {
        addr: Address,
        size: u64,
    },
    Commit {
        space: String,
        offset: Address,
        size: u64,
        stack: NativeCallStack,
    },
    Uncommit {
        space: String,
        offset: Address,
        size: u64,
    },
    AddView {
        space: String,
        addr: Address,
        size: u64,
        offset: Address,
        tag: MemTag,
        stack: NativeCallStack,
    },
    RemoveView {
        space: String,
        addr: Address,
        size: u64,
    },
    SetTag {
        addr: Address,
        size: u64,
        tag: MemTag,
    },
}

/// A trace operation with the source line it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub op: TraceOp,
    /// 1-based line number
    pub line: usize,
    /// Source text, trimmed
    pub text: String,
}

/// A parsed trace script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    pub events: Vec<TraceEvent>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Parse error with the offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceParseError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for TraceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trace error at line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for TraceParseError {}

/// Parse a whole trace script
pub fn parse_trace(source: &str) -> Result<Trace, TraceParseError> {
    let mut events = Vec::new();

    for (i, raw) in source.lines().enumerate() {
        let line = i + 1;
        let text = raw.split('#').next().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }

        let mut parser = LineParser::new(text, line);
        let op = parser.parse_op()?;
        events.push(TraceEvent {
            op,
            line,
            text: text.to_string(),
        });
    }

    Ok(Trace { events })
}

/// Parses the words of a single line
struct LineParser<'a> {
    words: Vec<&'a str>,
    position: usize,
    line: usize,
}

impl<'a> LineParser<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        LineParser {
            words: text.split_whitespace().collect(),
            position: 0,
            line,
        }
    }

    fn error(&self, message: impl Into<String>) -> TraceParseError {
        TraceParseError {
            message: message.into(),
            line: self.line,
        }
    }

    fn parse_op(&mut self) -> Result<TraceOp, TraceParseError> {
        let keyword = self.next_word("operation")?;
        let op = match keyword.to_ascii_lowercase().as_str() {
            "space" => TraceOp::RegisterSpace {
                name: self.next_word("space name")?.to_string(),
            },
            "reserve" => TraceOp::Reserve {
                addr: self.expect_number("address")?,
                size: self.expect_number("size")?,
                tag: self.expect_tag()?,
                stack: self.optional_stack()?,
            },
            "release" => TraceOp::Release {
                addr: self.expect_number("address")?,
                size: self.expect_number("size")?,
            },
            "commit" => TraceOp::Commit {
                space: self.next_word("space name")?.to_string(),
                offset: self.expect_number("offset")?,
                size: self.expect_number("size")?,
                stack: self.optional_stack()?,
            },
            "uncommit" => TraceOp::Uncommit {
                space: self.next_word("space name")?.to_string(),
                offset: self.expect_number("offset")?,
                size: self.expect_number("size")?,
            },
            "view" => TraceOp::AddView {
                space: self.next_word("space name")?.to_string(),
                addr: self.expect_number("address")?,
                size: self.expect_number("size")?,
                offset: self.expect_number("offset")?,
                tag: self.expect_tag()?,
                stack: self.optional_stack()?,
            },
            "unview" => TraceOp::RemoveView {
                space: self.next_word("space name")?.to_string(),
                addr: self.expect_number("address")?,
                size: self.expect_number("size")?,
            },
            "tag" => TraceOp::SetTag {
                addr: self.expect_number("address")?,
                size: self.expect_number("size")?,
                tag: self.expect_tag()?,
            },
            other => return Err(self.error(format!("Unknown operation '{}'", other))),
        };
        self.finish()?;
        Ok(op)
    }

    fn next_word(&mut self, what: &str) -> Result<&'a str, TraceParseError> {
        let word = self
            .words
            .get(self.position)
            .copied()
            .ok_or_else(|| self.error(format!("Expected {}", what)))?;
        self.position += 1;
        Ok(word)
    }

    fn expect_number(&mut self, what: &str) -> Result<u64, TraceParseError> {
        let word = self.next_word(what)?;
        parse_number(word).ok_or_else(|| self.error(format!("Invalid {} '{}'", what, word)))
    }

    fn expect_tag(&mut self) -> Result<MemTag, TraceParseError> {
        let word = self.next_word("memory tag")?;
        word.parse().map_err(|e: String| self.error(e))
    }

    fn optional_stack(&mut self) -> Result<NativeCallStack, TraceParseError> {
        let Some(word) = self.words.get(self.position).copied() else {
            return Ok(NativeCallStack::empty());
        };
        let Some(list) = word.strip_prefix('@') else {
            return Ok(NativeCallStack::empty());
        };
        self.position += 1;

        let mut frames = Vec::new();
        for frame in list.split(',').filter(|f| !f.is_empty()) {
            let addr = parse_number(frame)
                .ok_or_else(|| self.error(format!("Invalid stack frame '{}'", frame)))?;
            frames.push(addr);
        }
        Ok(NativeCallStack::new(&frames))
    }

    fn finish(&self) -> Result<(), TraceParseError> {
        match self.words.get(self.position) {
            Some(extra) => Err(self.error(format!("Unexpected '{}'", extra))),
            None => Ok(()),
        }
    }
}

/// Parse `4096`, `0x1000`, `4K`, `0x10M` style numbers
pub fn parse_number(word: &str) -> Option<u64> {
    let (digits, multiplier) = match word.chars().last()? {
        'k' | 'K' => (&word[..word.len() - 1], 1u64 << 10),
        'm' | 'M' => (&word[..word.len() - 1], 1 << 20),
        'g' | 'G' => (&word[..word.len() - 1], 1 << 30),
        _ => (word, 1),
    };

    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    value.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_number("4096"), Some(4096));
        assert_eq!(parse_number("0x1000"), Some(0x1000));
        assert_eq!(parse_number("4K"), Some(4096));
        assert_eq!(parse_number("0x10M"), Some(16 << 20));
        assert_eq!(parse_number("2g"), Some(2 << 30));
        assert_eq!(parse_number("0xfffffffffffffffG"), None);
        assert_eq!(parse_number("K"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_parse_full_trace() {
        let source = "\
            # setup\n\
            space Class\n\
            reserve 0x1000 4K Test @0xa,0xb\n\
            view Class 0x1000 4K 0x500000 ClassShared\n\
            commit Class 0x500000 1K   # trailing comment\n";
        let trace = parse_trace(source).unwrap();

        assert_eq!(trace.len(), 4);
        assert_eq!(
            trace.events[1].op,
            TraceOp::Reserve {
                addr: 0x1000,
                size: 4096,
                tag: MemTag::Test,
                stack: NativeCallStack::new(&[0xa, 0xb]),
            }
        );
        assert_eq!(trace.events[1].line, 3);
        assert_eq!(trace.events[3].text, "commit Class 0x500000 1K");
        assert!(matches!(
            &trace.events[2].op,
            TraceOp::AddView { space, offset: 0x500000, tag: MemTag::ClassShared, .. } if space == "Class"
        ));
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_trace("reserve 0x1000 4K\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("memory tag"));

        let err = parse_trace("\nfrobnicate 1 2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("Unknown operation"));

        let err = parse_trace("release 0x1000 4K extra\n").unwrap_err();
        assert!(err.message.contains("Unexpected 'extra'"));

        let err = parse_trace("reserve 0x1000 4K Test @0xa,zz\n").unwrap_err();
        assert!(err.message.contains("Invalid stack frame"));
    }
}
