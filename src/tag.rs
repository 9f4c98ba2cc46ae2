//! Memory-purpose categories attached to reservations and views

use std::fmt;
use std::str::FromStr;

macro_rules! mem_tags {
    ($($variant:ident => ($ident:literal, $name:literal)),* $(,)?) => {
        /// What a range of virtual memory is used for
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MemTag {
            $($variant),*
        }

        impl MemTag {
            /// Every tag, in index order
            pub const ALL: &'static [MemTag] = &[$(MemTag::$variant),*];

            /// Number of tags, for per-tag counter arrays
            pub const COUNT: usize = Self::ALL.len();

            /// Short identifier used in trace files
            pub fn ident(self) -> &'static str {
                match self {
                    $(MemTag::$variant => $ident),*
                }
            }

            /// Human-readable name used in reports
            pub fn name(self) -> &'static str {
                match self {
                    $(MemTag::$variant => $name),*
                }
            }
        }
    };
}

mem_tags! {
    JavaHeap => ("JavaHeap", "Java Heap"),
    Class => ("Class", "Class"),
    Thread => ("Thread", "Thread"),
    ThreadStack => ("ThreadStack", "Thread Stack"),
    Code => ("Code", "Code"),
    GC => ("GC", "GC"),
    GCCardSet => ("GCCardSet", "GCCardSet"),
    Compiler => ("Compiler", "Compiler"),
    JVMCI => ("JVMCI", "JVMCI"),
    Internal => ("Internal", "Internal"),
    Other => ("Other", "Other"),
    Symbol => ("Symbol", "Symbol"),
    NMT => ("NMT", "Native Memory Tracking"),
    ClassShared => ("ClassShared", "Shared class space"),
    Chunk => ("Chunk", "Arena Chunk"),
    Test => ("Test", "Test"),
    Tracing => ("Tracing", "Tracing"),
    Logging => ("Logging", "Logging"),
    Statistics => ("Statistics", "Statistics"),
    Arguments => ("Arguments", "Arguments"),
    Module => ("Module", "Module"),
    Safepoint => ("Safepoint", "Safepoint"),
    Synchronizer => ("Synchronizer", "Synchronization"),
    Serviceability => ("Serviceability", "Serviceability"),
    Metaspace => ("Metaspace", "Metaspace"),
    StringDedup => ("StringDedup", "String Deduplication"),
    ObjectMonitor => ("ObjectMonitor", "Object Monitors"),
    None => ("None", "Unknown"),
}

impl MemTag {
    /// Stable position of this tag in [`MemTag::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MemTag {
    type Err = String;

    /// Parse a tag identifier, ignoring case (`gc`, `GC`, `javaheap`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.ident().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown memory tag '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_order() {
        for (i, tag) in MemTag::ALL.iter().enumerate() {
            assert_eq!(tag.index(), i);
        }
        assert_eq!(MemTag::None.index(), MemTag::COUNT - 1);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("gc".parse::<MemTag>(), Ok(MemTag::GC));
        assert_eq!("JAVAHEAP".parse::<MemTag>(), Ok(MemTag::JavaHeap));
        assert!("Heap".parse::<MemTag>().is_err());
    }
}
