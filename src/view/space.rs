//! Physical memory space registry
//!
//! Every named backing space owns its committed and mapped storage plus its
//! running summary counters, bundled in one [`SpaceData`] so they can never
//! drift apart. Ids are handed out by a counter and never reused.

use super::storage::RegionStorage;
use super::summary::VirtualMemorySnapshot;
use crate::range::{TrackedOffsetRange, TrackedRange};
use std::fmt;

/// Name of the space registered at initialization
pub const HEAP_SPACE_NAME: &str = "Heap";

/// Capability token naming a registered physical space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalMemorySpace {
    pub id: u32,
}

impl fmt::Display for PhysicalMemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "space #{}", self.id)
    }
}

/// Storage owned by one physical space
#[derive(Debug, Default)]
pub struct SpaceData {
    pub name: String,
    pub committed: RegionStorage<TrackedRange>,
    pub mapped: RegionStorage<TrackedOffsetRange>,
    pub snapshot: VirtualMemorySnapshot,
}

impl SpaceData {
    fn new(name: &str) -> Self {
        SpaceData {
            name: name.to_string(),
            ..SpaceData::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct SpaceRegistry {
    spaces: Vec<SpaceData>,
    next_id: u32,
}

impl SpaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and default storage for `name`
    pub fn register(&mut self, name: &str) -> PhysicalMemorySpace {
        let space = PhysicalMemorySpace { id: self.next_id };
        self.next_id = self
            .next_id
            .checked_add(1)
            .unwrap_or_else(|| panic!("physical space ids exhausted"));
        assert_eq!(
            self.spaces.len(),
            space.id as usize,
            "space table out of sync with id counter"
        );
        self.spaces.push(SpaceData::new(name));
        space
    }

    /// Storage for `space`. Panics if the id was never registered.
    pub fn get(&self, space: PhysicalMemorySpace) -> &SpaceData {
        self.spaces
            .get(space.id as usize)
            .unwrap_or_else(|| panic!("space id out of range: {}", space.id))
    }

    pub fn get_mut(&mut self, space: PhysicalMemorySpace) -> &mut SpaceData {
        self.spaces
            .get_mut(space.id as usize)
            .unwrap_or_else(|| panic!("space id out of range: {}", space.id))
    }

    /// First space registered under `name`
    pub fn find(&self, name: &str) -> Option<PhysicalMemorySpace> {
        self.spaces
            .iter()
            .position(|s| s.name == name)
            .map(|i| PhysicalMemorySpace { id: i as u32 })
    }

    /// All registered spaces in id order
    pub fn iter(&self) -> impl Iterator<Item = (PhysicalMemorySpace, &SpaceData)> {
        self.spaces
            .iter()
            .enumerate()
            .map(|(i, data)| (PhysicalMemorySpace { id: i as u32 }, data))
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}
