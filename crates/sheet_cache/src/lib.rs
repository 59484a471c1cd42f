//! Budgeted residency cache for atlas sheets.
//!
//! Producers call [`SheetCache::request_resident`] (or the cloneable
//! [`SheetRequester`]) from any thread. Each call enqueues a touch and returns
//! whatever handle is resident right now. A single actor thread owns the
//! recency list and the resident byte count: it loads missing sheets, evicts
//! the least recently used ones when the budget would be exceeded, and moves
//! every touched sheet to the head of the list.

mod actor;
mod cache;
mod loader;
mod recency;
mod stats;

use std::fmt;
use std::path::PathBuf;

pub use cache::{CacheConfig, CacheSnapshot, SheetCache, SheetRequester};
pub use loader::{ResidentSheet, SheetLoadError, SheetLoader};
pub use recency::RecencyViolation;
pub use stats::CacheStats;

/// Position of a sheet in the sheet table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetIndex(u32);

impl SheetIndex {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SheetIndex {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, formatter)
    }
}

impl From<u32> for SheetIndex {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Immutable metadata of one sheet, known before it is ever loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDescriptor {
    pub index: SheetIndex,
    pub byte_size: u64,
    pub locator: PathBuf,
}

/// Per-request failure reported by the actor.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("sheet {index} needs {byte_size} bytes but the cache capacity is {capacity} bytes")]
    CapacityExceeded {
        index: SheetIndex,
        byte_size: u64,
        capacity: u64,
    },
    #[error("sheet {index} failed to load")]
    Load {
        index: SheetIndex,
        #[source]
        source: SheetLoadError,
    },
}

impl CacheError {
    pub fn index(&self) -> SheetIndex {
        match self {
            CacheError::CapacityExceeded { index, .. } | CacheError::Load { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("sheet {index} is outside the sheet table of {sheet_count} sheets")]
    OutOfRange { index: SheetIndex, sheet_count: usize },
    #[error("sheet cache actor has stopped")]
    ActorStopped,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheStartError {
    #[error("sheet table position {position} holds sheet {index}")]
    SheetOutOfOrder { position: usize, index: SheetIndex },
    #[error("sheet table of {len} sheets exceeds the index range")]
    TooManySheets { len: usize },
    #[error("failed to spawn sheet cache actor")]
    Spawn(#[source] std::io::Error),
}

/// Diagnostic stream emitted by the actor after each state change.
#[derive(Debug)]
pub enum CacheEvent {
    Loaded { index: SheetIndex, byte_size: u64 },
    Evicted { index: SheetIndex, byte_size: u64 },
    Failed(CacheError),
}
