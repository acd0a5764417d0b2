//! Storage collaborator boundary
//!
//! The receiver hands every decoded record to a [`Store`]. What the store does
//! with it (batching into windows, replication, spilling to disk) is its own
//! business. [`StorageLevel`] is carried through untouched so the store side
//! can honour the durability the caller asked for.

use crate::error::{Result, VirtaError};
use std::fmt;
use std::str::FromStr;

/// Sink for decoded records
///
/// Called once per record, in decode order, from the receiver thread.
/// Implementations are expected to return quickly; if they block, that is the
/// backpressure point of the pipeline.
pub trait Store<T>: Send + Sync {
    /// Accept one record
    fn store(&self, record: T);
}

impl<T, S: Store<T> + ?Sized> Store<T> for std::sync::Arc<S> {
    fn store(&self, record: T) {
        (**self).store(record)
    }
}

/// Durability/replication policy for stored records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageLevel {
    pub use_memory: bool,
    pub use_disk: bool,
    pub deserialized: bool,
    pub replication: u8,
}

impl StorageLevel {
    pub const NONE: Self = Self::new(false, false, false, 1);
    pub const MEMORY_ONLY: Self = Self::new(true, false, true, 1);
    pub const MEMORY_ONLY_2: Self = Self::new(true, false, true, 2);
    pub const MEMORY_ONLY_SER: Self = Self::new(true, false, false, 1);
    pub const MEMORY_ONLY_SER_2: Self = Self::new(true, false, false, 2);
    pub const DISK_ONLY: Self = Self::new(false, true, false, 1);
    pub const DISK_ONLY_2: Self = Self::new(false, true, false, 2);
    pub const MEMORY_AND_DISK: Self = Self::new(true, true, true, 1);
    pub const MEMORY_AND_DISK_2: Self = Self::new(true, true, true, 2);
    pub const MEMORY_AND_DISK_SER: Self = Self::new(true, true, false, 1);
    pub const MEMORY_AND_DISK_SER_2: Self = Self::new(true, true, false, 2);

    const NAMED: [(&'static str, StorageLevel); 11] = [
        ("NONE", Self::NONE),
        ("MEMORY_ONLY", Self::MEMORY_ONLY),
        ("MEMORY_ONLY_2", Self::MEMORY_ONLY_2),
        ("MEMORY_ONLY_SER", Self::MEMORY_ONLY_SER),
        ("MEMORY_ONLY_SER_2", Self::MEMORY_ONLY_SER_2),
        ("DISK_ONLY", Self::DISK_ONLY),
        ("DISK_ONLY_2", Self::DISK_ONLY_2),
        ("MEMORY_AND_DISK", Self::MEMORY_AND_DISK),
        ("MEMORY_AND_DISK_2", Self::MEMORY_AND_DISK_2),
        ("MEMORY_AND_DISK_SER", Self::MEMORY_AND_DISK_SER),
        ("MEMORY_AND_DISK_SER_2", Self::MEMORY_AND_DISK_SER_2),
    ];

    pub const fn new(use_memory: bool, use_disk: bool, deserialized: bool, replication: u8) -> Self {
        Self {
            use_memory,
            use_disk,
            deserialized,
            replication,
        }
    }

    /// Canonical name, if this level is one of the predefined constants
    pub fn name(&self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, level)| level == self)
            .map(|(name, _)| *name)
    }
}

impl Default for StorageLevel {
    fn default() -> Self {
        Self::MEMORY_AND_DISK_SER_2
    }
}

impl fmt::Display for StorageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(
                f,
                "StorageLevel(memory={}, disk={}, deserialized={}, replication={})",
                self.use_memory, self.use_disk, self.deserialized, self.replication
            ),
        }
    }
}

impl FromStr for StorageLevel {
    type Err = VirtaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::NAMED
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, level)| *level)
            .ok_or_else(|| VirtaError::Config(format!("unknown storage level: {s}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_replicated_serialized() {
        let level = StorageLevel::default();
        assert!(level.use_memory);
        assert!(level.use_disk);
        assert!(!level.deserialized);
        assert_eq!(level.replication, 2);
        assert_eq!(level.to_string(), "MEMORY_AND_DISK_SER_2");
    }

    #[test]
    fn test_parse_by_name() {
        let level: StorageLevel = "memory_only".parse().unwrap();
        assert_eq!(level, StorageLevel::MEMORY_ONLY);
        assert!("MEMORY_ON_TAPE".parse::<StorageLevel>().is_err());
    }

    #[test]
    fn test_custom_level_display() {
        let level = StorageLevel::new(true, false, true, 3);
        assert!(level.name().is_none());
        assert!(level.to_string().contains("replication=3"));
    }
}
