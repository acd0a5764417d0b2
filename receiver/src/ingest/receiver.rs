//! Generic receiver lifecycle
//!
//! Outer frameworks host receivers through this trait without knowing how
//! they connect or decode.

use super::state::IngesterState;
use crate::error::Result;
use crate::storage::StorageLevel;

/// Receiver trait - lifecycle hooks called by the hosting framework
pub trait Receiver: Send + Sync {
    /// Receiver name for identification and logging
    fn name(&self) -> &'static str;

    /// Begin receiving in the background. Must not block.
    ///
    /// Calling this on a receiver that is not freshly created is a
    /// programming error and returns `VirtaError::InvalidState`.
    fn on_start(&self) -> Result<()>;

    /// Ask the receiver to stop. Cooperative and non-blocking.
    fn on_stop(&self);

    /// Durability the received records should be stored with
    fn storage_level(&self) -> StorageLevel;

    /// Current lifecycle state
    fn state(&self) -> IngesterState;
}
