/*!
 * Shared-Memory Synchronization Library
 * Blocking primitives laid out in flat shared memory, addressed by byte offset
 *
 * - `region`: shared regions, block/wake on words, buffer tags, bump arena
 * - `sync`: synchronic cells, futex wait queues, lock, condition, barrier
 * - `monitoring`: tracing setup
 */

pub mod core;
pub mod monitoring;
pub mod region;
pub mod sync;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::types::{Offset, Size, Tag, WaitStatus};
pub use monitoring::init_tracing;
pub use region::{identifier, tag_buffer, SharedArena, SharedRegion};
pub use sync::{
    Barrier, Cond, Futex, FutexManager, Lock, LockGuard, SyncConfig, SyncInteger, SyncValue,
    Synchronic,
};
