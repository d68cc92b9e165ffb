/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 *
 * Only configuration and exhaustion failures are errors. `NotEqual` and
 * `TimedOut` outcomes of a wait are ordinary values (see `WaitStatus`), and
 * usage errors such as unlocking a lock that is not held panic instead of
 * being reported here.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for shared-memory synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Configuration and resource errors raised at primitive boundaries
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Shared region length must be non-zero")]
    #[diagnostic(
        code(region::empty),
        help("Allocate the region with room for every primitive laid out in it.")
    )]
    EmptyRegion,

    #[error("Range out of bounds: offset {offset}, size {size}, region size {region_len}")]
    #[diagnostic(
        code(region::out_of_bounds),
        help("Primitive offsets must leave room for the primitive's full layout.")
    )]
    OutOfBounds {
        offset: usize,
        size: usize,
        region_len: usize,
    },

    #[error("Offset {offset} is not aligned to {align} bytes")]
    #[diagnostic(
        code(region::misaligned),
        help("Use the primitive's BYTE_ALIGN when reserving its range.")
    )]
    Misaligned { offset: usize, align: usize },

    #[error("Shared region view has no buffer tag")]
    #[diagnostic(
        code(tag::untagged),
        help("Call tag_buffer on every agent's view before using it with the futex.")
    )]
    Untagged,

    #[error("Buffer already tagged {existing}, cannot retag as {requested}")]
    #[diagnostic(
        code(tag::conflict),
        help("The same memory must carry the same tag in every agent.")
    )]
    TagConflict { existing: u32, requested: u32 },

    #[error("Tag {tag} is already assigned to a different shared region")]
    #[diagnostic(
        code(tag::in_use),
        help("Tags must be unique per physical shared memory extent.")
    )]
    TagInUse { tag: u32 },

    #[error("No initialized primitive found at offset {offset}")]
    #[diagnostic(
        code(setup::not_initialized),
        help("Run initialize in one agent before any other agent attaches.")
    )]
    NotInitialized { offset: usize },

    #[error("Invalid party count {0}")]
    #[diagnostic(code(barrier::invalid_parties), help("A barrier needs at least one party."))]
    InvalidPartyCount(u32),

    #[error("Arena exhausted: requested {requested} bytes, {available} available")]
    #[diagnostic(
        code(arena::exhausted),
        help("Reserve a larger arena when laying out the shared region.")
    )]
    ArenaExhausted { requested: usize, available: usize },

    #[error("Futex workspace exhausted: all {capacity} waiter slots are taken")]
    #[diagnostic(
        code(futex::workspace_exhausted),
        help("Size the workspace with FutexManager::workspace_bytes for every agent.")
    )]
    WorkspaceExhausted { capacity: usize },

    #[error("Alignment {align} is not a non-zero power of two")]
    #[diagnostic(
        code(arena::invalid_alignment),
        help("Pass a primitive's BYTE_ALIGN, or another power of two.")
    )]
    InvalidAlignment { align: usize },

    #[error("Operation not supported: {0}")]
    #[diagnostic(code(sync::unsupported))]
    Unsupported(String),
}
