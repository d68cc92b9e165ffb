/*!
 * Core Types
 * Common types used across the primitives
 */

use serde::{Deserialize, Serialize};

/// Byte offset into a shared region
pub type Offset = usize;

/// Size type for layout computations
pub type Size = usize;

/// Buffer identity tag
pub type Tag = u32;

/// Outcome of a blocking wait
///
/// None of these are errors: callers branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStatus {
    /// Woken by a notify, or the awaited condition already held
    Ok,
    /// The watched word did not hold the expected value
    NotEqual,
    /// The deadline passed before a wake arrived
    TimedOut,
}

impl WaitStatus {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, WaitStatus::Ok)
    }

    #[inline]
    pub fn timed_out(&self) -> bool {
        matches!(self, WaitStatus::TimedOut)
    }
}

/// Round `offset` up to the next multiple of `align` (a power of two)
///
/// `None` if the rounded offset does not fit in a `usize`.
#[inline]
pub const fn align_up(offset: Offset, align: Size) -> Option<Offset> {
    match offset.checked_add(align - 1) {
        Some(padded) => Some(padded & !(align - 1)),
        None => None,
    }
}
