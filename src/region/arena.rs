/*!
 * Shared Bump Arena
 * Lock-free bump allocation of byte ranges inside a shared region
 *
 * The arena lives in the region it carves up: a two-word header (`next`,
 * `limit`) followed by the allocatable bytes. Any agent holding a view can
 * allocate; nothing is ever freed.
 */

use super::memory::SharedRegion;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{ARENA_HEADER_BYTES, WORD_BYTES};
use crate::core::types::{align_up, Offset, Size};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

const NEXT: Offset = 0;
const LIMIT: Offset = WORD_BYTES;

/// View of a bump arena laid out at a fixed offset
#[derive(Clone, Debug)]
pub struct SharedArena {
    region: SharedRegion,
    offset: Offset,
}

impl SharedArena {
    /// Lay out an arena covering `[offset, offset + len)`
    ///
    /// Must run once, in one agent, before any other agent attaches.
    pub fn initialize(region: &SharedRegion, offset: Offset, len: Size) -> SyncResult<Self> {
        region.check_range(offset, len.max(ARENA_HEADER_BYTES), WORD_BYTES)?;

        let arena = Self {
            region: region.clone(),
            offset,
        };
        arena
            .next()
            .store((offset + ARENA_HEADER_BYTES) as u32, Ordering::Relaxed);
        arena.limit().store((offset + len) as u32, Ordering::Release);

        debug!(offset, len, "initialized shared arena");
        Ok(arena)
    }

    /// Attach to an arena another agent initialized
    pub fn new(region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        region.check_range(offset, ARENA_HEADER_BYTES, WORD_BYTES)?;

        let arena = Self {
            region: region.clone(),
            offset,
        };
        if arena.limit().load(Ordering::Acquire) == 0 {
            return Err(SyncError::NotInitialized { offset });
        }
        Ok(arena)
    }

    #[inline]
    fn next(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + NEXT)
    }

    #[inline]
    fn limit(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + LIMIT)
    }

    /// Reserve `bytes` bytes aligned to `align` (a power of two)
    ///
    /// Returns the absolute byte offset of the reservation. A request that
    /// does not fit, however large, fails without moving the arena.
    pub fn alloc(&self, bytes: Size, align: Size) -> SyncResult<Offset> {
        if !align.is_power_of_two() {
            return Err(SyncError::InvalidAlignment { align });
        }
        let limit = self.limit().load(Ordering::Acquire) as usize;
        let mut current = self.next().load(Ordering::Acquire);

        loop {
            let span = align_up(current as usize, align)
                .and_then(|start| Some((start, start.checked_add(bytes)?)));
            let (start, end) = match span {
                Some((start, end)) if end <= limit => (start, end),
                _ => {
                    return Err(SyncError::ArenaExhausted {
                        requested: bytes,
                        available: limit.saturating_sub(current as usize),
                    })
                }
            };

            match self.next().compare_exchange_weak(
                current,
                end as u32,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(start),
                Err(observed) => current = observed,
            }
        }
    }

    /// Bytes still available (ignoring alignment padding)
    pub fn remaining(&self) -> Size {
        let limit = self.limit().load(Ordering::Acquire) as usize;
        limit.saturating_sub(self.next().load(Ordering::Acquire) as usize)
    }

    /// First allocatable offset
    #[inline]
    pub fn start(&self) -> Offset {
        self.offset + ARENA_HEADER_BYTES
    }

    /// One past the last allocatable offset
    pub fn end(&self) -> Offset {
        self.limit().load(Ordering::Acquire) as usize
    }
}
