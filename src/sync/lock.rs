/*!
 * Shared-Memory Lock
 *
 * A non-recursive mutex in one 32-bit word:
 *
 * - `0` unlocked
 * - `1` locked, nobody blocked
 * - `2` locked, agents may be blocked on the word
 *
 * Acquisition is two-phase. The spin phase retries CAS(0 -> 1) under a
 * bounded [`Backoff`]; once the budget is spent the agent swaps the word to
 * `2` and blocks until a swap observes `0`. Unlock only pays for a wake when
 * the word said `2`.
 *
 * The lock does not use the synchronic cell: an integer CAS plus block/wake
 * is all it needs.
 */

use super::config::SyncConfig;
use super::spinwait::Backoff;
use crate::core::errors::SyncResult;
use crate::core::limits::{LOCK_BYTES, WORD_BYTES};
use crate::core::types::{Offset, Size};
use crate::region::park;
use crate::region::SharedRegion;
use std::sync::atomic::{AtomicU32, Ordering};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// View of a lock word
#[derive(Clone, Debug)]
pub struct Lock {
    region: SharedRegion,
    offset: Offset,
    config: SyncConfig,
}

impl Lock {
    pub const BYTE_SIZE: Size = LOCK_BYTES;
    pub const BYTE_ALIGN: Size = WORD_BYTES;

    /// Reset the lock word to unlocked and return a view of it
    pub fn initialize(region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        let lock = Self::new(region, offset)?;
        lock.state().store(UNLOCKED, Ordering::SeqCst);
        Ok(lock)
    }

    /// Attach to a lock at `offset`
    pub fn new(region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        region.check_range(offset, Self::BYTE_SIZE, Self::BYTE_ALIGN)?;
        Ok(Self {
            region: region.clone(),
            offset,
            config: SyncConfig::default(),
        })
    }

    /// Use a different spin budget for this view
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn offset(&self) -> Offset {
        self.offset
    }

    #[inline]
    fn state(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset)
    }

    /// Acquire without blocking
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state()
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn lock(&self) {
        if self.try_lock() {
            return;
        }

        // Spin phase
        let state = self.state();
        let mut backoff = Backoff::new(&self.config);
        while backoff.spin() {
            if state.load(Ordering::Relaxed) == UNLOCKED && self.try_lock() {
                return;
            }
        }

        // Block phase: announce contention, sleep until the swap sees it free
        while state.swap(CONTENDED, Ordering::Acquire) != UNLOCKED {
            park::block(state, CONTENDED, None);
        }
    }

    /// Release the lock
    ///
    /// # Panics
    ///
    /// If the lock is not held. Unlocking a free lock would corrupt the state
    /// word for every agent sharing it.
    pub fn unlock(&self) {
        let state = self.state();
        let previous = state.swap(UNLOCKED, Ordering::Release);
        assert!(
            previous != UNLOCKED,
            "unlock of a lock that is not held (offset {})",
            self.offset
        );
        if previous == CONTENDED {
            park::wake(state, 1);
        }
    }

    /// Acquire and return a guard that releases on drop
    pub fn guard(&self) -> LockGuard<'_> {
        self.lock();
        LockGuard { lock: self }
    }

    /// Whether some agent holds the lock right now (diagnostics)
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state().load(Ordering::Relaxed) != UNLOCKED
    }
}

/// Scoped hold on a [`Lock`]
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a Lock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
