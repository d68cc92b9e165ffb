/*!
 * Shared-Memory Condition Variable
 *
 * Mesa-style condition variable bound to one [`Lock`]. Layout (8 bytes):
 *
 * ```text
 * +0  sequence: u32, bumped by every signal/broadcast
 * +4  waiters:  u32, agents between "counted" and "woken"
 * ```
 *
 * A waiter snapshots `sequence` while still holding the lock, releases the
 * lock and blocks on the snapshot. Any signal after the snapshot changes the
 * word, so the block cannot sleep through it. Wakeups may be spurious:
 * callers re-check their predicate in a loop.
 */

use super::lock::Lock;
use crate::core::errors::SyncResult;
use crate::core::limits::{COND_BYTES, WORD_BYTES};
use crate::core::types::{Offset, Size, WaitStatus};
use crate::region::park::{self, Blocked};
use crate::region::SharedRegion;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const SEQUENCE: Offset = 0;
const WAITERS: Offset = WORD_BYTES;

/// View of a condition variable
#[derive(Clone, Debug)]
pub struct Cond {
    lock: Lock,
    region: SharedRegion,
    offset: Offset,
}

impl Cond {
    pub const BYTE_SIZE: Size = COND_BYTES;
    pub const BYTE_ALIGN: Size = WORD_BYTES;

    /// Zero the condition variable and bind a view to `lock`
    pub fn initialize(lock: &Lock, region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        let cond = Self::new(lock, region, offset)?;
        cond.sequence().store(0, Ordering::SeqCst);
        cond.waiters().store(0, Ordering::SeqCst);
        Ok(cond)
    }

    /// Attach to a condition variable at `offset`, bound to `lock`
    pub fn new(lock: &Lock, region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        region.check_range(offset, Self::BYTE_SIZE, Self::BYTE_ALIGN)?;
        Ok(Self {
            lock: lock.clone(),
            region: region.clone(),
            offset,
        })
    }

    /// The lock this condition variable releases and reacquires
    #[inline]
    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    #[inline]
    fn sequence(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + SEQUENCE)
    }

    #[inline]
    fn waiters(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + WAITERS)
    }

    /// Release the lock, block until signalled, reacquire the lock
    ///
    /// The caller must hold the lock.
    pub fn wait(&self) {
        self.wait_until(None);
    }

    /// [`Cond::wait`] bounded by `timeout`
    ///
    /// The lock is held again on return whatever the outcome.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitStatus {
        self.wait_until(park::deadline_after(Some(timeout)))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> WaitStatus {
        let waiters = self.waiters();
        waiters.fetch_add(1, Ordering::SeqCst);
        let seen = self.sequence().load(Ordering::SeqCst);

        self.lock.unlock();
        let blocked = park::block(self.sequence(), seen, deadline);
        waiters.fetch_sub(1, Ordering::SeqCst);
        self.lock.lock();

        match blocked {
            Blocked::TimedOut => WaitStatus::TimedOut,
            Blocked::Woken | Blocked::NotEqual => WaitStatus::Ok,
        }
    }

    /// Wake one waiter; a no-op when nobody waits
    pub fn signal(&self) {
        let sequence = self.sequence();
        sequence.fetch_add(1, Ordering::SeqCst);
        if self.waiters().load(Ordering::SeqCst) > 0 {
            park::wake(sequence, 1);
        }
    }

    /// Wake every waiter; a no-op when nobody waits
    pub fn broadcast(&self) {
        let sequence = self.sequence();
        sequence.fetch_add(1, Ordering::SeqCst);
        if self.waiters().load(Ordering::SeqCst) > 0 {
            park::wake_all(sequence);
        }
    }

    /// Agents currently inside `wait` (diagnostics)
    #[inline]
    pub fn waiting(&self) -> u32 {
        self.waiters().load(Ordering::SeqCst)
    }
}
