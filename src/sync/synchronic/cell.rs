/*!
 * Synchronic Cell
 *
 * A value slot with blocking wait/notify and no lock. Layout (16 bytes,
 * 8-byte aligned):
 *
 * ```text
 * +0   value slot (8 bytes reserved, the element type uses its own width)
 * +8   generation: u32, bumped after every write to the value
 * +12  waiters:    u32, agents currently inside a blocking load
 * ```
 *
 * # Missed-update freedom
 *
 * Writers update the value first and bump the generation second. Readers
 * take a seqlock snapshot (generation, value, generation again) and block
 * on the generation they observed *before* checking the value. A write that
 * lands between the check and the block changes the generation, so the
 * block returns immediately instead of sleeping through it.
 */

use super::value::{RmwOp, SyncInteger, SyncValue};
use crate::core::errors::SyncResult;
use crate::core::limits::{SYNCHRONIC_ALIGN, SYNCHRONIC_BYTES};
use crate::core::types::{Offset, Size, WaitStatus};
use crate::region::park;
use crate::region::SharedRegion;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

const VALUE: Offset = 0;
const GENERATION: Offset = 8;
const WAITERS: Offset = 12;

/// View of a synchronic cell holding a `T`
pub struct Synchronic<T: SyncValue> {
    region: SharedRegion,
    offset: Offset,
    _marker: PhantomData<T>,
}

impl<T: SyncValue> Clone for Synchronic<T> {
    fn clone(&self) -> Self {
        Self {
            region: self.region.clone(),
            offset: self.offset,
            _marker: PhantomData,
        }
    }
}

impl<T: SyncValue> fmt::Debug for Synchronic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronic")
            .field("offset", &self.offset)
            .field("value", &self.load())
            .field("generation", &self.generation())
            .field("waiters", &self.waiters())
            .finish()
    }
}

impl<T: SyncValue> Synchronic<T> {
    /// Bytes reserved from the base offset
    pub const BYTE_SIZE: Size = SYNCHRONIC_BYTES;
    /// Required alignment of the base offset
    pub const BYTE_ALIGN: Size = SYNCHRONIC_ALIGN;

    /// Zero the cell and return a view of it
    ///
    /// Must complete in one agent before any other agent constructs a view.
    pub fn initialize(region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        let cell = Self::new(region, offset)?;
        T::WIDTH.store(&cell.region, offset + VALUE, 0);
        cell.waiters_word().store(0, Ordering::SeqCst);
        cell.generation_word().store(0, Ordering::SeqCst);
        Ok(cell)
    }

    /// Attach to a cell at `offset`
    pub fn new(region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        region.check_range(offset, Self::BYTE_SIZE, Self::BYTE_ALIGN)?;
        Ok(Self {
            region: region.clone(),
            offset,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn offset(&self) -> Offset {
        self.offset
    }

    #[inline]
    fn generation_word(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + GENERATION)
    }

    #[inline]
    fn waiters_word(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + WAITERS)
    }

    #[inline]
    fn load_bits(&self) -> u64 {
        T::WIDTH.load(&self.region, self.offset + VALUE)
    }

    /// Publish a write: bump the generation, wake sleepers if there are any
    #[inline]
    fn bump(&self) {
        let generation = self.generation_word();
        generation.fetch_add(1, Ordering::SeqCst);
        if self.waiters_word().load(Ordering::SeqCst) > 0 {
            park::wake_all(generation);
        }
    }

    /// CAS loop for operations without native atomic support
    fn update(&self, f: impl Fn(T) -> T) -> T {
        let mut current = self.load_bits();
        loop {
            let new = f(T::from_bits(current)).to_bits();
            match T::WIDTH.compare_exchange(&self.region, self.offset + VALUE, current, new) {
                Ok(previous) => {
                    self.bump();
                    return T::from_bits(previous);
                }
                Err(observed) => current = observed,
            }
        }
    }

    fn rmw(&self, op: RmwOp, v: T) -> T {
        let previous = T::WIDTH.fetch(&self.region, self.offset + VALUE, op, v.to_bits());
        self.bump();
        T::from_bits(previous)
    }

    #[inline]
    pub fn load(&self) -> T {
        T::from_bits(self.load_bits())
    }

    pub fn store(&self, v: T) {
        T::WIDTH.store(&self.region, self.offset + VALUE, v.to_bits());
        self.bump();
    }

    /// Store `v`, returning the previous value
    pub fn exchange(&self, v: T) -> T {
        let previous = T::WIDTH.swap(&self.region, self.offset + VALUE, v.to_bits());
        self.bump();
        T::from_bits(previous)
    }

    /// Replace the value with `new` if it is the same as `old`
    ///
    /// Returns the value observed; the exchange happened iff that value is
    /// the same as `old` under [`SyncValue::same`]. A failed exchange does
    /// not count as a write and wakes nobody.
    pub fn compare_exchange(&self, old: T, new: T) -> T {
        let mut current = self.load_bits();
        loop {
            if !T::from_bits(current).same(old) {
                return T::from_bits(current);
            }
            match T::WIDTH.compare_exchange(&self.region, self.offset + VALUE, current, new.to_bits())
            {
                Ok(previous) => {
                    self.bump();
                    return T::from_bits(previous);
                }
                // +0/-0 or a concurrent write, re-check against the fresh bits
                Err(observed) => current = observed,
            }
        }
    }

    /// Add `v` (wrapping for integers), returning the previous value
    pub fn add(&self, v: T) -> T {
        if T::IS_FLOAT {
            self.update(|x| SyncValue::add(x, v))
        } else {
            self.rmw(RmwOp::Add, v)
        }
    }

    /// Subtract `v` (wrapping for integers), returning the previous value
    pub fn sub(&self, v: T) -> T {
        if T::IS_FLOAT {
            self.update(|x| SyncValue::sub(x, v))
        } else {
            self.rmw(RmwOp::Sub, v)
        }
    }

    /// Wake every agent blocked on this cell without changing the value
    pub fn notify(&self) {
        self.bump();
    }

    /// Consistent `(value, generation)` pair
    fn snapshot(&self) -> (T, u32) {
        let generation = self.generation_word();
        loop {
            let before = generation.load(Ordering::SeqCst);
            let bits = self.load_bits();
            if generation.load(Ordering::SeqCst) == before {
                return (T::from_bits(bits), before);
            }
            std::hint::spin_loop();
        }
    }

    /// Block until `accept` holds for the value or the deadline passes
    fn wait_for(&self, accept: impl Fn(T) -> bool, deadline: Option<Instant>) -> (T, WaitStatus) {
        let waiters = self.waiters_word();
        waiters.fetch_add(1, Ordering::SeqCst);

        let outcome = loop {
            let (value, generation) = self.snapshot();
            if accept(value) {
                break (value, WaitStatus::Ok);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break (value, WaitStatus::TimedOut);
            }
            park::block(self.generation_word(), generation, deadline);
        };

        waiters.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    /// Block until the value is the same as `v`, then return it
    pub fn load_when_equal(&self, v: T) -> T {
        self.wait_for(|x| x.same(v), None).0
    }

    /// Block until the value differs from `v`, then return it
    pub fn load_when_not_equal(&self, v: T) -> T {
        self.wait_for(|x| !x.same(v), None).0
    }

    /// Block until the value differs from `v` or `timeout` elapses
    ///
    /// Returns [`WaitStatus::TimedOut`] if it gave up, [`WaitStatus::Ok`]
    /// otherwise. `None` waits forever.
    pub fn expect_update(&self, v: T, timeout: Option<Duration>) -> WaitStatus {
        self.expect_update_until(v, park::deadline_after(timeout))
    }

    /// [`Synchronic::expect_update`] with an absolute deadline
    pub fn expect_update_until(&self, v: T, deadline: Option<Instant>) -> WaitStatus {
        self.wait_for(|x| !x.same(v), deadline).1
    }

    /// Current generation (diagnostics)
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation_word().load(Ordering::SeqCst)
    }

    /// Agents currently blocked or about to block on this cell (diagnostics)
    #[inline]
    pub fn waiters(&self) -> u32 {
        self.waiters_word().load(Ordering::SeqCst)
    }
}

impl<T: SyncInteger> Synchronic<T> {
    /// Bitwise and, returning the previous value
    pub fn and(&self, v: T) -> T {
        self.rmw(RmwOp::And, v)
    }

    /// Bitwise or, returning the previous value
    pub fn or(&self, v: T) -> T {
        self.rmw(RmwOp::Or, v)
    }

    /// Bitwise xor, returning the previous value
    pub fn xor(&self, v: T) -> T {
        self.rmw(RmwOp::Xor, v)
    }
}
