/*!
 * Bounded Spin Backoff
 *
 * The spin half of every spin-then-block path. Short waits are served by
 * spinning so they never pay for a park/unpark round-trip; once the budget
 * is spent the caller blocks on the word instead of burning CPU.
 *
 * 1. **Tight spin phase** (`0..yield_after`): `spin_loop()` hint
 * 2. **Yield phase** (`yield_after..max_spins`): `yield_now()`
 * 3. **Exhausted**: `spin()` returns false, the caller blocks
 */

use super::config::SyncConfig;
use std::thread;

/// Spin budget for one acquire attempt
#[derive(Debug)]
pub struct Backoff {
    step: u32,
    max_spins: u32,
    yield_after: u32,
}

impl Backoff {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            step: 0,
            max_spins: config.max_spins,
            yield_after: config.yield_after,
        }
    }

    /// Spin once; returns false once the budget is spent
    #[inline]
    pub fn spin(&mut self) -> bool {
        if self.step >= self.max_spins {
            return false;
        }

        if self.step < self.yield_after {
            std::hint::spin_loop();
        } else {
            thread::yield_now();
        }

        self.step += 1;
        true
    }

    /// Spin without a budget, for waits that are known to be short
    #[inline]
    pub fn snooze(&mut self) {
        if !self.spin() {
            thread::yield_now();
        }
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.step >= self.max_spins
    }
}
