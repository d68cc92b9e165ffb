/*!
 * Block/Wake Facility
 *
 * Address-keyed parking for agents waiting on a 32-bit word in a shared
 * region. Built on parking_lot_core, which keeps a global hash table of
 * parked threads keyed by address; on Linux the parking itself bottoms out
 * in futex syscalls.
 *
 * # Design
 *
 * `block` is an atomic check-then-block: the expected value is validated
 * while the parking bucket is locked, and `wake` takes the same bucket lock,
 * so a store + wake that races with a block can never be lost. Wakes may
 * still be spurious from the caller's point of view (another agent's update
 * on the same word), so every caller re-checks its condition in a loop.
 */

use parking_lot_core::{
    park, unpark_all, unpark_filter, FilterOp, ParkResult, DEFAULT_PARK_TOKEN,
    DEFAULT_UNPARK_TOKEN,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Outcome of a single block call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocked {
    /// Unparked by a wake on the same word
    Woken,
    /// The word no longer held the expected value, the agent never slept
    NotEqual,
    /// The deadline passed
    TimedOut,
}

#[inline]
fn key(word: &AtomicU32) -> usize {
    word as *const AtomicU32 as usize
}

/// Convert a relative timeout into an absolute deadline
///
/// `None`, and durations too large to represent, mean "wait forever".
#[inline]
pub fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

/// Block the calling agent while `word` holds `expected`
pub fn block(word: &AtomicU32, expected: u32, deadline: Option<Instant>) -> Blocked {
    // SAFETY: the key is the address of a word inside a live region; the
    // callbacks only perform an atomic load and never call back into the
    // parking lot
    let result = unsafe {
        park(
            key(word),
            || word.load(Ordering::SeqCst) == expected,
            || {},
            |_key, _was_last| {},
            DEFAULT_PARK_TOKEN,
            deadline,
        )
    };

    match result {
        ParkResult::Unparked(_) => Blocked::Woken,
        ParkResult::Invalid => Blocked::NotEqual,
        ParkResult::TimedOut => Blocked::TimedOut,
    }
}

/// Wake up to `count` agents blocked on `word`, returning how many woke
pub fn wake(word: &AtomicU32, count: usize) -> usize {
    if count == 0 {
        return 0;
    }

    let mut budget = count;
    // SAFETY: see `block`; the filter closure only touches local state
    let result = unsafe {
        unpark_filter(
            key(word),
            |_token| {
                if budget == 0 {
                    FilterOp::Stop
                } else {
                    budget -= 1;
                    FilterOp::Unpark
                }
            },
            |_result| DEFAULT_UNPARK_TOKEN,
        )
    };
    result.unparked_threads
}

/// Wake every agent blocked on `word`
pub fn wake_all(word: &AtomicU32) -> usize {
    // SAFETY: see `block`
    unsafe { unpark_all(key(word), DEFAULT_UNPARK_TOKEN) }
}
