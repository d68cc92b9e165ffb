/*!
 * Shared-Memory Barrier
 *
 * Reusable N-party rendezvous. Layout (12 bytes):
 *
 * ```text
 * +0  remaining:   u32, counts down from party_count each round
 * +4  sequence:    u32, even between rounds, odd while a release is running
 * +8  party_count: u32
 * ```
 *
 * The last arrival resets `remaining`, makes `sequence` odd, wakes everyone
 * blocked on it and makes it even again. Released agents do not return
 * while `sequence` is odd, so none of them can re-enter and decrement
 * `remaining` for the next round before the release that reset it is over.
 */

use super::config::SyncConfig;
use super::spinwait::Backoff;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{BARRIER_BYTES, WORD_BYTES};
use crate::core::types::{Offset, Size};
use crate::region::park;
use crate::region::SharedRegion;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

const REMAINING: Offset = 0;
const SEQUENCE: Offset = WORD_BYTES;
const PARTIES: Offset = 2 * WORD_BYTES;

/// View of a barrier
#[derive(Clone, Debug)]
pub struct Barrier {
    region: SharedRegion,
    offset: Offset,
}

impl Barrier {
    pub const BYTE_SIZE: Size = BARRIER_BYTES;
    pub const BYTE_ALIGN: Size = WORD_BYTES;

    /// Lay out a barrier for `parties` agents
    pub fn initialize(region: &SharedRegion, offset: Offset, parties: u32) -> SyncResult<Self> {
        if parties == 0 {
            return Err(SyncError::InvalidPartyCount(parties));
        }
        region.check_range(offset, Self::BYTE_SIZE, Self::BYTE_ALIGN)?;

        let barrier = Self {
            region: region.clone(),
            offset,
        };
        barrier.remaining().store(parties, Ordering::SeqCst);
        barrier.sequence().store(0, Ordering::SeqCst);
        barrier.party_count().store(parties, Ordering::SeqCst);

        debug!(offset, parties, "initialized barrier");
        Ok(barrier)
    }

    /// Attach to a barrier another agent initialized
    pub fn new(region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        region.check_range(offset, Self::BYTE_SIZE, Self::BYTE_ALIGN)?;

        let barrier = Self {
            region: region.clone(),
            offset,
        };
        if barrier.parties() == 0 {
            return Err(SyncError::NotInitialized { offset });
        }
        Ok(barrier)
    }

    #[inline]
    fn remaining(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + REMAINING)
    }

    #[inline]
    fn sequence(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + SEQUENCE)
    }

    #[inline]
    fn party_count(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + PARTIES)
    }

    /// Number of agents that must enter to complete a round
    #[inline]
    pub fn parties(&self) -> u32 {
        self.party_count().load(Ordering::SeqCst)
    }

    /// Block until `parties` agents have entered this round
    ///
    /// Returns true for exactly one agent per round, the one whose arrival
    /// released the others.
    pub fn enter(&self) -> bool {
        let sequence = self.sequence();
        // Must be read before decrementing: afterwards the round may already
        // have been released and the next one started
        let seen = sequence.load(Ordering::SeqCst);

        if self.remaining().fetch_sub(1, Ordering::SeqCst) == 1 {
            self.remaining().store(self.parties(), Ordering::SeqCst);
            sequence.fetch_add(1, Ordering::SeqCst);
            park::wake_all(sequence);
            sequence.fetch_add(1, Ordering::SeqCst);
            return true;
        }

        while sequence.load(Ordering::SeqCst) == seen {
            park::block(sequence, seen, None);
        }

        // Release in progress: the releaser is between its two increments
        let mut backoff = Backoff::new(&SyncConfig::default());
        while sequence.load(Ordering::SeqCst) & 1 == 1 {
            backoff.snooze();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_party_never_blocks() {
        let region = SharedRegion::new(16).unwrap();
        let barrier = Barrier::initialize(&region, 0, 1).unwrap();

        for _ in 0..10 {
            assert!(barrier.enter());
        }
        assert_eq!(barrier.sequence().load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_zero_parties_rejected() {
        let region = SharedRegion::new(16).unwrap();
        assert_eq!(
            Barrier::initialize(&region, 0, 0).unwrap_err(),
            SyncError::InvalidPartyCount(0)
        );
        assert_eq!(
            Barrier::new(&region, 0).unwrap_err(),
            SyncError::NotInitialized { offset: 0 }
        );
    }

    #[test]
    fn test_one_leader_per_round() {
        const PARTIES: u32 = 4;
        const ROUNDS: usize = 50;

        let region = SharedRegion::new(16).unwrap();
        Barrier::initialize(&region, 4, PARTIES).unwrap();

        let handles: Vec<_> = (0..PARTIES)
            .map(|_| {
                let barrier = Barrier::new(&region.view(), 4).unwrap();
                thread::spawn(move || (0..ROUNDS).filter(|_| barrier.enter()).count())
            })
            .collect();

        let leaders: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(leaders, ROUNDS);
    }
}
