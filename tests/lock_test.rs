/*!
 * Lock and Condition Tests
 * Mutual exclusion and producer/consumer handoff across agents
 */

use pretty_assertions::assert_eq;
use shared_sync::{Cond, Lock, SharedArena, SharedRegion, SyncConfig, WaitStatus};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

#[test]
fn test_mutual_exclusion() {
    const AGENTS: usize = 8;
    const ITERATIONS: u32 = 5_000;

    let region = SharedRegion::new(16).unwrap();
    Lock::initialize(&region, 0).unwrap();

    let handles: Vec<_> = (0..AGENTS)
        .map(|i| {
            let view = region.view();
            let config = if i % 2 == 0 {
                SyncConfig::default()
            } else {
                SyncConfig::no_spin()
            };
            thread::spawn(move || {
                let lock = Lock::new(&view, 0).unwrap().with_config(config);
                let inside = view.atomic_u32(4).unwrap();
                let counter = view.atomic_u32(8).unwrap();
                for _ in 0..ITERATIONS {
                    let _guard = lock.guard();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        region.atomic_u32(8).unwrap().load(Ordering::SeqCst),
        AGENTS as u32 * ITERATIONS
    );
    assert!(!Lock::new(&region, 0).unwrap().is_locked());
}

/// One-slot queue: lock word, two conditions, slot, full flag
struct Slot {
    lock: Lock,
    not_empty: Cond,
    not_full: Cond,
    region: SharedRegion,
}

const SLOT_VALUE: usize = 32;
const SLOT_FULL: usize = 36;

impl Slot {
    fn layout(region: &SharedRegion) {
        let arena = SharedArena::initialize(region, 0, 32).unwrap();
        let lock_at = arena.alloc(Lock::BYTE_SIZE, Lock::BYTE_ALIGN).unwrap();
        let lock = Lock::initialize(region, lock_at).unwrap();
        for _ in 0..2 {
            let cond_at = arena.alloc(Cond::BYTE_SIZE, Cond::BYTE_ALIGN).unwrap();
            Cond::initialize(&lock, region, cond_at).unwrap();
        }
    }

    fn attach(region: SharedRegion) -> Self {
        let lock = Lock::new(&region, 8).unwrap();
        let not_empty = Cond::new(&lock, &region, 12).unwrap();
        let not_full = Cond::new(&lock, &region, 20).unwrap();
        Self {
            lock,
            not_empty,
            not_full,
            region,
        }
    }

    fn put(&self, value: u32) {
        let _guard = self.lock.guard();
        let full = self.region.atomic_u32(SLOT_FULL).unwrap();
        while full.load(Ordering::SeqCst) == 1 {
            self.not_full.wait();
        }
        self.region
            .atomic_u32(SLOT_VALUE)
            .unwrap()
            .store(value, Ordering::SeqCst);
        full.store(1, Ordering::SeqCst);
        self.not_empty.signal();
    }

    fn take(&self) -> u32 {
        let _guard = self.lock.guard();
        let full = self.region.atomic_u32(SLOT_FULL).unwrap();
        while full.load(Ordering::SeqCst) == 0 {
            self.not_empty.wait();
        }
        let value = self
            .region
            .atomic_u32(SLOT_VALUE)
            .unwrap()
            .load(Ordering::SeqCst);
        full.store(0, Ordering::SeqCst);
        self.not_full.signal();
        value
    }
}

#[test]
fn test_producer_consumer_handoff() {
    let region = SharedRegion::new(40).unwrap();
    Slot::layout(&region);

    let view = region.view();
    let producer = thread::spawn(move || {
        let slot = Slot::attach(view);
        for value in 1..=500 {
            slot.put(value);
        }
    });

    let slot = Slot::attach(region.clone());
    let received: Vec<u32> = (0..500).map(|_| slot.take()).collect();
    producer.join().unwrap();

    assert_eq!(received, (1..=500).collect::<Vec<_>>());
}

#[test]
fn test_broadcast_releases_every_waiter() {
    let region = SharedRegion::new(32).unwrap();
    let lock = Lock::initialize(&region, 0).unwrap();
    let cond = Cond::initialize(&lock, &region, 4).unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let view = region.view();
            thread::spawn(move || {
                let lock = Lock::new(&view, 0).unwrap();
                let cond = Cond::new(&lock, &view, 4).unwrap();
                let go = view.atomic_u32(16).unwrap();
                let _guard = lock.guard();
                while go.load(Ordering::SeqCst) == 0 {
                    cond.wait();
                }
            })
        })
        .collect();

    while cond.waiting() < 6 {
        thread::sleep(Duration::from_millis(1));
    }
    {
        let _guard = lock.guard();
        region.atomic_u32(16).unwrap().store(1, Ordering::SeqCst);
        cond.broadcast();
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cond.waiting(), 0);
}

#[test]
fn test_signal_releases_one_waiter_per_token() {
    const WAITERS: u32 = 4;

    // lock +0, cond +4, tokens +12, consumed +16, exited +20
    let region = SharedRegion::new(32).unwrap();
    let lock = Lock::initialize(&region, 0).unwrap();
    let cond = Cond::initialize(&lock, &region, 4).unwrap();

    let handles: Vec<_> = (0..WAITERS)
        .map(|_| {
            let view = region.view();
            thread::spawn(move || {
                let lock = Lock::new(&view, 0).unwrap();
                let cond = Cond::new(&lock, &view, 4).unwrap();
                let tokens = view.atomic_u32(12).unwrap();
                let consumed = view.atomic_u32(16).unwrap();
                let exited = view.atomic_u32(20).unwrap();

                let _guard = lock.guard();
                loop {
                    let available = tokens.load(Ordering::SeqCst);
                    if available == u32::MAX {
                        break;
                    }
                    if available > 0 {
                        tokens.store(available - 1, Ordering::SeqCst);
                        consumed.fetch_add(1, Ordering::SeqCst);
                    }
                    cond.wait();
                }
                exited.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    while cond.waiting() < WAITERS {
        thread::sleep(Duration::from_millis(1));
    }

    {
        let _guard = lock.guard();
        region.atomic_u32(12).unwrap().store(1, Ordering::SeqCst);
        cond.signal();
    }

    // Whoever wakes takes the only token; the rest stay parked
    let consumed = region.atomic_u32(16).unwrap();
    while consumed.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(50));
    {
        let _guard = lock.guard();
        assert_eq!(consumed.load(Ordering::SeqCst), 1);
        assert_eq!(region.atomic_u32(12).unwrap().load(Ordering::SeqCst), 0);
        assert_eq!(region.atomic_u32(20).unwrap().load(Ordering::SeqCst), 0);
    }

    {
        let _guard = lock.guard();
        region.atomic_u32(12).unwrap().store(u32::MAX, Ordering::SeqCst);
        cond.broadcast();
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(region.atomic_u32(20).unwrap().load(Ordering::SeqCst), WAITERS);
    assert_eq!(consumed.load(Ordering::SeqCst), 1);
    assert_eq!(cond.waiting(), 0);
}

#[test]
fn test_wait_timeout_without_signal() {
    let region = SharedRegion::new(16).unwrap();
    let lock = Lock::initialize(&region, 0).unwrap();
    let cond = Cond::initialize(&lock, &region, 4).unwrap();

    let _guard = lock.guard();
    assert_eq!(cond.wait_timeout(Duration::from_millis(20)), WaitStatus::TimedOut);
    assert!(lock.is_locked());
}
