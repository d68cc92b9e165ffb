/*!
 * Synchronic Cell Tests
 * Cross-agent handoff, missed-update freedom and value equality
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use shared_sync::{SharedRegion, SyncValue, Synchronic, WaitStatus};
use std::thread;
use std::time::{Duration, Instant};

fn shared_cell<T: SyncValue>() -> (SharedRegion, Synchronic<T>) {
    let region = SharedRegion::new(Synchronic::<T>::BYTE_SIZE * 4).unwrap();
    let cell = Synchronic::<T>::initialize(&region, 0).unwrap();
    (region, cell)
}

#[test]
fn test_blocked_reader_observes_store() {
    let (region, cell) = shared_cell::<i32>();

    let not_equal = Synchronic::<i32>::new(&region.view(), 0).unwrap();
    let equal = Synchronic::<i32>::new(&region.view(), 0).unwrap();
    let a = thread::spawn(move || not_equal.load_when_not_equal(0));
    let b = thread::spawn(move || equal.load_when_equal(5));

    while cell.waiters() < 2 {
        thread::yield_now();
    }
    cell.store(5);

    assert_eq!(a.join().unwrap(), 5);
    assert_eq!(b.join().unwrap(), 5);
    assert_eq!(cell.waiters(), 0);
}

#[test]
fn test_load_when_equal_on_current_value_returns_at_once() {
    let (_region, cell) = shared_cell::<u8>();
    assert_eq!(cell.load_when_equal(0), 0);
}

#[test]
fn test_ping_pong_never_misses_an_update() {
    const ROUNDS: i64 = 2_000;
    let (region, ping) = shared_cell::<i64>();
    let pong = Synchronic::<i64>::initialize(&region, 16).unwrap();

    let view = region.view();
    let handle = thread::spawn(move || {
        let ping = Synchronic::<i64>::new(&view, 0).unwrap();
        let pong = Synchronic::<i64>::new(&view, 16).unwrap();
        for round in 1..=ROUNDS {
            assert_eq!(ping.load_when_equal(round), round);
            pong.store(round);
        }
    });

    for round in 1..=ROUNDS {
        ping.store(round);
        assert_eq!(pong.load_when_equal(round), round);
    }
    handle.join().unwrap();
}

#[test]
fn test_concurrent_adds_are_atomic() {
    let (region, cell) = shared_cell::<u32>();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cell = Synchronic::<u32>::new(&region.view(), 0).unwrap();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    cell.add(1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cell.load(), 8_000);
    assert_eq!(cell.generation(), 8_000);
}

#[test]
fn test_concurrent_float_adds() {
    let (region, cell) = shared_cell::<f64>();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cell = Synchronic::<f64>::new(&region.view(), 0).unwrap();
            thread::spawn(move || {
                for _ in 0..500 {
                    cell.add(0.5);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Halves are exact in binary
    assert_eq!(cell.load(), 1_000.0);
}

#[test]
fn test_notify_without_change_keeps_expect_update_waiting() {
    let (region, cell) = shared_cell::<i32>();
    let reader = Synchronic::<i32>::new(&region.view(), 0).unwrap();

    let handle = thread::spawn(move || {
        let start = Instant::now();
        // The value never changes, so only the deadline can end this wait
        let status = reader.expect_update(0, Some(Duration::from_millis(200)));
        (status, start.elapsed())
    });
    while cell.waiters() == 0 {
        thread::yield_now();
    }
    cell.notify();

    let (status, elapsed) = handle.join().unwrap();
    assert_eq!(status, WaitStatus::TimedOut);
    assert!(elapsed >= Duration::from_millis(200));
}

#[test]
fn test_expect_update_sees_write_from_other_agent() {
    let (region, cell) = shared_cell::<u16>();
    let writer = Synchronic::<u16>::new(&region.view(), 0).unwrap();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        writer.store(9);
    });

    assert_eq!(cell.expect_update(0, Some(Duration::from_secs(10))), WaitStatus::Ok);
    assert_eq!(cell.load(), 9);
    handle.join().unwrap();
}

#[test]
fn test_views_out_of_range() {
    let region = SharedRegion::new(16).unwrap();
    assert!(Synchronic::<i8>::new(&region, 8).is_err());
    assert!(Synchronic::<i8>::new(&region, 4).is_err());
}

proptest! {
    #[test]
    fn float_same_matches_bits_or_zero(a in any::<f64>(), b in any::<f64>()) {
        let expected = a.to_bits() == b.to_bits() || (a == 0.0 && b == 0.0);
        prop_assert_eq!(a.same(b), expected);
    }

    #[test]
    fn float_store_preserves_bits(bits in any::<u32>()) {
        let (_region, cell) = shared_cell::<f32>();
        let value = f32::from_bits(bits);
        cell.store(value);
        prop_assert_eq!(cell.load().to_bits(), bits);
    }

    #[test]
    fn integer_same_is_equality(a in any::<i16>(), b in any::<i16>()) {
        prop_assert_eq!(a.same(b), a == b);
    }
}
