/*!
 * Futex Tests
 * Wait/wake matching, timeouts and workspace setup across agents
 */

use pretty_assertions::assert_eq;
use serial_test::serial;
use shared_sync::{tag_buffer, Futex, FutexManager, SharedRegion, SyncError, WaitStatus};
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

// Tags are process-wide; this file uses 3_001..3_099.

fn workspace(max_agents: usize) -> SharedRegion {
    let region = SharedRegion::new(FutexManager::workspace_bytes(max_agents)).unwrap();
    FutexManager::initialize(&region, 0, max_agents).unwrap();
    region
}

fn tagged(len: usize, tag: u32) -> SharedRegion {
    let region = SharedRegion::new(len).unwrap();
    tag_buffer(&region, tag).unwrap();
    region
}

/// Spawn an agent that tags its own view and waits on `index`
fn spawn_waiter(
    ws: &SharedRegion,
    buf: &SharedRegion,
    tag: u32,
    index: usize,
    timeout: Duration,
) -> thread::JoinHandle<WaitStatus> {
    let ws = ws.view();
    let buf = buf.view();
    thread::spawn(move || {
        tag_buffer(&buf, tag).unwrap();
        let futex = Futex::setup(&ws, 0).unwrap();
        futex.wait(&buf, index, 0, Some(timeout)).unwrap()
    })
}

fn await_waiting(futex: &Futex, count: usize) {
    let start = Instant::now();
    while futex.waiting() < count {
        assert!(start.elapsed() < Duration::from_secs(10), "waiters never arrived");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
#[serial]
fn test_wait_with_no_writer_times_out() {
    let ws = workspace(32);
    let buf = tagged(64, 3_001);
    let futex = Futex::setup(&ws, 0).unwrap();

    let start = Instant::now();
    let status = futex
        .wait(&buf, 0, 0, Some(Duration::from_millis(1000)))
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(status, WaitStatus::TimedOut);
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(3000), "took {elapsed:?}");
}

#[test]
fn test_wait_on_changed_value_is_not_equal() {
    let ws = workspace(2);
    let buf = tagged(64, 3_002);
    buf.atomic_i32(12).unwrap().store(-1, Ordering::SeqCst);
    let futex = Futex::setup(&ws, 0).unwrap();

    let start = Instant::now();
    assert_eq!(
        futex.wait(&buf, 3, 0, Some(Duration::from_secs(5))).unwrap(),
        WaitStatus::NotEqual
    );
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(futex.wait(&buf, 3, -1, Some(Duration::ZERO)).unwrap(), WaitStatus::TimedOut);
}

#[test]
fn test_wake_bounded_by_count() {
    let ws = workspace(6);
    let buf = tagged(64, 3_003);
    let waiters: Vec<_> = (0..5)
        .map(|_| spawn_waiter(&ws, &buf, 3_003, 1, Duration::from_secs(10)))
        .collect();

    let waker = Futex::setup(&ws, 0).unwrap();
    await_waiting(&waker, 5);

    assert_eq!(waker.wake(&buf, 1, Some(2)).unwrap(), 2);
    // Woken waiters may still be linked until they unlink themselves, but
    // their flags are set and they are never counted twice
    assert_eq!(waker.wake(&buf, 1, Some(2)).unwrap(), 2);
    assert_eq!(waker.wake(&buf, 1, None).unwrap(), 1);
    assert_eq!(waker.wake(&buf, 1, None).unwrap(), 0);

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), WaitStatus::Ok);
    }
    assert_eq!(waker.waiting(), 0);
}

#[test]
fn test_wake_never_crosses_addresses_or_buffers() {
    let ws = workspace(4);
    let a = tagged(64, 3_010);
    let b = tagged(64, 3_011);

    let same_offset_other_buffer = spawn_waiter(&ws, &b, 3_011, 0, Duration::from_millis(800));
    let other_offset = spawn_waiter(&ws, &a, 3_010, 1, Duration::from_millis(800));
    let target = spawn_waiter(&ws, &a, 3_010, 0, Duration::from_secs(10));

    let waker = Futex::setup(&ws, 0).unwrap();
    await_waiting(&waker, 3);
    assert_eq!(waker.wake(&a, 0, None).unwrap(), 1);

    assert_eq!(target.join().unwrap(), WaitStatus::Ok);
    assert_eq!(other_offset.join().unwrap(), WaitStatus::TimedOut);
    assert_eq!(same_offset_other_buffer.join().unwrap(), WaitStatus::TimedOut);
}

#[test]
fn test_wake_with_zero_budget() {
    let ws = workspace(2);
    let buf = tagged(16, 3_020);
    let waiter = spawn_waiter(&ws, &buf, 3_020, 0, Duration::from_millis(500));

    let waker = Futex::setup(&ws, 0).unwrap();
    await_waiting(&waker, 1);
    assert_eq!(waker.wake(&buf, 0, Some(0)).unwrap(), 0);
    assert_eq!(waiter.join().unwrap(), WaitStatus::TimedOut);
}

#[test]
fn test_futex_reused_across_waits() {
    let ws = workspace(2);
    let buf = tagged(16, 3_030);
    let (tx, rx) = mpsc::channel();

    let ws_view = ws.view();
    let buf_view = buf.view();
    let waiter = thread::spawn(move || {
        tag_buffer(&buf_view, 3_030).unwrap();
        let futex = Futex::setup(&ws_view, 0).unwrap();
        for _ in 0..20 {
            let status = futex
                .wait(&buf_view, 0, 0, Some(Duration::from_secs(10)))
                .unwrap();
            tx.send(status).unwrap();
        }
    });

    let waker = Futex::setup(&ws, 0).unwrap();
    for _ in 0..20 {
        await_waiting(&waker, 1);
        assert_eq!(waker.wake(&buf, 0, Some(1)).unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), WaitStatus::Ok);
    }
    waiter.join().unwrap();
}

#[test]
fn test_setup_errors() {
    let blank = SharedRegion::new(FutexManager::workspace_bytes(1)).unwrap();
    assert_eq!(
        Futex::setup(&blank, 0).unwrap_err(),
        SyncError::NotInitialized { offset: 0 }
    );

    let ws = workspace(1);
    let _only = Futex::setup(&ws, 0).unwrap();
    assert_eq!(
        Futex::setup(&ws.view(), 0).unwrap_err(),
        SyncError::WorkspaceExhausted { capacity: 1 }
    );

    assert!(matches!(
        FutexManager::initialize(&blank, 4, 1),
        Err(SyncError::Misaligned { .. })
    ));
    assert!(matches!(
        FutexManager::initialize(&blank, 0, 2),
        Err(SyncError::OutOfBounds { .. })
    ));
}

#[test]
fn test_untagged_and_unsupported() {
    let ws = workspace(1);
    let futex = Futex::setup(&ws, 0).unwrap();

    let buf = tagged(16, 3_040);
    let fresh = buf.view();
    assert_eq!(futex.wait(&fresh, 0, 0, None), Err(SyncError::Untagged));

    assert!(matches!(
        futex.wake_or_requeue(&buf, 0, 1, 1, 0),
        Err(SyncError::Unsupported(_))
    ));
}

#[test]
fn test_tag_mismatches_rejected() {
    let a = tagged(16, 3_050);
    let b = SharedRegion::new(16).unwrap();

    assert_eq!(
        tag_buffer(&b, 3_050).unwrap_err(),
        SyncError::TagInUse { tag: 3_050 }
    );
    assert_eq!(
        tag_buffer(&a.view(), 3_051).unwrap_err(),
        SyncError::TagConflict {
            existing: 3_050,
            requested: 3_051
        }
    );
    // Retagging with the same tag is fine
    tag_buffer(&a, 3_050).unwrap();
    tag_buffer(&a.view(), 3_050).unwrap();
}
