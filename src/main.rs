/*!
 * sync-stress
 *
 * Runs the shared-memory primitives through the end-to-end scenarios they
 * are expected to pass and exits non-zero on the first failure:
 * - synchronic handoff between two agents
 * - barrier-synchronized rotation over disjoint segments
 * - futex wait timing out with no waker
 * - lock contention with a critical-section occupancy check
 *
 * Environment variables:
 * - SYNC_STRESS_AGENTS: agents in the lock contention run (default: 8)
 * - SYNC_STRESS_ITERATIONS: lock acquisitions per agent (default: 10000)
 */

use anyhow::{ensure, Context, Result};
use shared_sync::monitoring::span_operation;
use shared_sync::{
    init_tracing, tag_buffer, Barrier, Futex, FutexManager, Lock, SharedArena, SharedRegion,
    Synchronic, WaitStatus,
};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

const SEGMENTS: usize = 5;
const SEGMENT_WORDS: usize = 10;
const FUTEX_AGENTS: usize = 32;
const FUTEX_TIMEOUT: Duration = Duration::from_millis(1000);

fn env_or(name: &str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} must be a positive integer, got {value:?}")),
        Err(_) => Ok(default),
    }
}

/// Agent B blocks before agent A stores 5; B must observe exactly 5
fn synchronic_handoff() -> Result<()> {
    let span = span_operation("synchronic_handoff", Duration::from_secs(1));
    let _entered = span.enter();
    let region = SharedRegion::new(Synchronic::<i32>::BYTE_SIZE)?;
    let cell = Synchronic::<i32>::initialize(&region, 0)?;

    let not_equal = Synchronic::<i32>::new(&region.view(), 0)?;
    let equal = Synchronic::<i32>::new(&region.view(), 0)?;
    let readers = [
        thread::spawn(move || not_equal.load_when_not_equal(0)),
        thread::spawn(move || equal.load_when_equal(5)),
    ];

    // Give both readers time to block
    while cell.waiters() < 2 {
        thread::yield_now();
    }
    cell.store(5);

    for reader in readers {
        let seen = reader
            .join()
            .map_err(|_| anyhow::anyhow!("synchronic reader panicked"))?;
        ensure!(seen == 5, "reader observed {seen}, expected 5");
    }
    span.record_result(true);
    info!(generation = cell.generation(), "synchronic handoff passed");
    Ok(())
}

/// Four agents plus this one rotate over five disjoint segments
///
/// In round `r` agent `i` adds `r + 1` to every word of segment
/// `(i + r) % 5`, so after five rounds every word holds 1 + 2 + ... + 5.
fn barrier_rotation() -> Result<()> {
    let span = span_operation("barrier_rotation", Duration::from_secs(1));
    let _entered = span.enter();
    let parties = SEGMENTS as u32;

    let arena_len = 64 + SEGMENTS * SEGMENT_WORDS * 4;
    let region = SharedRegion::new(arena_len)?;
    let arena = SharedArena::initialize(&region, 0, arena_len)?;
    let barrier_offset = arena.alloc(Barrier::BYTE_SIZE, Barrier::BYTE_ALIGN)?;
    let data = arena.alloc(SEGMENTS * SEGMENT_WORDS * 4, 4)?;
    Barrier::initialize(&region, barrier_offset, parties)?;

    let rotate = move |region: SharedRegion, agent: usize| -> Result<()> {
        let barrier = Barrier::new(&region, barrier_offset)?;
        for round in 0..SEGMENTS {
            let segment = (agent + round) % SEGMENTS;
            for word in 0..SEGMENT_WORDS {
                let cell = region.atomic_i32(data + (segment * SEGMENT_WORDS + word) * 4)?;
                // Plain load/store: a second writer in the same round would lose updates
                let value = cell.load(Ordering::Relaxed);
                cell.store(value + round as i32 + 1, Ordering::Relaxed);
            }
            barrier.enter();
        }
        Ok(())
    };

    let workers: Vec<_> = (1..SEGMENTS)
        .map(|agent| {
            let view = region.view();
            thread::spawn(move || rotate(view, agent))
        })
        .collect();
    rotate(region.clone(), 0)?;
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("rotation agent panicked"))??;
    }

    for index in 0..SEGMENTS * SEGMENT_WORDS {
        let value = region.atomic_i32(data + index * 4)?.load(Ordering::SeqCst);
        ensure!(value == 15, "word {index} holds {value}, expected 15");
    }
    span.record_items_processed((SEGMENTS * SEGMENT_WORDS) as u64);
    span.record_result(true);
    info!(parties, words = SEGMENTS * SEGMENT_WORDS, "barrier rotation passed");
    Ok(())
}

/// A wait nobody wakes must time out after about one second
fn futex_timeout() -> Result<()> {
    let span = span_operation("futex_timeout", FUTEX_TIMEOUT * 2);
    let _entered = span.enter();
    let workspace = SharedRegion::new(FutexManager::workspace_bytes(FUTEX_AGENTS))?;
    FutexManager::initialize(&workspace, 0, FUTEX_AGENTS)?;

    let buf = SharedRegion::new(64)?;
    tag_buffer(&buf, 1)?;
    let futex = Futex::setup(&workspace, 0)?;

    let start = Instant::now();
    let status = futex.wait(&buf, 0, 0, Some(FUTEX_TIMEOUT))?;
    let elapsed = start.elapsed();

    ensure!(
        status == WaitStatus::TimedOut,
        "futex wait returned {status:?}, expected TimedOut"
    );
    ensure!(
        elapsed >= FUTEX_TIMEOUT,
        "futex wait returned after {elapsed:?}, before the timeout"
    );
    span.record_result(true);
    info!(elapsed_ms = elapsed.as_millis() as u64, "futex timeout passed");
    Ok(())
}

/// Agents hammer one lock; the critical section must never be shared
fn lock_contention(agents: usize, iterations: usize) -> Result<()> {
    let span = span_operation("lock_contention", Duration::from_secs(5));
    let _entered = span.enter();
    let region = SharedRegion::new(16)?;
    Lock::initialize(&region, 0)?;

    let workers: Vec<_> = (0..agents)
        .map(|_| {
            let view = region.view();
            thread::spawn(move || -> Result<u32> {
                let lock = Lock::new(&view, 0)?;
                let occupancy = view.atomic_u32(4)?;
                let counter = view.atomic_u32(8)?;
                let mut worst = 0;
                for _ in 0..iterations {
                    let _guard = lock.guard();
                    worst = worst.max(occupancy.fetch_add(1, Ordering::SeqCst) + 1);
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                    occupancy.fetch_sub(1, Ordering::SeqCst);
                }
                Ok(worst)
            })
        })
        .collect();

    for worker in workers {
        let worst = worker
            .join()
            .map_err(|_| anyhow::anyhow!("lock agent panicked"))??;
        ensure!(worst == 1, "{worst} agents were inside the critical section at once");
    }

    let total = region.atomic_u32(8)?.load(Ordering::SeqCst) as usize;
    ensure!(
        total == agents * iterations,
        "counter is {total}, expected {}",
        agents * iterations
    );
    span.record_items_processed(total as u64);
    span.record_result(true);
    info!(agents, iterations, "lock contention passed");
    Ok(())
}

fn run() -> Result<()> {
    let agents = env_or("SYNC_STRESS_AGENTS", 8)?;
    let iterations = env_or("SYNC_STRESS_ITERATIONS", 10_000)?;

    synchronic_handoff().context("synchronic handoff")?;
    barrier_rotation().context("barrier rotation")?;
    futex_timeout().context("futex timeout")?;
    lock_contention(agents, iterations).context("lock contention")?;
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;

    info!("sync-stress starting");
    if let Err(e) = run() {
        error!(error = %format!("{e:#}"), "sync-stress failed");
        return Err(e);
    }
    info!("all scenarios passed");
    Ok(())
}
