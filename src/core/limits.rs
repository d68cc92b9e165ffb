/*!
 * System Limits and Constants
 *
 * Centralized location for layout sizes, tuning thresholds and magic numbers.
 * Organized by domain for maintainability and discoverability.
 *
 * ## Conventions
 * - Layout constants are byte counts; every primitive reserves exactly this
 *   many bytes from its base offset
 * - Performance-critical constants are marked with [PERF]
 * - Constants that are part of the shared memory format are marked with
 *   [LAYOUT]; changing them breaks agents built against older layouts
 */

// =============================================================================
// REGION
// =============================================================================

/// Alignment of every region's backing memory (8 bytes)
/// [LAYOUT] Wide enough for 64-bit synchronic cells
pub const REGION_ALIGN: usize = 8;

/// Size of one atomic word used by locks, barriers and futex bookkeeping
pub const WORD_BYTES: usize = 4;

// =============================================================================
// PRIMITIVE LAYOUTS
// =============================================================================

/// Synchronic cell footprint: 8-byte value slot, generation, waiters
/// [LAYOUT]
pub const SYNCHRONIC_BYTES: usize = 16;

/// Synchronic cell alignment
/// [LAYOUT]
pub const SYNCHRONIC_ALIGN: usize = 8;

/// Lock footprint: a single state word
/// [LAYOUT]
pub const LOCK_BYTES: usize = WORD_BYTES;

/// Condition variable footprint: sequence and waiter count
/// [LAYOUT]
pub const COND_BYTES: usize = 2 * WORD_BYTES;

/// Barrier footprint: remaining, sequence, party count
/// [LAYOUT]
pub const BARRIER_BYTES: usize = 3 * WORD_BYTES;

/// Shared arena header: next free offset, limit
/// [LAYOUT]
pub const ARENA_HEADER_BYTES: usize = 2 * WORD_BYTES;

/// Futex workspace header: spinlock, magic, bump next, bump limit
/// [LAYOUT]
pub const FUTEX_HEADER_BYTES: usize = 4 * WORD_BYTES;

/// Futex waiter node: flag cell plus buffer id, address, prev, next
/// [LAYOUT]
pub const FUTEX_NODE_BYTES: usize = SYNCHRONIC_BYTES + 4 * WORD_BYTES;

/// Marker published last by `FutexManager::initialize`
/// [LAYOUT] Zeroed memory never carries it
pub const FUTEX_MAGIC: u32 = 0x5F75_7478;

// =============================================================================
// SPIN TUNING
// =============================================================================

/// Spin iterations before a lock falls back to blocking (100 iterations)
/// [PERF] Covers short critical sections without a park round-trip
pub const DEFAULT_MAX_SPINS: u32 = 100;

/// Spin iterations before the backoff starts yielding (10 iterations)
/// [PERF] ~20ns per `spin_loop` hint
pub const DEFAULT_YIELD_AFTER: u32 = 10;

/// Low-latency preset spin budget (1000 iterations)
pub const LOW_LATENCY_MAX_SPINS: u32 = 1000;

/// Long-wait preset spin budget (10 iterations)
pub const LONG_WAIT_MAX_SPINS: u32 = 10;
