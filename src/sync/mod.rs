/*!
 * Synchronization Primitives
 *
 * Everything here lives inside a [`SharedRegion`](crate::region::SharedRegion)
 * at a caller-chosen offset. A primitive is initialized once by one agent;
 * every other agent attaches its own view with `new` and never copies the
 * state out of the region.
 *
 * - [`Synchronic`]: value cell with blocking loads and notify
 * - [`Futex`]: block on any `i32` word of any tagged region
 * - [`Lock`] / [`Cond`]: mutex and condition variable
 * - [`Barrier`]: reusable N-party rendezvous
 */

pub mod barrier;
pub mod condvar;
pub mod config;
pub mod futex;
pub mod lock;
pub mod spinwait;
pub mod synchronic;

pub use barrier::Barrier;
pub use condvar::Cond;
pub use config::SyncConfig;
pub use futex::{Futex, FutexManager};
pub use lock::{Lock, LockGuard};
pub use spinwait::Backoff;
pub use synchronic::{SyncInteger, SyncValue, Synchronic, Width};
