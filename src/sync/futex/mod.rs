/*!
 * Futex
 * Address-keyed wait queue over arbitrary shared words
 */

mod manager;
mod node;

pub use manager::{Futex, FutexManager};
