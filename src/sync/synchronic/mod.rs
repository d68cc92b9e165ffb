/*!
 * Synchronic Cells
 *
 * Atomic value cells with lock-free blocking wait/notify, generic over a
 * closed set of integer and float element types.
 */

mod cell;
mod value;

pub use cell::Synchronic;
pub use value::{SyncInteger, SyncValue, Width};
