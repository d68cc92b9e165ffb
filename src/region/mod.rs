/*!
 * Shared Region
 *
 * The leaf layer every primitive is built on:
 * - `SharedRegion`: zero-filled memory with atomic word access by byte offset
 * - `park`: block on a word until it changes, wake agents blocked on a word
 * - `tag`: buffer identity tags for cross-agent address equality
 * - `SharedArena`: bump allocation of primitive ranges inside a region
 */

mod arena;
mod memory;
pub mod park;
mod tag;

pub use arena::SharedArena;
pub use memory::SharedRegion;
pub use park::Blocked;
pub use tag::{identifier, tag_buffer};
