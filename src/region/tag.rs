/*!
 * Buffer Identity Tags
 *
 * Agents cannot compare view objects to decide whether two addresses are the
 * same: every agent holds its own view. Instead each physical region carries
 * a dense integer tag, attached to every view over it, and futex addresses
 * are `(tag, byte offset)` pairs.
 *
 * A process-wide registry records which memory owns which tag so that both
 * kinds of mistake are caught where they are made: the same memory tagged
 * twice with different tags, and one tag reused for different memory.
 */

use super::memory::SharedRegion;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::types::Tag;
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

struct TagRegistry {
    by_tag: DashMap<Tag, usize, RandomState>,
    by_memory: DashMap<usize, Tag, RandomState>,
}

impl TagRegistry {
    fn new() -> Self {
        Self {
            by_tag: DashMap::with_hasher(RandomState::new()),
            by_memory: DashMap::with_hasher(RandomState::new()),
        }
    }

    fn register(&self, tag: Tag, memory: usize) -> SyncResult<()> {
        // Lock order is always by_tag then by_memory
        match self.by_tag.entry(tag) {
            Entry::Occupied(entry) => {
                if *entry.get() != memory {
                    return Err(SyncError::TagInUse { tag });
                }
                Ok(())
            }
            Entry::Vacant(entry) => {
                match self.by_memory.entry(memory) {
                    Entry::Occupied(existing) => {
                        return Err(SyncError::TagConflict {
                            existing: *existing.get(),
                            requested: tag,
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(tag);
                    }
                }
                entry.insert(memory);
                Ok(())
            }
        }
    }

    fn forget(&self, memory: usize) {
        if let Some((_, tag)) = self.by_memory.remove(&memory) {
            self.by_tag.remove_if(&tag, |_, owner| *owner == memory);
        }
    }
}

static REGISTRY: OnceLock<TagRegistry> = OnceLock::new();

fn registry() -> &'static TagRegistry {
    REGISTRY.get_or_init(TagRegistry::new)
}

/// Attach `tag` to this view of a shared region
///
/// Every agent must tag its own view before using the region's addresses
/// with the futex. Tagging again with the same tag is a no-op.
pub fn tag_buffer(region: &SharedRegion, tag: Tag) -> SyncResult<()> {
    if let Some(existing) = region.tag() {
        if existing == tag {
            return Ok(());
        }
        warn!(existing, requested = tag, "view already carries a different tag");
        return Err(SyncError::TagConflict {
            existing,
            requested: tag,
        });
    }

    registry().register(tag, region.identity()).map_err(|e| {
        warn!(tag, error = %e, "buffer tag rejected");
        e
    })?;

    match region.tag_slot().set(tag) {
        Ok(()) => {
            debug!(tag, len = region.len(), "tagged shared region view");
            Ok(())
        }
        // Another thread tagged this same view concurrently
        Err(_) => match region.tag() {
            Some(existing) if existing != tag => Err(SyncError::TagConflict {
                existing,
                requested: tag,
            }),
            _ => Ok(()),
        },
    }
}

/// Tag attached to this view
pub fn identifier(region: &SharedRegion) -> SyncResult<Tag> {
    region.tag().ok_or(SyncError::Untagged)
}

/// Drop the registration of freed memory so its tag can be reused
pub(crate) fn forget_memory(memory: usize) {
    if let Some(registry) = REGISTRY.get() {
        registry.forget(memory);
    }
}
