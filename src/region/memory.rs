/*!
 * Shared Region
 * Flat, zero-filled memory addressed by byte offset from every agent
 */

use super::tag;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::REGION_ALIGN;
use crate::core::types::{align_up, Offset, Size, Tag};
use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU16, AtomicU32, AtomicU64, AtomicU8};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Backing memory shared by every view of a region
pub(crate) struct RegionMemory {
    words: Box<[AtomicU64]>,
    len: Size,
}

impl RegionMemory {
    /// Stable identity of the physical extent (its base address)
    #[inline]
    pub(crate) fn identity(&self) -> usize {
        self.words.as_ptr() as usize
    }

    #[inline]
    fn base(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }
}

impl Drop for RegionMemory {
    fn drop(&mut self) {
        tag::forget_memory(self.identity());
    }
}

/// One agent's view over a shared region
///
/// Cloning keeps the view (and therefore its buffer tag); [`SharedRegion::view`]
/// produces a fresh untagged view over the same memory, which is what handing
/// the region to another agent looks like.
#[derive(Clone)]
pub struct SharedRegion {
    memory: Arc<RegionMemory>,
    tag: Arc<OnceLock<Tag>>,
}

impl SharedRegion {
    /// Allocate a zero-filled region of at least `len` bytes
    ///
    /// The length is rounded up to the region alignment. Offsets inside the
    /// region are stored in 32-bit words, so the region may not exceed 4GiB.
    pub fn new(len: Size) -> SyncResult<Self> {
        if len == 0 {
            return Err(SyncError::EmptyRegion);
        }
        let len = match align_up(len, REGION_ALIGN) {
            Some(aligned) if aligned <= u32::MAX as usize => aligned,
            _ => {
                return Err(SyncError::OutOfBounds {
                    offset: 0,
                    size: len,
                    region_len: u32::MAX as usize,
                })
            }
        };

        let words = (0..len / REGION_ALIGN)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(len, "allocated shared region");
        Ok(Self {
            memory: Arc::new(RegionMemory { words, len }),
            tag: Arc::new(OnceLock::new()),
        })
    }

    /// A new, untagged view over the same memory
    pub fn view(&self) -> Self {
        Self {
            memory: Arc::clone(&self.memory),
            tag: Arc::new(OnceLock::new()),
        }
    }

    /// Region length in bytes
    #[inline]
    pub fn len(&self) -> Size {
        self.memory.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.memory.len == 0
    }

    /// Buffer tag attached to this view, if any
    #[inline]
    pub fn tag(&self) -> Option<Tag> {
        self.tag.get().copied()
    }

    /// Whether two views address the same physical memory
    #[inline]
    pub fn same_memory(a: &SharedRegion, b: &SharedRegion) -> bool {
        Arc::ptr_eq(&a.memory, &b.memory)
    }

    #[inline]
    pub(crate) fn identity(&self) -> usize {
        self.memory.identity()
    }

    pub(crate) fn tag_slot(&self) -> &OnceLock<Tag> {
        &self.tag
    }

    /// Validate that `[offset, offset + size)` lies inside the region and
    /// that `offset` is a multiple of `align`
    pub fn check_range(&self, offset: Offset, size: Size, align: Size) -> SyncResult<()> {
        if align == 0 || offset % align != 0 {
            return Err(SyncError::Misaligned { offset, align });
        }
        match offset.checked_add(size) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(SyncError::OutOfBounds {
                offset,
                size,
                region_len: self.len(),
            }),
        }
    }

    pub fn atomic_u8(&self, offset: Offset) -> SyncResult<&AtomicU8> {
        self.check_range(offset, 1, 1)?;
        Ok(self.u8_at(offset))
    }

    pub fn atomic_u16(&self, offset: Offset) -> SyncResult<&AtomicU16> {
        self.check_range(offset, 2, 2)?;
        Ok(self.u16_at(offset))
    }

    /// Checked access to an `i32` word (the futex's element type)
    pub fn atomic_i32(&self, offset: Offset) -> SyncResult<&AtomicI32> {
        self.check_range(offset, 4, 4)?;
        Ok(self.i32_at(offset))
    }

    /// Checked access to a `u32` word
    pub fn atomic_u32(&self, offset: Offset) -> SyncResult<&AtomicU32> {
        self.check_range(offset, 4, 4)?;
        Ok(self.u32_at(offset))
    }

    /// Checked access to a `u64` word
    pub fn atomic_u64(&self, offset: Offset) -> SyncResult<&AtomicU64> {
        self.check_range(offset, 8, 8)?;
        Ok(self.u64_at(offset))
    }

    // Primitives validate their whole range once at construction and then go
    // through these accessors. The asserts keep a bad offset from ever turning
    // into an out-of-bounds reference.

    #[inline]
    pub(crate) fn u8_at(&self, offset: Offset) -> &AtomicU8 {
        self.assert_word(offset, 1);
        // SAFETY: in bounds, and every byte of the region is only accessed atomically
        unsafe { &*(self.memory.base().add(offset) as *const AtomicU8) }
    }

    #[inline]
    pub(crate) fn u16_at(&self, offset: Offset) -> &AtomicU16 {
        self.assert_word(offset, 2);
        // SAFETY: in bounds and 2-byte aligned
        unsafe { &*(self.memory.base().add(offset) as *const AtomicU16) }
    }

    #[inline]
    pub(crate) fn u32_at(&self, offset: Offset) -> &AtomicU32 {
        self.assert_word(offset, 4);
        // SAFETY: in bounds and 4-byte aligned
        unsafe { &*(self.memory.base().add(offset) as *const AtomicU32) }
    }

    #[inline]
    pub(crate) fn i32_at(&self, offset: Offset) -> &AtomicI32 {
        self.assert_word(offset, 4);
        // SAFETY: in bounds and 4-byte aligned
        unsafe { &*(self.memory.base().add(offset) as *const AtomicI32) }
    }

    #[inline]
    pub(crate) fn u64_at(&self, offset: Offset) -> &AtomicU64 {
        self.assert_word(offset, 8);
        // SAFETY: in bounds and 8-byte aligned
        unsafe { &*(self.memory.base().add(offset) as *const AtomicU64) }
    }

    #[inline(always)]
    fn assert_word(&self, offset: Offset, width: Size) {
        assert!(
            offset % width == 0 && offset + width <= self.len(),
            "word access at {offset} (width {width}) outside region of {} bytes",
            self.len()
        );
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegion")
            .field("len", &self.len())
            .field("tag", &self.tag())
            .finish()
    }
}
