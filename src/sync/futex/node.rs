/*!
 * Futex Waiter Nodes
 *
 * One node per agent, linked into a circular doubly linked list by byte
 * offsets rather than pointers. Layout (32 bytes, 8-byte aligned):
 *
 * ```text
 * +0   flag:      Synchronic<i32>, 0 while waiting, 1 once woken
 * +16  buffer_id: u32, tag of the region the agent waits on
 * +20  byte_addr: u32, byte offset of the awaited word in that region
 * +24  prev:      u32, offset of the previous node
 * +28  next:      u32, offset of the next node
 * ```
 *
 * Every link field is only touched with the workspace spinlock held, so the
 * loads and stores here are relaxed; the spinlock orders them.
 */

use crate::core::limits::SYNCHRONIC_BYTES;
use crate::core::types::{Offset, Tag};
use crate::region::SharedRegion;
use std::sync::atomic::{AtomicU32, Ordering};

const BUFFER_ID: Offset = SYNCHRONIC_BYTES;
const BYTE_ADDR: Offset = SYNCHRONIC_BYTES + 4;
const PREV: Offset = SYNCHRONIC_BYTES + 8;
const NEXT: Offset = SYNCHRONIC_BYTES + 12;

/// Borrowed view of one node
#[derive(Clone, Copy)]
pub(super) struct Node<'a> {
    region: &'a SharedRegion,
    offset: Offset,
}

impl<'a> Node<'a> {
    #[inline]
    pub(super) fn at(region: &'a SharedRegion, offset: Offset) -> Self {
        Self { region, offset }
    }

    #[inline]
    pub(super) fn offset(&self) -> Offset {
        self.offset
    }

    #[inline]
    fn word(&self, field: Offset) -> &'a AtomicU32 {
        self.region.u32_at(self.offset + field)
    }

    /// The wait flag's value word (the synchronic cell's value slot)
    #[inline]
    pub(super) fn flag_value(&self) -> i32 {
        self.region.i32_at(self.offset).load(Ordering::SeqCst)
    }

    #[inline]
    pub(super) fn buffer_id(&self) -> Tag {
        self.word(BUFFER_ID).load(Ordering::Relaxed)
    }

    #[inline]
    pub(super) fn byte_addr(&self) -> u32 {
        self.word(BYTE_ADDR).load(Ordering::Relaxed)
    }

    #[inline]
    pub(super) fn set_target(&self, tag: Tag, byte_addr: u32) {
        self.word(BUFFER_ID).store(tag, Ordering::Relaxed);
        self.word(BYTE_ADDR).store(byte_addr, Ordering::Relaxed);
    }

    #[inline]
    pub(super) fn prev(&self) -> Offset {
        self.word(PREV).load(Ordering::Relaxed) as Offset
    }

    #[inline]
    pub(super) fn next(&self) -> Offset {
        self.word(NEXT).load(Ordering::Relaxed) as Offset
    }

    #[inline]
    fn set_prev(&self, offset: Offset) {
        self.word(PREV).store(offset as u32, Ordering::Relaxed);
    }

    #[inline]
    fn set_next(&self, offset: Offset) {
        self.word(NEXT).store(offset as u32, Ordering::Relaxed);
    }

    /// Make this node a list of its own (sentinel init, or "not linked")
    pub(super) fn self_link(&self) {
        self.set_prev(self.offset);
        self.set_next(self.offset);
    }

    #[inline]
    pub(super) fn is_linked(&self) -> bool {
        self.next() != self.offset
    }

    /// Splice this node in just before `sentinel`, i.e. at the list tail
    pub(super) fn link_before(&self, sentinel: Node<'a>) {
        assert!(!self.is_linked(), "futex node {} linked twice", self.offset);

        let tail = Node::at(self.region, sentinel.prev());
        self.set_prev(tail.offset);
        self.set_next(sentinel.offset);
        tail.set_next(self.offset);
        sentinel.set_prev(self.offset);
    }

    /// Remove this node from whatever list it is in
    pub(super) fn unlink(&self) {
        assert!(self.is_linked(), "futex node {} unlinked twice", self.offset);

        let prev = Node::at(self.region, self.prev());
        let next = Node::at(self.region, self.next());
        prev.set_next(next.offset);
        next.set_prev(prev.offset);
        self.self_link();
    }
}
