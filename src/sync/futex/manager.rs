/*!
 * Futex Wait-Queue Manager
 *
 * Lets agents block on any `i32` word of any tagged shared region, whether or
 * not that word has a synchronic layout around it. Waiters are tracked in one
 * workspace shared by every agent:
 *
 * ```text
 * +0   spinlock:    Lock word guarding the whole list
 * +4   magic:       FUTEX_MAGIC once initialization is complete
 * +8   alloc_next:  bump arena header
 * +12  alloc_limit
 * +16  sentinel node
 * +48  node slots, one per agent
 * ```
 *
 * Waiting publishes a node `(tag, byte address)` at the list tail and blocks
 * on the node's own synchronic flag; waking walks the list once and flips the
 * flag of each matching node. A node is in the list exactly while its owner
 * is inside `wait`.
 */

use super::node::Node;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{
    FUTEX_HEADER_BYTES, FUTEX_MAGIC, FUTEX_NODE_BYTES, SYNCHRONIC_ALIGN, WORD_BYTES,
};
use crate::core::types::{Offset, Size, WaitStatus};
use crate::region::{identifier, park, SharedArena, SharedRegion};
use crate::sync::lock::Lock;
use crate::sync::synchronic::Synchronic;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

const SPINLOCK: Offset = 0;
const MAGIC: Offset = WORD_BYTES;
const ARENA: Offset = 2 * WORD_BYTES;
const SENTINEL: Offset = FUTEX_HEADER_BYTES;

const WAITING: i32 = 0;
const WOKEN: i32 = 1;

/// View of a futex workspace
#[derive(Clone, Debug)]
pub struct FutexManager {
    region: SharedRegion,
    offset: Offset,
}

impl FutexManager {
    /// Bytes a workspace for `max_agents` agents occupies
    pub const fn workspace_bytes(max_agents: usize) -> Size {
        FUTEX_HEADER_BYTES + FUTEX_NODE_BYTES * (max_agents + 1)
    }

    /// Lay out a workspace for `max_agents` agents at `offset`
    ///
    /// Must complete in one agent before any agent calls [`Futex::setup`].
    pub fn initialize(region: &SharedRegion, offset: Offset, max_agents: usize) -> SyncResult<Self> {
        let bytes = Self::workspace_bytes(max_agents);
        region.check_range(offset, bytes, SYNCHRONIC_ALIGN)?;

        let manager = Self {
            region: region.clone(),
            offset,
        };
        manager.magic().store(0, Ordering::SeqCst);
        Lock::initialize(region, offset + SPINLOCK)?;

        let arena = SharedArena::initialize(region, offset + ARENA, bytes - ARENA)?;
        let sentinel = arena.alloc(FUTEX_NODE_BYTES, SYNCHRONIC_ALIGN)?;
        debug_assert_eq!(sentinel, offset + SENTINEL);
        Synchronic::<i32>::initialize(region, sentinel)?;
        Node::at(region, sentinel).self_link();

        manager.magic().store(FUTEX_MAGIC, Ordering::Release);
        debug!(offset, max_agents, bytes, "initialized futex workspace");
        Ok(manager)
    }

    /// Attach to a workspace another agent initialized
    pub fn new(region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        region.check_range(offset, Self::workspace_bytes(0), SYNCHRONIC_ALIGN)?;

        let manager = Self {
            region: region.clone(),
            offset,
        };
        if manager.magic().load(Ordering::Acquire) != FUTEX_MAGIC {
            warn!(offset, "no futex workspace at offset");
            return Err(SyncError::NotInitialized { offset });
        }
        Ok(manager)
    }

    #[inline]
    fn magic(&self) -> &AtomicU32 {
        self.region.u32_at(self.offset + MAGIC)
    }

    fn arena(&self) -> SyncResult<SharedArena> {
        SharedArena::new(&self.region, self.offset + ARENA)
    }

    fn spinlock(&self) -> SyncResult<Lock> {
        Lock::new(&self.region, self.offset + SPINLOCK)
    }

    /// Number of agents the workspace has node slots for
    pub fn capacity(&self) -> SyncResult<usize> {
        let arena = self.arena()?;
        Ok((arena.end() - self.offset) / FUTEX_NODE_BYTES - 1)
    }

    /// Node slots not yet claimed by an agent
    pub fn available(&self) -> SyncResult<usize> {
        Ok(self.arena()?.remaining() / FUTEX_NODE_BYTES)
    }

    /// Claim this agent's node and return its futex handle
    pub fn setup(&self) -> SyncResult<Futex> {
        let node = self
            .arena()?
            .alloc(FUTEX_NODE_BYTES, SYNCHRONIC_ALIGN)
            .map_err(|e| match e {
                SyncError::ArenaExhausted { .. } => {
                    let capacity = self.capacity().unwrap_or_default();
                    warn!(offset = self.offset, capacity, "futex workspace exhausted");
                    SyncError::WorkspaceExhausted { capacity }
                }
                other => other,
            })?;

        let flag = Synchronic::<i32>::initialize(&self.region, node)?;
        Node::at(&self.region, node).self_link();

        debug!(workspace = self.offset, node, "claimed futex node");
        Ok(Futex {
            lock: self.spinlock()?,
            workspace: self.region.clone(),
            sentinel: self.offset + SENTINEL,
            node,
            flag,
            _not_sync: PhantomData,
        })
    }

    /// Agents currently linked into the wait list (diagnostics)
    pub fn waiting(&self) -> SyncResult<usize> {
        let lock = self.spinlock()?;
        let _guard = lock.guard();
        Ok(count_linked(&self.region, self.offset + SENTINEL))
    }
}

fn count_linked(region: &SharedRegion, sentinel: Offset) -> usize {
    let mut count = 0;
    let mut current = Node::at(region, sentinel).next();
    while current != sentinel {
        count += 1;
        current = Node::at(region, current).next();
    }
    count
}

/// One agent's handle on a futex workspace
///
/// Owns exactly one node, so it can be moved to another thread but not
/// shared between threads: two concurrent waits would corrupt the node.
#[derive(Debug)]
pub struct Futex {
    lock: Lock,
    workspace: SharedRegion,
    sentinel: Offset,
    node: Offset,
    flag: Synchronic<i32>,
    _not_sync: PhantomData<Cell<()>>,
}

impl Futex {
    /// Attach to the workspace at `offset` and claim a node
    pub fn setup(region: &SharedRegion, offset: Offset) -> SyncResult<Self> {
        FutexManager::new(region, offset)?.setup()
    }

    /// Workspace offset of this agent's node
    #[inline]
    pub fn node_offset(&self) -> Offset {
        self.node
    }

    /// Resolve `index` to the `(byte address, word)` it names in `view`
    fn target(view: &SharedRegion, index: usize) -> SyncResult<(u32, &AtomicI32)> {
        let byte_addr = index
            .checked_mul(WORD_BYTES)
            .ok_or(SyncError::OutOfBounds {
                offset: index,
                size: WORD_BYTES,
                region_len: view.len(),
            })?;
        let word = view.atomic_i32(byte_addr)?;
        // Regions never exceed 4GiB
        Ok((byte_addr as u32, word))
    }

    /// Block while the `i32` at element `index` of `view` holds `expected`
    ///
    /// Returns [`WaitStatus::NotEqual`] at once if the word already differs,
    /// [`WaitStatus::Ok`] once woken by [`Futex::wake`] and
    /// [`WaitStatus::TimedOut`] if `timeout` passes first. Errors are
    /// configuration problems only: an untagged view or a bad index.
    pub fn wait(
        &self,
        view: &SharedRegion,
        index: usize,
        expected: i32,
        timeout: Option<Duration>,
    ) -> SyncResult<WaitStatus> {
        let tag = identifier(view)?;
        let (byte_addr, word) = Self::target(view, index)?;
        let deadline = park::deadline_after(timeout);
        let node = Node::at(&self.workspace, self.node);

        {
            let _guard = self.lock.guard();
            if word.load(Ordering::SeqCst) != expected {
                return Ok(WaitStatus::NotEqual);
            }
            self.flag.store(WAITING);
            node.set_target(tag, byte_addr);
            node.link_before(Node::at(&self.workspace, self.sentinel));
        }
        trace!(tag, byte_addr, expected, ?timeout, "futex wait");

        self.flag.expect_update_until(WAITING, deadline);

        // The flag read under the lock decides: a wake that lands after the
        // deadline but before the unlink still counts as a wake
        let woken = {
            let _guard = self.lock.guard();
            node.unlink();
            self.flag.load() == WOKEN
        };

        let status = if woken {
            WaitStatus::Ok
        } else {
            WaitStatus::TimedOut
        };
        trace!(tag, byte_addr, ?status, "futex wait returned");
        Ok(status)
    }

    /// Wake up to `max` agents waiting on element `index` of `view`
    ///
    /// `None` wakes every such agent. Returns how many were woken. Agents
    /// waiting on other words, or on the same offset of other regions, are
    /// never woken.
    pub fn wake(&self, view: &SharedRegion, index: usize, max: Option<usize>) -> SyncResult<usize> {
        let tag = identifier(view)?;
        let (byte_addr, _) = Self::target(view, index)?;
        let budget = max.unwrap_or(usize::MAX);
        if budget == 0 {
            return Ok(0);
        }

        let mut woken = 0;
        {
            let _guard = self.lock.guard();
            let mut current = Node::at(&self.workspace, self.sentinel).next();
            while current != self.sentinel && woken < budget {
                let node = Node::at(&self.workspace, current);
                if node.buffer_id() == tag
                    && node.byte_addr() == byte_addr
                    && node.flag_value() == WAITING
                {
                    Synchronic::<i32>::new(&self.workspace, node.offset())?.store(WOKEN);
                    woken += 1;
                }
                current = node.next();
            }
        }

        trace!(tag, byte_addr, woken, "futex wake");
        Ok(woken)
    }

    /// Wake some waiters and move the rest to another word
    ///
    /// Not supported: always fails with [`SyncError::Unsupported`].
    pub fn wake_or_requeue(
        &self,
        _view: &SharedRegion,
        _index: usize,
        _count: usize,
        _requeue_index: usize,
        _expected: i32,
    ) -> SyncResult<usize> {
        warn!("futex wake_or_requeue called");
        Err(SyncError::Unsupported(
            "futex wake_or_requeue is not implemented".to_string(),
        ))
    }

    /// Agents currently linked into the wait list (diagnostics)
    pub fn waiting(&self) -> usize {
        let _guard = self.lock.guard();
        count_linked(&self.workspace, self.sentinel)
    }
}
