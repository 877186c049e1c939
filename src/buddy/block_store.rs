//! Flat block-record store and index-linked free lists
//!
//! All block records live in one `Vec` owned by the pool; lists never hold
//! the records themselves, only handles (indices) into the store. Recycled
//! slots are chained through the same `next` field the lists use, so the
//! store needs no separate free-slot bookkeeping.

use alloc::vec::Vec;

use super::block::Block;
use crate::buddy::PoolError;

#[cfg(feature = "log")]
use log::error;

/// Handle of a block record inside a [`BlockStore`].
pub type BlockHandle = usize;

/// One slot of the store: a block record plus its list link.
#[derive(Debug, Clone, Copy)]
pub struct StoreNode {
    pub block: Block,
    pub next: Option<BlockHandle>,
}

/// Flat backing store for block records.
///
/// Handles stay valid until the slot is recycled via [`Self::release`];
/// callers (the pool) are responsible for not holding on to released
/// handles.
#[derive(Debug)]
pub struct BlockStore {
    nodes: Vec<StoreNode>,
    free_head: Option<BlockHandle>,
    free_slots: usize,
}

impl BlockStore {
    pub fn with_capacity(capacity: usize) -> Result<Self, PoolError> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve(capacity)
            .map_err(|_| PoolError::OutOfMemory)?;
        Ok(Self {
            nodes,
            free_head: None,
            free_slots: 0,
        })
    }

    /// Number of live (non-recycled) records.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_slots
    }

    /// Claim a slot for `block`, reusing a recycled one when possible.
    ///
    /// Returns `None` when the store cannot grow, which the pool reports as
    /// allocation failure.
    pub fn claim(&mut self, block: Block) -> Option<BlockHandle> {
        if let Some(idx) = self.free_head {
            self.free_head = self.nodes[idx].next;
            self.free_slots -= 1;
            self.nodes[idx] = StoreNode { block, next: None };
            return Some(idx);
        }
        if self.nodes.len() == self.nodes.capacity() && self.nodes.try_reserve(1).is_err() {
            error!("block store exhausted, cannot grow");
            return None;
        }
        self.nodes.push(StoreNode { block, next: None });
        Some(self.nodes.len() - 1)
    }

    /// Return a slot to the recycle chain.
    pub fn release(&mut self, idx: BlockHandle) {
        debug_assert!(idx < self.nodes.len());
        self.nodes[idx].next = self.free_head;
        self.free_head = Some(idx);
        self.free_slots += 1;
    }

    pub fn get(&self, idx: BlockHandle) -> Option<&StoreNode> {
        self.nodes.get(idx)
    }

    pub fn get_mut(&mut self, idx: BlockHandle) -> Option<&mut StoreNode> {
        self.nodes.get_mut(idx)
    }

    /// Block record behind `idx`. Panics on a dangling handle in debug
    /// builds only; handles are crate-internal.
    pub fn block(&self, idx: BlockHandle) -> Block {
        self.nodes[idx].block
    }

    pub fn set_block(&mut self, idx: BlockHandle, block: Block) {
        self.nodes[idx].block = block;
    }
}

/// Singly-linked list of block handles, one per size class.
///
/// Insertion is at the head and ties are broken by list order, so the most
/// recently freed block of a class is handed out first.
#[derive(Debug)]
pub struct BlockList {
    head: Option<BlockHandle>,
    len: usize,
}

impl BlockList {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Insert a handle at the head of the list.
    pub fn push_front(&mut self, store: &mut BlockStore, idx: BlockHandle) {
        if let Some(node) = store.get_mut(idx) {
            node.next = self.head;
            self.head = Some(idx);
            self.len += 1;
        } else {
            error!("push_front with dangling handle {}", idx);
        }
    }

    /// Detach and return the head handle. The record stays in the store.
    pub fn pop_front(&mut self, store: &mut BlockStore) -> Option<BlockHandle> {
        let head_idx = self.head?;
        let head_node = store.get(head_idx)?;
        self.head = head_node.next;
        self.len -= 1;
        Some(head_idx)
    }

    /// Find a handle by block offset.
    ///
    /// Returns `(handle, prev_handle)` so removal does not need a second
    /// traversal.
    pub fn find_by_offset(
        &self,
        store: &BlockStore,
        offset: usize,
    ) -> Option<(BlockHandle, Option<BlockHandle>)> {
        let mut prev_idx = None;
        let mut current_idx = self.head;
        let mut visited = 0;

        while let Some(idx) = current_idx {
            if visited > self.len {
                error!("cycle detected during free-list search");
                return None;
            }
            let node = store.get(idx)?;
            if node.block.offset == offset {
                return Some((idx, prev_idx));
            }
            prev_idx = current_idx;
            current_idx = node.next;
            visited += 1;
        }

        None
    }

    /// Unlink a handle using its known predecessor (O(1)).
    ///
    /// The record itself is not released; the caller decides whether the
    /// handle is recycled or reused for a merged block.
    pub fn unlink(
        &mut self,
        store: &mut BlockStore,
        idx: BlockHandle,
        prev_idx: Option<BlockHandle>,
    ) -> bool {
        let next_idx = match store.get(idx) {
            Some(node) => node.next,
            None => {
                error!("unlink with dangling handle {}", idx);
                return false;
            }
        };

        match prev_idx {
            Some(prev) => {
                let Some(prev_node) = store.get_mut(prev) else {
                    error!("unlink with dangling prev handle {}", prev);
                    return false;
                };
                if prev_node.next != Some(idx) {
                    error!("prev handle {} does not link to {}", prev, idx);
                    return false;
                }
                prev_node.next = next_idx;
            }
            None => {
                if self.head != Some(idx) {
                    error!("handle {} is not the list head", idx);
                    return false;
                }
                self.head = next_idx;
            }
        }

        self.len -= 1;
        true
    }

    /// Iterator over the handles in this list.
    pub fn iter<'a>(&self, store: &'a BlockStore) -> BlockListIter<'a> {
        BlockListIter {
            store,
            current: self.head,
        }
    }
}

/// Iterator over the block records of one list.
pub struct BlockListIter<'a> {
    store: &'a BlockStore,
    current: Option<BlockHandle>,
}

impl<'a> Iterator for BlockListIter<'a> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let idx = self.current?;
        let node = self.store.get(idx)?;
        self.current = node.next;
        Some(node.block)
    }
}
