//! Binary-buddy memory pool
//!
//! One contiguous arena of `2^max_order` bytes, carved into power-of-two
//! blocks. Allocation scans the free lists for the smallest class that can
//! hold the request and splits larger blocks on demand; release coalesces a
//! block with its free buddy, recursively, back up to the top order.
//!
//! The pool has no internal locking. Concurrent `alloc`/`free` on the same
//! pool must be serialized by the caller; exclusive access is what `&mut
//! self` enforces.

use alloc::vec::Vec;

use hashbrown::HashMap;

#[cfg(feature = "log")]
use log::{debug, error, warn};

use super::block::{Block, BlockState, Side, HEADER_BYTES};
use super::block_store::{BlockHandle, BlockList, BlockStore};
use super::{PoolError, PoolResult};

/// Buddy memory pool
///
/// Free lists are indexed by size class: slot 0 holds the largest class
/// (order `max_order`), slot `N-1` the smallest (order `min_order`). Only
/// free blocks appear in the lists; blocks handed out to callers are
/// tracked in a separate index keyed by their data offset.
///
/// Dropping the pool releases the arena and all bookkeeping in one go;
/// offsets handed out earlier cannot outlive it because every access goes
/// back through the pool.
#[derive(Debug)]
pub struct Pool {
    arena: Vec<u8>,
    max_order: usize,
    min_order: usize,
    free_lists: Vec<BlockList>,
    store: BlockStore,
    used: HashMap<usize, BlockHandle>,
    #[cfg(feature = "tracking")]
    nsplits: usize,
    #[cfg(feature = "tracking")]
    nmerges: usize,
}

impl Pool {
    /// Create a pool with an arena of `2^max_order` bytes.
    ///
    /// `min_order` is the smallest order a block may be split to;
    /// `2^min_order` must strictly exceed the per-block header overhead so
    /// that a minimum-size block still has usable capacity.
    ///
    /// # Errors
    ///
    /// - [`PoolError::OutOfRange`] if `max_order` exceeds the usable bit
    ///   width of `usize`.
    /// - [`PoolError::BadValue`] if `min_order > max_order` or a
    ///   minimum-size block could not hold its own header.
    /// - [`PoolError::OutOfMemory`] if the arena or bookkeeping tables
    ///   cannot be allocated; nothing is leaked in that case.
    pub fn new(max_order: usize, min_order: usize) -> PoolResult<Self> {
        if max_order >= usize::BITS as usize {
            return Err(PoolError::OutOfRange);
        }
        if min_order > max_order || (1usize << min_order) <= HEADER_BYTES {
            return Err(PoolError::BadValue);
        }

        let arena_len = 1usize << max_order;
        let mut arena = Vec::new();
        arena
            .try_reserve_exact(arena_len)
            .map_err(|_| PoolError::OutOfMemory)?;
        arena.resize(arena_len, 0);

        let nslots = max_order - min_order + 1;
        let mut free_lists = Vec::new();
        free_lists
            .try_reserve_exact(nslots)
            .map_err(|_| PoolError::OutOfMemory)?;
        for _ in 0..nslots {
            free_lists.push(BlockList::new());
        }

        let mut store = BlockStore::with_capacity(nslots * 2)?;
        let mut used = HashMap::new();
        used.try_reserve(nslots).map_err(|_| PoolError::OutOfMemory)?;

        // Before any storage has been requested there is a single free
        // block of 2^max_order bytes in slot 0. Side flags are irrelevant
        // at the top level.
        let top = Block::new(0, max_order, BlockState::Free, Side::Left, Side::Left);
        let top_handle = store.claim(top).ok_or(PoolError::OutOfMemory)?;

        let mut pool = Self {
            arena,
            max_order,
            min_order,
            free_lists,
            store,
            used,
            #[cfg(feature = "tracking")]
            nsplits: 0,
            #[cfg(feature = "tracking")]
            nmerges: 0,
        };
        pool.free_lists[0].push_front(&mut pool.store, top_handle);

        Ok(pool)
    }

    /// Largest order of the pool (the arena spans `2^max_order` bytes).
    pub fn max_order(&self) -> usize {
        self.max_order
    }

    /// Smallest order a block may be split down to.
    pub fn min_order(&self) -> usize {
        self.min_order
    }

    /// Arena capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    fn slot_of(&self, order: usize) -> usize {
        self.max_order - order
    }

    /// Allocate `len` usable bytes, returning the data offset of the block.
    ///
    /// Exhaustion is a routine outcome and yields `None`; the pool never
    /// grows. Note that a request of exactly `2^j` bytes lands in the next
    /// class up because of the header overhead.
    pub fn alloc(&mut self, len: usize) -> Option<usize> {
        let need = len.checked_add(HEADER_BYTES)?;

        // Scan size classes from largest to smallest, remembering the last
        // slot that can satisfy the request; that is the smallest class
        // with a free entry whose capacity covers `need`.
        let mut candidate = None;
        for slot in 0..self.free_lists.len() {
            let order = self.max_order - slot;
            if (1usize << order) >= need && !self.free_lists[slot].is_empty() {
                candidate = Some(slot);
            }
        }
        let slot = candidate?;

        let handle = self.free_lists[slot].pop_front(&mut self.store)?;
        let mut block = self.store.block(handle);

        loop {
            let size = block.size();

            // No further split when the request fits exactly, would not fit
            // in a half, or halving would go below min_order.
            if need == size || need > size / 2 || block.order == self.min_order {
                block.state = BlockState::Used;
                self.store.set_block(handle, block);
                let data = block.data_offset();
                if self.used.try_reserve(1).is_err() {
                    // Roll the block back into its free list.
                    block.state = BlockState::Free;
                    self.store.set_block(handle, block);
                    let slot = self.slot_of(block.order);
                    self.free_lists[slot].push_front(&mut self.store, handle);
                    return None;
                }
                self.used.insert(data, handle);
                debug!(
                    "pool: alloc {} bytes -> offset {:#x} (order {})",
                    len, data, block.order
                );
                return Some(data);
            }

            // Split: the block shrinks into the left child, the right
            // child is synthesized at the buddy offset. The left child
            // records the old side as its parent side; the right child
            // inherits the old parent side.
            #[cfg(feature = "tracking")]
            {
                self.nsplits += 1;
            }
            let prev_side = block.side;
            let prev_parent = block.parent_side;
            block.order -= 1;
            block.side = Side::Left;
            block.parent_side = prev_side;

            let sibling = Block::new(
                block.offset + block.size(),
                block.order,
                BlockState::Free,
                Side::Right,
                prev_parent,
            );
            let Some(sibling_handle) = self.store.claim(sibling) else {
                // Cannot record the split; undo it and put the original
                // block back where it came from.
                block.order += 1;
                block.side = prev_side;
                block.parent_side = prev_parent;
                self.store.set_block(handle, block);
                let slot = self.slot_of(block.order);
                self.free_lists[slot].push_front(&mut self.store, handle);
                return None;
            };
            let new_slot = self.slot_of(block.order);
            self.free_lists[new_slot].push_front(&mut self.store, sibling_handle);
            self.store.set_block(handle, block);
        }
    }

    /// Release the block at `data_offset` back into the pool.
    ///
    /// The offset is validated against the used-block index: an offset the
    /// pool never handed out (foreign, corrupted, or already freed) is
    /// ignored, never dereferenced. The freed block is coalesced with its
    /// buddy as long as the buddy is free and of the same order, walking up
    /// the orders until a used buddy, a finer-split buddy, or the top level
    /// stops the merge.
    pub fn free(&mut self, data_offset: usize) {
        let Some(handle) = self.used.remove(&data_offset) else {
            warn!("pool: free of unknown offset {:#x} ignored", data_offset);
            return;
        };

        let mut handle = handle;
        loop {
            let mut block = self.store.block(handle);
            block.state = BlockState::Free;

            // Top level has no buddy.
            if block.order == self.max_order {
                self.store.set_block(handle, block);
                self.free_lists[0].push_front(&mut self.store, handle);
                return;
            }

            let buddy_offset = block.buddy_offset();
            let slot = self.slot_of(block.order);

            if buddy_offset >= self.arena.len() {
                // Cannot happen for a well-formed block, but an
                // out-of-range buddy must never be touched.
                self.store.set_block(handle, block);
                self.free_lists[slot].push_front(&mut self.store, handle);
                return;
            }

            // A buddy that is used or split finer is not in this class's
            // list; in either case the block is just marked free.
            let Some((buddy_handle, prev)) =
                self.free_lists[slot].find_by_offset(&self.store, buddy_offset)
            else {
                self.store.set_block(handle, block);
                self.free_lists[slot].push_front(&mut self.store, handle);
                return;
            };

            let buddy = self.store.block(buddy_handle);
            if buddy.side != block.side.flip() {
                error!(
                    "pool: blocks {:#x} and {:#x} have inconsistent sides",
                    block.offset, buddy.offset
                );
                self.store.set_block(handle, block);
                self.free_lists[slot].push_front(&mut self.store, handle);
                return;
            }

            // Coalesce: two records collapse into one a level up. The
            // merged block starts at the left child and derives its flags
            // from both children.
            self.free_lists[slot].unlink(&mut self.store, buddy_handle, prev);
            self.store.release(buddy_handle);
            #[cfg(feature = "tracking")]
            {
                self.nmerges += 1;
            }

            let (left, right) = match block.side {
                Side::Left => (block, buddy),
                Side::Right => (buddy, block),
            };
            let merged = Block::new(
                left.offset,
                block.order + 1,
                BlockState::Free,
                left.parent_side,
                right.parent_side,
            );
            debug!(
                "pool: merged {:#x} and {:#x} into order {}",
                left.offset, right.offset, merged.order
            );
            self.store.set_block(handle, merged);
        }
    }

    /// Usable bytes of a live allocation.
    ///
    /// Returns `None` unless `data_offset` was returned by [`Self::alloc`]
    /// and has not been freed since.
    pub fn data(&self, data_offset: usize) -> Option<&[u8]> {
        let &handle = self.used.get(&data_offset)?;
        let block = self.store.block(handle);
        Some(&self.arena[block.data_offset()..block.offset + block.size()])
    }

    /// Mutable access to the usable bytes of a live allocation.
    pub fn data_mut(&mut self, data_offset: usize) -> Option<&mut [u8]> {
        let &handle = self.used.get(&data_offset)?;
        let block = self.store.block(handle);
        Some(&mut self.arena[block.data_offset()..block.offset + block.size()])
    }

    pub(crate) fn free_lists(&self) -> &[BlockList] {
        &self.free_lists
    }

    pub(crate) fn store(&self) -> &BlockStore {
        &self.store
    }

    pub(crate) fn used_blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.used.values().map(|&handle| self.store.block(handle))
    }

    pub(crate) fn used_len(&self) -> usize {
        self.used.len()
    }

    #[cfg(feature = "tracking")]
    pub(crate) fn split_count(&self) -> usize {
        self.nsplits
    }

    #[cfg(feature = "tracking")]
    pub(crate) fn merge_count(&self) -> usize {
        self.nmerges
    }
}
