//! Buddy block metadata
//!
//! A block is identified by its byte offset into the pool's arena and its
//! order (log2 of its size). The buddy of a block is found by flipping the
//! address bit at position `order`, which is an involution: applying it
//! twice yields the original offset.

/// Bytes reserved at the front of every handed-out block.
///
/// The pool keeps its block records out-of-band, but the accounting still
/// charges each allocation this fixed header so the layout stays compatible
/// with header-prefixed buddy pools: a request for `n` bytes consumes
/// `n + HEADER_BYTES` of arena capacity, and the offset returned to the
/// caller points just past the reserved region.
pub const HEADER_BYTES: usize = core::mem::size_of::<usize>() * 2;

/// Whether a block is currently handed out or sitting in a free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Used,
}

/// Position of a block relative to its same-order sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Buddy block record
///
/// `side` is this block's position relative to its sibling; `parent_side`
/// is the position of the block one level up, kept so that coalescing can
/// reconstruct the merge topology without walking a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub offset: usize,
    pub order: usize,
    pub state: BlockState,
    pub side: Side,
    pub parent_side: Side,
}

impl Block {
    pub const fn new(
        offset: usize,
        order: usize,
        state: BlockState,
        side: Side,
        parent_side: Side,
    ) -> Self {
        Self {
            offset,
            order,
            state,
            side,
            parent_side,
        }
    }

    /// Size of this block in bytes.
    pub fn size(&self) -> usize {
        1 << self.order
    }

    /// Offset of the sibling block at the same order.
    pub fn buddy_offset(&self) -> usize {
        self.offset ^ (1 << self.order)
    }

    /// Offset of the caller-visible data region.
    pub fn data_offset(&self) -> usize {
        self.offset + HEADER_BYTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buddy_offset_involution() {
        for order in 0..16 {
            let offset = 3 << order; // arbitrary block aligned to its order
            let block = Block::new(offset, order, BlockState::Free, Side::Left, Side::Left);
            let buddy = Block::new(
                block.buddy_offset(),
                order,
                BlockState::Free,
                Side::Right,
                Side::Left,
            );
            assert_eq!(buddy.buddy_offset(), offset);
        }
    }

    #[test]
    fn test_buddy_offset_adjacency() {
        let left = Block::new(0x40, 6, BlockState::Free, Side::Left, Side::Left);
        assert_eq!(left.buddy_offset(), 0x80);
        let right = Block::new(0x80, 6, BlockState::Free, Side::Right, Side::Left);
        assert_eq!(right.buddy_offset(), 0x40);
    }

    #[test]
    fn test_side_flip() {
        assert_eq!(Side::Left.flip(), Side::Right);
        assert_eq!(Side::Right.flip(), Side::Left);
    }
}
