//! Binary-buddy memory pool
//!
//! This module provides the allocator core:
//! - One exclusively-owned arena of `2^max_order` bytes
//! - Per-size-class free lists of block handles
//! - Split-on-demand allocation and buddy-coalescing release
//! - Read-only statistics, with optional split/merge tracking

pub mod block;
pub mod block_store;
pub mod pool;
pub mod stats;

pub use block::{Block, BlockState, Side, HEADER_BYTES};
pub use block_store::{BlockHandle, BlockList, BlockListIter, BlockStore};
pub use pool::Pool;
pub use stats::PoolStats;

/// The error type used for pool construction.
///
/// All variants are construction-time conditions; allocation failure at
/// runtime is signaled by `None` from [`Pool::alloc`], never by an error
/// or a panic, since exhaustion is a routine outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The arena or a bookkeeping table could not be allocated.
    OutOfMemory,
    /// `max_order` exceeds the usable bit width of `usize`.
    OutOfRange,
    /// `min_order > max_order`, or a minimum-size block could not hold its
    /// own header.
    BadValue,
}

/// A [`Result`] type with [`PoolError`] as the error type.
pub type PoolResult<T = ()> = Result<T, PoolError>;
