//! Buddy memory pool and FSM engine
//!
//! This crate implements the two cores of a small embedded runtime:
//! - A binary-buddy memory pool: one contiguous arena carved into
//!   power-of-two blocks, split on allocation and coalesced on release,
//!   tracked through per-size-class free lists.
//! - A finite-state-machine engine with hash-table-backed state/event
//!   tables and a mutex-guarded multi-priority event queue.
//!
//! The pool has no internal locking and is meant for single-threaded or
//! externally-synchronized use. The FSM's event queue supports concurrent
//! producers and consumers.

#![no_std]

extern crate alloc;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

pub mod buddy;
pub use buddy::{Block, BlockState, Pool, PoolError, PoolResult, PoolStats, Side, HEADER_BYTES};

pub mod fsm;
pub use fsm::{Action, Event, Fsm, FsmError, FsmResult, State};
