//! Finite-state-machine engine
//!
//! States and their event tables live in hash tables; transitions are
//! dispatched either synchronously through [`Fsm::process_event`] or
//! asynchronously through a multi-priority event queue that supports
//! concurrent producers and consumers.

pub mod machine;
pub mod queue;
pub mod state;

pub use machine::Fsm;
pub use state::{Action, Event, State};

/// The error type shared by the FSM engine and its states.
///
/// Absence (`NotFound`, `Empty`) and duplication (`AlreadyExists`) are
/// routine outcomes of search- and insert-like operations, not failures;
/// nothing in this module panics for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmError {
    /// A queue node or payload copy could not be allocated.
    OutOfMemory,
    /// The state or event looked up is not in its table.
    NotFound,
    /// The machine has no states, or all event queues are empty.
    Empty,
    /// A state or event key is already taken.
    AlreadyExists,
    /// Invalid configuration, e.g. a priority outside `0..nqueues`.
    BadValue,
}

/// A [`Result`] type with [`FsmError`] as the error type.
pub type FsmResult<T = ()> = Result<T, FsmError>;
