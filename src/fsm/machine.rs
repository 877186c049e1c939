//! The state machine engine
//!
//! The machine owns its state table and the priority event queues. Setup
//! (`add_state`, `set_state`) takes `&mut self` and must be serialized by
//! the caller; once running, `queue_event`, `dequeue_event` and
//! `process_event` all work through `&self`, so producers and consumers on
//! different threads can share one machine. Only the queue structure is
//! guarded by the mutex; event processing, including action callbacks,
//! runs outside it.

use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use spin::Mutex;

#[cfg(feature = "log")]
use log::debug;

use super::queue::{PendingEvent, PriorityQueues};
use super::state::State;
use super::{FsmError, FsmResult};

/// Sentinel for "no current state committed yet".
const NO_STATE: u32 = u32::MAX;

/// Finite state machine with hash-table-backed states and a
/// multi-priority event queue.
///
/// The current state is held as a key into the state table, never as a
/// direct reference, and is re-validated on every transition. A direct
/// [`Fsm::process_event`] racing a dequeue-driven one is memory-safe but
/// logically last-writer-wins on the current state; serialize consumers if
/// that matters.
pub struct Fsm {
    states: HashMap<u32, State>,
    current: AtomicU32,
    queues: Mutex<PriorityQueues>,
    nqueues: usize,
}

impl Fsm {
    /// Create a machine with `nqueues` event priorities.
    ///
    /// # Errors
    ///
    /// [`FsmError::BadValue`] if `nqueues` is zero.
    pub fn new(nqueues: usize) -> FsmResult<Self> {
        Self::with_state_capacity(0, nqueues)
    }

    /// Create a machine with a pre-sized state table.
    pub fn with_state_capacity(capacity: usize, nqueues: usize) -> FsmResult<Self> {
        if nqueues == 0 {
            return Err(FsmError::BadValue);
        }
        Ok(Self {
            states: HashMap::with_capacity(capacity),
            current: AtomicU32::new(NO_STATE),
            queues: Mutex::new(PriorityQueues::new(nqueues)),
            nqueues,
        })
    }

    /// Number of event priorities.
    pub fn nqueues(&self) -> usize {
        self.nqueues
    }

    /// Add a state under `key`, rewriting the state's own key to match.
    ///
    /// # Errors
    ///
    /// - [`FsmError::BadValue`] if `key` is `u32::MAX`, which is reserved
    ///   as the "no current state" sentinel.
    /// - [`FsmError::AlreadyExists`] if `key` collides with an existing
    ///   state.
    pub fn add_state(&mut self, key: u32, mut state: State) -> FsmResult {
        if key == NO_STATE {
            return Err(FsmError::BadValue);
        }
        match self.states.entry(key) {
            Entry::Occupied(_) => Err(FsmError::AlreadyExists),
            Entry::Vacant(entry) => {
                state.set_key(key);
                entry.insert(state);
                Ok(())
            }
        }
    }

    /// Look up a state by key.
    pub fn state(&self, key: u32) -> Option<&State> {
        self.states.get(&key)
    }

    /// Mutable access to a state, e.g. to add or remove events after the
    /// state was added. Reachability flags are not recomputed here; run
    /// [`Fsm::mark_reachable_states`] after changing transitions.
    pub fn state_mut(&mut self, key: u32) -> Option<&mut State> {
        self.states.get_mut(&key)
    }

    /// Commit `key` as the current state.
    ///
    /// The target is marked reachable (setting the initial state renders
    /// it explicitly reachable) and a full reachability pass runs before
    /// the commit.
    ///
    /// # Errors
    ///
    /// [`FsmError::NotFound`] if `key` is not in the state table.
    pub fn set_state(&mut self, key: u32) -> FsmResult {
        let Some(state) = self.states.get_mut(&key) else {
            return Err(FsmError::NotFound);
        };
        state.mark_reachable();
        self.mark_reachable_states();
        self.current.store(key, Ordering::Release);
        Ok(())
    }

    /// Key of the current state, or `None` before the first
    /// [`Fsm::set_state`].
    pub fn current_state(&self) -> Option<u32> {
        match self.current.load(Ordering::Acquire) {
            NO_STATE => None,
            key => Some(key),
        }
    }

    /// Process one event against the current state, synchronously.
    ///
    /// The event's action (if any) is invoked with `payload`; the
    /// transition is committed only after the target state is confirmed to
    /// exist in the state table.
    ///
    /// # Errors
    ///
    /// [`FsmError::NotFound`] when the machine has no current state, the
    /// current state does not handle `event_key` (the routine "unhandled
    /// event" case), or the target state is missing; the current state is
    /// unchanged in all three cases.
    pub fn process_event(&self, event_key: u32, payload: &[u8]) -> FsmResult {
        let current = self.current.load(Ordering::Acquire);
        if current == NO_STATE {
            return Err(FsmError::NotFound);
        }
        let state = self.states.get(&current).ok_or(FsmError::NotFound)?;
        let event = state.event(event_key).ok_or(FsmError::NotFound)?;

        event.run_action(payload);

        let target = event.target();
        if !self.states.contains_key(&target) {
            return Err(FsmError::NotFound);
        }
        self.current.store(target, Ordering::Release);
        Ok(())
    }

    /// Copy `payload` and append the event to the tail of the given
    /// priority's queue. Safe to call from multiple threads.
    ///
    /// # Errors
    ///
    /// - [`FsmError::BadValue`] if `priority >= nqueues`.
    /// - [`FsmError::OutOfMemory`] if the payload copy or the queue node
    ///   cannot be allocated; the queue is unchanged.
    pub fn queue_event(&self, event_key: u32, payload: &[u8], priority: usize) -> FsmResult {
        if priority >= self.nqueues {
            return Err(FsmError::BadValue);
        }

        // Copy the payload before taking the lock.
        let mut data = Vec::new();
        data.try_reserve_exact(payload.len())
            .map_err(|_| FsmError::OutOfMemory)?;
        data.extend_from_slice(payload);

        let event = PendingEvent {
            event_key,
            priority,
            payload: data,
        };

        let mut queues = self.queues.lock();
        queues.push(event)
    }

    /// Serve the head of the highest-priority non-empty queue.
    ///
    /// The event is popped under the lock and processed outside it; an
    /// event the current state cannot handle is silently discarded, with
    /// no retry and no dead-letter queue. The owned payload copy is
    /// released either way.
    ///
    /// # Errors
    ///
    /// [`FsmError::Empty`] if all queues are empty.
    pub fn dequeue_event(&self) -> FsmResult {
        let event = {
            let mut queues = self.queues.lock();
            queues.pop_highest()
        };
        let Some(event) = event else {
            return Err(FsmError::Empty);
        };

        debug!(
            "fsm: dequeued event {} (priority {})",
            event.event_key, event.priority
        );
        if self.process_event(event.event_key, &event.payload).is_err() {
            debug!("fsm: event {} discarded", event.event_key);
        }
        Ok(())
    }

    /// Total number of pending events across all priorities.
    pub fn queued_events(&self) -> usize {
        self.queues.lock().total_len()
    }

    /// Check the machine for structural problems.
    ///
    /// # Errors
    ///
    /// [`FsmError::Empty`] if the machine has no states.
    pub fn validate(&self) -> FsmResult {
        if self.states.is_empty() {
            return Err(FsmError::Empty);
        }
        Ok(())
    }

    /// Propagate the reachable flag, one pass.
    ///
    /// For every state visited in table order, if it is reachable at that
    /// point, all of its transition targets are marked reachable too. This
    /// is a single pass, not an iterated fixed point: multi-hop chains
    /// added since the last pass may be under-approximated until the next
    /// one. Callers that mutate the graph after a pass see stale flags.
    pub fn mark_reachable_states(&mut self) {
        let keys: Vec<u32> = self.states.keys().copied().collect();
        for key in keys {
            let targets: Vec<u32> = match self.states.get(&key) {
                Some(state) if state.is_reachable() => state.event_targets().collect(),
                _ => continue,
            };
            for target in targets {
                if let Some(state) = self.states.get_mut(&target) {
                    state.mark_reachable();
                }
            }
        }
    }

    /// Write the transition graph as a `dot` digraph.
    ///
    /// One `S<from> -> S<to> [label="E<key>"]` line per transition,
    /// consumable by graph-visualization tooling.
    pub fn export_to_dot(&self, writer: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(writer, "digraph {{")?;
        for (&state_key, state) in &self.states {
            for (event_key, event) in state.events() {
                writeln!(
                    writer,
                    "S{} -> S{} [label=\"E{}\"]",
                    state_key,
                    event.target(),
                    event_key
                )?;
            }
        }
        writeln!(writer, "}}")
    }

    /// Write one line per state, followed by that state's event table.
    pub fn print_states(&self, writer: &mut dyn fmt::Write) -> fmt::Result {
        for state in self.states.values() {
            writeln!(
                writer,
                "state [key = {}, reachable = {}]",
                state.key(),
                if state.is_reachable() { 'T' } else { 'F' }
            )?;
            state.print_events(writer)?;
        }
        Ok(())
    }
}
