//! States and their event tables
//!
//! A state owns a hash table mapping event keys to [`Event`]s. The same
//! event key may mean different things in different states, or not exist
//! there at all. Events reference their target state by key only; the
//! machine validates the target against its state table before committing
//! a transition, so a dangling target degrades to a routine `NotFound`.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use super::{FsmError, FsmResult};

/// A transition action.
///
/// Implemented for any `Fn(&[u8])` that is `Send + Sync`; actions run
/// synchronously during event processing, outside the queue lock, so they
/// must not assume exclusivity over machine state.
pub trait Action: Send + Sync {
    fn apply(&self, payload: &[u8]);
}

impl<F> Action for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn apply(&self, payload: &[u8]) {
        self(payload)
    }
}

/// A labeled transition, scoped to the state it is attached to.
pub struct Event {
    description: String,
    action: Option<Box<dyn Action>>,
    target: u32,
}

impl Event {
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Key of the state this event transitions to.
    pub fn target(&self) -> u32 {
        self.target
    }

    pub(crate) fn run_action(&self, payload: &[u8]) {
        if let Some(action) = &self.action {
            action.apply(payload);
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("description", &self.description)
            .field("target", &self.target)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

/// A named node of the machine, owning its event table.
#[derive(Debug)]
pub struct State {
    key: u32,
    reachable: bool,
    events: HashMap<u32, Event>,
}

impl State {
    /// Create a state. The key is rewritten when the state is added to a
    /// machine under a different key.
    pub fn new(key: u32) -> Self {
        Self {
            key,
            reachable: false,
            events: HashMap::new(),
        }
    }

    /// Create a state with a pre-sized event table.
    pub fn with_event_capacity(key: u32, capacity: usize) -> Self {
        Self {
            key,
            reachable: false,
            events: HashMap::with_capacity(capacity),
        }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    pub(crate) fn set_key(&mut self, key: u32) {
        self.key = key;
    }

    /// Whether the state was found reachable by the last reachability
    /// pass. Stale until [`crate::Fsm::mark_reachable_states`] runs.
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub(crate) fn mark_reachable(&mut self) {
        self.reachable = true;
    }

    /// Attach an event to this state.
    ///
    /// # Errors
    ///
    /// [`FsmError::AlreadyExists`] if `key` is already taken in this
    /// state's table.
    pub fn add_event(
        &mut self,
        key: u32,
        description: &str,
        action: Option<Box<dyn Action>>,
        target: u32,
    ) -> FsmResult {
        match self.events.entry(key) {
            Entry::Occupied(_) => Err(FsmError::AlreadyExists),
            Entry::Vacant(entry) => {
                entry.insert(Event {
                    description: String::from(description),
                    action,
                    target,
                });
                Ok(())
            }
        }
    }

    /// Detach an event from this state.
    ///
    /// # Errors
    ///
    /// [`FsmError::NotFound`] if no event with `key` exists here.
    pub fn remove_event(&mut self, key: u32) -> FsmResult {
        match self.events.remove(&key) {
            Some(_) => Ok(()),
            None => Err(FsmError::NotFound),
        }
    }

    /// Look up the event attached under `key`.
    pub fn event(&self, key: u32) -> Option<&Event> {
        self.events.get(&key)
    }

    pub fn events(&self) -> impl Iterator<Item = (u32, &Event)> {
        self.events.iter().map(|(&key, event)| (key, event))
    }

    pub(crate) fn event_targets(&self) -> impl Iterator<Item = u32> + '_ {
        self.events.values().map(Event::target)
    }

    /// Write one line per event of this state's table.
    pub fn print_events(&self, writer: &mut dyn fmt::Write) -> fmt::Result {
        for (key, event) in &self.events {
            writeln!(
                writer,
                "evtkey: {}\tdesc: {}\tnewstate: {}",
                key,
                event.description(),
                event.target()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_add_event_rejects_duplicates() {
        let mut state = State::new(1);
        state.add_event(0, "go", None, 2).unwrap();
        assert_eq!(
            state.add_event(0, "go again", None, 3).unwrap_err(),
            FsmError::AlreadyExists
        );
        // The original event is untouched.
        assert_eq!(state.event(0).unwrap().target(), 2);
        assert_eq!(state.event(0).unwrap().description(), "go");
    }

    #[test]
    fn test_remove_event() {
        let mut state = State::new(1);
        state.add_event(7, "loop", None, 1).unwrap();
        state.remove_event(7).unwrap();
        assert!(state.event(7).is_none());
        assert_eq!(state.remove_event(7).unwrap_err(), FsmError::NotFound);
    }

    #[test]
    fn test_event_key_is_scoped_to_state() {
        let mut a = State::new(1);
        let mut b = State::new(2);
        a.add_event(0, "to b", None, 2).unwrap();
        b.add_event(0, "to a", None, 1).unwrap();
        assert_eq!(a.event(0).unwrap().target(), 2);
        assert_eq!(b.event(0).unwrap().target(), 1);
    }

    #[test]
    fn test_print_events_format() {
        let mut state = State::new(1);
        state.add_event(3, "ping", None, 4).unwrap();
        let mut out = alloc::string::String::new();
        state.print_events(&mut out).unwrap();
        assert_eq!(out, "evtkey: 3\tdesc: ping\tnewstate: 4\n".to_string());
    }
}
