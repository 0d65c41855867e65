//! Synchronous event bus.
//!
//! Listeners subscribe per event type and are invoked in registration order
//! on the caller's stack. A listener receives the controller mutably, so it
//! may react to an event by mutating the graph, which can in turn fire more
//! events.
//!
//! Dispatch iterates over a snapshot of the listener list taken when the
//! dispatch starts: listeners added or removed by a running listener take
//! effect for the next dispatch.

use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use trellis_core::identifier::Id;

use crate::{controller::Controller, element::Element};

/// Fired once per transaction with every element created in it.
pub const ELEMENT_ADD: &str = "element.add";

/// Fired once per transaction with every element removed in it.
pub const ELEMENT_REMOVE: &str = "element.remove";

/// Fired once per reconciliation with the ids of pre-existing elements whose
/// state changed, when enabled in the configuration.
pub const ELEMENT_CHANGE: &str = "element.change";

/// Payload delivered to listeners.
#[derive(Debug)]
pub enum Event {
    /// Ids of the added elements, in creation order.
    Added(Vec<Id>),
    /// The removed elements, detached from the controller.
    Removed(Vec<Element>),
    /// Ids of the changed elements.
    Changed(Vec<Id>),
    /// Domain-defined payload.
    Custom(Value),
}

impl Event {
    /// Number of elements the event refers to.
    pub fn len(&self) -> usize {
        match self {
            Self::Added(ids) | Self::Changed(ids) => ids.len(),
            Self::Removed(elements) => elements.len(),
            Self::Custom(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids the event refers to.
    pub fn ids(&self) -> Vec<Id> {
        match self {
            Self::Added(ids) | Self::Changed(ids) => ids.clone(),
            Self::Removed(elements) => elements.iter().map(Element::id).collect(),
            Self::Custom(_) => Vec::new(),
        }
    }
}

/// Error returned by a failing listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type of listener callbacks.
pub type ListenerResult = Result<(), ListenerError>;

/// Boxed listener callback.
pub type Listener = Box<dyn FnMut(&mut Controller, &Event) -> ListenerResult>;

pub(crate) type SharedListener = Rc<RefCell<Listener>>;

/// Handle returned by `add_event_listener`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Per-type listener lists.
#[derive(Default)]
pub(crate) struct EventBus {
    listeners: IndexMap<String, Vec<(ListenerId, SharedListener)>>,
    next_id: u64,
}

impl EventBus {
    pub fn add(&mut self, event_type: &str, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(event_type.to_string())
            .or_default()
            .push((id, Rc::new(RefCell::new(listener))));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered for
    /// `event_type`.
    pub fn remove(&mut self, event_type: &str, id: ListenerId) -> bool {
        let Some(listeners) = self.listeners.get_mut(event_type) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            self.listeners.shift_remove(event_type);
        }
        removed
    }

    /// Listeners of `event_type` in registration order.
    pub fn snapshot(&self, event_type: &str) -> Vec<(ListenerId, SharedListener)> {
        self.listeners
            .get(event_type)
            .map(|listeners| {
                listeners
                    .iter()
                    .map(|(id, listener)| (*id, Rc::clone(listener)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.listeners.contains_key(event_type)
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.listeners.get(event_type).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.listeners
                    .iter()
                    .map(|(event_type, listeners)| (event_type, listeners.len())),
            )
            .finish()
    }
}
