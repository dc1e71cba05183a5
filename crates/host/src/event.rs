//! Host event plumbing: raw events, per-node listener registration and
//! bubbling dispatch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::tree::{self, NodeHandle};

/// A host-level event as delivered to registered listeners. Geometry
/// and modifier state are captured at creation time; propagation state
/// is interior-mutable so a listener can stop the bubble.
pub struct RawEvent {
    pub event_type: String,
    pub target: RefCell<Option<NodeHandle>>,
    pub page_x: f64,
    pub page_y: f64,
    pub client_x: f64,
    pub client_y: f64,
    pub alt_key: bool,
    pub ctrl_key: bool,
    pub meta_key: bool,
    pub shift_key: bool,
    pub button: Option<i32>,
    pub which: Option<i32>,
    pub key_code: Option<i32>,
    propagation_stopped: Cell<bool>,
}

impl RawEvent {
    pub fn new(event_type: &str) -> RawEvent {
        RawEvent {
            event_type: event_type.to_string(),
            target: RefCell::new(None),
            page_x: 0.0,
            page_y: 0.0,
            client_x: 0.0,
            client_y: 0.0,
            alt_key: false,
            ctrl_key: false,
            meta_key: false,
            shift_key: false,
            button: None,
            which: None,
            key_code: None,
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

pub type RawListener = Rc<dyn Fn(&RawEvent)>;

pub(crate) struct ListenerEntry {
    pub id: u64,
    pub event_type: String,
    pub callback: RawListener,
}

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Registers a listener on `node`; returns the id used for removal.
pub fn add_listener(node: &NodeHandle, event_type: &str, callback: RawListener) -> u64 {
    let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
    node.borrow_mut().listeners.push(ListenerEntry {
        id,
        event_type: event_type.to_string(),
        callback,
    });
    id
}

/// Removes a listener by id; returns whether one was removed.
pub fn remove_listener(node: &NodeHandle, id: u64) -> bool {
    let mut n = node.borrow_mut();
    let before = n.listeners.len();
    n.listeners.retain(|entry| entry.id != id);
    n.listeners.len() != before
}

/// Delivers `event` to `target` and bubbles it toward the root.
/// Listeners already queued on a node all run even if one of them
/// stops propagation; stopping only cuts off the ancestors.
pub fn dispatch_event(target: &NodeHandle, event: &RawEvent) {
    *event.target.borrow_mut() = Some(target.clone());
    trace!(event_type = %event.event_type, "dispatching host event");
    let mut current = Some(target.clone());
    while let Some(node) = current {
        let callbacks: Vec<RawListener> = node
            .borrow()
            .listeners
            .iter()
            .filter(|entry| entry.event_type == event.event_type)
            .map(|entry| entry.callback.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
        if event.propagation_stopped() {
            break;
        }
        current = tree::parent(&node);
    }
}

/// Fires a bubbling `submit` event at `form`, as the host browser
/// would on a user-triggered submission.
pub fn submit_form(form: &NodeHandle) {
    dispatch_event(form, &RawEvent::new("submit"));
}
