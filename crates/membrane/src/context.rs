//! Per-gadget installation state shared by every wrapper the
//! installation mints.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use palisade_host::tree::RawNode;
use palisade_host::{Document, NodeHandle, Scheduler};

use crate::event::EventHandler;
use crate::guard::Marker;
use crate::uri::UriRewriter;

/// One registered listener, remembered so removal can match by the
/// gadget's original handler identity.
pub(crate) struct ListenerRegistration {
    pub node: Weak<RefCell<RawNode>>,
    pub event_type: String,
    pub host_id: u64,
    pub original: EventHandler,
}

/// Shared state of one gadget installation. Everything a wrapper does
/// flows through this: the namespace suffix, the capability marker,
/// the URI rewriter, the handler registry and the re-entrant dispatch
/// depth.
pub(crate) struct GadgetCtx {
    /// Namespace suffix including the leading `-`.
    pub suffix: String,
    /// The suffix minus its leading delimiter; scopes gadget CSS.
    pub id_class: String,
    pub module_id: u32,
    pub marker: Marker,
    pub uri_rewriter: Rc<dyn UriRewriter>,
    /// Re-entrant event-processing depth for the current dynamic
    /// extent; nonzero while a handler is running.
    pub depth: Cell<u32>,
    pub handlers: RefCell<HashMap<String, EventHandler>>,
    pub listeners: RefCell<Vec<ListenerRegistration>>,
    pub document: Rc<Document>,
    pub scheduler: Rc<RefCell<Scheduler>>,
    /// The host subtree this gadget owns; its virtual body. Traversal
    /// from inside never crosses above it.
    pub container: NodeHandle,
}

impl GadgetCtx {
    /// Appends this gadget's namespace suffix to an id token.
    pub fn suffix_id(&self, id: &str) -> String {
        format!("{id}{}", self.suffix)
    }

    /// Strips the suffix from an id token; `None` when it is absent,
    /// which hides foreign ids entirely.
    pub fn unsuffix_id<'v>(&self, value: &'v str) -> Option<&'v str> {
        value.strip_suffix(self.suffix.as_str())
    }

    pub fn in_event_scope(&self) -> bool {
        self.depth.get() > 0
    }
}
