//! Event virtualization.
//!
//! Gadget handlers never see a host event. They get a `TameEvent`
//! snapshot plus a tamed, always-editable target wrapper, and they run
//! inside a re-entrant depth scope that marks the dynamic extent of
//! genuine event processing. Ambient effects like window scrolling
//! consult that scope.

use std::rc::Rc;

use palisade_host::RawEvent;

use crate::context::GadgetCtx;
use crate::error::DomResult;
use crate::node::{tame_node, TameNode};

/// A gadget-supplied handler. Errors it returns are logged and, for
/// named dispatch, re-raised to the dispatching host.
pub type EventHandler = Rc<dyn Fn(&TameNode, &TameEvent) -> DomResult<()>>;

/// Read-only view of one event occurrence. Stopping propagation is
/// the only write it forwards.
pub struct TameEvent<'a> {
    raw: &'a RawEvent,
    target: Option<TameNode>,
}

impl<'a> TameEvent<'a> {
    pub(crate) fn new(raw: &'a RawEvent, target: Option<TameNode>) -> TameEvent<'a> {
        TameEvent { raw, target }
    }

    /// Wraps the host event's own target through the given gadget's
    /// membrane.
    pub(crate) fn from_raw(ctx: &Rc<GadgetCtx>, raw: &'a RawEvent) -> TameEvent<'a> {
        let target = raw
            .target
            .borrow()
            .as_ref()
            .map(|node| tame_node(ctx, node, true));
        TameEvent { raw, target }
    }

    pub fn event_type(&self) -> &str {
        &self.raw.event_type
    }

    pub fn target(&self) -> Option<&TameNode> {
        self.target.as_ref()
    }

    pub fn page_x(&self) -> f64 {
        self.raw.page_x
    }

    pub fn page_y(&self) -> f64 {
        self.raw.page_y
    }

    pub fn client_x(&self) -> f64 {
        self.raw.client_x
    }

    pub fn client_y(&self) -> f64 {
        self.raw.client_y
    }

    pub fn alt_key(&self) -> bool {
        self.raw.alt_key
    }

    pub fn ctrl_key(&self) -> bool {
        self.raw.ctrl_key
    }

    pub fn meta_key(&self) -> bool {
        self.raw.meta_key
    }

    pub fn shift_key(&self) -> bool {
        self.raw.shift_key
    }

    pub fn button(&self) -> Option<i32> {
        self.raw.button
    }

    pub fn which(&self) -> Option<i32> {
        self.raw.which
    }

    pub fn key_code(&self) -> Option<i32> {
        self.raw.key_code
    }

    pub fn stop_propagation(&self) {
        self.raw.stop_propagation();
    }
}

/// RAII marker for the dynamic extent of event processing. The depth
/// is a counter, not a flag: dispatch re-enters when a handler fires
/// another event synchronously, and every exit path must restore.
pub(crate) struct DepthGuard {
    ctx: Rc<GadgetCtx>,
}

impl DepthGuard {
    pub(crate) fn enter(ctx: &Rc<GadgetCtx>) -> DepthGuard {
        ctx.depth.set(ctx.depth.get() + 1);
        DepthGuard { ctx: ctx.clone() }
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.ctx.depth.set(self.ctx.depth.get() - 1);
    }
}
