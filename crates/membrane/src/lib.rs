//! Capability-security taming layer for a shared document tree.
//!
//! Mutually distrusting gadgets share one host document. Each gadget
//! is installed with its own namespace suffix, URI rewriter and
//! capability marker, and everything it touches goes through wrappers
//! that validate, rewrite or refuse. The policy tables live in
//! `palisade-policy`; the concrete tree, events and timers live in
//! `palisade-host`.

mod attr;
mod context;
mod sanitize;

pub mod error;
pub mod event;
pub mod guard;
pub mod node;
pub mod style;
pub mod uri;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use palisade_host::tree as host_tree;
use palisade_host::{Document, NodeHandle, RawEvent, Scheduler};
use tracing::{debug, error, warn};

pub use error::{DomError, DomResult};
pub use event::{EventHandler, TameEvent};
pub use guard::{Marker, Stamp};
pub use node::{TameKind, TameNode, TameNodeList};
pub use style::{SealedStyle, StyleSealer, TameStyle};
pub use uri::{DenyAllRewriter, SchemeRewriter, UriRewriter};

use crate::context::GadgetCtx;
use crate::event::DepthGuard;
use crate::node::tame_node;

/// The tamed document a gadget scripts against.
#[derive(Clone)]
pub struct TameDocument {
    ctx: Rc<GadgetCtx>,
}

impl TameDocument {
    /// Creates a detached element of an allowlisted, safe tag. Element
    /// policy is applied immediately, so a fresh form already refuses
    /// native submission.
    pub fn create_element(&self, tag: &str) -> DomResult<TameNode> {
        let tag = tag.to_ascii_lowercase();
        let table = palisade_policy::ElementTable::standard();
        if !table.is_known(&tag) || table.is_unsafe(&tag) {
            return Err(DomError::UnsupportedOperation {
                operation: "create_element of a disallowed tag",
            });
        }
        let node = self.ctx.document.create_element(&tag);
        sanitize::apply_element_policy_to_node(&node);
        Ok(tame_node(&self.ctx, &node, true))
    }

    pub fn create_text_node(&self, text: &str) -> TameNode {
        let node = self.ctx.document.create_text_node(text);
        tame_node(&self.ctx, &node, true)
    }

    /// Looks up an element by the gadget's virtual id. The query runs
    /// against the suffixed id, so one gadget can never resolve
    /// another's elements.
    pub fn get_element_by_id(&self, id: &str) -> Option<TameNode> {
        let suffixed = self.ctx.suffix_id(id);
        self.ctx
            .document
            .get_element_by_id(&suffixed)
            .map(|node| tame_node(&self.ctx, &node, true))
    }

    /// The gadget's virtual body: the container subtree it owns.
    pub fn body(&self) -> TameNode {
        tame_node(&self.ctx, &self.ctx.container, true)
    }

    /// Elements of the gadget's subtree with the given tag; the query
    /// never reaches outside the container.
    pub fn get_elements_by_tag_name(&self, tag: &str) -> DomResult<TameNodeList> {
        self.body().get_elements_by_tag_name(tag)
    }

    /// `document.write` is not virtualizable; calls are logged and
    /// ignored.
    pub fn write(&self, text: &str) {
        warn!(len = text.len(), "document.write is a no-op under taming");
    }
}

/// Opaque, capability-guarded timer handle.
pub struct TimerHandle {
    id: u64,
    stamp: Stamp,
}

/// Fixed, read-only location stand-in; gadgets never learn the real
/// page URL.
#[derive(Debug, Clone, Copy)]
pub struct Location;

impl Location {
    pub fn href(&self) -> &'static str {
        "http://nosuchhost.invalid:80/"
    }

    pub fn protocol(&self) -> &'static str {
        "http:"
    }

    pub fn host(&self) -> &'static str {
        "nosuchhost.invalid:80"
    }

    pub fn hostname(&self) -> &'static str {
        "nosuchhost.invalid"
    }

    pub fn port(&self) -> &'static str {
        "80"
    }

    pub fn pathname(&self) -> &'static str {
        "/"
    }

    pub fn search(&self) -> &'static str {
        ""
    }

    pub fn hash(&self) -> &'static str {
        ""
    }
}

/// Fixed navigator stand-in.
#[derive(Debug, Clone, Copy)]
pub struct Navigator;

impl Navigator {
    pub fn user_agent(&self) -> &'static str {
        "Palisade/1.0"
    }

    pub fn app_name(&self) -> &'static str {
        "Palisade"
    }

    pub fn app_version(&self) -> &'static str {
        "1.0"
    }
}

/// The tamed window.
#[derive(Clone)]
pub struct TameWindow {
    ctx: Rc<GadgetCtx>,
}

impl TameWindow {
    pub fn document(&self) -> TameDocument {
        TameDocument {
            ctx: self.ctx.clone(),
        }
    }

    pub fn location(&self) -> Location {
        Location
    }

    pub fn navigator(&self) -> Navigator {
        Navigator
    }

    pub fn set_timeout(&self, callback: Rc<dyn Fn()>, delay_ms: u64) -> TimerHandle {
        let id = self.ctx.scheduler.borrow_mut().set_timeout(callback, delay_ms);
        TimerHandle {
            id,
            stamp: self.ctx.marker.stamp(),
        }
    }

    pub fn set_interval(&self, callback: Rc<dyn Fn()>, period_ms: u64) -> TimerHandle {
        let id = self.ctx.scheduler.borrow_mut().set_interval(callback, period_ms);
        TimerHandle {
            id,
            stamp: self.ctx.marker.stamp(),
        }
    }

    /// Cancels a timer. The handle must come from this installation.
    pub fn clear_timeout(&self, handle: &TimerHandle) -> DomResult<()> {
        self.ctx.marker.guard(&handle.stamp)?;
        self.ctx.scheduler.borrow_mut().clear(handle.id);
        Ok(())
    }

    /// Scrolls the host viewport, but only inside the dynamic extent
    /// of genuine event processing; ambient calls are ignored.
    pub fn scroll_to(&self, x: f64, y: f64) {
        if self.ctx.in_event_scope() {
            self.ctx.document.scroll_to(x, y);
        } else {
            debug!("scroll_to outside event processing ignored");
        }
    }
}

/// Everything one installed gadget receives.
pub struct GadgetScope {
    document: TameDocument,
    window: TameWindow,
    sealer: StyleSealer,
    ctx: Rc<GadgetCtx>,
}

impl GadgetScope {
    pub fn document(&self) -> TameDocument {
        self.document.clone()
    }

    pub fn window(&self) -> TameWindow {
        self.window.clone()
    }

    /// The style-sealing capability for this gadget's trusted compiler
    /// output.
    pub fn sealer(&self) -> &StyleSealer {
        &self.sealer
    }

    pub fn module_id(&self) -> u32 {
        self.ctx.module_id
    }

    /// The id class scoping this gadget's generated CSS selectors.
    pub fn id_class(&self) -> &str {
        &self.ctx.id_class
    }

    pub fn suffix(&self) -> &str {
        &self.ctx.suffix
    }

    /// Registers a named handler reachable from rewritten event
    /// attributes.
    pub fn register_handler(&self, name: &str, handler: EventHandler) {
        self.ctx
            .handlers
            .borrow_mut()
            .insert(name.to_string(), handler);
    }

    /// Installs compiler-generated CSS into the host document.
    pub fn emit_css(&self, css_text: &str) {
        style::emit_css(&self.ctx.document, css_text);
    }
}

/// Process-wide dispatch entry point. Rewritten event attributes name
/// a module id and handler; the dispatcher routes the invocation back
/// into the right gadget scope.
pub struct Dispatcher {
    scopes: RefCell<HashMap<u32, Rc<GadgetCtx>>>,
    next_module: Cell<u32>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher {
            scopes: RefCell::new(HashMap::new()),
            next_module: Cell::new(0),
        }
    }

    /// Installs one gadget. The suffix must begin with the `-`
    /// delimiter; the remainder becomes the gadget's id class. A
    /// container element carrying that class is appended to the host
    /// body and becomes the gadget's virtual document body.
    pub fn install(
        &self,
        suffix: &str,
        uri_rewriter: Rc<dyn UriRewriter>,
        document: Rc<Document>,
        scheduler: Rc<RefCell<Scheduler>>,
    ) -> DomResult<GadgetScope> {
        let Some(id_class) = suffix.strip_prefix('-') else {
            return Err(DomError::MalformedConfiguration {
                reason: format!("suffix {suffix:?} must start with '-'"),
            });
        };
        if id_class.is_empty()
            || !id_class
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DomError::MalformedConfiguration {
                reason: format!("suffix {suffix:?} is not a valid name token"),
            });
        }
        let container = document.create_element("div");
        if let Some(elem) = container.borrow_mut().as_element_mut() {
            elem.set_attribute("class", id_class);
        }
        host_tree::append_child(&document.body(), &container)
            .map_err(|e| DomError::MalformedConfiguration {
                reason: e.to_string(),
            })?;
        let module_id = self.next_module.get();
        self.next_module.set(module_id + 1);
        let marker = Marker::mint();
        let ctx = Rc::new(GadgetCtx {
            suffix: suffix.to_string(),
            id_class: id_class.to_string(),
            module_id,
            marker,
            uri_rewriter,
            depth: Cell::new(0),
            handlers: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            document,
            scheduler,
            container,
        });
        self.scopes.borrow_mut().insert(module_id, ctx.clone());
        Ok(GadgetScope {
            document: TameDocument { ctx: ctx.clone() },
            window: TameWindow { ctx: ctx.clone() },
            sealer: StyleSealer::new(marker.stamp()),
            ctx,
        })
    }

    /// Runs a named handler in a gadget scope: the entry point behind
    /// every rewritten event attribute. The handler sees a fresh tamed
    /// target and event; its errors are logged and re-raised.
    pub fn dispatch(
        &self,
        module_id: u32,
        handler_name: &str,
        target: &NodeHandle,
        event: &RawEvent,
    ) -> DomResult<()> {
        let ctx = self
            .scopes
            .borrow()
            .get(&module_id)
            .cloned()
            .ok_or(DomError::InvalidCapability)?;
        let handler = ctx
            .handlers
            .borrow()
            .get(handler_name)
            .cloned()
            .ok_or(DomError::InvalidCapability)?;
        let _scope = DepthGuard::enter(&ctx);
        let tamed_target = tame_node(&ctx, target, true);
        let tamed_event = TameEvent::new(event, Some(tamed_target.clone()));
        if let Err(err) = handler(&tamed_target, &tamed_event) {
            error!(%err, handler = %handler_name, module_id,
                "dispatched handler failed");
            return Err(err);
        }
        Ok(())
    }

    /// Dispatches from a rewritten event-attribute value, resolving
    /// the module id and handler name it encodes.
    pub fn dispatch_rewritten(
        &self,
        attr_value: &str,
        target: &NodeHandle,
        event: &RawEvent,
    ) -> DomResult<()> {
        let Some((module_id, handler_name)) = attr::parse_dispatch_call(attr_value)
        else {
            return Err(DomError::InvalidCapability);
        };
        self.dispatch(module_id, handler_name, target, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uri::SchemeRewriter;

    fn host() -> (Rc<Document>, Rc<RefCell<Scheduler>>) {
        (Document::new(), Rc::new(RefCell::new(Scheduler::new())))
    }

    #[test]
    fn install_rejects_malformed_suffixes() {
        let dispatcher = Dispatcher::new();
        let (document, scheduler) = host();
        for bad in ["g1", "", "-", "-has space"] {
            let result = dispatcher.install(
                bad,
                Rc::new(SchemeRewriter::web_default()),
                document.clone(),
                scheduler.clone(),
            );
            assert!(
                matches!(result, Err(DomError::MalformedConfiguration { .. })),
                "suffix {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn install_builds_a_classed_container() {
        let dispatcher = Dispatcher::new();
        let (document, scheduler) = host();
        let scope = dispatcher
            .install(
                "-g1___",
                Rc::new(SchemeRewriter::web_default()),
                document.clone(),
                scheduler,
            )
            .unwrap();
        assert_eq!(scope.id_class(), "g1___");
        let body = scope.document().body();
        assert_eq!(body.class_name().unwrap(), "g1___");
    }

    #[test]
    fn create_element_refuses_disallowed_tags() {
        let dispatcher = Dispatcher::new();
        let (document, scheduler) = host();
        let scope = dispatcher
            .install(
                "-g1___",
                Rc::new(SchemeRewriter::web_default()),
                document,
                scheduler,
            )
            .unwrap();
        let doc = scope.document();
        assert!(doc.create_element("p").is_ok());
        assert!(matches!(
            doc.create_element("script"),
            Err(DomError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            doc.create_element("blink"),
            Err(DomError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn fresh_forms_refuse_native_submission() {
        let dispatcher = Dispatcher::new();
        let (document, scheduler) = host();
        let scope = dispatcher
            .install(
                "-g1___",
                Rc::new(SchemeRewriter::web_default()),
                document,
                scheduler,
            )
            .unwrap();
        let form = scope.document().create_element("form").unwrap();
        assert_eq!(
            form.raw()
                .borrow()
                .as_element()
                .unwrap()
                .get_attribute("onsubmit")
                .as_deref(),
            Some("return false")
        );
    }

    #[test]
    fn timer_handles_are_capability_guarded() {
        let dispatcher = Dispatcher::new();
        let (document, scheduler) = host();
        let scope_a = dispatcher
            .install(
                "-a___",
                Rc::new(SchemeRewriter::web_default()),
                document.clone(),
                scheduler.clone(),
            )
            .unwrap();
        let scope_b = dispatcher
            .install(
                "-b___",
                Rc::new(SchemeRewriter::web_default()),
                document,
                scheduler,
            )
            .unwrap();
        let handle = scope_a.window().set_timeout(Rc::new(|| {}), 10);
        assert_eq!(
            scope_b.window().clear_timeout(&handle),
            Err(DomError::InvalidCapability)
        );
        assert!(scope_a.window().clear_timeout(&handle).is_ok());
    }
}
