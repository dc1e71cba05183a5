//! Node wrappers: the membrane between gadget code and the host tree.
//!
//! Every host node a gadget can see arrives wrapped in a `TameNode`
//! whose kind is fixed at wrap time from the element allowlist.
//! Unknown and unsafe elements wrap as `Opaque`: traversal still
//! works, everything else refuses. Wrappers are minted fresh on each
//! factory call; two wrappers for the same host node are equal in
//! effect but never guaranteed identical.

use std::collections::HashMap;
use std::rc::Rc;

use palisade_host::markup;
use palisade_host::tree::{self, NodeData, NodeHandle};
use palisade_host::{event as host_event, RawEvent};
use palisade_policy::{AttrClass, ElementTable, FLAG_CDATA, FLAG_RCDATA};
use tracing::{debug, error};

use crate::attr;
use crate::context::{GadgetCtx, ListenerRegistration};
use crate::error::{DomError, DomResult};
use crate::event::{DepthGuard, EventHandler, TameEvent};
use crate::guard::Stamp;
use crate::sanitize;
use crate::style::{SealedStyle, TameStyle};

/// Closed wrapper taxonomy; there is no subtype chain to walk or
/// spoof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TameKind {
    Opaque,
    Text,
    Comment,
    Element,
    Anchor,
    Form,
    Input,
    Image,
}

impl TameKind {
    fn is_element(self) -> bool {
        matches!(
            self,
            TameKind::Element
                | TameKind::Anchor
                | TameKind::Form
                | TameKind::Input
                | TameKind::Image
        )
    }
}

#[derive(Clone)]
pub struct TameNode {
    kind: TameKind,
    node: NodeHandle,
    editable: bool,
    stamp: Stamp,
    pub(crate) ctx: Rc<GadgetCtx>,
}

/// Wraps a host node for gadget consumption.
pub(crate) fn tame_node(ctx: &Rc<GadgetCtx>, raw: &NodeHandle, editable: bool) -> TameNode {
    let kind = {
        let n = raw.borrow();
        match &n.data {
            NodeData::Text(_) => TameKind::Text,
            NodeData::Comment(_) => TameKind::Comment,
            NodeData::Document => TameKind::Opaque,
            NodeData::Element(elem) => {
                let table = ElementTable::standard();
                if !table.is_known(&elem.tag) || table.is_unsafe(&elem.tag) {
                    TameKind::Opaque
                } else {
                    match elem.tag.as_str() {
                        "a" => TameKind::Anchor,
                        "form" => TameKind::Form,
                        "input" => TameKind::Input,
                        "img" => TameKind::Image,
                        _ => TameKind::Element,
                    }
                }
            }
        }
    };
    TameNode {
        kind,
        node: raw.clone(),
        editable,
        stamp: ctx.marker.stamp(),
        ctx: ctx.clone(),
    }
}

impl TameNode {
    pub fn kind(&self) -> TameKind {
        self.kind
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub(crate) fn raw(&self) -> &NodeHandle {
        &self.node
    }

    fn wrap(&self, raw: &NodeHandle) -> TameNode {
        tame_node(&self.ctx, raw, self.editable)
    }

    fn guard_other(&self, other: &TameNode) -> DomResult<()> {
        self.ctx.marker.guard(&other.stamp)
    }

    fn require_element(&self, operation: &'static str) -> DomResult<()> {
        if self.kind.is_element() {
            Ok(())
        } else {
            Err(DomError::UnsupportedOperation { operation })
        }
    }

    fn require_kind(&self, kind: TameKind, operation: &'static str) -> DomResult<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(DomError::UnsupportedOperation { operation })
        }
    }

    fn require_editable(&self) -> DomResult<()> {
        if self.editable {
            Ok(())
        } else {
            Err(DomError::NotEditable)
        }
    }

    fn tag(&self) -> String {
        self.node.borrow().tag().unwrap_or("").to_string()
    }

    // Identity surface. Opaque wrappers answer blandly instead of
    // failing so generic traversal code keeps working.

    pub fn node_name(&self) -> String {
        match self.kind {
            TameKind::Opaque => "#".to_string(),
            TameKind::Text => "#text".to_string(),
            TameKind::Comment => "#comment".to_string(),
            _ => self.tag().to_ascii_uppercase(),
        }
    }

    pub fn node_type(&self) -> i32 {
        match self.kind {
            TameKind::Opaque => -1,
            TameKind::Text => 3,
            TameKind::Comment => 8,
            _ => 1,
        }
    }

    pub fn node_value(&self) -> String {
        if self.kind == TameKind::Opaque {
            return String::new();
        }
        match &self.node.borrow().data {
            NodeData::Text(t) | NodeData::Comment(t) => t.clone(),
            _ => String::new(),
        }
    }

    // Traversal never fails, whatever the kind. The gadget's own
    // container is its horizon; walking above it answers `None`.

    pub fn parent(&self) -> Option<TameNode> {
        if Rc::ptr_eq(&self.node, &self.ctx.container) {
            return None;
        }
        tree::parent(&self.node).map(|p| self.wrap(&p))
    }

    pub fn children(&self) -> Vec<TameNode> {
        tree::children(&self.node)
            .iter()
            .map(|c| self.wrap(c))
            .collect()
    }

    pub fn first_child(&self) -> Option<TameNode> {
        tree::first_child(&self.node).map(|c| self.wrap(&c))
    }

    pub fn last_child(&self) -> Option<TameNode> {
        tree::last_child(&self.node).map(|c| self.wrap(&c))
    }

    pub fn next_sibling(&self) -> Option<TameNode> {
        tree::next_sibling(&self.node).map(|c| self.wrap(&c))
    }

    pub fn prev_sibling(&self) -> Option<TameNode> {
        tree::prev_sibling(&self.node).map(|c| self.wrap(&c))
    }

    // Attribute surface, routed through the policy engine in both
    // directions.

    pub fn get_attribute(&self, name: &str) -> DomResult<Option<String>> {
        self.require_element("get_attribute")?;
        let name = name.to_ascii_lowercase();
        let tag = self.tag();
        let Some(class) = palisade_policy::AttributeTable::standard()
            .classify(&tag, &name)
        else {
            return Ok(None);
        };
        let stored = self
            .node
            .borrow()
            .as_element()
            .and_then(|elem| elem.get_attribute(&name));
        Ok(stored.and_then(|value| attr::virtualize_attribute(&self.ctx, class, &value)))
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> DomResult<()> {
        self.require_element("set_attribute")?;
        self.require_editable()?;
        let name = name.to_ascii_lowercase();
        let tag = self.tag();
        let class = palisade_policy::AttributeTable::standard().classify(&tag, &name);
        let rewritten = attr::rewrite_attribute(&self.ctx, &tag, &name, class, value)?;
        if let Some(elem) = self.node.borrow_mut().as_element_mut() {
            elem.set_attribute(&name, &rewritten);
        }
        Ok(())
    }

    pub fn remove_attribute(&self, name: &str) -> DomResult<()> {
        self.require_element("remove_attribute")?;
        self.require_editable()?;
        let name = name.to_ascii_lowercase();
        let tag = self.tag();
        match palisade_policy::AttributeTable::standard().classify(&tag, &name) {
            None => Err(DomError::rejected(format!(
                "attribute {name} not allowed on {tag}"
            ))),
            // Frame targets and handler slots hold the injected
            // element-policy defenses; they can be rewritten but
            // never stripped.
            Some(AttrClass::FrameTarget | AttrClass::Script) => {
                Err(DomError::rejected(format!(
                    "attribute {name} on {tag} cannot be removed"
                )))
            }
            Some(_) => {
                if let Some(elem) = self.node.borrow_mut().as_element_mut() {
                    elem.remove_attribute(&name);
                }
                Ok(())
            }
        }
    }

    pub fn id(&self) -> DomResult<String> {
        Ok(self.get_attribute("id")?.unwrap_or_default())
    }

    pub fn set_id(&self, id: &str) -> DomResult<()> {
        self.set_attribute("id", id)
    }

    pub fn class_name(&self) -> DomResult<String> {
        Ok(self.get_attribute("class")?.unwrap_or_default())
    }

    pub fn set_class_name(&self, classes: &str) -> DomResult<()> {
        self.set_attribute("class", classes)
    }

    pub fn tag_name(&self) -> DomResult<String> {
        self.require_element("tag_name")?;
        Ok(self.tag().to_ascii_uppercase())
    }

    /// Descendant elements with the given tag, in document order.
    /// Tags outside the safe allowlist yield an empty list.
    pub fn get_elements_by_tag_name(&self, tag: &str) -> DomResult<TameNodeList> {
        self.require_element("get_elements_by_tag_name")?;
        let tag = tag.to_ascii_lowercase();
        let table = ElementTable::standard();
        if !table.is_known(&tag) || table.is_unsafe(&tag) {
            return Ok(tame_node_list(&self.ctx, &[], self.editable, None));
        }
        Ok(tame_node_list(
            &self.ctx,
            &tree::elements_by_tag_name(&self.node, &tag),
            self.editable,
            None,
        ))
    }

    // Markup surface.

    pub fn inner_html(&self) -> DomResult<String> {
        self.require_element("inner_html")?;
        let flags = ElementTable::standard().lookup(&self.tag()).unwrap_or(0);
        if flags & (FLAG_CDATA | FLAG_RCDATA) != 0 {
            // Raw-text bodies read back as escaped text.
            return Ok(markup::escape_text(&tree::text_content(&self.node)));
        }
        Ok(sanitize::tame_inner_html(
            &self.ctx,
            &markup::serialize_inner(&self.node),
        ))
    }

    pub fn set_inner_html(&self, html: &str) -> DomResult<()> {
        self.require_element("set_inner_html")?;
        self.require_editable()?;
        let flags = ElementTable::standard().lookup(&self.tag()).unwrap_or(0);
        if flags & FLAG_CDATA != 0 {
            return Err(DomError::UnsupportedOperation {
                operation: "set_inner_html on a raw-text element",
            });
        }
        if flags & FLAG_RCDATA != 0 {
            let text = markup::unescape_entities(html);
            for child in tree::children(&self.node) {
                tree::detach(&child);
            }
            let _ = tree::append_child(
                &self.node,
                &palisade_host::RawNode::new_text(&text),
            );
            return Ok(());
        }
        let sanitized = sanitize::sanitize_html(&self.ctx, html);
        self.ctx.document.set_inner_markup(&self.node, &sanitized);
        Ok(())
    }

    // Style surface.

    pub fn style(&self) -> DomResult<TameStyle> {
        self.require_element("style")?;
        Ok(TameStyle::new(self.node.clone(), self.editable))
    }

    /// Applies a trusted batch of declarations. Unsealing is the
    /// validation; editability is still required.
    pub fn update_style(&self, sealed: &SealedStyle) -> DomResult<()> {
        self.require_element("update_style")?;
        self.ctx.marker.guard(sealed.stamp())?;
        self.require_editable()?;
        if let Some(elem) = self.node.borrow_mut().as_element_mut() {
            for (name, value) in sealed.pairs() {
                elem.set_style_value(name, value);
            }
        }
        Ok(())
    }

    // Layout reads.

    pub fn offset_left(&self) -> DomResult<i32> {
        self.offset("offset_left", |o| o.0)
    }

    pub fn offset_top(&self) -> DomResult<i32> {
        self.offset("offset_top", |o| o.1)
    }

    pub fn offset_width(&self) -> DomResult<i32> {
        self.offset("offset_width", |o| o.2)
    }

    pub fn offset_height(&self) -> DomResult<i32> {
        self.offset("offset_height", |o| o.3)
    }

    fn offset(
        &self,
        operation: &'static str,
        pick: fn((i32, i32, i32, i32)) -> i32,
    ) -> DomResult<i32> {
        self.require_element(operation)?;
        Ok(self
            .node
            .borrow()
            .as_element()
            .map(|elem| pick(elem.offsets))
            .unwrap_or(0))
    }

    // Structural mutation. Both operands are guarded and both must be
    // editable; namespace equality is deliberately not checked.

    pub fn append_child(&self, child: &TameNode) -> DomResult<()> {
        self.require_element("append_child")?;
        self.guard_other(child)?;
        self.require_editable()?;
        child.require_editable()?;
        tree::append_child(&self.node, &child.node)
            .map_err(|e| DomError::rejected(e.to_string()))
    }

    pub fn insert_before(
        &self,
        child: &TameNode,
        before: Option<&TameNode>,
    ) -> DomResult<()> {
        self.require_element("insert_before")?;
        self.guard_other(child)?;
        if let Some(before) = before {
            self.guard_other(before)?;
        }
        self.require_editable()?;
        child.require_editable()?;
        tree::insert_before(&self.node, &child.node, before.map(|b| &b.node))
            .map_err(|e| DomError::rejected(e.to_string()))
    }

    pub fn remove_child(&self, child: &TameNode) -> DomResult<()> {
        self.require_element("remove_child")?;
        self.guard_other(child)?;
        self.require_editable()?;
        child.require_editable()?;
        tree::remove_child(&self.node, &child.node)
            .map_err(|e| DomError::rejected(e.to_string()))
    }

    pub fn replace_child(
        &self,
        new_child: &TameNode,
        old_child: &TameNode,
    ) -> DomResult<()> {
        self.require_element("replace_child")?;
        self.guard_other(new_child)?;
        self.guard_other(old_child)?;
        self.require_editable()?;
        new_child.require_editable()?;
        old_child.require_editable()?;
        tree::replace_child(&self.node, &new_child.node, &old_child.node)
            .map_err(|e| DomError::rejected(e.to_string()))
    }

    // Listener surface. Registration wraps the gadget handler so it
    // runs against a fresh tamed target inside the event-processing
    // depth scope; removal matches by the original handler's identity.

    pub fn add_event_listener(
        &self,
        event_type: &str,
        handler: EventHandler,
    ) -> DomResult<()> {
        self.require_element("add_event_listener")?;
        self.require_editable()?;
        let event_type = event_type.to_ascii_lowercase();
        let ctx = self.ctx.clone();
        let node = self.node.clone();
        let original = handler.clone();
        let wrapped: palisade_host::RawListener = Rc::new(move |raw_event: &RawEvent| {
            let target = tame_node(&ctx, &node, true);
            let event = TameEvent::from_raw(&ctx, raw_event);
            let _scope = DepthGuard::enter(&ctx);
            if let Err(err) = handler(&target, &event) {
                error!(%err, event_type = %raw_event.event_type,
                    "gadget event handler failed");
            }
        });
        let host_id = host_event::add_listener(&self.node, &event_type, wrapped);
        self.ctx.listeners.borrow_mut().push(ListenerRegistration {
            node: Rc::downgrade(&self.node),
            event_type,
            host_id,
            original,
        });
        Ok(())
    }

    /// Removes a previously added listener; silently a no-op when no
    /// registration matches.
    pub fn remove_event_listener(
        &self,
        event_type: &str,
        original: &EventHandler,
    ) -> DomResult<()> {
        self.require_element("remove_event_listener")?;
        self.require_editable()?;
        let event_type = event_type.to_ascii_lowercase();
        let mut registrations = self.ctx.listeners.borrow_mut();
        let position = registrations.iter().position(|reg| {
            reg.event_type == event_type
                && Rc::ptr_eq(&reg.original, original)
                && reg
                    .node
                    .upgrade()
                    .map(|n| Rc::ptr_eq(&n, &self.node))
                    .unwrap_or(false)
        });
        if let Some(position) = position {
            let registration = registrations.remove(position);
            host_event::remove_listener(&self.node, registration.host_id);
        }
        Ok(())
    }

    /// Fires a synthetic event at this node; registered listeners run
    /// through the normal indirection.
    pub fn dispatch_event(&self, event_type: &str) -> DomResult<()> {
        self.require_element("dispatch_event")?;
        self.require_editable()?;
        host_event::dispatch_event(&self.node, &RawEvent::new(event_type));
        Ok(())
    }

    // Anchor surface.

    pub fn href(&self) -> DomResult<String> {
        self.require_kind(TameKind::Anchor, "href")?;
        Ok(self.get_attribute("href")?.unwrap_or_default())
    }

    pub fn set_href(&self, href: &str) -> DomResult<()> {
        self.require_kind(TameKind::Anchor, "set_href")?;
        self.set_attribute("href", href)
    }

    // Form surface.

    pub fn action(&self) -> DomResult<String> {
        self.require_kind(TameKind::Form, "action")?;
        Ok(self.get_attribute("action")?.unwrap_or_default())
    }

    pub fn method(&self) -> DomResult<String> {
        self.require_kind(TameKind::Form, "method")?;
        Ok(self
            .get_attribute("method")?
            .unwrap_or_default()
            .to_ascii_lowercase())
    }

    /// The form's target is virtual; gadgets always read it as empty.
    pub fn target(&self) -> DomResult<String> {
        self.require_kind(TameKind::Form, "target")?;
        Ok(self.get_attribute("target")?.unwrap_or_default())
    }

    /// The form's controls, name-addressable by their `name`
    /// attribute.
    pub fn elements(&self) -> DomResult<TameNodeList> {
        self.require_kind(TameKind::Form, "elements")?;
        let mut controls = Vec::new();
        collect_controls(&self.node, &mut controls);
        Ok(tame_node_list(
            &self.ctx,
            &controls,
            self.editable,
            Some("name"),
        ))
    }

    pub fn reset(&self) -> DomResult<()> {
        self.require_kind(TameKind::Form, "reset")?;
        self.require_editable()?;
        tree::reset_form(&self.node);
        Ok(())
    }

    pub fn submit(&self) -> DomResult<()> {
        self.require_kind(TameKind::Form, "submit")?;
        self.require_editable()?;
        host_event::submit_form(&self.node);
        Ok(())
    }

    // Input surface.

    pub fn value(&self) -> DomResult<String> {
        self.require_kind(TameKind::Input, "value")?;
        Ok(self
            .node
            .borrow()
            .as_element()
            .map(|elem| elem.effective_value())
            .unwrap_or_default())
    }

    pub fn set_value(&self, value: &str) -> DomResult<()> {
        self.require_kind(TameKind::Input, "set_value")?;
        self.require_editable()?;
        if let Some(elem) = self.node.borrow_mut().as_element_mut() {
            elem.value = Some(value.to_string());
        }
        Ok(())
    }

    pub fn checked(&self) -> DomResult<bool> {
        self.require_kind(TameKind::Input, "checked")?;
        Ok(self
            .node
            .borrow()
            .as_element()
            .map(|elem| elem.checked)
            .unwrap_or(false))
    }

    pub fn set_checked(&self, checked: bool) -> DomResult<()> {
        self.require_kind(TameKind::Input, "set_checked")?;
        self.require_editable()?;
        if let Some(elem) = self.node.borrow_mut().as_element_mut() {
            elem.checked = checked;
        }
        Ok(())
    }

    pub fn input_type(&self) -> DomResult<String> {
        self.require_kind(TameKind::Input, "input_type")?;
        let raw = self
            .node
            .borrow()
            .as_element()
            .and_then(|elem| elem.get_attribute("type"));
        Ok(raw.unwrap_or_else(|| "text".to_string()).to_ascii_lowercase())
    }

    /// The enclosing form, if any, within the gadget's horizon.
    pub fn form(&self) -> DomResult<Option<TameNode>> {
        self.require_kind(TameKind::Input, "form")?;
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            if node.kind == TameKind::Form {
                return Ok(Some(node));
            }
            cursor = node.parent();
        }
        Ok(None)
    }

    pub fn focus(&self) -> DomResult<()> {
        self.require_kind(TameKind::Input, "focus")?;
        self.require_editable()?;
        self.ctx.document.focus(&self.node);
        Ok(())
    }

    pub fn blur(&self) -> DomResult<()> {
        self.require_kind(TameKind::Input, "blur")?;
        self.require_editable()?;
        self.ctx.document.blur(&self.node);
        Ok(())
    }

    // Image surface.

    pub fn src(&self) -> DomResult<String> {
        self.require_kind(TameKind::Image, "src")?;
        Ok(self.get_attribute("src")?.unwrap_or_default())
    }

    pub fn set_src(&self, src: &str) -> DomResult<()> {
        self.require_kind(TameKind::Image, "set_src")?;
        self.set_attribute("src", src)
    }

    // Text surface.

    pub fn data(&self) -> DomResult<String> {
        self.require_kind(TameKind::Text, "data")?;
        Ok(self.node_value())
    }

    pub fn set_data(&self, text: &str) -> DomResult<()> {
        self.require_kind(TameKind::Text, "set_data")?;
        self.require_editable()?;
        if let NodeData::Text(t) = &mut self.node.borrow_mut().data {
            *t = text.to_string();
        }
        Ok(())
    }
}

fn collect_controls(node: &NodeHandle, out: &mut Vec<NodeHandle>) {
    for child in tree::children(node) {
        if matches!(
            child.borrow().tag(),
            Some("input" | "select" | "textarea" | "button")
        ) {
            out.push(child.clone());
        }
        collect_controls(&child, out);
    }
}

/// Ordered, immutable collection of wrappers, optionally addressable
/// by a key attribute.
pub struct TameNodeList {
    items: Vec<TameNode>,
    names: HashMap<String, usize>,
}

pub(crate) fn tame_node_list(
    ctx: &Rc<GadgetCtx>,
    nodes: &[NodeHandle],
    editable: bool,
    key_attr: Option<&str>,
) -> TameNodeList {
    let items: Vec<TameNode> = nodes.iter().map(|n| tame_node(ctx, n, editable)).collect();
    let mut names = HashMap::new();
    if let Some(key_attr) = key_attr {
        for (index, raw) in nodes.iter().enumerate() {
            let Some(name) = raw
                .borrow()
                .as_element()
                .and_then(|elem| elem.get_attribute(key_attr))
            else {
                continue;
            };
            // Names that shadow the numeric index, collide, or end in
            // the reserved marker are not addressable.
            if name.is_empty()
                || name.ends_with("__")
                || name.chars().all(|c| c.is_ascii_digit())
            {
                debug!(name = %name, "skipping unaddressable collection name");
                continue;
            }
            names.entry(name).or_insert(index);
        }
    }
    TameNodeList { items, names }
}

impl TameNodeList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TameNode> {
        self.items.get(index).cloned()
    }

    pub fn named(&self, name: &str) -> Option<TameNode> {
        self.names.get(name).and_then(|&index| self.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TameNode> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GadgetCtx;
    use crate::guard::Marker;
    use crate::uri::SchemeRewriter;
    use palisade_host::{Document, RawNode, Scheduler};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    fn ctx() -> Rc<GadgetCtx> {
        let document = Document::new();
        let container = document.create_element("div");
        let _ = tree::append_child(&document.body(), &container);
        Rc::new(GadgetCtx {
            suffix: "-g1___".to_string(),
            id_class: "g1___".to_string(),
            module_id: 0,
            marker: Marker::mint(),
            uri_rewriter: Rc::new(SchemeRewriter::web_default()),
            depth: Cell::new(0),
            handlers: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            document,
            scheduler: Rc::new(RefCell::new(Scheduler::new())),
            container,
        })
    }

    #[test]
    fn unsafe_and_unknown_elements_wrap_opaque() {
        let ctx = ctx();
        let script = RawNode::new_element("script");
        let custom = RawNode::new_element("custom-tag");
        let p = RawNode::new_element("p");
        assert_eq!(tame_node(&ctx, &script, true).kind(), TameKind::Opaque);
        assert_eq!(tame_node(&ctx, &custom, true).kind(), TameKind::Opaque);
        assert_eq!(tame_node(&ctx, &p, true).kind(), TameKind::Element);
    }

    #[test]
    fn subtypes_are_assigned_by_tag() {
        let ctx = ctx();
        for (tag, kind) in [
            ("a", TameKind::Anchor),
            ("form", TameKind::Form),
            ("input", TameKind::Input),
            ("img", TameKind::Image),
            ("select", TameKind::Element),
        ] {
            let node = RawNode::new_element(tag);
            assert_eq!(tame_node(&ctx, &node, true).kind(), kind);
        }
    }

    #[test]
    fn opaque_allows_traversal_but_nothing_else() {
        let ctx = ctx();
        let holder = RawNode::new_element("div");
        let script = RawNode::new_element("script");
        tree::append_child(&holder, &script).unwrap();
        tree::append_child(&ctx.container, &holder).unwrap();
        let opaque = tame_node(&ctx, &script, true);
        assert_eq!(opaque.node_name(), "#");
        assert_eq!(opaque.node_value(), "");
        assert_eq!(opaque.node_type(), -1);
        assert!(opaque.parent().is_some());
        assert!(opaque.children().is_empty());
        assert!(matches!(
            opaque.get_attribute("id"),
            Err(DomError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            opaque.inner_html(),
            Err(DomError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn traversal_stops_at_the_container() {
        let ctx = ctx();
        let child = ctx.document.create_element("p");
        tree::append_child(&ctx.container, &child).unwrap();
        let wrapped = tame_node(&ctx, &child, true);
        let body = wrapped.parent().unwrap();
        assert!(body.parent().is_none());
    }

    #[test]
    fn mutation_requires_both_editable_bits() {
        let ctx = ctx();
        let parent_node = tame_node(&ctx, &RawNode::new_element("div"), true);
        let frozen_child = tame_node(&ctx, &RawNode::new_element("p"), false);
        assert_eq!(
            parent_node.append_child(&frozen_child),
            Err(DomError::NotEditable)
        );
        let frozen_parent = tame_node(&ctx, &RawNode::new_element("div"), false);
        let child = tame_node(&ctx, &RawNode::new_element("p"), true);
        assert_eq!(
            frozen_parent.append_child(&child),
            Err(DomError::NotEditable)
        );
        assert!(parent_node.append_child(&child).is_ok());
    }

    #[test]
    fn foreign_wrappers_fail_the_guard() {
        let ctx_a = ctx();
        let ctx_b = ctx();
        let parent_node = tame_node(&ctx_a, &RawNode::new_element("div"), true);
        let foreign = tame_node(&ctx_b, &RawNode::new_element("p"), true);
        assert_eq!(
            parent_node.append_child(&foreign),
            Err(DomError::InvalidCapability)
        );
    }

    #[test]
    fn id_round_trips_through_the_namespace() {
        let ctx = ctx();
        let node = tame_node(&ctx, &RawNode::new_element("p"), true);
        node.set_id("x").unwrap();
        assert_eq!(
            node.raw()
                .borrow()
                .as_element()
                .unwrap()
                .get_attribute("id")
                .as_deref(),
            Some("x-g1___")
        );
        assert_eq!(node.id().unwrap(), "x");
    }

    #[test]
    fn foreign_id_reads_as_absent() {
        let ctx = ctx();
        let raw = RawNode::new_element("p");
        raw.borrow_mut()
            .as_element_mut()
            .unwrap()
            .set_attribute("id", "x-other___");
        let node = tame_node(&ctx, &raw, true);
        assert_eq!(node.get_attribute("id").unwrap(), None);
        assert_eq!(node.id().unwrap(), "");
    }

    #[test]
    fn policy_injected_defenses_cannot_be_removed() {
        let ctx = ctx();
        let anchor_raw = RawNode::new_element("a");
        anchor_raw
            .borrow_mut()
            .as_element_mut()
            .unwrap()
            .set_attribute("target", "_blank");
        let anchor = tame_node(&ctx, &anchor_raw, true);
        assert!(matches!(
            anchor.remove_attribute("target"),
            Err(DomError::PolicyRejected { .. })
        ));
        assert!(anchor_raw
            .borrow()
            .as_element()
            .unwrap()
            .has_attribute("target"));

        let form_raw = RawNode::new_element("form");
        form_raw
            .borrow_mut()
            .as_element_mut()
            .unwrap()
            .set_attribute("onsubmit", "return false");
        let form = tame_node(&ctx, &form_raw, true);
        assert!(matches!(
            form.remove_attribute("onsubmit"),
            Err(DomError::PolicyRejected { .. })
        ));

        // Ordinary attributes still come off.
        let p = tame_node(&ctx, &RawNode::new_element("p"), true);
        p.set_attribute("title", "t").unwrap();
        p.remove_attribute("title").unwrap();
        assert_eq!(p.get_attribute("title").unwrap(), None);
    }

    #[test]
    fn tag_queries_cover_the_subtree_and_respect_the_allowlist() {
        let ctx = ctx();
        let root = tame_node(&ctx, &RawNode::new_element("div"), true);
        let top = RawNode::new_element("p");
        let holder = RawNode::new_element("span");
        let nested = RawNode::new_element("p");
        tree::append_child(root.raw(), &top).unwrap();
        tree::append_child(root.raw(), &holder).unwrap();
        tree::append_child(&holder, &nested).unwrap();
        tree::append_child(root.raw(), &RawNode::new_element("script")).unwrap();

        let found = root.get_elements_by_tag_name("p").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found.get(0).unwrap().node_name(), "P");
        assert!(root.get_elements_by_tag_name("script").unwrap().is_empty());
        assert!(root.get_elements_by_tag_name("blink").unwrap().is_empty());
    }

    #[test]
    fn inner_html_round_trip() {
        let ctx = ctx();
        let node = tame_node(&ctx, &RawNode::new_element("div"), true);
        node.set_inner_html("<p id=\"a\">hi<script>x()</script></p>")
            .unwrap();
        assert_eq!(node.inner_html().unwrap(), "<p id=\"a\">hi</p>");
    }

    #[test]
    fn rcdata_set_inner_html_stores_text() {
        let ctx = ctx();
        let node = tame_node(&ctx, &RawNode::new_element("textarea"), true);
        node.set_inner_html("a &lt;b&gt;").unwrap();
        assert_eq!(tree::text_content(node.raw()), "a <b>");
        assert_eq!(node.inner_html().unwrap(), "a &lt;b&gt;");
    }

    #[test]
    fn input_surface_tracks_live_state() {
        let ctx = ctx();
        let raw = RawNode::new_element("input");
        raw.borrow_mut()
            .as_element_mut()
            .unwrap()
            .set_attribute("value", "default");
        let input = tame_node(&ctx, &raw, true);
        assert_eq!(input.value().unwrap(), "default");
        input.set_value("typed").unwrap();
        assert_eq!(input.value().unwrap(), "typed");
        assert_eq!(input.input_type().unwrap(), "text");
        assert!(!input.checked().unwrap());
        input.set_checked(true).unwrap();
        assert!(input.checked().unwrap());
    }

    #[test]
    fn form_elements_are_name_addressable() {
        let ctx = ctx();
        let form_raw = RawNode::new_element("form");
        for name in ["alpha", "7", "bad__"] {
            let input = RawNode::new_element("input");
            input
                .borrow_mut()
                .as_element_mut()
                .unwrap()
                .set_attribute("name", name);
            tree::append_child(&form_raw, &input).unwrap();
        }
        let form = tame_node(&ctx, &form_raw, true);
        let elements = form.elements().unwrap();
        assert_eq!(elements.len(), 3);
        assert!(elements.named("alpha").is_some());
        assert!(elements.named("7").is_none());
        assert!(elements.named("bad__").is_none());
        assert!(elements.get(1).is_some());
    }

    #[test]
    fn kind_gates_subtype_operations() {
        let ctx = ctx();
        let p = tame_node(&ctx, &RawNode::new_element("p"), true);
        assert!(matches!(
            p.href(),
            Err(DomError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            p.value(),
            Err(DomError::UnsupportedOperation { .. })
        ));
        let text = tame_node(&ctx, &RawNode::new_text("hello"), true);
        assert_eq!(text.data().unwrap(), "hello");
        text.set_data("world").unwrap();
        assert_eq!(text.node_value(), "world");
    }
}
