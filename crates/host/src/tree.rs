//! The shared document tree.
//!
//! Nodes are reference-counted cells with weak parent links; the whole
//! tree lives on the host's single thread. Element attributes are kept
//! as an ordered list, with inline style held separately so the style
//! attribute and the live style object can never diverge. Form control
//! state (current value, checked) lives outside the attribute list so
//! a clone can preserve it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::HostError;
use crate::event::ListenerEntry;
use crate::markup;

pub type NodeHandle = Rc<RefCell<RawNode>>;

/// One node of the host tree.
pub struct RawNode {
    pub data: NodeData,
    pub(crate) parent: Weak<RefCell<RawNode>>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) listeners: Vec<ListenerEntry>,
}

impl fmt::Debug for RawNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawNode")
            .field("data", &self.data)
            .field("children", &self.children.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[derive(Debug)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// Element payload: tag, attributes, inline style, control state and
/// layout geometry, mirroring what the membrane is allowed to observe.
#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    attrs: Vec<(String, String)>,
    style: Vec<(String, String)>,
    /// Live control value; `None` means "whatever the value attribute
    /// says", which is what a form reset restores.
    pub value: Option<String>,
    pub checked: bool,
    /// offset left/top/width/height as the host layout reports them.
    pub offsets: (i32, i32, i32, i32),
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            style: Vec::new(),
            value: None,
            checked: false,
            offsets: (0, 0, 0, 0),
        }
    }

    /// Attribute read; the style attribute is rendered from the style
    /// store so the two views cannot disagree.
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        if name == "style" {
            if self.style.is_empty() {
                return None;
            }
            return Some(self.rendered_style());
        }
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Attribute write with the host quirks the shim contract names:
    /// `style` replaces the style store, `value`/`checked` also reset
    /// the live control state so markup-set defaults behave natively.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match name {
            "style" => {
                self.style = parse_style_text(value);
                return;
            }
            "value" => self.value = None,
            "checked" => self.checked = true,
            _ => {}
        }
        if let Some(slot) = self.attrs.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value.to_string();
            return;
        }
        self.attrs.push((name.to_string(), value.to_string()));
    }

    pub fn remove_attribute(&mut self, name: &str) {
        if name == "style" {
            self.style.clear();
            return;
        }
        self.attrs.retain(|(n, _)| n != name);
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        if name == "style" {
            return !self.style.is_empty();
        }
        self.attrs.iter().any(|(n, _)| n == name)
    }

    /// Attribute list in document order, style rendered last.
    pub fn attributes(&self) -> Vec<(String, String)> {
        let mut out = self.attrs.clone();
        if !self.style.is_empty() {
            out.push(("style".to_string(), self.rendered_style()));
        }
        out
    }

    /// Live style value for a dashed CSS property name.
    pub fn style_value(&self, css_name: &str) -> Option<&str> {
        self.style
            .iter()
            .find(|(n, _)| n == css_name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets one style property; an empty value clears it.
    pub fn set_style_value(&mut self, css_name: &str, value: &str) {
        if value.is_empty() {
            self.style.retain(|(n, _)| n != css_name);
            return;
        }
        if let Some(slot) = self.style.iter_mut().find(|(n, _)| n == css_name) {
            slot.1 = value.to_string();
            return;
        }
        self.style.push((css_name.to_string(), value.to_string()));
    }

    pub fn rendered_style(&self) -> String {
        self.style
            .iter()
            .map(|(n, v)| format!("{n}: {v}"))
            .collect::<Vec<_>>()
            .join(" ; ")
    }

    /// The effective control value: live state, else the value
    /// attribute, else empty.
    pub fn effective_value(&self) -> String {
        if let Some(v) = &self.value {
            return v.clone();
        }
        self.get_attribute("value").unwrap_or_default()
    }
}

fn parse_style_text(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for decl in text.split(';') {
        let Some((name, value)) = decl.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        if !name.is_empty() && !value.is_empty() {
            out.push((name, value));
        }
    }
    out
}

impl RawNode {
    fn wrap(data: NodeData) -> NodeHandle {
        Rc::new(RefCell::new(RawNode {
            data,
            parent: Weak::new(),
            children: Vec::new(),
            listeners: Vec::new(),
        }))
    }

    pub fn new_element(tag: &str) -> NodeHandle {
        Self::wrap(NodeData::Element(ElementData::new(tag)))
    }

    pub fn new_text(text: &str) -> NodeHandle {
        Self::wrap(NodeData::Text(text.to_string()))
    }

    pub fn new_comment(text: &str) -> NodeHandle {
        Self::wrap(NodeData::Comment(text.to_string()))
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Lower-cased tag, or `None` for non-elements.
    pub fn tag(&self) -> Option<&str> {
        self.as_element().map(|e| e.tag.as_str())
    }
}

// Structural operations. These take handles rather than &mut self so
// borrows stay local to each step; a dispatched handler may re-enter
// the tree while its own wrapper still exists.

pub fn parent(node: &NodeHandle) -> Option<NodeHandle> {
    node.borrow().parent.upgrade()
}

pub fn children(node: &NodeHandle) -> Vec<NodeHandle> {
    node.borrow().children.clone()
}

pub fn first_child(node: &NodeHandle) -> Option<NodeHandle> {
    node.borrow().children.first().cloned()
}

pub fn last_child(node: &NodeHandle) -> Option<NodeHandle> {
    node.borrow().children.last().cloned()
}

fn sibling(node: &NodeHandle, offset: isize) -> Option<NodeHandle> {
    let parent = parent(node)?;
    let parent = parent.borrow();
    let index = parent
        .children
        .iter()
        .position(|c| Rc::ptr_eq(c, node))?;
    let target = index as isize + offset;
    if target < 0 {
        return None;
    }
    parent.children.get(target as usize).cloned()
}

pub fn next_sibling(node: &NodeHandle) -> Option<NodeHandle> {
    sibling(node, 1)
}

pub fn prev_sibling(node: &NodeHandle) -> Option<NodeHandle> {
    sibling(node, -1)
}

/// Detaches `node` from its parent, if any.
pub fn detach(node: &NodeHandle) {
    if let Some(parent) = parent(node) {
        parent
            .borrow_mut()
            .children
            .retain(|c| !Rc::ptr_eq(c, node));
    }
    node.borrow_mut().parent = Weak::new();
}

fn is_ancestor_of(candidate: &NodeHandle, node: &NodeHandle) -> bool {
    let mut cur = parent(node);
    while let Some(n) = cur {
        if Rc::ptr_eq(&n, candidate) {
            return true;
        }
        cur = parent(&n);
    }
    false
}

/// Appends `child` to `parent`, detaching it from any previous parent.
pub fn append_child(
    parent_node: &NodeHandle,
    child: &NodeHandle,
) -> Result<(), HostError> {
    if Rc::ptr_eq(parent_node, child) || is_ancestor_of(child, parent_node) {
        return Err(HostError::NotAChild);
    }
    detach(child);
    child.borrow_mut().parent = Rc::downgrade(parent_node);
    parent_node.borrow_mut().children.push(child.clone());
    Ok(())
}

/// Inserts `child` before `reference`; `None` appends.
pub fn insert_before(
    parent_node: &NodeHandle,
    child: &NodeHandle,
    reference: Option<&NodeHandle>,
) -> Result<(), HostError> {
    let Some(reference) = reference else {
        return append_child(parent_node, child);
    };
    if Rc::ptr_eq(parent_node, child) || is_ancestor_of(child, parent_node) {
        return Err(HostError::NotAChild);
    }
    detach(child);
    let mut parent = parent_node.borrow_mut();
    let index = parent
        .children
        .iter()
        .position(|c| Rc::ptr_eq(c, reference))
        .ok_or(HostError::ReferenceNotFound)?;
    parent.children.insert(index, child.clone());
    drop(parent);
    child.borrow_mut().parent = Rc::downgrade(parent_node);
    Ok(())
}

pub fn remove_child(
    parent_node: &NodeHandle,
    child: &NodeHandle,
) -> Result<(), HostError> {
    let attached = parent(child)
        .map(|p| Rc::ptr_eq(&p, parent_node))
        .unwrap_or(false);
    if !attached {
        return Err(HostError::NotAChild);
    }
    detach(child);
    Ok(())
}

/// Replaces `old_child` with `new_child` in `parent`'s child list.
pub fn replace_child(
    parent_node: &NodeHandle,
    new_child: &NodeHandle,
    old_child: &NodeHandle,
) -> Result<(), HostError> {
    insert_before(parent_node, new_child, Some(old_child))?;
    detach(old_child);
    Ok(())
}

/// Depth-first scan for the first element carrying `id` exactly.
pub fn element_by_id(root: &NodeHandle, id: &str) -> Option<NodeHandle> {
    let node = root.borrow();
    if let Some(elem) = node.as_element() {
        if elem.get_attribute("id").as_deref() == Some(id) {
            drop(node);
            return Some(root.clone());
        }
    }
    let kids = node.children.clone();
    drop(node);
    kids.iter().find_map(|child| element_by_id(child, id))
}

/// All descendant elements with the given lower-cased tag, in document
/// order; the root itself is not included.
pub fn elements_by_tag_name(root: &NodeHandle, tag: &str) -> Vec<NodeHandle> {
    let mut out = Vec::new();
    collect_by_tag(root, tag, &mut out);
    out
}

fn collect_by_tag(node: &NodeHandle, tag: &str, out: &mut Vec<NodeHandle>) {
    let kids = children(node);
    for child in kids {
        if child.borrow().tag() == Some(tag) {
            out.push(child.clone());
        }
        collect_by_tag(&child, tag, out);
    }
}

/// Concatenated text content of the subtree.
pub fn text_content(node: &NodeHandle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &NodeHandle, out: &mut String) {
    let n = node.borrow();
    if let NodeData::Text(t) = &n.data {
        out.push_str(t);
    }
    let kids = n.children.clone();
    drop(n);
    for child in &kids {
        collect_text(child, out);
    }
}

/// Deep clone preserving attributes, inline style and form control
/// state. Listeners are not cloned.
pub fn clone_subtree(node: &NodeHandle) -> NodeHandle {
    let n = node.borrow();
    let data = match &n.data {
        NodeData::Document => NodeData::Document,
        NodeData::Element(e) => NodeData::Element(e.clone()),
        NodeData::Text(t) => NodeData::Text(t.clone()),
        NodeData::Comment(c) => NodeData::Comment(c.clone()),
    };
    let kids = n.children.clone();
    drop(n);
    let copy = RawNode::wrap(data);
    for child in &kids {
        let child_copy = clone_subtree(child);
        // Fresh nodes cannot form cycles.
        let _ = append_child(&copy, &child_copy);
    }
    copy
}

/// Restores every control under `form` to its markup-declared default.
pub fn reset_form(form: &NodeHandle) {
    for control in elements_by_tag_name(form, "input")
        .into_iter()
        .chain(elements_by_tag_name(form, "textarea"))
        .chain(elements_by_tag_name(form, "select"))
    {
        let mut node = control.borrow_mut();
        if let Some(elem) = node.as_element_mut() {
            elem.value = None;
            elem.checked = elem.has_attribute("checked");
        }
    }
}

/// The host page: one document root with a head (the css container)
/// and a body where gadget output lands.
#[derive(Debug)]
pub struct Document {
    root: NodeHandle,
    head: NodeHandle,
    body: NodeHandle,
    pub scroll: Cell<(f64, f64)>,
    focused: RefCell<Option<NodeHandle>>,
}

impl Document {
    pub fn new() -> Rc<Document> {
        let root = RawNode::wrap(NodeData::Document);
        let html = RawNode::new_element("html");
        let head = RawNode::new_element("head");
        let body = RawNode::new_element("body");
        let _ = append_child(&root, &html);
        let _ = append_child(&html, &head);
        let _ = append_child(&html, &body);
        Rc::new(Document {
            root,
            head,
            body,
            scroll: Cell::new((0.0, 0.0)),
            focused: RefCell::new(None),
        })
    }

    pub fn root(&self) -> NodeHandle {
        self.root.clone()
    }

    /// Where gadget stylesheets are appended.
    pub fn css_container(&self) -> NodeHandle {
        self.head.clone()
    }

    pub fn body(&self) -> NodeHandle {
        self.body.clone()
    }

    pub fn create_element(&self, tag: &str) -> NodeHandle {
        RawNode::new_element(tag)
    }

    pub fn create_text_node(&self, text: &str) -> NodeHandle {
        RawNode::new_text(text)
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeHandle> {
        element_by_id(&self.root, id)
    }

    /// Builds a detached `<style>` element holding `css_text`.
    pub fn create_stylesheet(&self, css_text: &str) -> NodeHandle {
        let style = RawNode::new_element("style");
        let text = RawNode::new_text(css_text);
        let _ = append_child(&style, &text);
        style
    }

    /// Replaces `node`'s children with nodes built from pre-validated
    /// markup.
    pub fn set_inner_markup(&self, node: &NodeHandle, markup_text: &str) {
        let old = children(node);
        for child in &old {
            detach(child);
        }
        for built in markup::build_fragment(markup_text) {
            let _ = append_child(node, &built);
        }
    }

    pub fn scroll_to(&self, x: f64, y: f64) {
        self.scroll.set((x, y));
    }

    pub fn focus(&self, node: &NodeHandle) {
        *self.focused.borrow_mut() = Some(node.clone());
    }

    pub fn blur(&self, node: &NodeHandle) {
        let mut focused = self.focused.borrow_mut();
        let is_focused = focused
            .as_ref()
            .map(|f| Rc::ptr_eq(f, node))
            .unwrap_or(false);
        if is_focused {
            *focused = None;
        }
    }

    pub fn focused(&self) -> Option<NodeHandle> {
        self.focused.borrow().clone()
    }
}
