//! The (tag, attribute) semantic-class table.
//!
//! Lookup is exact `(tag, attr)` first, then the `(*, attr)` wildcard.
//! A pair absent from both is unclassified; the membrane rejects writes
//! to unclassified attributes and reads them back as empty.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Semantic class of an attribute value, deciding how the membrane
/// rewrites it on the way into the shared tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrClass {
    /// Document-unique identifier; suffixed per gadget.
    Id,
    /// Reference to one identifier; suffixed per gadget.
    Idref,
    /// Space-separated identifier references; each suffixed.
    Idrefs,
    /// Space-separated class tokens; validated, never suffixed.
    Classes,
    /// A name visible across the whole document.
    GlobalName,
    /// A name scoped to an enclosing construct (form controls).
    LocalName,
    /// An event handler body; rewritten to the dispatch template.
    Script,
    /// A URI; routed through the host rewrite callback.
    Uri,
    /// Inline style text; routed through the style sanitizer.
    Style,
    /// A frame target; always rejected, frames are ambient.
    FrameTarget,
    /// Plain text with no security-relevant interpretation.
    None,
}

/// The attribute-class table.
#[derive(Debug)]
pub struct AttributeTable {
    exact: HashMap<(&'static str, &'static str), AttrClass>,
    wildcard: HashMap<&'static str, AttrClass>,
}

impl AttributeTable {
    pub fn standard() -> &'static AttributeTable {
        &STANDARD_ATTRIBUTES
    }

    /// Classify `(tag, attr)`, both already lower-cased. Exact entries
    /// shadow wildcard ones.
    pub fn classify(&self, tag: &str, attr: &str) -> Option<AttrClass> {
        if let Some(class) = self.exact.get(&(tag, attr)) {
            return Some(*class);
        }
        self.wildcard.get(attr).copied()
    }
}

lazy_static! {
    static ref STANDARD_ATTRIBUTES: AttributeTable = {
        use AttrClass::*;
        let mut wildcard: HashMap<&'static str, AttrClass> = HashMap::new();
        for (attr, class) in [
            ("id", Id),
            ("class", Classes),
            ("style", Style),
            ("title", None),
            ("dir", None),
            ("lang", None),
            ("tabindex", None),
            ("accesskey", None),
            ("align", None),
            ("width", None),
            ("height", None),
            ("headers", Idrefs),
            ("onclick", Script),
            ("ondblclick", Script),
            ("onmousedown", Script),
            ("onmouseup", Script),
            ("onmouseover", Script),
            ("onmousemove", Script),
            ("onmouseout", Script),
            ("onkeydown", Script),
            ("onkeypress", Script),
            ("onkeyup", Script),
            ("onfocus", Script),
            ("onblur", Script),
            ("onchange", Script),
            ("onselect", Script),
        ] {
            wildcard.insert(attr, class);
        }

        let mut exact: HashMap<(&'static str, &'static str), AttrClass> =
            HashMap::new();
        for (tag, attr, class) in [
            // URIs
            ("a", "href", Uri),
            ("area", "href", Uri),
            ("img", "src", Uri),
            ("img", "longdesc", Uri),
            ("img", "usemap", Uri),
            ("input", "src", Uri),
            ("form", "action", Uri),
            ("blockquote", "cite", Uri),
            ("q", "cite", Uri),
            ("del", "cite", Uri),
            ("ins", "cite", Uri),
            // Frame targets
            ("a", "target", FrameTarget),
            ("area", "target", FrameTarget),
            ("form", "target", FrameTarget),
            // Names
            ("a", "name", GlobalName),
            ("map", "name", GlobalName),
            ("form", "name", GlobalName),
            ("input", "name", LocalName),
            ("select", "name", LocalName),
            ("textarea", "name", LocalName),
            ("button", "name", LocalName),
            // Id references
            ("label", "for", Idref),
            // Form handlers
            ("form", "onsubmit", Script),
            ("form", "onreset", Script),
            // Plain per-tag attributes
            ("a", "rel", None),
            ("a", "rev", None),
            ("area", "alt", None),
            ("area", "shape", None),
            ("area", "coords", None),
            ("img", "alt", None),
            ("img", "border", None),
            ("img", "hspace", None),
            ("img", "vspace", None),
            ("input", "type", None),
            ("input", "value", None),
            ("input", "checked", None),
            ("input", "disabled", None),
            ("input", "readonly", None),
            ("input", "maxlength", None),
            ("input", "size", None),
            ("input", "alt", None),
            ("button", "type", None),
            ("button", "value", None),
            ("button", "disabled", None),
            ("select", "size", None),
            ("select", "multiple", None),
            ("select", "disabled", None),
            ("option", "value", None),
            ("option", "selected", None),
            ("option", "disabled", None),
            ("option", "label", None),
            ("textarea", "rows", None),
            ("textarea", "cols", None),
            ("textarea", "disabled", None),
            ("textarea", "readonly", None),
            ("form", "method", None),
            ("form", "enctype", None),
            ("form", "accept-charset", None),
            ("table", "border", None),
            ("table", "cellpadding", None),
            ("table", "cellspacing", None),
            ("table", "summary", None),
            ("td", "colspan", None),
            ("td", "rowspan", None),
            ("td", "valign", None),
            ("td", "abbr", None),
            ("td", "axis", None),
            ("td", "scope", None),
            ("th", "colspan", None),
            ("th", "rowspan", None),
            ("th", "valign", None),
            ("th", "abbr", None),
            ("th", "axis", None),
            ("th", "scope", None),
            ("tr", "valign", None),
            ("col", "span", None),
            ("colgroup", "span", None),
            ("del", "datetime", None),
            ("ins", "datetime", None),
            ("ol", "start", None),
            ("ol", "type", None),
            ("ul", "type", None),
            ("li", "value", None),
            ("li", "type", None),
            ("pre", "cols", None),
        ] {
            exact.insert((tag, attr), class);
        }
        AttributeTable { exact, wildcard }
    };
}
