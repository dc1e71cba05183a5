//! Style sanitization and the sealed-style capability.
//!
//! Inline style flows through two doors. Untrusted text goes through
//! the per-declaration grammar check in `sanitize_style_attr_value`
//! and the per-property check in `TameStyle::set`. Trusted compiler
//! output skips the grammar and rides a `SealedStyle` that only the
//! installation's `StyleSealer` can mint.

use lazy_static::lazy_static;
use regex::Regex;

use palisade_host::tree as host_tree;
use palisade_host::{Document, NodeHandle};
use palisade_policy::{internal_key, CssPropertyTable};
use tracing::debug;

use crate::attr;
use crate::error::{DomError, DomResult};
use crate::guard::Stamp;
use crate::uri::UriRewriter;

lazy_static! {
    /// URIs never ride in style text; any `url(` construct is refused
    /// regardless of what the property grammar would say.
    static ref URL_CONSTRUCT: Regex = Regex::new(r"(?i)url\s*\(").unwrap();
}

/// Validated per-property view of one element's inline style.
pub struct TameStyle {
    node: NodeHandle,
    editable: bool,
}

impl TameStyle {
    pub(crate) fn new(node: NodeHandle, editable: bool) -> TameStyle {
        TameStyle { node, editable }
    }

    /// Current value of a dashed property name, or "" when unset.
    pub fn get(&self, css_name: &str) -> String {
        let name = css_name.trim().to_ascii_lowercase();
        let node = self.node.borrow();
        node.as_element()
            .and_then(|elem| elem.style_value(&name))
            .unwrap_or("")
            .to_string()
    }

    /// Sets one property after grammar validation; an empty value
    /// clears it.
    pub fn set(&self, css_name: &str, value: &str) -> DomResult<()> {
        if !self.editable {
            return Err(DomError::NotEditable);
        }
        let name = css_name.trim().to_ascii_lowercase();
        let Some(property) = CssPropertyTable::standard().get(&internal_key(&name))
        else {
            return Err(DomError::rejected(format!("unknown css property {name:?}")));
        };
        let value = value.trim();
        if value.is_empty() {
            if let Some(elem) = self.node.borrow_mut().as_element_mut() {
                elem.set_style_value(&name, "");
            }
            return Ok(());
        }
        if URL_CONSTRUCT.is_match(value) {
            return Err(DomError::rejected("url() is not allowed in style values"));
        }
        if !property.allows(value) {
            return Err(DomError::rejected(format!(
                "value {value:?} does not match the grammar for {name}"
            )));
        }
        if let Some(elem) = self.node.borrow_mut().as_element_mut() {
            elem.set_style_value(&name, value);
        }
        Ok(())
    }
}

/// Filters a style attribute value down to the declarations whose
/// property is known and whose value matches its grammar. Output is a
/// fixed point: sanitizing it again changes nothing.
pub fn sanitize_style_attr_value(text: &str) -> String {
    let table = CssPropertyTable::standard();
    let mut kept = Vec::new();
    for declaration in text.split(';') {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        let Some(property) = table.get(&internal_key(&name)) else {
            debug!(property = %name, "dropping unknown style property");
            continue;
        };
        if URL_CONSTRUCT.is_match(value) || !property.allows(value) {
            debug!(property = %name, "dropping style declaration failing its grammar");
            continue;
        }
        kept.push(format!("{name}: {value}"));
    }
    kept.join(" ; ")
}

/// A batch of style declarations vouched for by trusted compiler
/// output. Opaque to gadget code.
pub struct SealedStyle {
    pairs: Vec<(String, String)>,
    stamp: Stamp,
}

impl SealedStyle {
    pub(crate) fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub(crate) fn stamp(&self) -> &Stamp {
        &self.stamp
    }
}

/// Capability to mint `SealedStyle` batches; handed out once per
/// installation.
pub struct StyleSealer {
    stamp: Stamp,
}

impl StyleSealer {
    pub(crate) fn new(stamp: Stamp) -> StyleSealer {
        StyleSealer { stamp }
    }

    /// Seals dashed-name declarations without re-running the grammar;
    /// possession of the sealer is the proof of validation.
    pub fn seal(&self, declarations: &[(&str, &str)]) -> SealedStyle {
        SealedStyle {
            pairs: declarations
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            stamp: self.stamp,
        }
    }
}

// Formatting helpers for trusted compiler output.

/// CSS-friendly number formatting; whole values drop the fraction.
pub fn css_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// `#rrggbb` from a packed 24-bit color.
pub fn css_color(rgb: u32) -> String {
    format!("#{:06x}", rgb & 0x00ff_ffff)
}

/// Rewrites a URI for use inside generated CSS; rejected URIs fail
/// rather than degrade.
pub fn css_uri(uri: &str, rewriter: &dyn UriRewriter) -> DomResult<String> {
    match rewriter.rewrite(uri, "image/*") {
        Some(rewritten) if !rewritten.is_empty() => Ok(format!("url(\"{rewritten}\")")),
        _ => Err(DomError::rejected(format!("css uri rejected {uri:?}"))),
    }
}

/// Validates a name-token list for interpolation into generated CSS.
pub fn ident(text: &str) -> DomResult<String> {
    if attr::is_valid_nmtokens(text) {
        Ok(text.trim().to_string())
    } else {
        Err(DomError::rejected(format!("invalid css identifier {text:?}")))
    }
}

/// Appends the namespace suffix to each token of an identifier list,
/// scoping generated selectors to one gadget.
pub fn suffixed(idents: &str, suffix: &str) -> DomResult<String> {
    let validated = ident(idents)?;
    Ok(validated
        .split_whitespace()
        .map(|token| format!("{token}{suffix}"))
        .collect::<Vec<_>>()
        .join(" "))
}

/// Installs generated CSS into the host's stylesheet container.
pub fn emit_css(document: &Document, css_text: &str) {
    let sheet = document.create_stylesheet(css_text);
    let _ = host_tree::append_child(&document.css_container(), &sheet);
}
