//! Attribute policy engine.
//!
//! `rewrite_attribute` is the single write-direction chokepoint: both
//! direct `set_attribute` calls and the bulk markup sanitizer feed
//! every value through it, so the two paths cannot drift apart. The
//! read direction (`virtualize_attribute`) undoes the namespace
//! rewriting on the way back out.

use lazy_static::lazy_static;
use regex::Regex;

use palisade_policy::AttrClass;

use crate::context::GadgetCtx;
use crate::error::{DomError, DomResult};
use crate::style;

lazy_static! {
    /// XML Name production, ASCII subset. Fail-closed: anything the
    /// subset cannot express is rejected.
    static ref XML_NAME: Regex =
        Regex::new(r"^[A-Za-z_:][A-Za-z0-9_.:\-]*$").unwrap();

    /// Whitespace-separated XML Nmtokens, surrounding space allowed.
    static ref XML_NMTOKENS: Regex =
        Regex::new(r"^\s*[A-Za-z0-9_.:\-]+(?:\s+[A-Za-z0-9_.:\-]+)*\s*$").unwrap();

    /// The reserved trailing marker: a double underscore ending any
    /// token. Values carrying it could collide with the namespace
    /// machinery and are refused outright.
    static ref RESERVED_SUFFIX: Regex = Regex::new(r"__(?:\s|$)").unwrap();

    /// The only handler shape accepted for event attributes:
    /// `[return ]name(this[, event])[;]`.
    static ref SIMPLE_HANDLER: Regex = Regex::new(
        r"^\s*(return\s+)?([A-Za-z_$][A-Za-z0-9_$]*)\s*\(\s*this\s*(?:,\s*event\s*)?\)\s*;?\s*$"
    )
    .unwrap();
}

pub(crate) fn is_valid_name(value: &str) -> bool {
    XML_NAME.is_match(value) && !RESERVED_SUFFIX.is_match(value)
}

pub(crate) fn is_valid_nmtokens(value: &str) -> bool {
    XML_NMTOKENS.is_match(value) && !RESERVED_SUFFIX.is_match(value)
}

/// The mime hint handed to the URI rewriter for a given attribute.
pub(crate) fn mime_type_for(tag: &str, attr: &str) -> &'static str {
    if tag == "img" && attr == "src" {
        "image/*"
    } else {
        "*/*"
    }
}

/// Validates and rewrites one attribute value in the write direction.
/// Returns the value to store, or `PolicyRejected`.
pub(crate) fn rewrite_attribute(
    ctx: &GadgetCtx,
    tag: &str,
    attr: &str,
    class: Option<AttrClass>,
    value: &str,
) -> DomResult<String> {
    let Some(class) = class else {
        return Err(DomError::rejected(format!(
            "attribute {attr} not allowed on {tag}"
        )));
    };
    match class {
        AttrClass::Id | AttrClass::Idref => {
            if !is_valid_name(value) {
                return Err(DomError::rejected(format!("invalid id token {value:?}")));
            }
            Ok(ctx.suffix_id(value))
        }
        AttrClass::Idrefs => {
            if !is_valid_nmtokens(value) {
                return Err(DomError::rejected(format!(
                    "invalid id reference list {value:?}"
                )));
            }
            Ok(value
                .split_whitespace()
                .map(|token| ctx.suffix_id(token))
                .collect::<Vec<_>>()
                .join(" "))
        }
        AttrClass::Classes | AttrClass::GlobalName | AttrClass::LocalName => {
            if !is_valid_nmtokens(value) {
                return Err(DomError::rejected(format!(
                    "invalid name token list {value:?}"
                )));
            }
            Ok(value.to_string())
        }
        AttrClass::Script => rewrite_handler(ctx, attr, value),
        AttrClass::Uri => {
            let rewritten = ctx
                .uri_rewriter
                .rewrite(value, mime_type_for(tag, attr))
                .filter(|uri| !uri.is_empty());
            match rewritten {
                Some(uri) => Ok(uri),
                None => Err(DomError::rejected(format!("uri rejected {value:?}"))),
            }
        }
        AttrClass::Style => Ok(style::sanitize_style_attr_value(value)),
        AttrClass::FrameTarget => {
            Err(DomError::rejected("frame targets are never accepted"))
        }
        AttrClass::None => Ok(value.to_string()),
    }
}

/// Rewrites a handler attribute into the dispatch-indirection call.
/// The `onsubmit` result additionally cancels the native submission.
fn rewrite_handler(ctx: &GadgetCtx, attr: &str, value: &str) -> DomResult<String> {
    let Some(captures) = SIMPLE_HANDLER.captures(value) else {
        return Err(DomError::rejected(format!(
            "handler does not match the accepted shape: {value:?}"
        )));
    };
    let returns = captures.get(1).is_some();
    let name = &captures[2];
    let call = format!(
        "plugin_dispatch_event(this, event, {}, \"{name}\");",
        ctx.module_id
    );
    if attr == "onsubmit" {
        return Ok(format!("try {{ {call} }} finally {{ return false; }}"));
    }
    if returns {
        return Ok(format!("return {call}"));
    }
    Ok(call)
}

lazy_static! {
    /// The rewritten dispatch call, for routing a stored handler
    /// attribute back through the dispatcher.
    static ref DISPATCH_CALL: Regex = Regex::new(
        r#"plugin_dispatch_event\(this, event, (\d+), "([A-Za-z_$][A-Za-z0-9_$]*)"\);"#
    )
    .unwrap();
}

/// Extracts the module id and handler name a rewritten event
/// attribute dispatches to, if the value is in the rewritten form.
pub(crate) fn parse_dispatch_call(value: &str) -> Option<(u32, &str)> {
    let captures = DISPATCH_CALL.captures(value)?;
    let module_id = captures.get(1)?.as_str().parse().ok()?;
    let name = captures.get(2)?.as_str();
    Some((module_id, name))
}

/// Read-direction virtualization of a stored attribute value. `None`
/// hides the attribute from the gadget entirely.
pub(crate) fn virtualize_attribute(
    ctx: &GadgetCtx,
    class: AttrClass,
    value: &str,
) -> Option<String> {
    match class {
        AttrClass::Id | AttrClass::Idref => {
            ctx.unsuffix_id(value).map(str::to_string)
        }
        AttrClass::Idrefs => {
            let tokens: Vec<&str> = value
                .split_whitespace()
                .filter_map(|token| ctx.unsuffix_id(token))
                .collect();
            if tokens.is_empty() {
                None
            } else {
                Some(tokens.join(" "))
            }
        }
        AttrClass::FrameTarget => None,
        _ => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GadgetCtx;
    use crate::guard::Marker;
    use crate::uri::SchemeRewriter;
    use palisade_host::{Document, Scheduler};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    fn ctx() -> GadgetCtx {
        let document = Document::new();
        let container = document.create_element("div");
        GadgetCtx {
            suffix: "-g1___".to_string(),
            id_class: "g1___".to_string(),
            module_id: 7,
            marker: Marker::mint(),
            uri_rewriter: Rc::new(SchemeRewriter::web_default()),
            depth: Cell::new(0),
            handlers: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            document,
            scheduler: Rc::new(RefCell::new(Scheduler::new())),
            container,
        }
    }

    fn rewrite(ctx: &GadgetCtx, tag: &str, attr: &str, value: &str) -> DomResult<String> {
        let class = palisade_policy::AttributeTable::standard().classify(tag, attr);
        rewrite_attribute(ctx, tag, attr, class, value)
    }

    #[test]
    fn ids_are_suffixed_on_write_and_stripped_on_read() {
        let ctx = ctx();
        assert_eq!(rewrite(&ctx, "p", "id", "foo").unwrap(), "foo-g1___");
        assert_eq!(
            virtualize_attribute(&ctx, AttrClass::Id, "foo-g1___").as_deref(),
            Some("foo")
        );
        assert_eq!(virtualize_attribute(&ctx, AttrClass::Id, "foo-g2___"), None);
    }

    #[test]
    fn reserved_suffix_is_rejected() {
        let ctx = ctx();
        assert!(rewrite(&ctx, "p", "id", "foo__").is_err());
        assert!(rewrite(&ctx, "td", "headers", "a b__ c").is_err());
        assert!(rewrite(&ctx, "p", "id", "x__y").is_ok());
    }

    #[test]
    fn idrefs_suffix_each_token() {
        let ctx = ctx();
        assert_eq!(
            rewrite(&ctx, "td", "headers", "a b").unwrap(),
            "a-g1___ b-g1___"
        );
    }

    #[test]
    fn classes_validate_but_never_suffix() {
        let ctx = ctx();
        assert_eq!(rewrite(&ctx, "p", "class", "one two").unwrap(), "one two");
        assert!(rewrite(&ctx, "p", "class", "bad<token").is_err());
    }

    #[test]
    fn handlers_rewrite_to_dispatch_indirection() {
        let ctx = ctx();
        assert_eq!(
            rewrite(&ctx, "p", "onclick", "foo(this)").unwrap(),
            "plugin_dispatch_event(this, event, 7, \"foo\");"
        );
        assert_eq!(
            rewrite(&ctx, "p", "onclick", "return foo(this, event);").unwrap(),
            "return plugin_dispatch_event(this, event, 7, \"foo\");"
        );
        assert_eq!(
            rewrite(&ctx, "form", "onsubmit", "handle(this, event)").unwrap(),
            "try { plugin_dispatch_event(this, event, 7, \"handle\"); } finally { return false; }"
        );
        assert!(rewrite(&ctx, "p", "onclick", "alert(document.cookie)").is_err());
        assert_eq!(
            parse_dispatch_call("plugin_dispatch_event(this, event, 7, \"foo\");"),
            Some((7, "foo"))
        );
        assert_eq!(
            parse_dispatch_call(
                "try { plugin_dispatch_event(this, event, 7, \"handle\"); } finally { return false; }"
            ),
            Some((7, "handle"))
        );
    }

    #[test]
    fn uris_go_through_the_rewriter() {
        let ctx = ctx();
        assert_eq!(
            rewrite(&ctx, "a", "href", "http://example.com/x").unwrap(),
            "http://example.com/x"
        );
        assert!(rewrite(&ctx, "a", "href", "javascript:alert(1)").is_err());
        assert_eq!(mime_type_for("img", "src"), "image/*");
        assert_eq!(mime_type_for("a", "href"), "*/*");
    }

    #[test]
    fn frame_targets_and_unknown_attributes_are_rejected() {
        let ctx = ctx();
        assert!(rewrite(&ctx, "a", "target", "_top").is_err());
        assert!(rewrite(&ctx, "p", "onbogus", "foo(this)").is_err());
    }

    #[test]
    fn idempotent_uri_survives_a_second_pass() {
        let ctx = ctx();
        let once = rewrite(&ctx, "a", "href", "HTTP://Example.COM/a").unwrap();
        let twice = rewrite(&ctx, "a", "href", &once).unwrap();
        assert_eq!(once, twice);
    }
}
