//! The markup sanitization pipeline.
//!
//! `sanitize_html` is the write direction: untrusted gadget markup in,
//! policy-clean markup out, never failing the whole pass. Attribute
//! rejections drop the attribute; unknown and unsafe elements drop
//! their tags. `tame_inner_html` is the read direction: host-side
//! markup back out through the namespace so a gadget never observes
//! foreign ids or its own suffix.

use palisade_policy::{AttributeTable, ElementTable, FLAG_CDATA};
use palisade_host::markup::{
    escape_attr, escape_text, is_void_tag, unescape_entities, Token, Tokenizer,
};
use palisade_host::NodeHandle;
use tracing::debug;

use crate::attr;
use crate::context::GadgetCtx;

/// Sanitizes untrusted markup in the write direction. Total: any
/// input produces some output, with everything rejected simply gone.
pub(crate) fn sanitize_html(ctx: &GadgetCtx, markup: &str) -> String {
    let elements = ElementTable::standard();
    let attributes = AttributeTable::standard();
    let mut tokenizer = Tokenizer::new(markup);
    let mut out = String::with_capacity(markup.len());
    loop {
        match tokenizer.next_token() {
            Token::Eof => break,
            // Decode then re-escape, so a loose '<' or '&' in text
            // comes out as a well-formed character reference.
            Token::Text(text) => out.push_str(&escape_text(&unescape_entities(&text))),
            Token::Comment(_) => {}
            Token::EndTag { name } => {
                if elements.is_known(&name) && !elements.is_unsafe(&name)
                    && !is_void_tag(&name)
                {
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
            }
            Token::StartTag { name, attrs, .. } => {
                if !elements.is_known(&name) || elements.is_unsafe(&name) {
                    debug!(tag = %name, "dropping disallowed element");
                    if elements.lookup(&name).unwrap_or(0) & FLAG_CDATA != 0 {
                        // Raw content of a dropped cdata element is
                        // never text to keep.
                        tokenizer.skip_raw_content(&name);
                    }
                    continue;
                }
                let mut kept: Vec<(String, String)> = Vec::new();
                for (attr_name, attr_value) in &attrs {
                    let class = attributes.classify(&name, attr_name);
                    match attr::rewrite_attribute(ctx, &name, attr_name, class, attr_value)
                    {
                        Ok(rewritten) => kept.push((attr_name.clone(), rewritten)),
                        Err(err) => {
                            debug!(tag = %name, attr = %attr_name, %err,
                                "dropping attribute during sanitization");
                        }
                    }
                }
                apply_element_policy(&name, &mut kept);
                out.push('<');
                out.push_str(&name);
                for (attr_name, attr_value) in &kept {
                    out.push(' ');
                    out.push_str(attr_name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(attr_value));
                    out.push('"');
                }
                out.push('>');
            }
        }
    }
    out
}

/// Post-rewrite attribute injections for specific elements: forms
/// must not trigger native submission, and links must not retarget
/// the embedding frame.
pub(crate) fn apply_element_policy(tag: &str, attrs: &mut Vec<(String, String)>) {
    match tag {
        "form" => {
            if !attrs.iter().any(|(name, _)| name == "onsubmit") {
                attrs.push(("onsubmit".to_string(), "return false".to_string()));
            }
        }
        "a" | "area" => {
            attrs.retain(|(name, _)| name != "target");
            attrs.push(("target".to_string(), "_blank".to_string()));
        }
        _ => {}
    }
}

/// Same policy applied to a freshly created host element.
pub(crate) fn apply_element_policy_to_node(node: &NodeHandle) {
    let mut n = node.borrow_mut();
    let Some(elem) = n.as_element_mut() else {
        return;
    };
    let tag = elem.tag.clone();
    match tag.as_str() {
        "form" => {
            if !elem.has_attribute("onsubmit") {
                elem.set_attribute("onsubmit", "return false");
            }
        }
        "a" | "area" => elem.set_attribute("target", "_blank"),
        _ => {}
    }
}

/// Virtualizes host-side markup for read-back through `inner_html`.
/// Foreign namespace traces are hidden; this gadget's suffix is
/// stripped; frame targets and unclassified attributes disappear.
pub(crate) fn tame_inner_html(ctx: &GadgetCtx, markup: &str) -> String {
    let elements = ElementTable::standard();
    let attributes = AttributeTable::standard();
    let mut tokenizer = Tokenizer::new(markup);
    let mut out = String::with_capacity(markup.len());
    loop {
        match tokenizer.next_token() {
            Token::Eof => break,
            Token::Text(text) => out.push_str(&escape_text(&unescape_entities(&text))),
            Token::Comment(_) => {}
            Token::EndTag { name } => {
                if elements.is_known(&name) && !elements.is_unsafe(&name)
                    && !is_void_tag(&name)
                {
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
            }
            Token::StartTag { name, attrs, .. } => {
                if !elements.is_known(&name) || elements.is_unsafe(&name) {
                    if elements.lookup(&name).unwrap_or(0) & FLAG_CDATA != 0 {
                        tokenizer.skip_raw_content(&name);
                    }
                    continue;
                }
                out.push('<');
                out.push_str(&name);
                for (attr_name, attr_value) in &attrs {
                    let Some(class) = attributes.classify(&name, attr_name) else {
                        continue;
                    };
                    let Some(shown) = attr::virtualize_attribute(ctx, class, attr_value)
                    else {
                        continue;
                    };
                    out.push(' ');
                    out.push_str(attr_name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&shown));
                    out.push('"');
                }
                out.push('>');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GadgetCtx;
    use crate::guard::Marker;
    use crate::uri::SchemeRewriter;
    use palisade_host::{Document, Scheduler};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    fn ctx() -> GadgetCtx {
        let document = Document::new();
        let container = document.create_element("div");
        GadgetCtx {
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
        }
    }

    #[test]
    fn drops_script_elements_and_their_content() {
        let ctx = ctx();
        let got = sanitize_html(&ctx, "a<script>alert(1)</script>b");
        assert_eq!(got, "ab");
    }

    #[test]
    fn unknown_tags_drop_but_keep_content() {
        let ctx = ctx();
        let got = sanitize_html(&ctx, "<blink>hi</blink>");
        assert_eq!(got, "hi");
    }

    #[test]
    fn rejected_attributes_vanish_without_aborting() {
        let ctx = ctx();
        let got = sanitize_html(
            &ctx,
            "<p onclick=\"alert(1)\" title=\"ok\">x</p>",
        );
        assert_eq!(got, "<p title=\"ok\">x</p>");
    }

    #[test]
    fn ids_are_suffixed_in_bulk() {
        let ctx = ctx();
        let got = sanitize_html(&ctx, "<p id=\"foo\">x</p>");
        assert_eq!(got, "<p id=\"foo-g1___\">x</p>");
    }

    #[test]
    fn forms_gain_the_defensive_onsubmit() {
        let ctx = ctx();
        let got = sanitize_html(&ctx, "<form></form>");
        assert_eq!(got, "<form onsubmit=\"return false\"></form>");
    }

    #[test]
    fn form_with_a_handler_keeps_the_rewritten_one() {
        let ctx = ctx();
        let got = sanitize_html(&ctx, "<form onsubmit=\"handle(this, event)\"></form>");
        assert_eq!(
            got,
            "<form onsubmit=\"try { plugin_dispatch_event(this, event, 0, &quot;handle&quot;); } finally { return false; }\"></form>"
        );
    }

    #[test]
    fn links_are_forced_to_blank_targets() {
        let ctx = ctx();
        let got = sanitize_html(
            &ctx,
            "<a href=\"http://example.com/\" target=\"_top\">x</a>",
        );
        assert_eq!(
            got,
            "<a href=\"http://example.com/\" target=\"_blank\">x</a>"
        );
    }

    #[test]
    fn loose_text_is_entity_escaped() {
        let ctx = ctx();
        let got = sanitize_html(&ctx, "<p>1 < 2 &amp; 3</p>");
        assert_eq!(got, "<p>1 &lt; 2 &amp; 3</p>");
        assert_eq!(sanitize_html(&ctx, &got), got);
    }

    #[test]
    fn multibyte_text_after_an_ampersand_sanitizes_cleanly() {
        let ctx = ctx();
        let got = sanitize_html(&ctx, "<p title=\"&日本語のテキスト\">&テキスト</p>");
        assert_eq!(
            got,
            "<p title=\"&amp;日本語のテキスト\">&amp;テキスト</p>"
        );
    }

    #[test]
    fn sanitize_is_idempotent_on_its_output() {
        let ctx = ctx();
        let input = "<p id=\"a\" class=\"c\"><a href=\"http://example.com/\">x</a></p>";
        let once = sanitize_html(&ctx, input);
        // Ids are namespace-rewritten once; re-sanitizing the output
        // must not stack suffixes, so feed the virtualized read-back
        // through instead, as the engine does.
        let read_back = tame_inner_html(&ctx, &once);
        let twice = sanitize_html(&ctx, &read_back);
        assert_eq!(once, twice);
    }

    #[test]
    fn read_back_hides_foreign_ids_and_strips_own_suffix() {
        let ctx = ctx();
        let got = tame_inner_html(
            &ctx,
            "<p id=\"mine-g1___\">a</p><p id=\"theirs-g2___\">b</p>",
        );
        assert_eq!(got, "<p id=\"mine\">a</p><p>b</p>");
    }

    #[test]
    fn read_back_strips_targets_and_unknown_attributes() {
        let ctx = ctx();
        let got = tame_inner_html(
            &ctx,
            "<a href=\"http://example.com/\" target=\"_blank\" data-x=\"1\">x</a>",
        );
        assert_eq!(got, "<a href=\"http://example.com/\">x</a>");
    }
}
