//! The element allowlist with per-element content-model flags.
//!
//! Tags absent from the table are unknown; unknown and `FLAG_UNSAFE`
//! tags are never given a typed wrapper and are dropped by the bulk
//! sanitizer.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Element may not be created, mutated or inspected by sandboxed code.
pub const FLAG_UNSAFE: u32 = 1;
/// Element content is raw character data (script, style).
pub const FLAG_CDATA: u32 = 1 << 1;
/// Element content is replaceable character data (textarea, title).
pub const FLAG_RCDATA: u32 = 1 << 2;
/// Void element; no end tag.
pub const FLAG_EMPTY: u32 = 1 << 3;

/// Allowlist of known HTML elements, keyed by lower-cased tag name.
#[derive(Debug)]
pub struct ElementTable {
    flags: HashMap<&'static str, u32>,
}

impl ElementTable {
    /// The standard table shared by every installation.
    pub fn standard() -> &'static ElementTable {
        &STANDARD_ELEMENTS
    }

    /// Flags for a known tag, `None` for an unknown one. Lookup is by
    /// exact lower-cased name; callers lower-case first.
    pub fn lookup(&self, tag: &str) -> Option<u32> {
        self.flags.get(tag).copied()
    }

    pub fn is_known(&self, tag: &str) -> bool {
        self.flags.contains_key(tag)
    }

    /// Unknown tags are treated as unsafe.
    pub fn is_unsafe(&self, tag: &str) -> bool {
        match self.lookup(tag) {
            Some(flags) => flags & FLAG_UNSAFE != 0,
            None => true,
        }
    }
}

lazy_static! {
    static ref STANDARD_ELEMENTS: ElementTable = {
        let mut flags: HashMap<&'static str, u32> = HashMap::new();
        let safe: &[&str] = &[
            "a", "abbr", "acronym", "address", "b", "big", "blockquote",
            "button", "caption", "center", "cite", "code", "colgroup",
            "dd", "del", "dfn", "div", "dl", "dt", "em", "fieldset",
            "font", "form", "h1", "h2", "h3", "h4", "h5", "h6", "i",
            "ins", "kbd", "label", "legend", "li", "map", "ol",
            "optgroup", "option", "p", "pre", "q", "s", "samp", "select",
            "small", "span", "strike", "strong", "sub", "sup", "table",
            "tbody", "td", "tfoot", "th", "thead", "tr", "tt", "u", "ul",
            "var",
        ];
        for tag in safe {
            flags.insert(tag, 0);
        }
        let empty: &[&str] = &["area", "br", "col", "hr", "img", "input"];
        for tag in empty {
            flags.insert(tag, FLAG_EMPTY);
        }
        flags.insert("textarea", FLAG_RCDATA);
        // Known but never exposed to sandboxed code.
        let unsafe_tags: &[&str] = &[
            "applet", "body", "embed", "frame", "frameset", "head",
            "html", "iframe", "isindex", "noframes", "noscript",
            "object", "param",
        ];
        for tag in unsafe_tags {
            flags.insert(tag, FLAG_UNSAFE);
        }
        for tag in ["base", "basefont", "link", "meta"] {
            flags.insert(tag, FLAG_UNSAFE | FLAG_EMPTY);
        }
        flags.insert("script", FLAG_UNSAFE | FLAG_CDATA);
        flags.insert("style", FLAG_UNSAFE | FLAG_CDATA);
        flags.insert("title", FLAG_UNSAFE | FLAG_RCDATA);
        ElementTable { flags }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_elements_are_known() {
        let table = ElementTable::standard();
        assert!(table.is_known("div"));
        assert!(table.is_known("a"));
        assert!(!table.is_unsafe("form"));
    }

    #[test]
    fn script_is_unsafe_cdata() {
        let table = ElementTable::standard();
        let flags = table.lookup("script").unwrap();
        assert!(flags & FLAG_UNSAFE != 0);
        assert!(flags & FLAG_CDATA != 0);
    }

    #[test]
    fn unknown_tags_are_unsafe() {
        let table = ElementTable::standard();
        assert!(!table.is_known("blink"));
        assert!(table.is_unsafe("blink"));
    }

    #[test]
    fn lookup_is_case_sensitive_lowercase() {
        // Callers must lower-case; the table itself never does.
        let table = ElementTable::standard();
        assert!(table.lookup("DIV").is_none());
    }
}
