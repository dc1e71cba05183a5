//! Markup tokenizer, escaping and serialization.
//!
//! The tokenizer is deliberately lenient: it consumes arbitrary input
//! without panicking and reports malformed constructs as text, since
//! its main caller is a sanitizer working on untrusted gadget markup.

use crate::tree::{self, NodeData, NodeHandle, RawNode};

/// Tags that never carry content and serialize without an end tag.
pub const VOID_TAGS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "hr", "img", "input", "isindex",
    "link", "meta", "param",
];

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Raw character data, entities still encoded.
    Text(String),
    Comment(String),
    Eof,
}

pub struct Tokenizer<'s> {
    input: &'s str,
    pos: usize,
}

impl<'s> Tokenizer<'s> {
    pub fn new(input: &'s str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.bump();
        }
    }

    pub fn next_token(&mut self) -> Token {
        if self.pos >= self.input.len() {
            return Token::Eof;
        }
        if self.peek() != Some('<') {
            return Token::Text(self.consume_text());
        }
        let rest = self.rest();
        if rest.starts_with("<!--") {
            return self.consume_comment();
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            // Doctypes and processing instructions carry nothing a
            // gadget may say; drop them.
            self.skip_past('>');
            return self.next_token();
        }
        if rest.starts_with("</") {
            return self.consume_end_tag();
        }
        let after = rest[1..].chars().next();
        if after.map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
            return self.consume_start_tag();
        }
        // A lone '<' is just text.
        Token::Text(self.consume_text_with_leading_lt())
    }

    fn consume_text(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '<' {
                break;
            }
            self.bump();
        }
        self.input[start..self.pos].to_string()
    }

    fn consume_text_with_leading_lt(&mut self) -> String {
        let start = self.pos;
        self.bump();
        while let Some(c) = self.peek() {
            if c == '<' {
                break;
            }
            self.bump();
        }
        self.input[start..self.pos].to_string()
    }

    fn consume_comment(&mut self) -> Token {
        self.pos += 4;
        let body_start = self.pos;
        let body_end = match self.rest().find("-->") {
            Some(offset) => {
                let end = self.pos + offset;
                self.pos = end + 3;
                end
            }
            None => {
                let end = self.input.len();
                self.pos = end;
                end
            }
        };
        Token::Comment(self.input[body_start..body_end].to_string())
    }

    fn consume_end_tag(&mut self) -> Token {
        self.pos += 2;
        let name = self.consume_tag_name();
        self.skip_past('>');
        if name.is_empty() {
            return self.next_token();
        }
        Token::EndTag { name }
    }

    fn consume_tag_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == ':' {
                self.bump();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    fn consume_start_tag(&mut self) -> Token {
        self.pos += 1;
        let name = self.consume_tag_name();
        let mut attrs = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') => {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => {
                    if let Some(attr) = self.consume_attribute() {
                        attrs.push(attr);
                    }
                }
            }
        }
        Token::StartTag {
            name,
            attrs,
            self_closing,
        }
    }

    fn consume_attribute(&mut self) -> Option<(String, String)> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '=' || c == '>' || c == '/' {
                break;
            }
            self.bump();
        }
        let name = self.input[start..self.pos].to_ascii_lowercase();
        if name.is_empty() {
            // Stray punctuation; step over it to guarantee progress.
            self.bump();
            return None;
        }
        self.skip_whitespace();
        if self.peek() != Some('=') {
            return Some((name, String::new()));
        }
        self.bump();
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let value_start = self.pos;
                while let Some(c) = self.peek() {
                    if c == quote {
                        break;
                    }
                    self.bump();
                }
                let raw = &self.input[value_start..self.pos];
                self.bump();
                raw.to_string()
            }
            _ => {
                let value_start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.bump();
                }
                self.input[value_start..self.pos].to_string()
            }
        };
        Some((name, unescape_entities(&value)))
    }

    /// Skips raw character data up to and including `</tag ... >`,
    /// for element bodies that suspend normal tokenization.
    pub fn skip_raw_content(&mut self, tag: &str) {
        let needle = format!("</{tag}");
        let lower = self.rest().to_ascii_lowercase();
        match lower.find(&needle) {
            Some(offset) => {
                self.pos += offset;
                self.skip_past('>');
            }
            None => self.pos = self.input.len(),
        }
    }

    fn skip_past(&mut self, delim: char) {
        while let Some(c) = self.bump() {
            if c == delim {
                break;
            }
        }
    }
}

/// Decodes the named and numeric character references the serializer
/// emits; unknown references pass through untouched.
pub fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        // Entity names are short; scan a bounded number of characters
        // so the window never lands inside a multibyte sequence.
        let semi = rest
            .char_indices()
            .take(12)
            .find_map(|(index, c)| (c == ';').then_some(index));
        let Some(semi) = semi else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix('#')
                .and_then(|digits| digits.parse::<u32>().ok())
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serializes the children of `node` back to markup.
pub fn serialize_inner(node: &NodeHandle) -> String {
    tree::children(node)
        .iter()
        .map(serialize_node)
        .collect::<Vec<_>>()
        .join("")
}

/// Serializes `node` and its subtree.
pub fn serialize_node(node: &NodeHandle) -> String {
    let n = node.borrow();
    match &n.data {
        NodeData::Document => {
            drop(n);
            serialize_inner(node)
        }
        NodeData::Text(t) => escape_text(t),
        NodeData::Comment(c) => format!("<!--{c}-->"),
        NodeData::Element(elem) => {
            let tag = elem.tag.clone();
            let mut out = String::new();
            out.push('<');
            out.push_str(&tag);
            for (name, value) in elem.attributes() {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                out.push_str(&escape_attr(&value));
                out.push('"');
            }
            out.push('>');
            if is_void_tag(&tag) {
                return out;
            }
            drop(n);
            out.push_str(&serialize_inner(node));
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
            out
        }
    }
}

/// Materializes pre-validated markup as detached host nodes. End tags
/// close the nearest matching open element; unmatched end tags are
/// dropped.
pub fn build_fragment(markup: &str) -> Vec<NodeHandle> {
    let mut tokenizer = Tokenizer::new(markup);
    let fragment = RawNode::new_element("#fragment");
    let mut stack: Vec<NodeHandle> = vec![fragment.clone()];
    loop {
        match tokenizer.next_token() {
            Token::Eof => break,
            Token::Text(text) => {
                let node = RawNode::new_text(&unescape_entities(&text));
                let top = stack.last().cloned();
                if let Some(top) = top {
                    let _ = tree::append_child(&top, &node);
                }
            }
            Token::Comment(body) => {
                let node = RawNode::new_comment(&body);
                let top = stack.last().cloned();
                if let Some(top) = top {
                    let _ = tree::append_child(&top, &node);
                }
            }
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => {
                let node = RawNode::new_element(&name);
                {
                    let mut n = node.borrow_mut();
                    if let Some(elem) = n.as_element_mut() {
                        for (attr_name, attr_value) in &attrs {
                            elem.set_attribute(attr_name, attr_value);
                        }
                    }
                }
                let top = stack.last().cloned();
                if let Some(top) = top {
                    let _ = tree::append_child(&top, &node);
                }
                if !self_closing && !is_void_tag(&name) {
                    stack.push(node);
                }
            }
            Token::EndTag { name } => {
                let open = stack
                    .iter()
                    .rposition(|n| n.borrow().tag() == Some(name.as_str()));
                if let Some(index) = open {
                    if index > 0 {
                        stack.truncate(index);
                    }
                }
            }
        }
    }
    tree::children(&fragment)
}
