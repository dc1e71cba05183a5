//! Per-property CSS value grammars.
//!
//! Every recognized property maps an internal key (`font_size`) to its
//! dashed CSS name (`font-size`) and a value grammar. Grammars are
//! matched against the candidate value with a single trailing space
//! appended, so multi-token grammars can anchor each token on a
//! delimiter instead of special-casing the last one.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

/// One recognized CSS property.
#[derive(Debug)]
pub struct CssProperty {
    /// Dashed name as written in stylesheets and style attributes.
    pub css_name: &'static str,
    pattern: Regex,
}

impl CssProperty {
    /// Whether `value` matches this property's grammar. The empty
    /// string never matches; clearing a property is a separate
    /// operation.
    pub fn allows(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let mut probe = String::with_capacity(value.len() + 1);
        probe.push_str(value);
        probe.push(' ');
        self.pattern.is_match(&probe)
    }
}

/// Maps a dashed CSS property name to the engine's internal key:
/// hyphens become underscores, and `float` becomes `css_float` to keep
/// identifiers usable.
pub fn internal_key(css_name: &str) -> String {
    if css_name == "float" {
        return "css_float".to_string();
    }
    css_name.replace('-', "_")
}

/// The CSS property grammar table, keyed by internal property key.
#[derive(Debug)]
pub struct CssPropertyTable {
    props: HashMap<&'static str, CssProperty>,
}

impl CssPropertyTable {
    pub fn standard() -> &'static CssPropertyTable {
        &STANDARD_CSS
    }

    pub fn get(&self, internal: &str) -> Option<&CssProperty> {
        self.props.get(internal)
    }

    pub fn is_known(&self, internal: &str) -> bool {
        self.props.contains_key(internal)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &CssProperty)> {
        self.props.iter().map(|(k, v)| (*k, v))
    }
}

// Grammar fragments. Each token grammar is written without anchors and
// assembled below with a mandatory trailing space per token.
const LENGTH: &str = r"-?\d+(?:\.\d+)?(?:px|em|ex|pt|pc|in|cm|mm|%)?";
const COLOR: &str = r"(?:#[0-9a-fA-F]{3}|#[0-9a-fA-F]{6}|aqua|black|blue|fuchsia|gray|green|lime|maroon|navy|olive|orange|purple|red|silver|teal|white|yellow|transparent|rgb\(\s*\d{1,3}%?\s*,\s*\d{1,3}%?\s*,\s*\d{1,3}%?\s*\))";
const BORDER_STYLE: &str =
    r"(?:none|hidden|dotted|dashed|solid|double|groove|ridge|inset|outset)";
const BORDER_WIDTH: &str = r"(?:thin|medium|thick)";

fn single(token: &str) -> Regex {
    Regex::new(&format!("^(?:{token})\\s+$")).unwrap()
}

fn repeated(token: &str, min: usize, max: usize) -> Regex {
    Regex::new(&format!("^(?:(?:{token})\\s+){{{min},{max}}}$")).unwrap()
}

lazy_static! {
    static ref STANDARD_CSS: CssPropertyTable = {
        let mut props: HashMap<&'static str, CssProperty> = HashMap::new();
        let len_auto = format!("{LENGTH}|auto");
        let border_part =
            format!("{LENGTH}|{BORDER_WIDTH}|{BORDER_STYLE}|{COLOR}");

        let mut put = |css_name: &'static str, pattern: Regex| {
            let key: &'static str =
                Box::leak(internal_key(css_name).into_boxed_str());
            props.insert(key, CssProperty { css_name, pattern });
        };

        put("color", single(COLOR));
        put("background-color", single(COLOR));
        put("border-color", repeated(COLOR, 1, 4));
        put("border", repeated(&border_part, 1, 3));
        put("border-top", repeated(&border_part, 1, 3));
        put("border-right", repeated(&border_part, 1, 3));
        put("border-bottom", repeated(&border_part, 1, 3));
        put("border-left", repeated(&border_part, 1, 3));
        put(
            "border-width",
            repeated(&format!("{LENGTH}|{BORDER_WIDTH}"), 1, 4),
        );
        put("border-style", repeated(BORDER_STYLE, 1, 4));
        put("margin", repeated(&len_auto, 1, 4));
        put("margin-top", single(&len_auto));
        put("margin-right", single(&len_auto));
        put("margin-bottom", single(&len_auto));
        put("margin-left", single(&len_auto));
        put("padding", repeated(LENGTH, 1, 4));
        put("padding-top", single(LENGTH));
        put("padding-right", single(LENGTH));
        put("padding-bottom", single(LENGTH));
        put("padding-left", single(LENGTH));
        put("width", single(&len_auto));
        put("height", single(&len_auto));
        put("top", single(&len_auto));
        put("right", single(&len_auto));
        put("bottom", single(&len_auto));
        put("left", single(&len_auto));
        put("position", single("static|relative|absolute|fixed"));
        put("float", single("left|right|none"));
        put("clear", single("left|right|both|none"));
        put(
            "display",
            single(
                "none|block|inline|inline-block|list-item|table|table-row|table-cell",
            ),
        );
        put("visibility", single("visible|hidden|collapse"));
        put("overflow", single("visible|hidden|scroll|auto"));
        put("z-index", single(r"-?\d+|auto"));
        put(
            "font-size",
            single(&format!(
                "xx-small|x-small|small|medium|large|x-large|xx-large|smaller|larger|{LENGTH}"
            )),
        );
        put("font-weight", single("normal|bold|bolder|lighter|[1-9]00"));
        put("font-style", single("normal|italic|oblique"));
        put(
            "font-family",
            Regex::new(
                r#"^(?:(?:[a-zA-Z][\w-]*(?: [a-zA-Z][\w-]*)*|"[\w\- ]+")\s*,\s*)*(?:[a-zA-Z][\w-]*(?: [a-zA-Z][\w-]*)*|"[\w\- ]+")\s+$"#,
            )
            .unwrap(),
        );
        put("line-height", single(&format!("normal|{LENGTH}")));
        put("letter-spacing", single(&format!("normal|{LENGTH}")));
        put("word-spacing", single(&format!("normal|{LENGTH}")));
        put("text-align", single("left|right|center|justify"));
        put(
            "text-decoration",
            repeated("none|underline|overline|line-through", 1, 3),
        );
        put("text-indent", single(LENGTH));
        put(
            "vertical-align",
            single(&format!(
                "baseline|sub|super|top|text-top|middle|bottom|text-bottom|{LENGTH}"
            )),
        );
        put("white-space", single("normal|pre|nowrap"));
        put(
            "cursor",
            single("auto|default|pointer|crosshair|move|text|wait|help"),
        );
        put(
            "list-style-type",
            single(
                "none|disc|circle|square|decimal|lower-alpha|upper-alpha|lower-roman|upper-roman",
            ),
        );
        CssPropertyTable { props }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_key_mapping() {
        assert_eq!(internal_key("font-size"), "font_size");
        assert_eq!(internal_key("float"), "css_float");
        assert_eq!(internal_key("color"), "color");
    }

    #[test]
    fn color_grammar() {
        let table = CssPropertyTable::standard();
        let color = table.get("color").unwrap();
        assert!(color.allows("#fff"));
        assert!(color.allows("#a0B1c2"));
        assert!(color.allows("red"));
        assert!(color.allows("rgb(0, 128, 255)"));
        assert!(!color.allows("expression(alert(1))"));
        assert!(!color.allows("#ffff"));
        assert!(!color.allows(""));
    }

    #[test]
    fn multi_token_grammars_anchor_each_token() {
        let table = CssPropertyTable::standard();
        let margin = table.get("margin").unwrap();
        assert!(margin.allows("1px"));
        assert!(margin.allows("1px auto 2em 0"));
        assert!(!margin.allows("1px bogus"));
        assert!(!margin.allows("1px 2px 3px 4px 5px"));
    }

    #[test]
    fn font_weight_rejects_invented_values() {
        let table = CssPropertyTable::standard();
        let weight = table.get("font_weight").unwrap();
        assert!(weight.allows("bold"));
        assert!(weight.allows("400"));
        assert!(!weight.allows("super-bold"));
    }

    #[test]
    fn float_lives_under_css_float() {
        let table = CssPropertyTable::standard();
        assert!(table.get("float").is_none());
        let float = table.get("css_float").unwrap();
        assert_eq!(float.css_name, "float");
        assert!(float.allows("left"));
    }
}
