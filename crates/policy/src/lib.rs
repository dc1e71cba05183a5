//! Static classification tables consumed by the palisade membrane.
//!
//! Three read-only tables: the element allowlist with per-element content
//! flags, the (tag, attribute) semantic-class table, and the CSS
//! property grammar table. All of them are available before any taming
//! call and never change afterwards.

pub mod attributes;
pub mod css;
pub mod elements;

pub use attributes::{AttrClass, AttributeTable};
pub use css::{internal_key, CssProperty, CssPropertyTable};
pub use elements::{
    ElementTable, FLAG_CDATA, FLAG_EMPTY, FLAG_RCDATA, FLAG_UNSAFE,
};
