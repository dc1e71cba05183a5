//! Host-side browser shim: the shared document tree, raw events,
//! markup tokenization/serialization, and a cooperative timer queue.
//!
//! Nothing in this crate enforces isolation. It models what a real
//! browser provides; the taming layer above it decides what a guest
//! may see or touch.

pub mod error;
pub mod event;
pub mod markup;
pub mod scheduler;
pub mod tree;

pub use error::HostError;
pub use event::{add_listener, dispatch_event, remove_listener, RawEvent, RawListener};
pub use markup::{escape_attr, escape_text, Token, Tokenizer};
pub use scheduler::Scheduler;
pub use tree::{Document, ElementData, NodeData, NodeHandle, RawNode};
