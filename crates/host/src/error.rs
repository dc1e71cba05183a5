//! Host tree error type.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    /// The node is not a child of the given parent, or the requested
    /// insertion would make a node its own ancestor.
    #[error("node is not a usable child of the given parent")]
    NotAChild,

    /// The reference node for an insertion is not in the child list.
    #[error("reference node not found in child list")]
    ReferenceNotFound,
}
