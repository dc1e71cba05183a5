//! The taming layer's error taxonomy.
//!
//! Every refusal the membrane can produce maps onto one of these five
//! variants, so callers can distinguish a forged reference from a
//! policy veto or a read-only wrapper.

use thiserror::Error;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    /// A wrapper or handle was minted by a different installation, or
    /// a dispatch named a module or handler that does not exist.
    #[error("invalid capability reference")]
    InvalidCapability,

    /// The operation mutates through a wrapper whose editable bit is
    /// not set.
    #[error("node is not editable")]
    NotEditable,

    /// The value or operation failed policy validation.
    #[error("policy rejected: {reason}")]
    PolicyRejected { reason: String },

    /// The wrapper kind does not support this operation at all.
    #[error("operation not supported: {operation}")]
    UnsupportedOperation { operation: &'static str },

    /// Installation input (gadget suffix, rewriter contract) is
    /// malformed.
    #[error("malformed configuration: {reason}")]
    MalformedConfiguration { reason: String },
}

impl DomError {
    pub(crate) fn rejected(reason: impl Into<String>) -> DomError {
        DomError::PolicyRejected {
            reason: reason.into(),
        }
    }
}
