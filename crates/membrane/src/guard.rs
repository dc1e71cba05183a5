//! Unforgeable installation identity.
//!
//! Each install mints one `Marker`; every wrapper and timer handle it
//! hands out carries a matching `Stamp`. Neither type can be built
//! outside this crate, so holding a stamped value is the only way to
//! pass the guard.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{DomError, DomResult};

static NEXT_MARKER: AtomicU64 = AtomicU64::new(1);

/// Per-installation identity held by the gadget context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker(u64);

/// Proof of origin carried by wrappers and handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp(u64);

impl Marker {
    pub(crate) fn mint() -> Marker {
        Marker(NEXT_MARKER.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn stamp(&self) -> Stamp {
        Stamp(self.0)
    }

    /// Verifies that `stamp` was minted by this installation.
    pub fn guard(&self, stamp: &Stamp) -> DomResult<()> {
        if self.0 == stamp.0 {
            Ok(())
        } else {
            Err(DomError::InvalidCapability)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_accepts_own_stamp_only() {
        let a = Marker::mint();
        let b = Marker::mint();
        assert!(a.guard(&a.stamp()).is_ok());
        assert_eq!(a.guard(&b.stamp()), Err(DomError::InvalidCapability));
    }
}
