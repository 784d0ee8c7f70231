//! Ambient Authority Root
//!
//! The single value from which all capability tokens are minted.
//!
//! # Design
//! - Claimable exactly once per process, at the host's bootstrap point
//! - Not `Clone`: the claimant decides who may borrow it for minting
//! - A borrow of the root is the proof-of-authority; the private unit
//!   field makes literal construction outside this module impossible

use core::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether the process root has been handed out.
static CLAIMED: AtomicBool = AtomicBool::new(false);

/// The process-wide ambient authority root.
///
/// Whoever claims this value controls which components receive which
/// capability tokens. Typically claimed once in `main` and threaded to
/// the composition root of the application.
#[derive(Debug)]
pub struct AmbientAuth {
    _priv: (),
}

impl AmbientAuth {
    /// Claim the process ambient authority.
    ///
    /// Returns `Some` on the first call in the process lifetime and
    /// `None` on every later call. There is no way to un-claim.
    pub fn claim() -> Option<Self> {
        if CLAIMED.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self { _priv: () })
        }
    }
}
