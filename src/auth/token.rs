//! Capability Tokens
//!
//! Zero-sized proof-of-permission values for the four privileged
//! operations of the engine.
//!
//! # Token Map
//! ```text
//! ┌─────────────┬─────────────────────────────────────────────┐
//! │ EncodeAuth  │ produce bytes from an object graph          │
//! │ DecodeAuth  │ reconstruct an object graph from bytes      │
//! │ InspectAuth │ read the raw bytes of a Serialised value    │
//! │ TrustAuth   │ assert foreign bytes are well-formed output │
//! └─────────────┴─────────────────────────────────────────────┘
//! ```
//!
//! Each token has exactly one constructor, taking the ambient root;
//! minting never fails. Tokens carry no data and no behavior beyond
//! type-level proof: holding one cannot be faked, checked, or revoked.

use super::ambient::AmbientAuth;

macro_rules! capability_token {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug)]
        pub struct $name {
            _priv: (),
        }

        impl $name {
            /// Mint this token from the process ambient root.
            #[inline]
            pub fn mint(_root: &AmbientAuth) -> Self {
                Self { _priv: () }
            }
        }
    };
}

capability_token! {
    /// Permission to encode object graphs into `Serialised` values.
    EncodeAuth
}

capability_token! {
    /// Permission to decode `Serialised` values back into object graphs.
    ///
    /// The most dangerous grant after `TrustAuth`: decoding bytes that
    /// did not come from this binary yields a garbage graph.
    DecodeAuth
}

capability_token! {
    /// Permission to read the raw bytes inside a `Serialised` value.
    InspectAuth
}

capability_token! {
    /// Permission to wrap arbitrary bytes as a `Serialised` value with
    /// no validation whatsoever.
    TrustAuth
}
