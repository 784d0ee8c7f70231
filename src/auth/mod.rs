//! Capability Token Layer
//!
//! Implements an object-capability model for the serialization engine.
//!
//! # Design
//! - One process-wide ambient authority root, claimable exactly once
//! - Four zero-sized tokens, each gating one privileged operation
//! - Tokens are minted only from the ambient root; once held they copy
//!   freely but can never be synthesized from nothing
//!
//! # Security Properties
//! - Enforcement is static: an operation's signature names the token
//!   type, so a caller without the token cannot express the call
//! - Splitting encode from inspect keeps a component that merely moves
//!   serialized data from observing private bit patterns
//! - Splitting decode from trust isolates "treat arbitrary bytes as
//!   well-formed" behind its own explicit grant

pub mod ambient;
pub mod token;

pub use ambient::AmbientAuth;
pub use token::{DecodeAuth, EncodeAuth, InspectAuth, TrustAuth};
