//! Registry Construction and Lookup
//!
//! Builds the read-only descriptor table and optionally installs it as
//! process-wide state.
//!
//! # Design
//! - `RegistryBuilder` assigns dense ids in registration order
//! - `Registry::lookup` is an array index, constant time
//! - The process-wide slot is a `spin::Once`: installed at most once,
//!   read-only forever after, safe for concurrent readers

use alloc::vec::Vec;
use core::fmt;

use spin::Once;

use super::descriptor::{FieldKind, TypeDescriptor, TypeId};
use crate::signature::Signature;

/// Error installing the process-wide registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallError {
    /// A registry has already been installed in this process.
    AlreadyInstalled,
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInstalled => write!(f, "a registry is already installed"),
        }
    }
}

/// Incremental builder for a descriptor table.
///
/// Registration order determines id assignment, so a program must
/// register its serializable types in one deterministic sequence
/// (declaration order is the usual choice).
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<TypeDescriptor>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    /// Register a type layout and receive its dense id.
    pub fn register(&mut self, name: &'static str, fields: Vec<FieldKind>) -> TypeId {
        let id = TypeId::new(self.descriptors.len() as u32);
        self.descriptors.push(TypeDescriptor::new(id, name, fields));
        id
    }

    /// Finish the table and derive its signature.
    pub fn build(self) -> Registry {
        let signature = Signature::of_descriptors(&self.descriptors);
        Registry {
            descriptors: self.descriptors,
            signature,
        }
    }
}

/// Read-only descriptor table.
#[derive(Debug)]
pub struct Registry {
    descriptors: Vec<TypeDescriptor>,
    signature: Signature,
}

impl Registry {
    /// Look up a descriptor by id.
    #[inline]
    pub fn lookup(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.descriptors.get(id.as_u32() as usize)
    }

    /// Number of registered types.
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no types are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// All descriptors, in id order.
    #[inline]
    pub fn descriptors(&self) -> &[TypeDescriptor] {
        &self.descriptors
    }

    /// The signature of this table, computed once at build time.
    #[inline]
    pub const fn signature(&self) -> Signature {
        self.signature
    }
}

/// Process-wide registry slot.
static GLOBAL: Once<Registry> = Once::new();

/// Install the process-wide registry.
///
/// Succeeds exactly once per process; later calls fail with
/// [`InstallError::AlreadyInstalled`] and leave the installed table
/// untouched.
pub fn install(registry: Registry) -> Result<&'static Registry, InstallError> {
    let mut fresh = false;
    let installed = GLOBAL.call_once(|| {
        fresh = true;
        registry
    });
    if fresh {
        Ok(installed)
    } else {
        Err(InstallError::AlreadyInstalled)
    }
}

/// The installed process-wide registry, if any.
pub fn global() -> Option<&'static Registry> {
    GLOBAL.get()
}
