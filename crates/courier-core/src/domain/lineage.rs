//! Type lineage - declared ancestry for message and fault types.
//!
//! Rust has no inheritance, so a type states its direct ancestors through
//! [`Lineage::parents`]. Ancestors are plain `'static` types, usually
//! zero-sized markers, that subscriptions and behaviors can be registered
//! against.
//!
//! ```ignore
//! struct Auditable;
//! impl Lineage for Auditable {}
//!
//! struct CreateOrder { id: u64 }
//! impl Lineage for CreateOrder {
//!     fn parents() -> Vec<TypeKey> {
//!         vec![TypeKey::of::<Auditable>()]
//!     }
//! }
//! ```

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Lineage declares the direct ancestors of a type.
pub trait Lineage: 'static {
    /// Direct ancestors, most relevant first. Defaults to none.
    fn parents() -> Vec<TypeKey> {
        Vec::new()
    }
}

/// Structural identity of a type plus a way to walk its ancestry.
///
/// Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    parents: fn() -> Vec<TypeKey>,
}

fn no_parents() -> Vec<TypeKey> {
    Vec::new()
}

impl TypeKey {
    /// Key of a type that declares lineage.
    pub fn of<T: Lineage>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            parents: T::parents,
        }
    }

    /// Key of a type without lineage (response types, for instance).
    pub fn leaf<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            parents: no_parents,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parents(&self) -> Vec<TypeKey> {
        (self.parents)()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Root of every message hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct AnyMessage;
impl Lineage for AnyMessage {}

/// Root of every request hierarchy (precedes [`AnyMessage`]).
#[derive(Debug, Clone, Copy)]
pub struct AnyRequest;
impl Lineage for AnyRequest {}

/// Root of every notification hierarchy (precedes [`AnyMessage`]).
#[derive(Debug, Clone, Copy)]
pub struct AnyNotification;
impl Lineage for AnyNotification {}

/// Root of every stream request hierarchy (precedes [`AnyMessage`]).
#[derive(Debug, Clone, Copy)]
pub struct AnyStreamRequest;
impl Lineage for AnyStreamRequest {}

/// Root of every fault hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct AnyFault;
impl Lineage for AnyFault {}

/// Which roots close a computed hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HierarchyRoot {
    /// No roots; the declared lineage only.
    None,
    Request,
    Notification,
    StreamRequest,
    Fault,
}

impl HierarchyRoot {
    pub fn keys(self) -> Vec<TypeKey> {
        match self {
            HierarchyRoot::None => Vec::new(),
            HierarchyRoot::Request => {
                vec![TypeKey::of::<AnyRequest>(), TypeKey::of::<AnyMessage>()]
            }
            HierarchyRoot::Notification => vec![
                TypeKey::of::<AnyNotification>(),
                TypeKey::of::<AnyMessage>(),
            ],
            HierarchyRoot::StreamRequest => vec![
                TypeKey::of::<AnyStreamRequest>(),
                TypeKey::of::<AnyMessage>(),
            ],
            HierarchyRoot::Fault => vec![TypeKey::of::<AnyFault>()],
        }
    }
}
