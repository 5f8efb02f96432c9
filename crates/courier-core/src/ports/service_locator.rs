//! ServiceLocator port - where handler, behavior and subscription instances live.
//!
//! The core only needs two queries, both keyed by a concrete
//! [`CapabilityKey`]. Any container, or a plain static registry
//! (see `impls::StaticRegistry`), can implement it.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::{CapabilityKey, ConfigurationError};

/// A registered instance, erased.
///
/// The value stored behind the `Any` is the `Arc<dyn Trait>` of the
/// capability (for example `Arc<dyn RequestHandler<R>>`), so callers
/// downcast to that exact type.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// ServiceLocator resolves registered instances.
///
/// # Contract
/// - `resolve_one` fails with `NotRegistered` when nothing is registered and
///   with `AmbiguousRegistration` when more than one instance is.
/// - `resolve_all` returns instances in registration order, possibly none.
/// - Registrations are closed before the first dispatch.
pub trait ServiceLocator: Send + Sync {
    fn resolve_one(&self, key: &CapabilityKey) -> Result<Instance, LocatorError>;

    fn resolve_all(&self, key: &CapabilityKey) -> Vec<Instance>;
}

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("nothing registered for {0}")]
    NotRegistered(CapabilityKey),

    #[error("{count} instances registered for {key}")]
    AmbiguousRegistration { key: CapabilityKey, count: usize },
}

impl From<LocatorError> for ConfigurationError {
    fn from(error: LocatorError) -> Self {
        match error {
            LocatorError::NotRegistered(key) => ConfigurationError::NotRegistered(key),
            LocatorError::AmbiguousRegistration { key, count } => {
                ConfigurationError::Ambiguous { key, count }
            }
        }
    }
}

impl<L: ServiceLocator + ?Sized> ServiceLocator for Arc<L> {
    fn resolve_one(&self, key: &CapabilityKey) -> Result<Instance, LocatorError> {
        (**self).resolve_one(key)
    }

    fn resolve_all(&self, key: &CapabilityKey) -> Vec<Instance> {
        (**self).resolve_all(key)
    }
}
