//! HandlerResolver - locator lookups with an optional per-key cache.
//!
//! Instances come back erased; `one` / `all` / `optional` downcast them to
//! the `Arc<dyn Capability>` type the caller expects and report anything
//! else as `ConfigurationError::CapabilityMismatch`.
//!
//! With caching on, every lookup shape keeps its own memo. Failed
//! single-registration lookups are memoized too, so a missing or ambiguous
//! registration reaches the locator once per key.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{CapabilityKey, ConfigurationError};
use crate::ports::{Instance, ServiceLocator};

type Resolved = Arc<[Instance]>;
type Memo<V> = RwLock<HashMap<CapabilityKey, V>>;

#[derive(Default)]
struct ResolutionCache {
    one: Memo<Result<Instance, ConfigurationError>>,
    optional: Memo<Result<Option<Instance>, ConfigurationError>>,
    all: Memo<Resolved>,
}

pub struct HandlerResolver {
    locator: Arc<dyn ServiceLocator>,
    cache: Option<ResolutionCache>,
}

impl HandlerResolver {
    pub fn new(locator: Arc<dyn ServiceLocator>, caching: bool) -> Self {
        Self {
            locator,
            cache: caching.then(ResolutionCache::default),
        }
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Exactly one instance; zero or several is a configuration error.
    pub fn resolve_one(&self, key: &CapabilityKey) -> Result<Instance, ConfigurationError> {
        memoize(self.cache.as_ref().map(|c| &c.one), key, || {
            Ok(self.locator.resolve_one(key)?)
        })
    }

    /// At most one instance.
    pub fn resolve_optional(
        &self,
        key: &CapabilityKey,
    ) -> Result<Option<Instance>, ConfigurationError> {
        memoize(self.cache.as_ref().map(|c| &c.optional), key, || {
            match self.locator.resolve_all(key).as_slice() {
                [] => Ok(None),
                [instance] => Ok(Some(Arc::clone(instance))),
                many => Err(ConfigurationError::Ambiguous {
                    key: *key,
                    count: many.len(),
                }),
            }
        })
    }

    /// Every instance, in registration order.
    pub fn resolve_all(&self, key: &CapabilityKey) -> Resolved {
        memoize(self.cache.as_ref().map(|c| &c.all), key, || {
            self.locator.resolve_all(key).into()
        })
    }

    pub fn one<T: Clone + 'static>(&self, key: &CapabilityKey) -> Result<T, ConfigurationError> {
        downcast(&self.resolve_one(key)?, key)
    }

    pub fn optional<T: Clone + 'static>(
        &self,
        key: &CapabilityKey,
    ) -> Result<Option<T>, ConfigurationError> {
        self.resolve_optional(key)?
            .map(|instance| downcast(&instance, key))
            .transpose()
    }

    pub fn all<T: Clone + 'static>(
        &self,
        key: &CapabilityKey,
    ) -> Result<Vec<T>, ConfigurationError> {
        self.resolve_all(key)
            .iter()
            .map(|instance| downcast(instance, key))
            .collect()
    }
}

/// Compute then publish, first writer wins.
fn memoize<V: Clone>(
    memo: Option<&Memo<V>>,
    key: &CapabilityKey,
    resolve: impl FnOnce() -> V,
) -> V {
    let Some(memo) = memo else {
        return resolve();
    };
    if let Some(found) = memo.read().get(key) {
        return found.clone();
    }

    let resolved = resolve();
    debug!(%key, "resolved from locator");
    memo.write().entry(*key).or_insert(resolved).clone()
}

pub(crate) fn downcast<T: Clone + 'static>(
    instance: &Instance,
    key: &CapabilityKey,
) -> Result<T, ConfigurationError> {
    instance
        .downcast_ref::<T>()
        .cloned()
        .ok_or(ConfigurationError::CapabilityMismatch {
            key: *key,
            expected: type_name::<T>(),
        })
}
