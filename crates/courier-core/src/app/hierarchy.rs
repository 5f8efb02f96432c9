//! TypeHierarchyResolver - ordered ancestry of message and fault types.
//!
//! Order: the type itself, then breadth-first ancestors in declaration
//! order (first occurrence wins), then the roots of the requested
//! [`HierarchyRoot`]. Used to pick behaviors and listeners registered
//! against ancestors, and as the priority order of the exception search.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::trace;

use crate::domain::{HierarchyRoot, TypeKey};

pub type Hierarchy = Arc<[TypeKey]>;

static GLOBAL: Lazy<TypeHierarchyResolver> = Lazy::new(TypeHierarchyResolver::cached);
static UNCACHED: TypeHierarchyResolver = TypeHierarchyResolver { cache: None };

/// Memoizes hierarchies per (type, root).
///
/// The set of types is bounded by the program, so entries are never
/// evicted. Concurrent first lookups may both compute; the first published
/// value wins and both are equal.
pub struct TypeHierarchyResolver {
    cache: Option<RwLock<HashMap<(TypeKey, HierarchyRoot), Hierarchy>>>,
}

impl TypeHierarchyResolver {
    /// Process-wide cached resolver.
    pub fn global() -> &'static TypeHierarchyResolver {
        &GLOBAL
    }

    /// The process-wide resolver matching a caching setting.
    pub fn shared(caching: bool) -> &'static TypeHierarchyResolver {
        if caching { &GLOBAL } else { &UNCACHED }
    }

    pub fn cached() -> Self {
        Self {
            cache: Some(RwLock::new(HashMap::new())),
        }
    }

    /// Computes every hierarchy afresh.
    pub fn uncached() -> Self {
        Self { cache: None }
    }

    pub fn hierarchy_of(&self, key: TypeKey, root: HierarchyRoot) -> Hierarchy {
        let Some(cache) = &self.cache else {
            return compute(key, root);
        };
        if let Some(found) = cache.read().get(&(key, root)) {
            return Arc::clone(found);
        }

        let computed = compute(key, root);
        let mut entries = cache.write();
        Arc::clone(entries.entry((key, root)).or_insert(computed))
    }
}

fn compute(key: TypeKey, root: HierarchyRoot) -> Hierarchy {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let mut queue = VecDeque::from([key]);

    while let Some(current) = queue.pop_front() {
        if !seen.insert(current) {
            continue;
        }
        ordered.push(current);
        queue.extend(current.parents());
    }
    for root_key in root.keys() {
        if seen.insert(root_key) {
            ordered.push(root_key);
        }
    }

    trace!(message_type = %key, ?ordered, "computed type hierarchy");
    ordered.into()
}
