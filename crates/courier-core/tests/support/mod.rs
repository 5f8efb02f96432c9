//! Shared fixtures for courier-core integration tests.
//!
//! - [`Journal`]: ordered recorder the fixtures below write into
//! - [`CountingLocator`]: `StaticRegistry` wrapper counting locator queries per key
//! - [`Recording`]: behavior that records enter/exit around `next`

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::domain::CapabilityKey;
use courier_core::ports::{Instance, LocatorError, ServiceLocator};
use courier_core::typed::{Next, Opaque, OpenBehavior, OpenNext, PipelineBehavior};
use courier_core::{
    CancellationSignal, HandlerError, Mediator, MediatorConfig, MessageRef, Request,
    StaticRegistry,
};
use parking_lot::Mutex;

#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

pub struct CountingLocator {
    inner: StaticRegistry,
    queries: Mutex<HashMap<CapabilityKey, usize>>,
}

impl CountingLocator {
    pub fn new(inner: StaticRegistry) -> Arc<Self> {
        Arc::new(Self {
            inner,
            queries: Mutex::new(HashMap::new()),
        })
    }

    pub fn queries_for(&self, key: &CapabilityKey) -> usize {
        self.queries.lock().get(key).copied().unwrap_or(0)
    }

    pub fn total_queries(&self) -> usize {
        self.queries.lock().values().sum()
    }

    fn count(&self, key: &CapabilityKey) {
        *self.queries.lock().entry(*key).or_default() += 1;
    }
}

impl ServiceLocator for CountingLocator {
    fn resolve_one(&self, key: &CapabilityKey) -> Result<Instance, LocatorError> {
        self.count(key);
        self.inner.resolve_one(key)
    }

    fn resolve_all(&self, key: &CapabilityKey) -> Vec<Instance> {
        self.count(key);
        self.inner.resolve_all(key)
    }
}

/// Records `"{name}-enter"` and `"{name}-exit"` around the next stage.
pub struct Recording {
    journal: Journal,
    name: &'static str,
}

impl Recording {
    pub fn new(journal: &Journal, name: &'static str) -> Self {
        Self {
            journal: journal.clone(),
            name,
        }
    }
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for Recording {
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R>,
        cancel: &CancellationSignal,
    ) -> Result<R::Response, HandlerError> {
        self.journal.record(format!("{}-enter", self.name));
        let response = next.run(request, cancel).await;
        self.journal.record(format!("{}-exit", self.name));
        response
    }
}

#[async_trait]
impl OpenBehavior for Recording {
    async fn handle(
        &self,
        _request: MessageRef<'_>,
        next: OpenNext<'_>,
        _cancel: &CancellationSignal,
    ) -> Result<Opaque, HandlerError> {
        self.journal.record(format!("{}-enter", self.name));
        let response = next.run().await;
        self.journal.record(format!("{}-exit", self.name));
        response
    }
}

pub fn mediator(registry: StaticRegistry) -> Mediator {
    Mediator::new(Arc::new(registry), MediatorConfig::default())
}
