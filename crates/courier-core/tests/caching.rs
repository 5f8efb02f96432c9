//! Resolution caching: repeated dispatches hit the locator once per key
//! with caching on, every time with caching off, and answer identically.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use courier_core::domain::{Capability, CapabilityKey};
use courier_core::typed::{ExceptionHandler, RequestHandler};
use courier_core::{
    AnyFault, CancellationSignal, ConfigurationError, ExceptionHandlingState, HandlerError,
    Lineage, Mediator, MediatorBuilder, MediatorConfig, MediatorError, MessageRef, Request,
    StaticRegistry, TypeKey,
};
use rstest::rstest;
use support::{CountingLocator, Recording, Journal};

struct Square(u32);
impl Lineage for Square {}

impl Request for Square {
    type Response = u32;
}

struct SquareHandler {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl RequestHandler<Square> for SquareHandler {
    async fn handle(
        &self,
        square: &Square,
        _cancel: &CancellationSignal,
    ) -> Result<u32, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(square.0 * square.0)
    }
}

fn locator(journal: &Journal, calls: &Arc<AtomicU32>) -> Arc<CountingLocator> {
    let mut registry = StaticRegistry::new();
    registry
        .request_handler::<Square, _>(SquareHandler { calls: calls.clone() })
        .behavior::<Square, _>(Recording::new(journal, "b"));
    CountingLocator::new(registry)
}

fn handler_key() -> CapabilityKey {
    CapabilityKey::new(Capability::RequestHandler, TypeKey::of::<Square>())
}

#[rstest]
#[case::cached(true, 1)]
#[case::uncached(false, 2)]
#[tokio::test]
async fn handler_resolution_count(#[case] caching: bool, #[case] expected: usize) {
    let journal = Journal::new();
    let calls = Arc::new(AtomicU32::new(0));
    let locator = locator(&journal, &calls);
    let config = MediatorConfig::default().with_caching(caching);
    let mediator = Mediator::new(locator.clone(), config);

    let first = mediator.send(Square(3), &CancellationSignal::none()).await.unwrap();
    let second = mediator.send(Square(3), &CancellationSignal::none()).await.unwrap();

    assert_eq!((first, second), (9, 9));
    assert_eq!(locator.queries_for(&handler_key()), expected);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(journal.entries().len(), 4);
}

#[tokio::test]
async fn cached_and_uncached_mediators_agree() {
    let journal = Journal::new();
    let calls = Arc::new(AtomicU32::new(0));
    let cached = Mediator::new(locator(&journal, &calls), MediatorConfig::default());
    let uncached = Mediator::new(
        locator(&journal, &calls),
        MediatorConfig::default().with_caching(false),
    );

    for n in 0..5 {
        let a = cached.send(Square(n), &CancellationSignal::none()).await.unwrap();
        let b = uncached.send(Square(n), &CancellationSignal::none()).await.unwrap();
        assert_eq!(a, b);
    }
    assert_eq!(cached.cached_pipelines(), 1);
    assert_eq!(uncached.cached_pipelines(), 0);
}

#[tokio::test]
async fn warmed_pipeline_needs_no_further_resolution() {
    let journal = Journal::new();
    let calls = Arc::new(AtomicU32::new(0));
    let locator = locator(&journal, &calls);
    let mediator = MediatorBuilder::new(locator.clone())
        .warm_request::<Square>()
        .build()
        .unwrap();
    let after_warmup = locator.total_queries();

    mediator.send(Square(2), &CancellationSignal::none()).await.unwrap();
    mediator.send(Square(4), &CancellationSignal::none()).await.unwrap();

    assert!(after_warmup > 0);
    assert_eq!(locator.total_queries(), after_warmup);
}

#[tokio::test]
async fn clones_share_the_pipeline_cache() {
    let journal = Journal::new();
    let calls = Arc::new(AtomicU32::new(0));
    let locator = locator(&journal, &calls);
    let mediator = Mediator::new(locator.clone(), MediatorConfig::default());

    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let mediator = mediator.clone();
            tokio::spawn(async move {
                mediator.send(Square(n), &CancellationSignal::none()).await
            })
        })
        .collect();
    for (n, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap().unwrap(), (n * n) as u32);
    }

    assert_eq!(mediator.cached_pipelines(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

struct Flaky;
impl Lineage for Flaky {}

impl Request for Flaky {
    type Response = u32;
}

struct FlakyHandler;

#[async_trait]
impl RequestHandler<Flaky> for FlakyHandler {
    async fn handle(
        &self,
        _flaky: &Flaky,
        _cancel: &CancellationSignal,
    ) -> Result<u32, HandlerError> {
        Err(HandlerError::msg("flaky"))
    }
}

struct Substitute(u32);

#[async_trait]
impl ExceptionHandler<u32> for Substitute {
    async fn handle(
        &self,
        _message: MessageRef<'_>,
        _error: &HandlerError,
        state: &mut ExceptionHandlingState<u32>,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        state.set_handled(self.0);
        Ok(())
    }
}

#[tokio::test]
async fn ambiguous_exception_handler_is_resolved_once() {
    let mut registry = StaticRegistry::new();
    registry
        .request_handler::<Flaky, _>(FlakyHandler)
        .request_exception_handler::<Flaky, u32, AnyFault, _>(Substitute(1))
        .request_exception_handler::<Flaky, u32, AnyFault, _>(Substitute(2));
    let locator = CountingLocator::new(registry);
    let mediator = Mediator::new(locator.clone(), MediatorConfig::default());

    for _ in 0..3 {
        let err = mediator
            .send(Flaky, &CancellationSignal::none())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MediatorError::Configuration(ConfigurationError::Ambiguous { count: 2, .. })
        ));
    }

    let key = CapabilityKey::exception(
        Capability::ExceptionHandler,
        TypeKey::of::<Flaky>(),
        Some(TypeKey::leaf::<u32>()),
        TypeKey::of::<AnyFault>(),
    );
    assert_eq!(locator.queries_for(&key), 1);
}
