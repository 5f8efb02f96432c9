//! Mediator - ディスパッチのファサード
//!
//! # 処理の流れ
//! caller → `send` / `publish` / `create_stream` → 組み立て済み pipeline
//! （キャッシュ or 新規構築）→ handler → 失敗時は exception subscription
//!
//! `Mediator` は軽量なハンドルで、clone 同士でキャッシュと設定を共有する。

use std::any::type_name;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, trace};

use super::config::MediatorConfig;
use super::exceptions::ExceptionSubscriptionEngine;
use super::hierarchy::TypeHierarchyResolver;
use super::pipeline::{
    Listener, NotificationPipeline, PipelineCache, PipelineComposer, PipelineKind,
    RequestPipeline, StreamPipeline,
};
use super::publish::PublishStrategy;
use super::resolver::HandlerResolver;
use crate::domain::{
    CancellationSignal, ConfigurationError, HandlerError, MediatorError, MessageRef,
    Notification, Request, StreamRequest, TypeKey,
};
use crate::ports::ServiceLocator;
use crate::typed::ItemStream;

#[derive(Clone)]
pub struct Mediator {
    inner: Arc<Inner>,
}

struct Inner {
    config: MediatorConfig,
    resolver: HandlerResolver,
    hierarchy: &'static TypeHierarchyResolver,
    pipelines: Option<PipelineCache>,
}

impl Mediator {
    pub fn new(locator: Arc<dyn ServiceLocator>, config: MediatorConfig) -> Self {
        let caching = config.caching_enabled;
        Self {
            inner: Arc::new(Inner {
                resolver: HandlerResolver::new(locator, caching),
                hierarchy: TypeHierarchyResolver::shared(caching),
                pipelines: caching.then(PipelineCache::default),
                config,
            }),
        }
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.inner.config
    }

    pub fn publish_strategy(&self) -> PublishStrategy {
        self.inner.config.publish_strategy
    }

    /// Number of composed pipelines held by this mediator.
    pub fn cached_pipelines(&self) -> usize {
        self.inner.pipelines.as_ref().map_or(0, PipelineCache::len)
    }

    /// Runs `request` through its pipeline.
    ///
    /// A failure escaping the pipeline is offered to the exception
    /// subscriptions; if none handles it, the original `HandlerError` is
    /// returned as `MediatorError::Handler`.
    pub async fn send<R: Request>(
        &self,
        request: R,
        cancel: &CancellationSignal,
    ) -> Result<R::Response, MediatorError> {
        let pipeline = self.request_pipeline::<R>()?;
        trace!(request = type_name::<R>(), "dispatching request");

        let error = match pipeline.run(&request, cancel).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        debug!(
            request = type_name::<R>(),
            fault = %error.fault_type(),
            "request failed, attempting recovery"
        );
        let recovered = self
            .engine()
            .attempt_recover::<R::Response>(
                MessageRef::of(&request),
                pipeline.hierarchy(),
                Some(TypeKey::leaf::<R::Response>()),
                &error,
                cancel,
            )
            .await?;

        match recovered {
            Some(response) => Ok(response),
            None => Err(MediatorError::Handler(error)),
        }
    }

    /// Delivers `notification` to every listener of its hierarchy using the
    /// configured [`PublishStrategy`]. No listeners is not an error.
    pub async fn publish<N: Notification>(
        &self,
        notification: N,
        cancel: &CancellationSignal,
    ) -> Result<(), MediatorError> {
        let pipeline = self.notification_pipeline::<N>()?;
        if pipeline.listeners().is_empty() {
            trace!(notification = type_name::<N>(), "no listeners");
            return Ok(());
        }

        let invocations = pipeline
            .listeners()
            .iter()
            .map(|listener| self.notify(listener, &notification, &pipeline, cancel));
        self.publish_strategy().dispatch(invocations).await
    }

    /// Opens the stream of `request`.
    ///
    /// Wiring errors surface here; items are produced lazily as the stream
    /// is polled. Once `cancel` fires the stream ends at the next poll.
    pub fn create_stream<S: StreamRequest>(
        &self,
        request: S,
        cancel: CancellationSignal,
    ) -> Result<ItemStream<S::Item>, MediatorError> {
        let pipeline = self.stream_pipeline::<S>()?;
        trace!(stream = type_name::<S>(), "opening stream");

        let stop = cancel.clone().cancelled_owned();
        Ok(pipeline
            .open(Arc::new(request), cancel)
            .take_until(stop)
            .boxed())
    }

    async fn notify<N: Notification>(
        &self,
        listener: &Listener<N>,
        notification: &N,
        pipeline: &NotificationPipeline<N>,
        cancel: &CancellationSignal,
    ) -> Result<(), MediatorError> {
        let error: HandlerError = match listener.invoke(notification, cancel).await {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };

        let recovered = self
            .engine()
            .attempt_recover::<()>(
                MessageRef::of(notification),
                pipeline.hierarchy(),
                None,
                &error,
                cancel,
            )
            .await?;

        match recovered {
            Some(()) => Ok(()),
            None => Err(MediatorError::Handler(error)),
        }
    }

    pub(crate) fn request_pipeline<R: Request>(
        &self,
    ) -> Result<Arc<RequestPipeline<R>>, ConfigurationError> {
        self.pipeline(PipelineKind::Request, TypeKey::of::<R>(), |composer| {
            composer.request::<R>()
        })
    }

    pub(crate) fn stream_pipeline<S: StreamRequest>(
        &self,
    ) -> Result<Arc<StreamPipeline<S>>, ConfigurationError> {
        self.pipeline(PipelineKind::Stream, TypeKey::of::<S>(), |composer| {
            composer.stream::<S>()
        })
    }

    pub(crate) fn notification_pipeline<N: Notification>(
        &self,
    ) -> Result<Arc<NotificationPipeline<N>>, ConfigurationError> {
        self.pipeline(PipelineKind::Notification, TypeKey::of::<N>(), |composer| {
            composer.notification::<N>()
        })
    }

    fn pipeline<P: Send + Sync + 'static>(
        &self,
        kind: PipelineKind,
        message: TypeKey,
        compose: impl FnOnce(&PipelineComposer<'_>) -> Result<P, ConfigurationError>,
    ) -> Result<Arc<P>, ConfigurationError> {
        let composer = PipelineComposer::new(&self.inner.resolver, self.inner.hierarchy);
        match &self.inner.pipelines {
            Some(cache) => cache.get_or_build(kind, message, || compose(&composer)),
            None => compose(&composer).map(Arc::new),
        }
    }

    fn engine(&self) -> ExceptionSubscriptionEngine<'_> {
        ExceptionSubscriptionEngine::new(&self.inner.resolver, self.inner.hierarchy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CancellationSource, Lineage};
    use crate::impls::StaticRegistry;
    use crate::typed::{RequestHandler, StreamRequestHandler};
    use async_trait::async_trait;
    use futures::stream;

    struct Ping(u32);
    impl Lineage for Ping {}
    impl Request for Ping {
        type Response = u32;
    }

    struct Double;

    #[async_trait]
    impl RequestHandler<Ping> for Double {
        async fn handle(
            &self,
            ping: &Ping,
            _cancel: &CancellationSignal,
        ) -> Result<u32, HandlerError> {
            Ok(ping.0 * 2)
        }
    }

    struct Ticks;
    impl Lineage for Ticks {}
    impl StreamRequest for Ticks {
        type Item = u64;
    }

    struct Forever;

    impl StreamRequestHandler<Ticks> for Forever {
        fn handle(&self, _request: Arc<Ticks>, _cancel: CancellationSignal) -> ItemStream<u64> {
            stream::iter(0..).map(Ok).boxed()
        }
    }

    fn mediator(registry: StaticRegistry, caching: bool) -> Mediator {
        Mediator::new(
            Arc::new(registry),
            MediatorConfig::default().with_caching(caching),
        )
    }

    #[tokio::test]
    async fn send_returns_the_handler_response() {
        let mut registry = StaticRegistry::new();
        registry.request_handler::<Ping, _>(Double);
        let mediator = mediator(registry, true);

        assert_eq!(mediator.send(Ping(21), &CancellationSignal::none()).await.unwrap(), 42);
        assert_eq!(mediator.cached_pipelines(), 1);
    }

    #[tokio::test]
    async fn missing_handler_is_a_configuration_error() {
        let mediator = mediator(StaticRegistry::new(), false);
        let err = mediator.send(Ping(1), &CancellationSignal::none()).await.unwrap_err();
        assert!(matches!(
            err,
            MediatorError::Configuration(ConfigurationError::NotRegistered(_))
        ));
        assert_eq!(mediator.cached_pipelines(), 0);
    }

    #[tokio::test]
    async fn publish_without_listeners_is_a_no_op() {
        struct Quiet;
        impl Lineage for Quiet {}
        impl Notification for Quiet {}

        let mediator = mediator(StaticRegistry::new(), true);
        mediator.publish(Quiet, &CancellationSignal::none()).await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_stream_ends_at_next_poll() {
        let mut registry = StaticRegistry::new();
        registry.stream_handler::<Ticks, _>(Forever);
        let mediator = mediator(registry, true);

        let source = CancellationSource::new();
        let mut items = mediator.create_stream(Ticks, source.signal()).unwrap();
        assert_eq!(items.next().await.unwrap().unwrap(), 0);
        assert_eq!(items.next().await.unwrap().unwrap(), 1);

        source.cancel();
        assert!(items.next().await.is_none());
    }
}
