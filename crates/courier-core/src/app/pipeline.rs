//! PipelineComposer - メッセージ型ごとの呼び出しチェーンを組み立てる
//!
//! # 組み立て順序
//! 1. pre/post-processor（request のみ）と終端 handler。processor も
//!    behavior と同じく派生度の低いレベルから集め、レベル内は登録順
//! 2. 各階層レベルの behavior。派生度の低いレベルから、レベル内は登録順
//! 3. 右から左へ畳み込む。behavior[0] が最外になり、呼び出し側からは
//!    behavior[0] .. behavior[n-1]、handler、逆順の巻き戻しに見える
//!
//! 畳み込みの各段は behavior と `next` を不変の組として保持する。
//! 解決の失敗はここで表面化し、その型の最初のメッセージより先に報告される。

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt};
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::hierarchy::{Hierarchy, TypeHierarchyResolver};
use super::resolver::HandlerResolver;
use crate::domain::{
    CancellationSignal, Capability, CapabilityKey, ConfigurationError, ForeignResponse,
    HandlerError, HierarchyRoot, MessageRef, Notification, Request, ResponseRef, SharedMessage,
    StreamRequest, TypeKey,
};
use crate::ports::Instance;
use crate::typed::behavior::{ErasedNext, RequestStage, StreamStage};
use crate::typed::{
    ItemStream, Next, NotificationHandler, Opaque, OpenBehavior, OpenNext,
    OpenNotificationHandler, OpenRequestPostProcessor, OpenRequestPreProcessor,
    OpenStreamBehavior, OpenStreamNext, PipelineBehavior, RequestHandler, RequestPostProcessor,
    RequestPreProcessor, StreamNext, StreamPipelineBehavior, StreamRequestHandler,
};

// ────────────────────────────────────────────────────────────────────────────
// Composed pipelines
// ────────────────────────────────────────────────────────────────────────────

pub(crate) struct RequestPipeline<R: Request> {
    entry: Arc<dyn RequestStage<R>>,
    hierarchy: Hierarchy,
}

impl<R: Request> RequestPipeline<R> {
    pub(crate) async fn run(
        &self,
        request: &R,
        cancel: &CancellationSignal,
    ) -> Result<R::Response, HandlerError> {
        self.entry.run(request, cancel).await
    }

    pub(crate) fn hierarchy(&self) -> &[TypeKey] {
        &self.hierarchy
    }
}

pub(crate) struct StreamPipeline<S: StreamRequest> {
    entry: Arc<dyn StreamStage<S>>,
}

impl<S: StreamRequest> StreamPipeline<S> {
    pub(crate) fn open(&self, request: Arc<S>, cancel: CancellationSignal) -> ItemStream<S::Item> {
        self.entry.open(request, cancel)
    }
}

pub(crate) struct NotificationPipeline<N: Notification> {
    listeners: Vec<Listener<N>>,
    hierarchy: Hierarchy,
}

impl<N: Notification> NotificationPipeline<N> {
    pub(crate) fn listeners(&self) -> &[Listener<N>] {
        &self.listeners
    }

    pub(crate) fn hierarchy(&self) -> &[TypeKey] {
        &self.hierarchy
    }
}

pub(crate) enum Listener<N: Notification> {
    Typed(Arc<dyn NotificationHandler<N>>),
    Open(Arc<dyn OpenNotificationHandler>),
}

impl<N: Notification> Listener<N> {
    pub(crate) async fn invoke(
        &self,
        notification: &N,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        match self {
            Listener::Typed(handler) => handler.handle(notification, cancel).await,
            Listener::Open(handler) => handler.handle(MessageRef::of(notification), cancel).await,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request stages
// ────────────────────────────────────────────────────────────────────────────

enum PreStep<R: Request> {
    Typed(Arc<dyn RequestPreProcessor<R>>),
    Open(Arc<dyn OpenRequestPreProcessor>),
}

impl<R: Request> PreStep<R> {
    async fn process(&self, request: &R, cancel: &CancellationSignal) -> Result<(), HandlerError> {
        match self {
            PreStep::Typed(processor) => processor.process(request, cancel).await,
            PreStep::Open(processor) => processor.process(MessageRef::of(request), cancel).await,
        }
    }
}

enum PostStep<R: Request> {
    Typed(Arc<dyn RequestPostProcessor<R>>),
    Open(Arc<dyn OpenRequestPostProcessor>),
}

impl<R: Request> PostStep<R> {
    async fn process(
        &self,
        request: &R,
        response: &R::Response,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        match self {
            PostStep::Typed(processor) => processor.process(request, response, cancel).await,
            PostStep::Open(processor) => {
                processor
                    .process(MessageRef::of(request), ResponseRef::of(response), cancel)
                    .await
            }
        }
    }
}

struct HandlerStage<R: Request> {
    pre: Vec<PreStep<R>>,
    handler: Arc<dyn RequestHandler<R>>,
    post: Vec<PostStep<R>>,
}

impl<R: Request> RequestStage<R> for HandlerStage<R> {
    fn run<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationSignal,
    ) -> BoxFuture<'a, Result<R::Response, HandlerError>> {
        Box::pin(async move {
            for processor in &self.pre {
                processor.process(request, cancel).await?;
            }
            let response = self.handler.handle(request, cancel).await?;
            for processor in &self.post {
                processor.process(request, &response, cancel).await?;
            }
            Ok(response)
        })
    }
}

struct BehaviorStage<R: Request> {
    behavior: Arc<dyn PipelineBehavior<R>>,
    next: Arc<dyn RequestStage<R>>,
}

impl<R: Request> RequestStage<R> for BehaviorStage<R> {
    fn run<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationSignal,
    ) -> BoxFuture<'a, Result<R::Response, HandlerError>> {
        self.behavior
            .handle(request, Next::new(self.next.as_ref()), cancel)
    }
}

struct OpenBehaviorStage<R: Request> {
    behavior: Arc<dyn OpenBehavior>,
    next: Arc<dyn RequestStage<R>>,
}

/// `next` bound to the request and signal the open behavior was called with.
struct BoundNext<'a, R: Request> {
    stage: &'a dyn RequestStage<R>,
    request: &'a R,
    cancel: &'a CancellationSignal,
}

impl<R: Request> ErasedNext for BoundNext<'_, R> {
    fn run(&self) -> BoxFuture<'_, Result<Opaque, HandlerError>> {
        Box::pin(async move {
            self.stage
                .run(self.request, self.cancel)
                .await
                .map(Opaque::new)
        })
    }
}

impl<R: Request> RequestStage<R> for OpenBehaviorStage<R> {
    fn run<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationSignal,
    ) -> BoxFuture<'a, Result<R::Response, HandlerError>> {
        Box::pin(async move {
            let bound = BoundNext {
                stage: self.next.as_ref(),
                request,
                cancel,
            };
            let opaque = self
                .behavior
                .handle(MessageRef::of(request), OpenNext::new(&bound), cancel)
                .await?;
            unwrap_opaque::<R::Response>(opaque)
        })
    }
}

fn unwrap_opaque<T: 'static>(opaque: Opaque) -> Result<T, HandlerError> {
    opaque.into_inner::<T>().map_err(|_| {
        HandlerError::new(ForeignResponse {
            expected: type_name::<T>(),
        })
    })
}

enum RequestLayer<R: Request> {
    Typed(Arc<dyn PipelineBehavior<R>>),
    Open(Arc<dyn OpenBehavior>),
}

impl<R: Request> RequestLayer<R> {
    fn wrap(self, next: Arc<dyn RequestStage<R>>) -> Arc<dyn RequestStage<R>> {
        match self {
            RequestLayer::Typed(behavior) => Arc::new(BehaviorStage { behavior, next }),
            RequestLayer::Open(behavior) => Arc::new(OpenBehaviorStage { behavior, next }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stream stages
// ────────────────────────────────────────────────────────────────────────────

struct StreamHandlerStage<S: StreamRequest> {
    handler: Arc<dyn StreamRequestHandler<S>>,
}

impl<S: StreamRequest> StreamStage<S> for StreamHandlerStage<S> {
    fn open(&self, request: Arc<S>, cancel: CancellationSignal) -> ItemStream<S::Item> {
        self.handler.handle(request, cancel)
    }
}

struct StreamBehaviorStage<S: StreamRequest> {
    behavior: Arc<dyn StreamPipelineBehavior<S>>,
    next: Arc<dyn StreamStage<S>>,
}

impl<S: StreamRequest> StreamStage<S> for StreamBehaviorStage<S> {
    fn open(&self, request: Arc<S>, cancel: CancellationSignal) -> ItemStream<S::Item> {
        self.behavior
            .handle(request, StreamNext::new(Arc::clone(&self.next)), cancel)
    }
}

struct OpenStreamBehaviorStage<S: StreamRequest> {
    behavior: Arc<dyn OpenStreamBehavior>,
    next: Arc<dyn StreamStage<S>>,
}

impl<S: StreamRequest> StreamStage<S> for OpenStreamBehaviorStage<S> {
    fn open(&self, request: Arc<S>, cancel: CancellationSignal) -> ItemStream<S::Item> {
        let next = Arc::clone(&self.next);
        let next_request = Arc::clone(&request);
        let next_cancel = cancel.clone();
        let next = OpenStreamNext::new(move || {
            next.open(next_request, next_cancel)
                .map_ok(Opaque::new)
                .boxed()
        });

        self.behavior
            .handle(SharedMessage::of(request), next, cancel)
            .map(|item| item.and_then(unwrap_opaque::<S::Item>))
            .boxed()
    }
}

enum StreamLayer<S: StreamRequest> {
    Typed(Arc<dyn StreamPipelineBehavior<S>>),
    Open(Arc<dyn OpenStreamBehavior>),
}

impl<S: StreamRequest> StreamLayer<S> {
    fn wrap(self, next: Arc<dyn StreamStage<S>>) -> Arc<dyn StreamStage<S>> {
        match self {
            StreamLayer::Typed(behavior) => Arc::new(StreamBehaviorStage { behavior, next }),
            StreamLayer::Open(behavior) => Arc::new(OpenStreamBehaviorStage { behavior, next }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Composer
// ────────────────────────────────────────────────────────────────────────────

pub(crate) struct PipelineComposer<'a> {
    resolver: &'a HandlerResolver,
    hierarchy: &'a TypeHierarchyResolver,
}

impl<'a> PipelineComposer<'a> {
    pub(crate) fn new(
        resolver: &'a HandlerResolver,
        hierarchy: &'a TypeHierarchyResolver,
    ) -> Self {
        Self {
            resolver,
            hierarchy,
        }
    }

    pub(crate) fn request<R: Request>(&self) -> Result<RequestPipeline<R>, ConfigurationError> {
        let message = TypeKey::of::<R>();
        let hierarchy = self.hierarchy.hierarchy_of(message, HierarchyRoot::Request);

        let pre = self.collect(
            Capability::RequestPreProcessor,
            message,
            hierarchy.iter().rev(),
            |instance| {
                if let Some(typed) = instance.downcast_ref::<Arc<dyn RequestPreProcessor<R>>>() {
                    return Some(PreStep::Typed(Arc::clone(typed)));
                }
                instance
                    .downcast_ref::<Arc<dyn OpenRequestPreProcessor>>()
                    .map(|open| PreStep::Open(Arc::clone(open)))
            },
        )?;
        let handler = self.resolver.one::<Arc<dyn RequestHandler<R>>>(&CapabilityKey::new(
            Capability::RequestHandler,
            message,
        ))?;
        let post = self.collect(
            Capability::RequestPostProcessor,
            message,
            hierarchy.iter().rev(),
            |instance| {
                if let Some(typed) = instance.downcast_ref::<Arc<dyn RequestPostProcessor<R>>>() {
                    return Some(PostStep::Typed(Arc::clone(typed)));
                }
                instance
                    .downcast_ref::<Arc<dyn OpenRequestPostProcessor>>()
                    .map(|open| PostStep::Open(Arc::clone(open)))
            },
        )?;

        let layers = self.collect(
            Capability::RequestBehavior,
            message,
            hierarchy.iter().rev(),
            |instance| {
                if let Some(typed) = instance.downcast_ref::<Arc<dyn PipelineBehavior<R>>>() {
                    return Some(RequestLayer::Typed(Arc::clone(typed)));
                }
                instance
                    .downcast_ref::<Arc<dyn OpenBehavior>>()
                    .map(|open| RequestLayer::Open(Arc::clone(open)))
            },
        )?;

        debug!(
            request = %message,
            behaviors = layers.len(),
            pre = pre.len(),
            post = post.len(),
            "composed request pipeline"
        );
        let terminal: Arc<dyn RequestStage<R>> = Arc::new(HandlerStage { pre, handler, post });
        let entry = layers
            .into_iter()
            .rev()
            .fold(terminal, |next, layer| layer.wrap(next));

        Ok(RequestPipeline { entry, hierarchy })
    }

    pub(crate) fn stream<S: StreamRequest>(&self) -> Result<StreamPipeline<S>, ConfigurationError> {
        let message = TypeKey::of::<S>();
        let handler = self.resolver.one::<Arc<dyn StreamRequestHandler<S>>>(&CapabilityKey::new(
            Capability::StreamHandler,
            message,
        ))?;

        let hierarchy = self.hierarchy.hierarchy_of(message, HierarchyRoot::StreamRequest);
        let layers = self.collect(
            Capability::StreamBehavior,
            message,
            hierarchy.iter().rev(),
            |instance| {
                if let Some(typed) = instance.downcast_ref::<Arc<dyn StreamPipelineBehavior<S>>>() {
                    return Some(StreamLayer::Typed(Arc::clone(typed)));
                }
                instance
                    .downcast_ref::<Arc<dyn OpenStreamBehavior>>()
                    .map(|open| StreamLayer::Open(Arc::clone(open)))
            },
        )?;

        debug!(stream = %message, behaviors = layers.len(), "composed stream pipeline");
        let terminal: Arc<dyn StreamStage<S>> = Arc::new(StreamHandlerStage { handler });
        let entry = layers
            .into_iter()
            .rev()
            .fold(terminal, |next, layer| layer.wrap(next));

        Ok(StreamPipeline { entry })
    }

    /// Listeners are ordered most-derived level first.
    pub(crate) fn notification<N: Notification>(
        &self,
    ) -> Result<NotificationPipeline<N>, ConfigurationError> {
        let message = TypeKey::of::<N>();
        let hierarchy = self.hierarchy.hierarchy_of(message, HierarchyRoot::Notification);
        let listeners = self.collect(
            Capability::NotificationHandler,
            message,
            hierarchy.iter(),
            |instance| {
                if let Some(typed) = instance.downcast_ref::<Arc<dyn NotificationHandler<N>>>() {
                    return Some(Listener::Typed(Arc::clone(typed)));
                }
                instance
                    .downcast_ref::<Arc<dyn OpenNotificationHandler>>()
                    .map(|open| Listener::Open(Arc::clone(open)))
            },
        )?;

        debug!(
            notification = %message,
            listeners = listeners.len(),
            "composed notification fan-out"
        );
        Ok(NotificationPipeline {
            listeners,
            hierarchy,
        })
    }

    /// Walks `levels`, classifying every instance registered for
    /// `capability` at each level. An unclassifiable instance at the
    /// concrete level is a malformed registration; at an ancestor level it
    /// belongs to another concrete type and is skipped.
    fn collect<'h, L>(
        &self,
        capability: Capability,
        message: TypeKey,
        levels: impl Iterator<Item = &'h TypeKey>,
        classify: impl Fn(&Instance) -> Option<L>,
    ) -> Result<Vec<L>, ConfigurationError> {
        let mut layers = Vec::new();
        for level in levels {
            let key = CapabilityKey::new(capability, *level);
            for instance in self.resolver.resolve_all(&key).iter() {
                match classify(instance) {
                    Some(layer) => layers.push(layer),
                    None if *level == message => {
                        return Err(ConfigurationError::CapabilityMismatch {
                            key,
                            expected: capability.as_str(),
                        });
                    }
                    None => trace!(%key, "skipping registration bound to another message type"),
                }
            }
        }
        Ok(layers)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cache
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PipelineKind {
    Request,
    Stream,
    Notification,
}

/// Composed pipelines keyed by (kind, message type).
///
/// Values are built outside the lock and published first-writer-wins, so
/// readers never see a half-built pipeline.
#[derive(Default)]
pub(crate) struct PipelineCache {
    entries: RwLock<HashMap<(PipelineKind, TypeKey), Arc<dyn Any + Send + Sync>>>,
}

impl PipelineCache {
    pub(crate) fn get_or_build<P: Send + Sync + 'static>(
        &self,
        kind: PipelineKind,
        message: TypeKey,
        build: impl FnOnce() -> Result<P, ConfigurationError>,
    ) -> Result<Arc<P>, ConfigurationError> {
        if let Some(found) = self.entries.read().get(&(kind, message)) {
            if let Ok(pipeline) = Arc::clone(found).downcast::<P>() {
                return Ok(pipeline);
            }
        }

        let built = Arc::new(build()?);
        let mut entries = self.entries.write();
        let published = entries
            .entry((kind, message))
            .or_insert_with(|| Arc::clone(&built) as Arc<dyn Any + Send + Sync>);
        Ok(Arc::clone(published).downcast::<P>().unwrap_or(built))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
