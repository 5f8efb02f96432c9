//! StaticRegistry - explicit registration list implementing `ServiceLocator`.
//!
//! Every registration method wraps the typed instance into the
//! `Arc<dyn Capability>` the engine downcasts to, and files it under the
//! concrete [`CapabilityKey`] it serves.
//!
//! ```ignore
//! let mut registry = StaticRegistry::new();
//! registry
//!     .request_handler::<Ping, _>(PingHandler)
//!     .behavior::<Ping, _>(Timing)
//!     .open_behavior::<AnyRequest, _>(Tracing)
//!     .request_exception_handler::<Ping, Pong, Timeout, _>(FallbackPong);
//! let mediator = MediatorBuilder::new(Arc::new(registry)).build()?;
//! ```
//!
//! Duplicates are accepted here; single-registration capabilities report
//! them as `AmbiguousRegistration` when resolved.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::domain::{
    Capability, CapabilityKey, Lineage, Notification, Request, StreamRequest, TypeKey,
};
use crate::ports::{Instance, LocatorError, ServiceLocator};
use crate::typed::{
    ExceptionAction, ExceptionHandler, NotificationHandler, OpenBehavior,
    OpenNotificationHandler, OpenRequestPostProcessor, OpenRequestPreProcessor,
    OpenStreamBehavior, PipelineBehavior, RequestHandler, RequestPostProcessor,
    RequestPreProcessor, StreamPipelineBehavior, StreamRequestHandler,
};

#[derive(Default)]
pub struct StaticRegistry {
    entries: HashMap<CapabilityKey, Vec<Instance>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Files an already erased instance under `key`.
    pub fn add(&mut self, key: CapabilityKey, instance: Instance) -> &mut Self {
        trace!(%key, "registered");
        self.entries.entry(key).or_default().push(instance);
        self
    }

    pub fn request_handler<R, H>(&mut self, handler: H) -> &mut Self
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        let handler: Arc<dyn RequestHandler<R>> = Arc::new(handler);
        self.add(
            CapabilityKey::new(Capability::RequestHandler, TypeKey::of::<R>()),
            Arc::new(handler),
        )
    }

    pub fn notification_handler<N, H>(&mut self, handler: H) -> &mut Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        let handler: Arc<dyn NotificationHandler<N>> = Arc::new(handler);
        self.add(
            CapabilityKey::new(Capability::NotificationHandler, TypeKey::of::<N>()),
            Arc::new(handler),
        )
    }

    /// Listener for every notification whose hierarchy contains `A`.
    pub fn open_notification_handler<A, H>(&mut self, handler: H) -> &mut Self
    where
        A: Lineage,
        H: OpenNotificationHandler + 'static,
    {
        let handler: Arc<dyn OpenNotificationHandler> = Arc::new(handler);
        self.add(
            CapabilityKey::new(Capability::NotificationHandler, TypeKey::of::<A>()),
            Arc::new(handler),
        )
    }

    pub fn stream_handler<S, H>(&mut self, handler: H) -> &mut Self
    where
        S: StreamRequest,
        H: StreamRequestHandler<S> + 'static,
    {
        let handler: Arc<dyn StreamRequestHandler<S>> = Arc::new(handler);
        self.add(
            CapabilityKey::new(Capability::StreamHandler, TypeKey::of::<S>()),
            Arc::new(handler),
        )
    }

    pub fn pre_processor<R, P>(&mut self, processor: P) -> &mut Self
    where
        R: Request,
        P: RequestPreProcessor<R> + 'static,
    {
        let processor: Arc<dyn RequestPreProcessor<R>> = Arc::new(processor);
        self.add(
            CapabilityKey::new(Capability::RequestPreProcessor, TypeKey::of::<R>()),
            Arc::new(processor),
        )
    }

    pub fn post_processor<R, P>(&mut self, processor: P) -> &mut Self
    where
        R: Request,
        P: RequestPostProcessor<R> + 'static,
    {
        let processor: Arc<dyn RequestPostProcessor<R>> = Arc::new(processor);
        self.add(
            CapabilityKey::new(Capability::RequestPostProcessor, TypeKey::of::<R>()),
            Arc::new(processor),
        )
    }

    /// Pre-processor for every request whose hierarchy contains `A`.
    pub fn open_pre_processor<A, P>(&mut self, processor: P) -> &mut Self
    where
        A: Lineage,
        P: OpenRequestPreProcessor + 'static,
    {
        let processor: Arc<dyn OpenRequestPreProcessor> = Arc::new(processor);
        self.add(
            CapabilityKey::new(Capability::RequestPreProcessor, TypeKey::of::<A>()),
            Arc::new(processor),
        )
    }

    /// Post-processor for every request whose hierarchy contains `A`.
    pub fn open_post_processor<A, P>(&mut self, processor: P) -> &mut Self
    where
        A: Lineage,
        P: OpenRequestPostProcessor + 'static,
    {
        let processor: Arc<dyn OpenRequestPostProcessor> = Arc::new(processor);
        self.add(
            CapabilityKey::new(Capability::RequestPostProcessor, TypeKey::of::<A>()),
            Arc::new(processor),
        )
    }

    pub fn behavior<R, B>(&mut self, behavior: B) -> &mut Self
    where
        R: Request,
        B: PipelineBehavior<R> + 'static,
    {
        let behavior: Arc<dyn PipelineBehavior<R>> = Arc::new(behavior);
        self.add(
            CapabilityKey::new(Capability::RequestBehavior, TypeKey::of::<R>()),
            Arc::new(behavior),
        )
    }

    /// Behavior for every request whose hierarchy contains `A`.
    pub fn open_behavior<A, B>(&mut self, behavior: B) -> &mut Self
    where
        A: Lineage,
        B: OpenBehavior + 'static,
    {
        let behavior: Arc<dyn OpenBehavior> = Arc::new(behavior);
        self.add(
            CapabilityKey::new(Capability::RequestBehavior, TypeKey::of::<A>()),
            Arc::new(behavior),
        )
    }

    pub fn stream_behavior<S, B>(&mut self, behavior: B) -> &mut Self
    where
        S: StreamRequest,
        B: StreamPipelineBehavior<S> + 'static,
    {
        let behavior: Arc<dyn StreamPipelineBehavior<S>> = Arc::new(behavior);
        self.add(
            CapabilityKey::new(Capability::StreamBehavior, TypeKey::of::<S>()),
            Arc::new(behavior),
        )
    }

    /// Behavior for every stream request whose hierarchy contains `A`.
    pub fn open_stream_behavior<A, B>(&mut self, behavior: B) -> &mut Self
    where
        A: Lineage,
        B: OpenStreamBehavior + 'static,
    {
        let behavior: Arc<dyn OpenStreamBehavior> = Arc::new(behavior);
        self.add(
            CapabilityKey::new(Capability::StreamBehavior, TypeKey::of::<A>()),
            Arc::new(behavior),
        )
    }

    /// Action observing `F` (or any fault descending from it) raised while
    /// handling `M` (or any request descending from it) with response `T`.
    pub fn request_exception_action<M, T, F, A>(&mut self, action: A) -> &mut Self
    where
        M: Lineage,
        T: 'static,
        F: Lineage,
        A: ExceptionAction + 'static,
    {
        self.exception_action(
            TypeKey::of::<M>(),
            Some(TypeKey::leaf::<T>()),
            TypeKey::of::<F>(),
            action,
        )
    }

    pub fn request_exception_handler<M, T, F, H>(&mut self, handler: H) -> &mut Self
    where
        M: Lineage,
        T: Send + 'static,
        F: Lineage,
        H: ExceptionHandler<T> + 'static,
    {
        self.exception_handler(
            TypeKey::of::<M>(),
            Some(TypeKey::leaf::<T>()),
            TypeKey::of::<F>(),
            handler,
        )
    }

    pub fn notification_exception_action<M, F, A>(&mut self, action: A) -> &mut Self
    where
        M: Lineage,
        F: Lineage,
        A: ExceptionAction + 'static,
    {
        self.exception_action(TypeKey::of::<M>(), None, TypeKey::of::<F>(), action)
    }

    pub fn notification_exception_handler<M, F, H>(&mut self, handler: H) -> &mut Self
    where
        M: Lineage,
        F: Lineage,
        H: ExceptionHandler<()> + 'static,
    {
        self.exception_handler(TypeKey::of::<M>(), None, TypeKey::of::<F>(), handler)
    }

    fn exception_action<A: ExceptionAction + 'static>(
        &mut self,
        message: TypeKey,
        response: Option<TypeKey>,
        fault: TypeKey,
        action: A,
    ) -> &mut Self {
        let action: Arc<dyn ExceptionAction> = Arc::new(action);
        self.add(
            CapabilityKey::exception(Capability::ExceptionAction, message, response, fault),
            Arc::new(action),
        )
    }

    fn exception_handler<T: Send + 'static, H: ExceptionHandler<T> + 'static>(
        &mut self,
        message: TypeKey,
        response: Option<TypeKey>,
        fault: TypeKey,
        handler: H,
    ) -> &mut Self {
        let handler: Arc<dyn ExceptionHandler<T>> = Arc::new(handler);
        self.add(
            CapabilityKey::exception(Capability::ExceptionHandler, message, response, fault),
            Arc::new(handler),
        )
    }

    pub fn registered_keys(&self) -> Vec<CapabilityKey> {
        self.entries.keys().copied().collect()
    }

    /// Number of registered instances across all keys.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ServiceLocator for StaticRegistry {
    fn resolve_one(&self, key: &CapabilityKey) -> Result<Instance, LocatorError> {
        match self.entries.get(key).map(Vec::as_slice) {
            None | Some([]) => Err(LocatorError::NotRegistered(*key)),
            Some([instance]) => Ok(Arc::clone(instance)),
            Some(many) => Err(LocatorError::AmbiguousRegistration {
                key: *key,
                count: many.len(),
            }),
        }
    }

    fn resolve_all(&self, key: &CapabilityKey) -> Vec<Instance> {
        self.entries.get(key).cloned().unwrap_or_default()
    }
}
