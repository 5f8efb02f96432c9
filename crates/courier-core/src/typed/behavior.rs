//! Behavior trait - 次の段の呼び出しを包むデコレータ
//!
//! # 二層構造
//! - **Typed**: `PipelineBehavior<R>`, `StreamPipelineBehavior<S>` - 具体的な
//!   メッセージ 1 つに束縛され、型付きの応答を見る
//! - **Open**: `OpenBehavior`, `OpenStreamBehavior` - 階層内の任意の型（root
//!   を含む）に登録でき、型消去されたメッセージと、次の段しか作れない
//!   [`Opaque`] 応答を見る

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use super::handler::ItemStream;
use crate::domain::{
    CancellationSignal, HandlerError, MessageRef, Request, SharedMessage, StreamRequest,
};

/// One composed step of a request pipeline.
pub(crate) trait RequestStage<R: Request>: Send + Sync {
    fn run<'a>(
        &'a self,
        request: &'a R,
        cancel: &'a CancellationSignal,
    ) -> BoxFuture<'a, Result<R::Response, HandlerError>>;
}

/// One composed step of a stream pipeline.
pub(crate) trait StreamStage<S: StreamRequest>: Send + Sync {
    fn open(&self, request: Arc<S>, cancel: CancellationSignal) -> ItemStream<S::Item>;
}

/// The rest of a request pipeline, as seen by a behavior.
pub struct Next<'a, R: Request> {
    stage: &'a dyn RequestStage<R>,
}

impl<'a, R: Request> Next<'a, R> {
    pub(crate) fn new(stage: &'a dyn RequestStage<R>) -> Self {
        Self { stage }
    }

    pub async fn run(
        self,
        request: &R,
        cancel: &CancellationSignal,
    ) -> Result<R::Response, HandlerError> {
        self.stage.run(request, cancel).await
    }
}

/// Wraps the handling of one request type.
///
/// ```ignore
/// struct Timing;
///
/// #[async_trait]
/// impl PipelineBehavior<Ping> for Timing {
///     async fn handle(&self, ping: &Ping, next: Next<'_, Ping>, cancel: &CancellationSignal)
///         -> Result<Pong, HandlerError>
///     {
///         let started = Instant::now();
///         let pong = next.run(ping, cancel).await;
///         tracing::debug!(elapsed = ?started.elapsed(), "ping handled");
///         pong
///     }
/// }
/// ```
#[async_trait]
pub trait PipelineBehavior<R: Request>: Send + Sync {
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R>,
        cancel: &CancellationSignal,
    ) -> Result<R::Response, HandlerError>;
}

/// Response of an unknown type travelling through an open behavior.
pub struct Opaque(Box<dyn Any + Send>);

impl Opaque {
    pub(crate) fn new<T: Send + 'static>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub(crate) fn into_inner<T: 'static>(self) -> Result<T, Self> {
        self.0.downcast::<T>().map(|boxed| *boxed).map_err(Self)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

pub(crate) trait ErasedNext: Send + Sync {
    fn run(&self) -> BoxFuture<'_, Result<Opaque, HandlerError>>;
}

/// The rest of a request pipeline, as seen by an open behavior. Runs with
/// the request and cancellation signal the behavior received.
pub struct OpenNext<'a> {
    inner: &'a dyn ErasedNext,
}

impl<'a> OpenNext<'a> {
    pub(crate) fn new(inner: &'a dyn ErasedNext) -> Self {
        Self { inner }
    }

    pub async fn run(self) -> Result<Opaque, HandlerError> {
        self.inner.run().await
    }
}

/// Wraps every request whose hierarchy contains the registration type.
#[async_trait]
pub trait OpenBehavior: Send + Sync {
    async fn handle(
        &self,
        request: MessageRef<'_>,
        next: OpenNext<'_>,
        cancel: &CancellationSignal,
    ) -> Result<Opaque, HandlerError>;
}

/// The rest of a stream pipeline, as seen by a stream behavior.
pub struct StreamNext<S: StreamRequest> {
    stage: Arc<dyn StreamStage<S>>,
}

impl<S: StreamRequest> StreamNext<S> {
    pub(crate) fn new(stage: Arc<dyn StreamStage<S>>) -> Self {
        Self { stage }
    }

    pub fn run(self, request: Arc<S>, cancel: CancellationSignal) -> ItemStream<S::Item> {
        self.stage.open(request, cancel)
    }
}

/// Wraps the item stream of one stream request type.
pub trait StreamPipelineBehavior<S: StreamRequest>: Send + Sync {
    fn handle(
        &self,
        request: Arc<S>,
        next: StreamNext<S>,
        cancel: CancellationSignal,
    ) -> ItemStream<S::Item>;
}

pub type OpaqueStream = BoxStream<'static, Result<Opaque, HandlerError>>;

/// The rest of a stream pipeline, as seen by an open stream behavior.
pub struct OpenStreamNext {
    open: Box<dyn FnOnce() -> OpaqueStream + Send>,
}

impl OpenStreamNext {
    pub(crate) fn new(open: impl FnOnce() -> OpaqueStream + Send + 'static) -> Self {
        Self {
            open: Box::new(open),
        }
    }

    pub fn run(self) -> OpaqueStream {
        (self.open)()
    }
}

/// Wraps every stream whose hierarchy contains the registration type.
pub trait OpenStreamBehavior: Send + Sync {
    fn handle(
        &self,
        request: SharedMessage,
        next: OpenStreamNext,
        cancel: CancellationSignal,
    ) -> OpaqueStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_only_unwraps_to_the_stored_type() {
        let value = Opaque::new(41u32);
        let value = value.into_inner::<String>().unwrap_err();
        assert_eq!(value.into_inner::<u32>().unwrap(), 41);
    }
}
