//! Handler traits - the terminal stage of every pipeline.
//!
//! Typed handlers are bound to one concrete message type. Notification
//! listeners may also be registered against an ancestor type through
//! [`OpenNotificationHandler`], which sees an erased [`MessageRef`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{
    CancellationSignal, HandlerError, MessageRef, Notification, Request, StreamRequest,
};

/// Lazy, non-restartable sequence produced by a stream pipeline.
pub type ItemStream<T> = BoxStream<'static, Result<T, HandlerError>>;

/// Handles one request type and produces its response.
///
/// # 使用例
/// ```ignore
/// struct PingHandler;
///
/// #[async_trait]
/// impl RequestHandler<Ping> for PingHandler {
///     async fn handle(
///         &self,
///         ping: &Ping,
///         _cancel: &CancellationSignal,
///     ) -> Result<Pong, HandlerError> {
///         Ok(Pong(ping.0))
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(
        &self,
        request: &R,
        cancel: &CancellationSignal,
    ) -> Result<R::Response, HandlerError>;
}

/// Listens to one notification type.
#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync {
    async fn handle(&self, notification: &N, cancel: &CancellationSignal)
    -> Result<(), HandlerError>;
}

/// Listens to every notification whose hierarchy contains the type it was
/// registered against.
#[async_trait]
pub trait OpenNotificationHandler: Send + Sync {
    async fn handle(
        &self,
        notification: MessageRef<'_>,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError>;
}

/// Produces the item stream of one stream request type.
///
/// The returned stream owns everything it needs; production happens only
/// while the consumer polls it.
pub trait StreamRequestHandler<S: StreamRequest>: Send + Sync {
    fn handle(&self, request: Arc<S>, cancel: CancellationSignal) -> ItemStream<S::Item>;
}
