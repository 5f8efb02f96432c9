//! Pre/post-processors - run strictly before and after the request handler,
//! inside the innermost behavior.
//!
//! Typed processors are bound to one request type. The open variants are
//! registered against an ancestor (or a root) and apply to every request
//! whose hierarchy contains it. Both are collected level by level, broadest
//! level first, registration order within a level.

use async_trait::async_trait;

use crate::domain::{CancellationSignal, HandlerError, MessageRef, Request, ResponseRef};

#[async_trait]
pub trait RequestPreProcessor<R: Request>: Send + Sync {
    async fn process(&self, request: &R, cancel: &CancellationSignal) -> Result<(), HandlerError>;
}

/// Sees the response only when the handler succeeded.
#[async_trait]
pub trait RequestPostProcessor<R: Request>: Send + Sync {
    async fn process(
        &self,
        request: &R,
        response: &R::Response,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError>;
}

#[async_trait]
pub trait OpenRequestPreProcessor: Send + Sync {
    async fn process(
        &self,
        request: MessageRef<'_>,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError>;
}

/// ```ignore
/// struct AllDone;
///
/// #[async_trait]
/// impl OpenRequestPostProcessor for AllDone {
///     async fn process(
///         &self,
///         request: MessageRef<'_>,
///         _response: ResponseRef<'_>,
///         _cancel: &CancellationSignal,
///     ) -> Result<(), HandlerError> {
///         tracing::info!(request = request.type_name(), "all done");
///         Ok(())
///     }
/// }
///
/// registry.open_post_processor::<Diagnostic, _>(AllDone);
/// ```
#[async_trait]
pub trait OpenRequestPostProcessor: Send + Sync {
    async fn process(
        &self,
        request: MessageRef<'_>,
        response: ResponseRef<'_>,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError>;
}
