//! Exception subscriptions - observers and recoverers for handler failures.
//!
//! Both are keyed by (message type, response type or none, fault type) and
//! receive the message erased, since they may be registered against any
//! ancestor of the failed message.
//!
//! - [`ExceptionAction`]: observes; every matching action runs.
//! - [`ExceptionHandler`]: may mark the failure handled and, for requests,
//!   supply the substitute response. At most one per key.

use async_trait::async_trait;

use crate::domain::{CancellationSignal, ExceptionHandlingState, HandlerError, MessageRef};

#[async_trait]
pub trait ExceptionAction: Send + Sync {
    async fn execute(
        &self,
        message: MessageRef<'_>,
        error: &HandlerError,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError>;
}

/// `T` is the response type of the request, or `()` for notifications.
///
/// ```ignore
/// struct FallbackQuote;
///
/// #[async_trait]
/// impl ExceptionHandler<Quote> for FallbackQuote {
///     async fn handle(
///         &self,
///         _message: MessageRef<'_>,
///         _error: &HandlerError,
///         state: &mut ExceptionHandlingState<Quote>,
///         _cancel: &CancellationSignal,
///     ) -> Result<(), HandlerError> {
///         state.set_handled(Quote::stale());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ExceptionHandler<T: Send>: Send + Sync {
    async fn handle(
        &self,
        message: MessageRef<'_>,
        error: &HandlerError,
        state: &mut ExceptionHandlingState<T>,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError>;
}
