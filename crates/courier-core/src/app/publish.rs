//! Publish strategies - how a notification's listener invocations are awaited.

use std::future::Future;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{HandlerError, MediatorError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStrategy {
    /// One listener at a time in listener order; the first failure stops
    /// the fan-out and propagates.
    #[default]
    Sequential,

    /// Every listener started together; returns once all finished. Any
    /// failure is reported as `MediatorError::Aggregate` holding every
    /// failure in listener order.
    Concurrent,
}

impl PublishStrategy {
    /// Awaits `invocations` according to the strategy. Each future is one
    /// listener call including its recovery attempt.
    pub(crate) async fn dispatch<I>(self, invocations: I) -> Result<(), MediatorError>
    where
        I: IntoIterator,
        I::Item: Future<Output = Result<(), MediatorError>>,
    {
        match self {
            PublishStrategy::Sequential => {
                for invocation in invocations {
                    if let Err(error) = invocation.await {
                        warn!(%error, "listener failed, stopping sequential publish");
                        return Err(error);
                    }
                }
                Ok(())
            }
            PublishStrategy::Concurrent => {
                let mut failures: Vec<HandlerError> = Vec::new();
                for result in join_all(invocations).await {
                    match result {
                        Ok(()) => {}
                        Err(MediatorError::Handler(error)) => failures.push(error),
                        Err(MediatorError::Aggregate(nested)) => failures.extend(nested),
                        Err(configuration @ MediatorError::Configuration(_)) => {
                            return Err(configuration);
                        }
                    }
                }
                if failures.is_empty() {
                    return Ok(());
                }
                warn!(failed = failures.len(), "concurrent publish finished with failures");
                Err(MediatorError::Aggregate(failures))
            }
        }
    }
}
