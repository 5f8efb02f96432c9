//! MediatorBuilder - 配線と起動時検証
//!
//! # Fail-fast 設計
//! `warm_*` で指定したメッセージ型の pipeline は `build()` の中で組み立てる。
//! handler の欠落や不正な登録は最初のディスパッチではなくここで報告される。

use std::any::type_name;
use std::sync::Arc;

use tracing::debug;

use super::config::MediatorConfig;
use super::mediator::Mediator;
use super::publish::PublishStrategy;
use crate::domain::{ConfigurationError, Notification, Request, StreamRequest};
use crate::ports::ServiceLocator;

type Warmup = Box<dyn Fn(&Mediator) -> Result<(), ConfigurationError> + Send>;

/// ```ignore
/// let mediator = MediatorBuilder::new(Arc::new(registry))
///     .publish_strategy(PublishStrategy::Concurrent)
///     .warm_request::<Ping>()
///     .build()?;
/// ```
pub struct MediatorBuilder {
    locator: Arc<dyn ServiceLocator>,
    config: MediatorConfig,
    warmups: Vec<(&'static str, Warmup)>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("pipeline of {message} cannot be composed: {source}")]
    Warmup {
        message: &'static str,
        #[source]
        source: ConfigurationError,
    },
}

impl MediatorBuilder {
    pub fn new(locator: Arc<dyn ServiceLocator>) -> Self {
        Self {
            locator,
            config: MediatorConfig::default(),
            warmups: Vec::new(),
        }
    }

    pub fn config(mut self, config: MediatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn caching(mut self, enabled: bool) -> Self {
        self.config.caching_enabled = enabled;
        self
    }

    pub fn publish_strategy(mut self, strategy: PublishStrategy) -> Self {
        self.config.publish_strategy = strategy;
        self
    }

    pub fn warm_request<R: Request>(self) -> Self {
        self.warm::<R>(|mediator| mediator.request_pipeline::<R>().map(drop))
    }

    pub fn warm_stream<S: StreamRequest>(self) -> Self {
        self.warm::<S>(|mediator| mediator.stream_pipeline::<S>().map(drop))
    }

    pub fn warm_notification<N: Notification>(self) -> Self {
        self.warm::<N>(|mediator| mediator.notification_pipeline::<N>().map(drop))
    }

    fn warm<M: 'static>(
        mut self,
        compose: impl Fn(&Mediator) -> Result<(), ConfigurationError> + Send + 'static,
    ) -> Self {
        let compose: Warmup = Box::new(compose);
        self.warmups.push((type_name::<M>(), compose));
        self
    }

    /// Builds the mediator and composes every warmed pipeline.
    ///
    /// With caching enabled the composed pipelines are kept; without it
    /// they only validate the wiring.
    pub fn build(self) -> Result<Mediator, BuildError> {
        let mediator = Mediator::new(self.locator, self.config);
        for (message, compose) in self.warmups.iter() {
            let message = *message;
            compose(&mediator).map_err(|source| BuildError::Warmup { message, source })?;
            debug!(message_type = message, "pipeline warmed");
        }
        Ok(mediator)
    }
}
