//! Errors - failure types flowing through the engine.
//!
//! - [`HandlerError`]: anything a handler, behavior, processor or exception
//!   subscription raised. Carries the runtime fault type so the exception
//!   engine can walk its lineage.
//! - [`ConfigurationError`]: a static wiring defect found while building a
//!   pipeline. Never recovered.
//! - [`MediatorError`]: what the mediator entry points return.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use super::capability::CapabilityKey;
use super::lineage::{Lineage, TypeKey};

/// A failure type with declared lineage.
///
/// Implemented for every `std::error::Error` that also implements
/// [`Lineage`]; `?` turns any fault into a [`HandlerError`].
pub trait Fault: StdError + Lineage + Send + Sync {}

impl<T: StdError + Lineage + Send + Sync> Fault for T {}

/// Failure raised while handling a message.
///
/// The value moves through the pipeline untouched: when nothing recovers it,
/// the caller gets back the very error the handler produced.
pub struct HandlerError {
    fault: TypeKey,
    inner: Box<dyn StdError + Send + Sync>,
}

impl HandlerError {
    pub fn new<F: Fault>(fault: F) -> Self {
        Self {
            fault: TypeKey::of::<F>(),
            inner: Box::new(fault),
        }
    }

    /// Ad-hoc failure without a dedicated fault type.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(AdHocFault(message.into()))
    }

    /// Runtime type of the underlying fault.
    pub fn fault_type(&self) -> TypeKey {
        self.fault
    }

    pub fn is<F: Fault>(&self) -> bool {
        self.inner.is::<F>()
    }

    pub fn downcast_ref<F: Fault>(&self) -> Option<&F> {
        self.inner.downcast_ref::<F>()
    }

    pub fn downcast<F: Fault>(self) -> Result<F, Self> {
        if !self.inner.is::<F>() {
            return Err(self);
        }
        let fault = self.fault;
        self.inner
            .downcast::<F>()
            .map(|boxed| *boxed)
            .map_err(|inner| Self { fault, inner })
    }
}

impl<F: Fault> From<F> for HandlerError {
    fn from(fault: F) -> Self {
        Self::new(fault)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("fault", &self.fault)
            .field("inner", &self.inner)
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

/// Fault type of [`HandlerError::msg`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AdHocFault(pub String);

impl Lineage for AdHocFault {}

/// An open behavior returned a response that its own pipeline did not produce.
#[derive(Debug, Error)]
#[error("open behavior returned a response for another pipeline (expected {expected})")]
pub struct ForeignResponse {
    pub expected: &'static str,
}

impl Lineage for ForeignResponse {}

/// Static wiring defect, reported on first use of a message shape.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("no registration for {0}")]
    NotRegistered(CapabilityKey),

    #[error("{count} registrations for {key}; exactly one is allowed")]
    Ambiguous { key: CapabilityKey, count: usize },

    #[error("registration for {key} does not implement {expected}")]
    CapabilityMismatch {
        key: CapabilityKey,
        expected: &'static str,
    },
}

/// Error returned by the mediator entry points.
#[derive(Debug, Error)]
pub enum MediatorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The original handler failure (or the failure of an exception
    /// subscription that ran while recovering from it).
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Every failure of a concurrent publish, in registration order.
    #[error("{} notification handler(s) failed", .0.len())]
    Aggregate(Vec<HandlerError>),
}

impl MediatorError {
    pub fn as_handler_error(&self) -> Option<&HandlerError> {
        match self {
            MediatorError::Handler(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_handler_error(self) -> Result<HandlerError, Self> {
        match self {
            MediatorError::Handler(error) => Ok(error),
            other => Err(other),
        }
    }
}
