//! Message shapes and type-erased message views.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::lineage::{Lineage, TypeKey};

/// Anything that can be dispatched. Identity is the concrete type.
pub trait Message: Lineage + Send + Sync + 'static {}

impl<T: Lineage + Send + Sync + 'static> Message for T {}

/// A message with exactly one handler producing `Response`.
pub trait Request: Message {
    type Response: Send + Sync + 'static;
}

/// A message broadcast to zero or more handlers.
pub trait Notification: Message {}

/// A message whose handler produces a lazy sequence of `Item`.
pub trait StreamRequest: Message {
    type Item: Send + 'static;
}

/// Borrowed, erased view of a message.
///
/// Subscribers registered against an ancestor type receive this instead of
/// the concrete message and downcast when they know more.
#[derive(Clone, Copy)]
pub struct MessageRef<'a> {
    key: TypeKey,
    value: &'a (dyn Any + Send + Sync),
}

impl<'a> MessageRef<'a> {
    pub fn of<M: Message>(message: &'a M) -> Self {
        Self {
            key: TypeKey::of::<M>(),
            value: message,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&'a T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for MessageRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRef").field("type", &self.key).finish()
    }
}

/// Borrowed, erased view of a response, handed to open post-processors.
#[derive(Clone, Copy)]
pub struct ResponseRef<'a> {
    key: TypeKey,
    value: &'a (dyn Any + Send + Sync),
}

impl<'a> ResponseRef<'a> {
    pub fn of<T: Send + Sync + 'static>(response: &'a T) -> Self {
        Self {
            key: TypeKey::leaf::<T>(),
            value: response,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&'a T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for ResponseRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseRef").field("type", &self.key).finish()
    }
}

/// Owned, erased view of a message. Used where the view must outlive the
/// call that produced it (stream pipelines).
#[derive(Clone)]
pub struct SharedMessage {
    key: TypeKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl SharedMessage {
    pub fn of<M: Message>(message: Arc<M>) -> Self {
        Self {
            key: TypeKey::of::<M>(),
            value: message,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn view(&self) -> MessageRef<'_> {
        MessageRef {
            key: self.key,
            value: self.value.as_ref(),
        }
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

impl fmt::Debug for SharedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMessage").field("type", &self.key).finish()
    }
}
