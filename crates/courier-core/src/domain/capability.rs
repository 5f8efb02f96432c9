//! Capability descriptors - the keys the service locator is queried with.

use std::fmt;

use super::lineage::TypeKey;

/// What a registered instance is able to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    RequestHandler,
    NotificationHandler,
    StreamHandler,
    RequestPreProcessor,
    RequestPostProcessor,
    RequestBehavior,
    StreamBehavior,
    ExceptionAction,
    ExceptionHandler,
}

impl Capability {
    /// Whether exactly one instance must be registered for a key.
    pub fn is_single(self) -> bool {
        matches!(
            self,
            Capability::RequestHandler | Capability::StreamHandler | Capability::ExceptionHandler
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::RequestHandler => "request handler",
            Capability::NotificationHandler => "notification handler",
            Capability::StreamHandler => "stream handler",
            Capability::RequestPreProcessor => "request pre-processor",
            Capability::RequestPostProcessor => "request post-processor",
            Capability::RequestBehavior => "request behavior",
            Capability::StreamBehavior => "stream behavior",
            Capability::ExceptionAction => "exception action",
            Capability::ExceptionHandler => "exception handler",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete capability shape: (capability, message, response?, fault?).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityKey {
    pub capability: Capability,
    pub message: TypeKey,
    pub response: Option<TypeKey>,
    pub fault: Option<TypeKey>,
}

impl CapabilityKey {
    pub fn new(capability: Capability, message: TypeKey) -> Self {
        Self {
            capability,
            message,
            response: None,
            fault: None,
        }
    }

    /// Key of an exception action or handler.
    pub fn exception(
        capability: Capability,
        message: TypeKey,
        response: Option<TypeKey>,
        fault: TypeKey,
    ) -> Self {
        Self {
            capability,
            message,
            response,
            fault: Some(fault),
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}", self.capability, self.message)?;
        if let Some(response) = self.response {
            write!(f, ", {response}")?;
        }
        if let Some(fault) = self.fault {
            write!(f, ", {fault}")?;
        }
        f.write_str(">")
    }
}
