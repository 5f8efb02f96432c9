//! Ports - the boundary between the engine and its collaborators.
//!
//! Registration and instance ownership belong to an external service
//! locator; the engine only asks it for instances by capability shape.

pub mod service_locator;

pub use self::service_locator::{Instance, LocatorError, ServiceLocator};
