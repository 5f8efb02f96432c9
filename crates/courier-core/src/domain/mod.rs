//! Domain - value types of the dispatch engine.
//!
//! - **lineage**: `Lineage`, `TypeKey`, hierarchy roots
//! - **message**: message shapes and erased views
//! - **capability**: locator keys
//! - **errors**: `HandlerError`, `ConfigurationError`, `MediatorError`
//! - **cancellation**: `CancellationSource` / `CancellationSignal`
//! - **exception_state**: `ExceptionHandlingState`

pub mod lineage;
pub mod message;
pub mod capability;
pub mod errors;
pub mod cancellation;
pub mod exception_state;

pub use self::lineage::{
    AnyFault, AnyMessage, AnyNotification, AnyRequest, AnyStreamRequest, HierarchyRoot, Lineage,
    TypeKey,
};
pub use self::message::{
    Message, MessageRef, Notification, Request, ResponseRef, SharedMessage, StreamRequest,
};
pub use self::capability::{Capability, CapabilityKey};
pub use self::errors::{
    AdHocFault, ConfigurationError, Fault, ForeignResponse, HandlerError, MediatorError,
};
pub use self::cancellation::{CancellationSignal, CancellationSource};
pub use self::exception_state::ExceptionHandlingState;
