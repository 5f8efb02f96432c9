//! Typed - 利用者が実装する capability trait
//!
//! # 二層構造
//! - **Typed**: 具体的なメッセージ型 1 つに束縛（`RequestHandler<R>`,
//!   `PipelineBehavior<R>`, ...）
//! - **Open**: メッセージを型消去し、祖先型に登録できる（`OpenBehavior`,
//!   `OpenRequestPreProcessor`, `OpenNotificationHandler`, exception subscription）

pub mod handler;
pub mod behavior;
pub mod processor;
pub mod exception;

pub use self::handler::{
    ItemStream, NotificationHandler, OpenNotificationHandler, RequestHandler,
    StreamRequestHandler,
};
pub use self::behavior::{
    Next, Opaque, OpaqueStream, OpenBehavior, OpenNext, OpenStreamBehavior, OpenStreamNext,
    PipelineBehavior, StreamNext, StreamPipelineBehavior,
};
pub use self::processor::{
    OpenRequestPostProcessor, OpenRequestPreProcessor, RequestPostProcessor, RequestPreProcessor,
};
pub use self::exception::{ExceptionAction, ExceptionHandler};
