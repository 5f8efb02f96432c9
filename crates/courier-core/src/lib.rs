//! courier-core
//!
//! プロセス内メッセージディスパッチ: 応答を 1 つ返す request、複数の
//! listener へ配る notification、遅延生成される stream。どれも順序付き
//! behavior で包まれ、失敗は型階層に沿って回復を試みる。
//!
//! # モジュール構成
//! - **domain**: 値型（lineage, message, capability key, error, cancellation）
//! - **ports**: `ServiceLocator` - 登録済みインスタンスの取得元
//! - **typed**: capability trait（handler, behavior, processor, exception subscription）
//! - **impls**: `StaticRegistry`
//! - **app**: 階層 / handler 解決、pipeline 組み立て、回復、`Mediator`

pub mod domain;
pub mod ports;
pub mod typed;
pub mod impls;
pub mod app;

pub use crate::app::{BuildError, Mediator, MediatorBuilder, MediatorConfig, PublishStrategy};
pub use crate::domain::{
    AnyFault, AnyMessage, AnyNotification, AnyRequest, AnyStreamRequest, CancellationSignal,
    CancellationSource, ConfigurationError, ExceptionHandlingState, HandlerError, Lineage,
    MediatorError, MessageRef, Notification, Request, ResponseRef, SharedMessage, StreamRequest,
    TypeKey,
};
pub use crate::impls::StaticRegistry;
pub use crate::ports::ServiceLocator;
