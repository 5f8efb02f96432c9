//! App - ディスパッチエンジン
//!
//! # 主要コンポーネント
//! - **TypeHierarchyResolver**: message / fault 型の順序付き祖先
//! - **HandlerResolver**: locator 参照と解決キャッシュ
//! - **PipelineComposer**: メッセージ型ごとのチェーンを組み立ててキャッシュ
//! - **ExceptionSubscriptionEngine**: fault × message 階層を探索する回復
//! - **Mediator / MediatorBuilder**: ファサードと fail-fast な構築

pub mod hierarchy;
pub mod resolver;
pub mod pipeline;
pub mod exceptions;
pub mod publish;
pub mod config;
pub mod mediator;
pub mod builder;

pub use self::hierarchy::{Hierarchy, TypeHierarchyResolver};
pub use self::resolver::HandlerResolver;
pub use self::publish::PublishStrategy;
pub use self::config::MediatorConfig;
pub use self::mediator::Mediator;
pub use self::builder::{BuildError, MediatorBuilder};
