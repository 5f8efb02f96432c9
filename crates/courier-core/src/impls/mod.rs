//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **StaticRegistry**: `ServiceLocator` を実装する明示的なインメモリ登録リスト
//!
//! DI コンテナ向けのアダプタは別 crate に置く。

pub mod static_registry;

pub use self::static_registry::StaticRegistry;
