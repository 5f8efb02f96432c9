//! ExceptionSubscriptionEngine - 失敗を exception subscription へ振り分ける
//!
//! # 探索順序
//! fault 階層が外側、message 階層が内側のループ。どちらも派生度の高い順。
//! 各 (fault, message) の組について:
//!
//! 1. その key の `ExceptionAction` をすべて実行（並行、全件を待つ）
//! 2. その key の `ExceptionHandler` があれば実行
//! 3. 共有 state が handled なら、その応答で回復を終える
//!
//! 両階層を使い切ったら未処理として扱い、呼び出し側は元の
//! `HandlerError` をそのまま返す。

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, trace, warn};

use super::hierarchy::TypeHierarchyResolver;
use super::resolver::HandlerResolver;
use crate::domain::{
    CancellationSignal, Capability, CapabilityKey, ExceptionHandlingState, HandlerError,
    HierarchyRoot, MediatorError, MessageRef, TypeKey,
};
use crate::typed::{ExceptionAction, ExceptionHandler};

pub(crate) struct ExceptionSubscriptionEngine<'a> {
    resolver: &'a HandlerResolver,
    hierarchy: &'a TypeHierarchyResolver,
}

impl<'a> ExceptionSubscriptionEngine<'a> {
    pub(crate) fn new(resolver: &'a HandlerResolver, hierarchy: &'a TypeHierarchyResolver) -> Self {
        Self {
            resolver,
            hierarchy,
        }
    }

    /// Offers `error` to the subscriptions of `message`.
    ///
    /// `response` is the response type key for requests and `None` for
    /// notifications (with `T = ()`).
    ///
    /// - `Ok(Some(_))`: handled, the value replaces the failed result
    /// - `Ok(None)`: unhandled
    /// - `Err(_)`: a subscription failed or is misconfigured
    pub(crate) async fn attempt_recover<T: Send + 'static>(
        &self,
        message: MessageRef<'_>,
        message_hierarchy: &[TypeKey],
        response: Option<TypeKey>,
        error: &HandlerError,
        cancel: &CancellationSignal,
    ) -> Result<Option<T>, MediatorError> {
        let faults = self
            .hierarchy
            .hierarchy_of(error.fault_type(), HierarchyRoot::Fault);
        let mut state = ExceptionHandlingState::<T>::new();

        for fault in faults.iter() {
            for level in message_hierarchy {
                let key = |capability: Capability| {
                    CapabilityKey::exception(capability, *level, response, *fault)
                };
                let actions = self
                    .resolver
                    .all::<Arc<dyn ExceptionAction>>(&key(Capability::ExceptionAction))?;
                let handler = self
                    .resolver
                    .optional::<Arc<dyn ExceptionHandler<T>>>(&key(Capability::ExceptionHandler))?;

                if !actions.is_empty() {
                    trace!(
                        message_type = %level,
                        %fault,
                        count = actions.len(),
                        "running exception actions"
                    );
                    let runs = actions
                        .iter()
                        .map(|action| action.execute(message, error, cancel));
                    let results = join_all(runs).await;
                    if let Some(failure) = results.into_iter().find_map(Result::err) {
                        warn!(
                            message_type = %level,
                            %fault,
                            error = %failure,
                            "exception action failed"
                        );
                        return Err(MediatorError::Handler(failure));
                    }
                }

                let Some(handler) = handler else {
                    continue;
                };
                handler.handle(message, error, &mut state, cancel).await?;
                if state.is_handled() {
                    debug!(message_type = %level, %fault, "failure recovered");
                    return Ok(state.into_response());
                }
            }
        }

        debug!(message_type = %message.key(), fault = %error.fault_type(), "failure unhandled");
        Ok(None)
    }
}
