//! Exception subscriptions: search order, unhandled propagation, handled
//! substitution, notification suppression and signal propagation.

mod support;

use async_trait::async_trait;
use courier_core::typed::{
    ExceptionAction, ExceptionHandler, NotificationHandler, PipelineBehavior, Next,
    RequestHandler,
};
use courier_core::{
    AnyFault, AnyNotification, CancellationSignal, CancellationSource, ExceptionHandlingState,
    HandlerError, Lineage, MediatorError, MessageRef, Notification, Request, StaticRegistry,
    TypeKey,
};
use rstest::rstest;
use support::{Journal, mediator};
use thiserror::Error;

// ── message lineage: SpecificReq(GeneralReq) ────────────────────────────────

struct GeneralReq;
impl Lineage for GeneralReq {}

#[derive(Debug)]
struct SpecificReq {
    id: u32,
}

impl Lineage for SpecificReq {
    fn parents() -> Vec<TypeKey> {
        vec![TypeKey::of::<GeneralReq>()]
    }
}

impl Request for SpecificReq {
    type Response = String;
}

// ── fault lineage: Derived(Base) ────────────────────────────────────────────

struct Base;
impl Lineage for Base {}

#[derive(Debug, Error, PartialEq)]
#[error("quota exceeded for request {0}")]
struct Derived(u32);

impl Lineage for Derived {
    fn parents() -> Vec<TypeKey> {
        vec![TypeKey::of::<Base>()]
    }
}

struct Failing;

#[async_trait]
impl RequestHandler<SpecificReq> for Failing {
    async fn handle(
        &self,
        request: &SpecificReq,
        _cancel: &CancellationSignal,
    ) -> Result<String, HandlerError> {
        Err(Derived(request.id).into())
    }
}

/// Marks the failure handled with a fixed response.
struct Answer(&'static str);

#[async_trait]
impl ExceptionHandler<String> for Answer {
    async fn handle(
        &self,
        _message: MessageRef<'_>,
        _error: &HandlerError,
        state: &mut ExceptionHandlingState<String>,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        state.set_handled(self.0.to_string());
        Ok(())
    }
}

/// Looks at the failure but leaves it unhandled.
struct Decline(Journal, &'static str);

#[async_trait]
impl ExceptionHandler<String> for Decline {
    async fn handle(
        &self,
        _message: MessageRef<'_>,
        _error: &HandlerError,
        _state: &mut ExceptionHandlingState<String>,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        self.0.record(self.1);
        Ok(())
    }
}

struct Observe(Journal, &'static str);

#[async_trait]
impl ExceptionAction for Observe {
    async fn execute(
        &self,
        message: MessageRef<'_>,
        error: &HandlerError,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        assert!(message.is::<SpecificReq>() || message.is::<Joined>());
        assert!(error.is::<Derived>());
        self.0.record(self.1);
        Ok(())
    }
}

fn failing_registry() -> StaticRegistry {
    let mut registry = StaticRegistry::new();
    registry.request_handler::<SpecificReq, _>(Failing);
    registry
}

async fn send(registry: StaticRegistry) -> Result<String, MediatorError> {
    mediator(registry)
        .send(SpecificReq { id: 7 }, &CancellationSignal::none())
        .await
}

#[tokio::test]
async fn most_specific_pair_wins() {
    let mut registry = failing_registry();
    registry
        .request_exception_handler::<GeneralReq, String, Base, _>(Answer("general/base"))
        .request_exception_handler::<SpecificReq, String, Derived, _>(Answer("specific/derived"));

    assert_eq!(send(registry).await.unwrap(), "specific/derived");
}

#[tokio::test]
async fn message_hierarchy_is_exhausted_before_widening_the_fault() {
    let mut registry = failing_registry();
    registry
        .request_exception_handler::<SpecificReq, String, Base, _>(Answer("specific/base"))
        .request_exception_handler::<GeneralReq, String, Derived, _>(Answer("general/derived"));

    assert_eq!(send(registry).await.unwrap(), "general/derived");
}

#[tokio::test]
async fn pairs_are_visited_fault_outer_message_inner() {
    let journal = Journal::new();
    let mut registry = failing_registry();
    registry
        .request_exception_action::<GeneralReq, String, Base, _>(Observe(
            journal.clone(),
            "base/general",
        ))
        .request_exception_action::<SpecificReq, String, Base, _>(Observe(
            journal.clone(),
            "base/specific",
        ))
        .request_exception_action::<GeneralReq, String, Derived, _>(Observe(
            journal.clone(),
            "derived/general",
        ))
        .request_exception_action::<SpecificReq, String, Derived, _>(Observe(
            journal.clone(),
            "derived/specific",
        ));

    let err = send(registry).await.unwrap_err();

    assert!(err.as_handler_error().is_some_and(|e| e.is::<Derived>()));
    assert_eq!(
        journal.entries(),
        vec!["derived/specific", "derived/general", "base/specific", "base/general"]
    );
}

#[tokio::test]
async fn declining_handlers_let_the_search_continue() {
    let journal = Journal::new();
    let mut registry = failing_registry();
    registry
        .request_exception_handler::<SpecificReq, String, Derived, _>(Decline(
            journal.clone(),
            "declined",
        ))
        .request_exception_handler::<SpecificReq, String, AnyFault, _>(Answer("fallback"));

    assert_eq!(send(registry).await.unwrap(), "fallback");
    assert_eq!(journal.entries(), vec!["declined"]);
}

#[rstest]
#[case::no_subscriptions(failing_registry())]
#[case::only_actions({
    let mut registry = failing_registry();
    registry
        .request_exception_action::<SpecificReq, String, Derived, _>(Observe(
            Journal::new(),
            "seen",
        ));
    registry
})]
#[case::other_response_type({
    let mut registry = failing_registry();
    registry.request_exception_handler::<SpecificReq, u64, Derived, _>(NumericAnswer);
    registry
})]
#[tokio::test]
async fn unhandled_failure_propagates_unchanged(#[case] registry: StaticRegistry) {
    let err = send(registry).await.unwrap_err();

    let original = err.into_handler_error().unwrap();
    assert_eq!(original.to_string(), "quota exceeded for request 7");
    assert_eq!(original.downcast::<Derived>().unwrap(), Derived(7));
}

struct NumericAnswer;

#[async_trait]
impl ExceptionHandler<u64> for NumericAnswer {
    async fn handle(
        &self,
        _message: MessageRef<'_>,
        _error: &HandlerError,
        state: &mut ExceptionHandlingState<u64>,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        state.set_handled(0);
        Ok(())
    }
}

/// Fails the request from inside the pipeline, after the handler.
struct Veto;

#[async_trait]
impl PipelineBehavior<SpecificReq> for Veto {
    async fn handle(
        &self,
        request: &SpecificReq,
        next: Next<'_, SpecificReq>,
        cancel: &CancellationSignal,
    ) -> Result<String, HandlerError> {
        next.run(request, cancel).await?;
        Err(Derived(request.id).into())
    }
}

#[tokio::test]
async fn behavior_failures_are_recovered_too() {
    struct Fine;

    #[async_trait]
    impl RequestHandler<SpecificReq> for Fine {
        async fn handle(
            &self,
            _request: &SpecificReq,
            _cancel: &CancellationSignal,
        ) -> Result<String, HandlerError> {
            Ok("fine".into())
        }
    }

    let mut registry = StaticRegistry::new();
    registry
        .request_handler::<SpecificReq, _>(Fine)
        .behavior::<SpecificReq, _>(Veto)
        .request_exception_handler::<GeneralReq, String, Base, _>(Answer("recovered"));

    assert_eq!(send(registry).await.unwrap(), "recovered");
}

// ── notifications ──────────────────────────────────────────────────────────

struct Joined;
impl Lineage for Joined {}
impl Notification for Joined {}

struct Grumpy(Journal);

#[async_trait]
impl NotificationHandler<Joined> for Grumpy {
    async fn handle(
        &self,
        _joined: &Joined,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        self.0.record("grumpy");
        Err(Derived(0).into())
    }
}

struct Cheerful(Journal);

#[async_trait]
impl NotificationHandler<Joined> for Cheerful {
    async fn handle(
        &self,
        _joined: &Joined,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        self.0.record("cheerful");
        Ok(())
    }
}

struct Suppress;

#[async_trait]
impl ExceptionHandler<()> for Suppress {
    async fn handle(
        &self,
        _message: MessageRef<'_>,
        _error: &HandlerError,
        state: &mut ExceptionHandlingState<()>,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        state.suppress();
        Ok(())
    }
}

#[tokio::test]
async fn notification_failure_propagates_unless_suppressed() {
    let journal = Journal::new();
    let mut registry = StaticRegistry::new();
    registry
        .notification_handler::<Joined, _>(Grumpy(journal.clone()))
        .notification_handler::<Joined, _>(Cheerful(journal.clone()))
        .notification_exception_action::<Joined, Derived, _>(Observe(journal.clone(), "observed"));

    let err = mediator(registry)
        .publish(Joined, &CancellationSignal::none())
        .await
        .unwrap_err();

    assert!(err.as_handler_error().is_some_and(|e| e.is::<Derived>()));
    assert_eq!(journal.entries(), vec!["grumpy", "observed"]);
}

#[tokio::test]
async fn suppressed_notification_failure_lets_the_fan_out_continue() {
    let journal = Journal::new();
    let mut registry = StaticRegistry::new();
    registry
        .notification_handler::<Joined, _>(Grumpy(journal.clone()))
        .notification_handler::<Joined, _>(Cheerful(journal.clone()))
        .notification_exception_handler::<AnyNotification, Base, _>(Suppress);

    mediator(registry)
        .publish(Joined, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(journal.entries(), vec!["grumpy", "cheerful"]);
}

// ── signal propagation ─────────────────────────────────────────────────────

/// Records whether it ran under a cancelled signal, then recovers.
struct Watchful(Journal, &'static str);

impl Watchful {
    fn note(&self, cancel: &CancellationSignal) {
        self.0.record(format!("{}:{}", self.1, cancel.is_cancelled()));
    }
}

#[async_trait]
impl ExceptionAction for Watchful {
    async fn execute(
        &self,
        _message: MessageRef<'_>,
        _error: &HandlerError,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        self.note(cancel);
        Ok(())
    }
}

#[async_trait]
impl ExceptionHandler<String> for Watchful {
    async fn handle(
        &self,
        _message: MessageRef<'_>,
        _error: &HandlerError,
        state: &mut ExceptionHandlingState<String>,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        self.note(cancel);
        state.set_handled(format!("recovered by {}", self.1));
        Ok(())
    }
}

#[async_trait]
impl ExceptionHandler<()> for Watchful {
    async fn handle(
        &self,
        _message: MessageRef<'_>,
        _error: &HandlerError,
        state: &mut ExceptionHandlingState<()>,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        self.note(cancel);
        state.suppress();
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler<Joined> for Watchful {
    async fn handle(
        &self,
        _joined: &Joined,
        cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        self.note(cancel);
        Err(Derived(1).into())
    }
}

fn cancelled() -> CancellationSignal {
    let source = CancellationSource::new();
    source.cancel();
    source.signal()
}

#[tokio::test]
async fn request_recovery_receives_the_callers_signal() {
    let journal = Journal::new();
    let mut registry = failing_registry();
    registry
        .request_exception_action::<SpecificReq, String, Derived, _>(Watchful(
            journal.clone(),
            "action",
        ))
        .request_exception_handler::<GeneralReq, String, AnyFault, _>(Watchful(
            journal.clone(),
            "handler",
        ));

    let response = mediator(registry)
        .send(SpecificReq { id: 7 }, &cancelled())
        .await
        .unwrap();

    assert_eq!(response, "recovered by handler");
    assert_eq!(journal.entries(), vec!["action:true", "handler:true"]);
}

#[tokio::test]
async fn notification_recovery_receives_the_callers_signal() {
    let journal = Journal::new();
    let mut registry = StaticRegistry::new();
    registry
        .notification_handler::<Joined, _>(Watchful(journal.clone(), "listener"))
        .notification_exception_action::<Joined, Derived, _>(Watchful(journal.clone(), "action"))
        .notification_exception_handler::<AnyNotification, Base, _>(Watchful(
            journal.clone(),
            "handler",
        ));

    mediator(registry)
        .publish(Joined, &cancelled())
        .await
        .unwrap();

    assert_eq!(
        journal.entries(),
        vec!["listener:true", "action:true", "handler:true"]
    );
}
