use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use thiserror::Error;
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use courier_core::domain::AnyRequest;
use courier_core::typed::{
    ExceptionHandler, ItemStream, NotificationHandler, Opaque, OpenBehavior, OpenNext,
    OpenNotificationHandler, OpenRequestPostProcessor, RequestHandler, StreamRequestHandler,
};
use courier_core::{
    CancellationSignal, CancellationSource, ExceptionHandlingState, HandlerError, Lineage,
    MediatorBuilder, MediatorConfig, MessageRef, Notification, Request, ResponseRef,
    StaticRegistry, StreamRequest, TypeKey,
};

/// Marker ancestor shared by every message the audit trail follows.
struct Auditable;
impl Lineage for Auditable {}

#[derive(Debug, Deserialize)]
struct Greet {
    name: String,
}

impl Lineage for Greet {
    fn parents() -> Vec<TypeKey> {
        vec![TypeKey::of::<Auditable>()]
    }
}

impl Request for Greet {
    type Response = String;
}

#[derive(Debug)]
struct UserJoined {
    name: String,
}

impl Lineage for UserJoined {
    fn parents() -> Vec<TypeKey> {
        vec![TypeKey::of::<Auditable>()]
    }
}

impl Notification for UserJoined {}

struct Countdown {
    from: u32,
}

impl Lineage for Countdown {}

impl StreamRequest for Countdown {
    type Item = u32;
}

#[derive(Debug, Error)]
#[error("greeter unavailable (left={0})")]
struct Unavailable(u32);

impl Lineage for Unavailable {}

struct GreetHandler {
    remaining_failures: AtomicU32,
}

impl GreetHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl RequestHandler<Greet> for GreetHandler {
    async fn handle(
        &self,
        greet: &Greet,
        _cancel: &CancellationSignal,
    ) -> Result<String, HandlerError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Unavailable(left).into());
        }
        Ok(format!("Hello, {}!", greet.name))
    }
}

/// Answers a failed greeting from a canned template.
struct CannedGreeting;

#[async_trait]
impl ExceptionHandler<String> for CannedGreeting {
    async fn handle(
        &self,
        message: MessageRef<'_>,
        error: &HandlerError,
        state: &mut ExceptionHandlingState<String>,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        if let Some(greet) = message.downcast_ref::<Greet>() {
            info!(%error, "serving canned greeting");
            state.set_handled(format!("Hello, {} (canned)", greet.name));
        }
        Ok(())
    }
}

/// Logs how long every request takes.
struct Timing;

#[async_trait]
impl OpenBehavior for Timing {
    async fn handle(
        &self,
        request: MessageRef<'_>,
        next: OpenNext<'_>,
        _cancel: &CancellationSignal,
    ) -> Result<Opaque, HandlerError> {
        let started = Instant::now();
        let result = next.run().await;
        info!(
            request = request.type_name(),
            elapsed = ?started.elapsed(),
            ok = result.is_ok(),
            "request finished"
        );
        result
    }
}

/// Post-processor for every `Auditable` request.
struct AllDone;

#[async_trait]
impl OpenRequestPostProcessor for AllDone {
    async fn process(
        &self,
        request: MessageRef<'_>,
        response: ResponseRef<'_>,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        if let Some(reply) = response.downcast_ref::<String>() {
            info!(request = request.type_name(), %reply, "all done");
        }
        Ok(())
    }
}

struct Welcome;

#[async_trait]
impl NotificationHandler<UserJoined> for Welcome {
    async fn handle(
        &self,
        joined: &UserJoined,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        println!("welcome aboard, {}", joined.name);
        Ok(())
    }
}

struct AuditTrail;

#[async_trait]
impl OpenNotificationHandler for AuditTrail {
    async fn handle(
        &self,
        notification: MessageRef<'_>,
        _cancel: &CancellationSignal,
    ) -> Result<(), HandlerError> {
        println!("audit: {}", notification.type_name());
        Ok(())
    }
}

struct Ticker;

impl StreamRequestHandler<Countdown> for Ticker {
    fn handle(&self, request: Arc<Countdown>, _cancel: CancellationSignal) -> ItemStream<u32> {
        stream::unfold(request.from, |n| async move {
            if n == 0 {
                return None;
            }
            sleep(Duration::from_millis(20)).await;
            Some((Ok(n), n - 1))
        })
        .boxed()
    }
}

/// `COURIER_CONFIG` may hold a JSON `MediatorConfig`.
fn load_config() -> Result<MediatorConfig, serde_json::Error> {
    match std::env::var("COURIER_CONFIG") {
        Ok(json) => MediatorConfig::from_json_str(&json),
        Err(_) => Ok(MediatorConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) 登録
    let mut registry = StaticRegistry::new();
    registry
        .request_handler::<Greet, _>(GreetHandler::new(1))
        .open_behavior::<AnyRequest, _>(Timing)
        .open_post_processor::<Auditable, _>(AllDone)
        .request_exception_handler::<Greet, String, Unavailable, _>(CannedGreeting)
        .notification_handler::<UserJoined, _>(Welcome)
        .open_notification_handler::<Auditable, _>(AuditTrail)
        .stream_handler::<Countdown, _>(Ticker);

    // (B) Mediator の構築（起動時に配線を検証）
    let config = load_config()?;
    info!(?config, "starting");
    let mediator = MediatorBuilder::new(Arc::new(registry))
        .config(config)
        .warm_request::<Greet>()
        .warm_notification::<UserJoined>()
        .warm_stream::<Countdown>()
        .build()?;

    // (C) send: 1 回目は失敗して canned 応答に、2 回目は成功
    let none = CancellationSignal::none();
    for _ in 0..2 {
        let greet: Greet = serde_json::from_value(serde_json::json!({ "name": "courier" }))?;
        println!("{}", mediator.send(greet, &none).await?);
    }

    // (D) publish
    mediator
        .publish(UserJoined { name: "courier".into() }, &none)
        .await?;

    // (E) stream: 3 件受け取ったらキャンセル
    let source = CancellationSource::new();
    let mut ticks = mediator.create_stream(Countdown { from: 10 }, source.signal())?;
    let mut received = 0;
    while let Some(tick) = ticks.next().await {
        println!("tick {}", tick?);
        received += 1;
        if received == 3 {
            source.cancel();
        }
    }
    println!("stream ended after {received} ticks");

    Ok(())
}
