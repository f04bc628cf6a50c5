//! End-to-end coverage of the deferred pipeline: a directive arrives at the
//! synchronous boundary, is relayed, consumed out-of-band, and its result is
//! posted to the event callback with the user's stored credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;

use hearth_auth::{
    FsObjectStore, OAuthClient, OAuthConfig, OAuthToken, ObjectTokenStore, ProfileUserIdResolver,
    TokenStore,
};
use hearth_deferred::{DeferredError, DeferredHandler, HttpEventSender};
use hearth_relay::{InMemoryQueue, QueueWorker, RelayPublisher, WorkerError};
use hearth_skill::types::{ContextProperty, NAMESPACE_POWER_CONTROLLER};
use hearth_skill::{
    DeferredRelayHandler, DirectiveHandler, NamespaceRouter, PowerControllerHandler, Request,
    Response, ResponseBuilder, SkillError,
};
use tokio::sync::watch;

const TURN_ON_DIRECTIVE: &str = r#"{
    "directive": {
        "header": {
            "namespace": "Alexa.PowerController",
            "name": "TurnOn",
            "payloadVersion": "3",
            "messageId": "directive-1",
            "correlationToken": "corr-1"
        },
        "endpoint": {
            "scope": { "type": "BearerToken", "token": "bearer-1" },
            "endpointId": "switch-1",
            "cookie": {}
        },
        "payload": {}
    }
}"#;

struct PowerOnHandler {
    builder: ResponseBuilder,
}

#[async_trait]
impl DirectiveHandler for PowerOnHandler {
    async fn handle(&self, request: &Request) -> Result<Option<Response>, SkillError> {
        Ok(Some(self.builder.basic_response(
            request,
            vec![ContextProperty {
                namespace: NAMESPACE_POWER_CONTROLLER.to_string(),
                name: "powerState".to_string(),
                value: json!("ON"),
                time_of_sample: chrono::Utc::now(),
                uncertainty_in_milliseconds: 500,
            }],
        )))
    }
}

struct FailingHandler;

#[async_trait]
impl DirectiveHandler for FailingHandler {
    async fn handle(&self, _request: &Request) -> Result<Option<Response>, SkillError> {
        Err(SkillError::Handler(anyhow::anyhow!("device offline")))
    }
}

struct Pipeline {
    queue: Arc<InMemoryQueue>,
    entry_router: NamespaceRouter,
    worker: QueueWorker,
    cancel_tx: watch::Sender<bool>,
    tokens: Arc<ObjectTokenStore>,
    _token_dir: tempfile::TempDir,
}

fn build_pipeline(server: &MockServer, worker_handler: Arc<dyn DirectiveHandler>) -> Pipeline {
    let queue = Arc::new(InMemoryQueue::new());
    let builder = ResponseBuilder::new();

    let mut entry_router = NamespaceRouter::new();
    entry_router.register(
        NAMESPACE_POWER_CONTROLLER,
        Arc::new(DeferredRelayHandler::new(
            Arc::new(RelayPublisher::new(queue.clone())),
            builder.clone(),
        )),
    );

    let token_dir = tempfile::tempdir().expect("tempdir");
    let tokens = Arc::new(ObjectTokenStore::new(Arc::new(FsObjectStore::new(
        token_dir.path(),
    ))));

    let http = reqwest::Client::new();
    let sender = Arc::new(HttpEventSender::new(
        http.clone(),
        server.url("/v3/events"),
        tokens.clone(),
        Arc::new(ProfileUserIdResolver::new(
            http.clone(),
            server.url("/user/profile"),
        )),
        OAuthClient::new(
            http,
            OAuthConfig::new("client-1", "secret-1").with_token_url(server.url("/auth/o2/token")),
        ),
    ));

    let mut worker_router = NamespaceRouter::new();
    worker_router.register(NAMESPACE_POWER_CONTROLLER, worker_handler);
    let deferred = DeferredHandler::new(Arc::new(worker_router), sender);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let worker = QueueWorker::new(
        queue.clone(),
        deferred,
        Duration::from_millis(50),
        cancel_rx,
    );

    Pipeline {
        queue,
        entry_router,
        worker,
        cancel_tx,
        tokens,
        _token_dir: token_dir,
    }
}

fn power_on_worker_handler() -> Arc<dyn DirectiveHandler> {
    Arc::new(PowerControllerHandler::new(
        Arc::new(PowerOnHandler {
            builder: ResponseBuilder::new(),
        }),
        Arc::new(FailingHandler),
    ))
}

#[tokio::test]
async fn turn_on_is_deferred_processed_and_posted_back() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/user/profile")
            .header("authorization", "Bearer bearer-1");
        then.status(200)
            .json_body(json!({ "user_id": "amzn1.account.AAA" }));
    });
    let event_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/events")
            .header("authorization", "Bearer access-1")
            .body_includes("\"name\":\"Response\"")
            .body_includes("\"correlationToken\":\"corr-1\"")
            .body_includes("\"endpointId\":\"switch-1\"")
            .body_includes("\"powerState\"");
        then.status(202);
    });

    let pipeline = build_pipeline(&server, power_on_worker_handler());
    pipeline
        .tokens
        .write(
            "amzn1.account.AAA",
            &OAuthToken {
                access_token: "access-1".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                token_type: Some("bearer".to_string()),
                expires_at: None,
            },
        )
        .await
        .expect("seed token");

    // Synchronous boundary: the directive is acknowledged as deferred.
    let request: Request = serde_json::from_str(TURN_ON_DIRECTIVE).expect("directive must decode");
    let ack = pipeline
        .entry_router
        .dispatch(&request)
        .await
        .expect("dispatch must succeed")
        .expect("a deferred acknowledgment must be returned");
    assert_eq!(ack.event.header.name, "DeferredResponse");
    assert_eq!(ack.event.header.correlation_token.as_deref(), Some("corr-1"));
    assert_ne!(ack.event.header.message_id, "directive-1");
    assert_eq!(pipeline.queue.len().await, 1);

    // Out-of-band: the worker consumes the message and posts the result.
    // A watcher cancels the loop once the queue drains so process() returns.
    let queue = pipeline.queue.clone();
    let cancel_tx = pipeline.cancel_tx;
    let watcher = tokio::spawn(async move {
        while !queue.is_empty().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel_tx.send(true).ok();
    });
    tokio::time::timeout(Duration::from_secs(5), pipeline.worker.process())
        .await
        .expect("worker must exit after cancellation")
        .expect("worker pass must succeed");
    watcher.await.expect("watcher must not panic");

    event_mock.assert();
    assert!(pipeline.queue.is_empty().await, "message must be deleted");
}

#[tokio::test]
async fn handling_failure_leaves_the_message_queued() {
    let server = MockServer::start();
    let pipeline = build_pipeline(
        &server,
        Arc::new(PowerControllerHandler::new(
            Arc::new(FailingHandler),
            Arc::new(FailingHandler),
        )),
    );

    let request: Request = serde_json::from_str(TURN_ON_DIRECTIVE).expect("directive must decode");
    pipeline
        .entry_router
        .dispatch(&request)
        .await
        .expect("dispatch must succeed");
    assert_eq!(pipeline.queue.len().await, 1);

    let error = pipeline
        .worker
        .process()
        .await
        .expect_err("handling failure must surface");
    assert!(matches!(
        error,
        WorkerError::Process(DeferredError::Handling(_))
    ));
    assert_eq!(
        pipeline.queue.len().await,
        1,
        "failed message must remain for redelivery"
    );
}

#[tokio::test]
async fn missing_grant_strands_the_result_without_posting() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/user/profile");
        then.status(200)
            .json_body(json!({ "user_id": "amzn1.account.NOGRANT" }));
    });
    let event_mock = server.mock(|when, then| {
        when.method(POST).path("/v3/events");
        then.status(202);
    });

    let pipeline = build_pipeline(&server, power_on_worker_handler());
    let request: Request = serde_json::from_str(TURN_ON_DIRECTIVE).expect("directive must decode");
    pipeline
        .entry_router
        .dispatch(&request)
        .await
        .expect("dispatch must succeed");

    let error = pipeline
        .worker
        .process()
        .await
        .expect_err("send must fail without a stored token");
    match &error {
        WorkerError::Process(DeferredError::Send(send_error)) => {
            assert!(send_error.to_string().contains("missing access token"));
        }
        other => panic!("unexpected error: {other}"),
    }
    event_mock.assert_calls(0);
    assert_eq!(
        pipeline.queue.len().await,
        1,
        "conservative behavior keeps the message for redelivery"
    );
}

#[tokio::test]
async fn relay_deduplicates_platform_retries() {
    let server = MockServer::start();
    let pipeline = build_pipeline(&server, power_on_worker_handler());
    let request: Request = serde_json::from_str(TURN_ON_DIRECTIVE).expect("directive must decode");

    let publisher = RelayPublisher::new(pipeline.queue.clone());
    publisher.relay(&request).await.expect("first relay");
    publisher.relay(&request).await.expect("retried relay");
    assert_eq!(
        pipeline.queue.len().await,
        1,
        "dedup id = message id must suppress the duplicate"
    );
}
