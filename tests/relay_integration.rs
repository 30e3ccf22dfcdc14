//! End-to-end tests for the webhook source → pipeline → backend → trigger path.
//!
//! Each test serves the webhook source on a random port, points the client
//! at a mockito backend, and uses a second mockito endpoint as the reply
//! trigger published by the device bridge.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;

use reply_relay::client::HttpResponseClient;
use reply_relay::config::{ClientConfig, PipelineConfig};
use reply_relay::injector::HttpTriggerInjector;
use reply_relay::pipeline::InterceptionPipeline;
use reply_relay::source::{NotificationSource, WebhookSource};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const TARGET: &str = "com.instagram.android";

/// Serve a webhook source and run a pipeline over it. Returns the webhook port.
async fn start_relay(backend_url: &str, config: PipelineConfig) -> (u16, Arc<WebhookSource>) {
    let source = Arc::new(WebhookSource::new());
    let app = source.router();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = HttpResponseClient::new(ClientConfig {
        base_url: backend_url.to_string(),
        ..ClientConfig::default()
    });
    let pipeline =
        InterceptionPipeline::new(config, Arc::new(client), Arc::new(HttpTriggerInjector::new()));

    let running = Arc::clone(&source);
    tokio::spawn(async move {
        pipeline.run(running.as_ref()).await.unwrap();
    });

    // Give the server and the run loop a moment to start.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, source)
}

async fn post_event(port: u16, event: &Value) -> reqwest::StatusCode {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/notifications"))
        .json(event)
        .send()
        .await
        .unwrap()
        .status()
}

/// Poll a mock until it has been matched or the test timeout elapses.
async fn wait_for(mock: &mockito::Mock) -> bool {
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if mock.matched_async().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn instagram_dm(trigger: &str) -> Value {
    json!({
        "key": "0|com.instagram.android|42",
        "source_app": TARGET,
        "title": "Alice",
        "body": "hi",
        "reply_capabilities": [
            {"label": "Reply", "result_slots": [{"key": "reply_text"}], "trigger": trigger}
        ]
    })
}

#[tokio::test]
async fn posted_notification_is_answered_through_trigger() {
    let mut backend = mockito::Server::new_async().await;
    let chat = backend
        .mock("POST", "/chat")
        .match_body(mockito::Matcher::Json(json!({"sender": "Alice", "message": "hi"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"reply": "hello!", "sender": "Alice", "originalMessage": "hi"}"#)
        .create_async()
        .await;

    let mut bridge = mockito::Server::new_async().await;
    let trigger = bridge
        .mock("POST", "/actions/42")
        .match_body(mockito::Matcher::Json(json!({"results": {"reply_text": "hello!"}})))
        .with_status(200)
        .create_async()
        .await;

    let (port, source) = start_relay(&backend.url(), PipelineConfig::for_source(TARGET)).await;
    assert!(source.is_active());

    let status = post_event(port, &instagram_dm(&format!("{}/actions/42", bridge.url()))).await;
    assert_eq!(status, reqwest::StatusCode::ACCEPTED);

    assert!(wait_for(&trigger).await, "reply trigger was never fired");
    chat.assert_async().await;
}

#[tokio::test]
async fn foreign_app_notification_never_reaches_backend() {
    let mut backend = mockito::Server::new_async().await;
    let chat = backend
        .mock("POST", "/chat")
        .with_status(200)
        .with_body(r#"{"reply": "hello!"}"#)
        .expect(1)
        .create_async()
        .await;

    let mut bridge = mockito::Server::new_async().await;
    let trigger = bridge
        .mock("POST", "/actions/42")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let trigger_url = format!("{}/actions/42", bridge.url());

    let (port, _source) = start_relay(&backend.url(), PipelineConfig::for_source(TARGET)).await;

    let mut foreign = instagram_dm(&trigger_url);
    foreign["source_app"] = json!("com.whatsapp");
    assert_eq!(post_event(port, &foreign).await, reqwest::StatusCode::ACCEPTED);

    // Events are handled in order, so once the second one is answered the
    // first has already been filtered out.
    assert_eq!(
        post_event(port, &instagram_dm(&trigger_url)).await,
        reqwest::StatusCode::ACCEPTED
    );
    assert!(wait_for(&trigger).await);

    chat.assert_async().await;
    trigger.assert_async().await;
}

#[tokio::test]
async fn backend_failure_does_not_fire_trigger() {
    let mut backend = mockito::Server::new_async().await;
    let chat = backend
        .mock("POST", "/chat")
        .with_status(503)
        .create_async()
        .await;

    let mut bridge = mockito::Server::new_async().await;
    let trigger = bridge
        .mock("POST", "/actions/42")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let (port, _source) = start_relay(&backend.url(), PipelineConfig::for_source(TARGET)).await;
    post_event(port, &instagram_dm(&format!("{}/actions/42", bridge.url()))).await;

    assert!(wait_for(&chat).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    trigger.assert_async().await;
}

#[tokio::test]
async fn status_reports_subscription_state() {
    let source = WebhookSource::new();
    let app = source.router();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let url = format!("http://127.0.0.1:{port}/status");
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body, json!({"active": false, "source": "webhook"}));

    let _events = source.start().await.unwrap();
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["active"], true);

    source.shutdown().await.unwrap();
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn malformed_notification_is_rejected() {
    let source = WebhookSource::new();
    let app = source.router();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = post_event(port, &json!({"title": "no source app"})).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn answered_notification_is_dismissed_when_enabled() {
    let mut backend = mockito::Server::new_async().await;
    let _chat = backend
        .mock("POST", "/chat")
        .with_status(200)
        .with_body(r#"{"reply": "hello!"}"#)
        .create_async()
        .await;

    let mut bridge = mockito::Server::new_async().await;
    let trigger = bridge
        .mock("POST", "/actions/42")
        .with_status(200)
        .create_async()
        .await;
    let dismiss = bridge
        .mock("POST", "/dismiss/42")
        .match_body(mockito::Matcher::Json(json!({})))
        .with_status(204)
        .create_async()
        .await;

    let config = PipelineConfig {
        dismiss_after_reply: true,
        ..PipelineConfig::for_source(TARGET)
    };
    let (port, _source) = start_relay(&backend.url(), config).await;

    let mut event = instagram_dm(&format!("{}/actions/42", bridge.url()));
    event["dismiss_trigger"] = json!(format!("{}/dismiss/42", bridge.url()));
    assert_eq!(post_event(port, &event).await, reqwest::StatusCode::ACCEPTED);

    assert!(wait_for(&dismiss).await, "notification was never dismissed");
    trigger.assert_async().await;
}
