//! HTTP surface over the dashboard operations.

mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use sqs_monitor::config::AppConfig;
use sqs_monitor::dashboard::DashboardService;
use sqs_monitor::queue::{MessageAttribute, RawMessage};
use sqs_monitor::repositories::{InsertOutcome, MessageRepository, NewMessage};
use sqs_monitor::server::{AppState, create_app};
use test_utils::{FakeQueueService, pipeline, queue_subscription, setup_test_db_arc};

const ALERTS_TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:alerts";

async fn app_with(fake: &Arc<FakeQueueService>) -> (Router, MessageRepository) {
    let db = setup_test_db_arc().await.unwrap();
    let state = AppState {
        config: Arc::new(AppConfig::default()),
        db: db.clone(),
        dashboard: DashboardService::new(pipeline(fake, db.clone())),
    };
    (create_app(state), MessageRepository::new(db))
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn alert(id: &str) -> RawMessage {
    RawMessage::new(id, format!("rh-{id}"), format!("alert {id}"))
        .with_attribute("TopicArn", MessageAttribute::string(ALERTS_TOPIC))
}

#[tokio::test]
async fn root_and_health() {
    let fake = FakeQueueService::new();
    let (app, _) = app_with(&fake).await;

    let (status, body) = send(&app, Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "sqs-monitor");

    let (status, body) = send(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn queues_listing_does_not_ingest_by_default() {
    let fake = FakeQueueService::new();
    fake.add_queue("orders", vec![RawMessage::new("m-1", "rh-1", "x")]);
    let (app, repository) = app_with(&fake).await;
    repository
        .insert_if_absent(NewMessage::new("old", "orders", "stored earlier"))
        .await
        .unwrap();

    let (status, body) = send(&app, Method::GET, "/queues").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queues"][0]["name"], "orders");
    assert_eq!(body["queues"][0]["message_count"], 1);
    assert!(fake.receive_calls().is_empty());

    let (_, body) = send(&app, Method::GET, "/queues?refresh=true").await;
    assert_eq!(body["queues"][0]["message_count"], 2);
}

#[tokio::test]
async fn queue_messages_are_newest_first() {
    let fake = FakeQueueService::new();
    let (app, repository) = app_with(&fake).await;
    let mut older = NewMessage::new("older", "orders", "a");
    older.received_at = older.received_at - chrono::Duration::minutes(5);
    repository.insert_if_absent(older).await.unwrap();
    repository
        .insert_if_absent(NewMessage::new("newer", "orders", "b"))
        .await
        .unwrap();

    let (status, body) = send(&app, Method::GET, "/queues/orders/messages").await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["newer", "older"]);
}

#[tokio::test]
async fn topics_listing_refreshes_by_default() {
    let fake = FakeQueueService::new();
    fake.add_queue("alerts-queue", vec![alert("a1"), alert("a2")]);
    fake.add_topic(ALERTS_TOPIC, vec![queue_subscription("alerts-queue")]);
    let (app, _) = app_with(&fake).await;

    let (status, body) = send(&app, Method::GET, "/topics?refresh=false").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topics"][0]["message_count"], 0);

    let (status, body) = send(&app, Method::GET, "/topics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topics"][0]["arn"], ALERTS_TOPIC);
    assert_eq!(body["topics"][0]["message_count"], 2);
}

#[tokio::test]
async fn refresh_errors_do_not_fail_topic_listing() {
    let fake = FakeQueueService::new();
    fake.add_topic(ALERTS_TOPIC, Vec::new());
    fake.fail_list_queues();
    let (app, _) = app_with(&fake).await;

    let (status, body) = send(&app, Method::GET, "/topics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topics"][0]["message_count"], 0);
}

#[tokio::test]
async fn topic_messages_ingest_from_subscribed_queues() {
    let fake = FakeQueueService::new();
    fake.add_queue("alerts-queue", vec![alert("a1")]);
    fake.add_queue("other", vec![RawMessage::new("o1", "rh-o1", "x")]);
    fake.add_topic(ALERTS_TOPIC, vec![queue_subscription("alerts-queue")]);
    let (app, _) = app_with(&fake).await;

    let uri = format!("/topics/{ALERTS_TOPIC}/messages");
    let (status, body) = send(&app, Method::GET, &uri).await;

    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["message_id"], "a1");
    assert_eq!(messages[0]["topic_arn"], ALERTS_TOPIC);
    assert_eq!(fake.pending("other"), 1);
}

#[tokio::test]
async fn message_detail_found_and_missing() {
    let fake = FakeQueueService::new();
    let (app, repository) = app_with(&fake).await;
    let InsertOutcome::Created(model) = repository
        .insert_if_absent(NewMessage::new("m-1", "orders", "payload"))
        .await
        .unwrap()
    else {
        panic!("expected a new row");
    };

    let (status, body) = send(&app, Method::GET, &format!("/messages/{}", model.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "payload");
    assert_eq!(body["state"], "RECEIVED");

    let missing = uuid::Uuid::new_v4();
    let (status, body) = send(&app, Method::GET, &format!("/messages/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["trace_id"].is_string());
}

#[tokio::test]
async fn explicit_refresh_returns_summary() {
    let fake = FakeQueueService::new();
    fake.add_queue("q1", vec![RawMessage::new("a", "rh-a", "x")]);
    fake.add_queue("q2", vec![RawMessage::new("b", "rh-b", "y")]);
    fake.fail_receive("q2");
    let (app, _) = app_with(&fake).await;

    let (status, body) = send(&app, Method::POST, "/refresh").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queues_polled"], 2);
    assert_eq!(body["queues_failed"], 1);
    assert_eq!(body["messages_received"], 1);
}

#[tokio::test]
async fn explicit_topic_refresh_returns_count() {
    let fake = FakeQueueService::new();
    fake.add_queue("alerts-queue", vec![alert("a1"), alert("a2")]);
    fake.add_topic(ALERTS_TOPIC, vec![queue_subscription("alerts-queue")]);
    let (app, repository) = app_with(&fake).await;

    let (status, body) =
        send(&app, Method::POST, &format!("/topics/{ALERTS_TOPIC}/refresh")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages_received"], 2);
    assert_eq!(repository.count_by_topic(ALERTS_TOPIC).await.unwrap(), 2);
}

#[tokio::test]
async fn upstream_failure_maps_to_provider_error() {
    let fake = FakeQueueService::new();
    fake.fail_list_queues();
    let (app, _) = app_with(&fake).await;

    let (status, body) = send(&app, Method::GET, "/queues").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "PROVIDER_ERROR");
    assert_eq!(body["details"]["operation"], "ListQueues");
}

#[tokio::test]
async fn request_id_is_echoed_as_trace_id() {
    let fake = FakeQueueService::new();
    let (app, _) = app_with(&fake).await;

    let request = Request::builder()
        .uri(format!("/messages/{}", uuid::Uuid::new_v4()))
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["trace_id"], "req-42");
}
