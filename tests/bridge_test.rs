use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use order_bridge::bridge::routes::{HEALTH_CHECK_PATH, ORDER_PATH};
use order_bridge::bridge::{router, OrderBridge, RpcStatus, DEADLINE_HEADER};
use order_bridge::broker::MemoryBroker;
use order_bridge::client::BridgeClient;
use order_bridge::config::{ConsumerConfig, PublishPolicy, ServerConfig};
use order_bridge::consumer::ConsumerLoop;
use order_bridge::lifecycle::{BridgeServer, LifecycleError};
use order_bridge::model::{Order, OrderResponse};
use order_bridge::publisher::RecordPublisher;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn bridge(broker: &MemoryBroker) -> Arc<OrderBridge<MemoryBroker>> {
    let policy = PublishPolicy {
        retry_backoff: Duration::ZERO,
        ..PublishPolicy::default()
    };
    Arc::new(OrderBridge::new(
        RecordPublisher::new(broker.clone(), policy),
        "orders",
    ))
}

fn call(path: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(broker: &MemoryBroker, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(bridge(broker), Duration::from_secs(5))
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_check_is_always_healthy() {
    let broker = MemoryBroker::new();
    broker.refuse_connections();

    let (status, body) = send(&broker, call(HEALTH_CHECK_PATH, "{}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Healthy", "status": true}));
}

#[tokio::test]
async fn test_order_call_publishes_and_answers() {
    let broker = MemoryBroker::new();
    let body = json!({"id": "42", "item_name": "keyboard"}).to_string();

    let (status, body) = send(&broker, call(ORDER_PATH, body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"message": "Successfully ordered 42: keyboard", "success": true})
    );
    let records = broker.records("orders", 0);
    assert_eq!(records.len(), 1);
    assert_eq!(
        Order::from_payload(&records[0].payload).unwrap(),
        Order::new("42", "keyboard")
    );
}

#[tokio::test]
async fn test_malformed_order_is_invalid_argument() {
    for body in [r#"{"id": "1"}"#, "not json", r#"{"id": 1, "item_name": "mug"}"#] {
        let broker = MemoryBroker::new();

        let (status, reply) = send(&broker, call(ORDER_PATH, body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "body={body}");
        assert_eq!(reply["code"], "invalid_argument", "body={body}");
        assert!(broker.records("orders", 0).is_empty());
        assert_eq!(broker.send_attempts(), 0);
    }
}

#[tokio::test]
async fn test_bad_deadline_header_is_invalid_argument() {
    let broker = MemoryBroker::new();
    let mut request = call(ORDER_PATH, json!({"id": "1", "item_name": "mug"}).to_string());
    request
        .headers_mut()
        .insert(DEADLINE_HEADER, "later".parse().unwrap());

    let (status, reply) = send(&broker, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["code"], "invalid_argument");
    assert!(broker.records("orders", 0).is_empty());
}

#[tokio::test]
async fn test_unreachable_log_is_unavailable() {
    let broker = MemoryBroker::new();
    broker.fail_all_sends(true);

    let (status, reply) = send(
        &broker,
        call(ORDER_PATH, json!({"id": "1", "item_name": "mug"}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let reply: RpcStatus = serde_json::from_value(reply).unwrap();
    assert_eq!(reply.code, "unavailable");
    assert_eq!(broker.send_attempts(), 5);
}

/// A call whose deadline passes while the publish is stuck is answered with
/// `deadline_exceeded`, and the producer session is released.
#[tokio::test]
async fn test_expired_deadline_abandons_the_call() {
    let broker = MemoryBroker::new();
    broker.stall_sends();
    let mut request = call(ORDER_PATH, json!({"id": "1", "item_name": "mug"}).to_string());
    request
        .headers_mut()
        .insert(DEADLINE_HEADER, "50".parse().unwrap());

    let (status, reply) = send(&broker, request).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(reply["code"], "deadline_exceeded");
    assert_eq!(broker.open_producer_sessions(), 0);
}

/// Orders carry no idempotency key: the same call twice stores two records.
#[tokio::test]
async fn test_repeated_order_is_stored_twice() {
    let broker = MemoryBroker::new();
    let app = router(bridge(&broker), Duration::from_secs(5));
    let body = json!({"id": "7", "item_name": "lamp"}).to_string();

    for _ in 0..2 {
        let response = app.clone().oneshot(call(ORDER_PATH, body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let records = broker.records("orders", 0);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].payload, records[1].payload);
    assert_eq!((records[0].offset, records[1].offset), (0, 1));
}

/// Client -> server -> log -> consumer, over a real socket.
#[tokio::test]
async fn test_order_round_trip_through_server_and_consumer() {
    let broker = MemoryBroker::new();
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        default_deadline: Duration::from_secs(5),
    };
    let server = BridgeServer::bind(&config, bridge(&broker)).await.unwrap();
    let base_url = format!("http://{}", server.local_addr());
    let server_shutdown = CancellationToken::new();
    let serving = tokio::spawn(server.serve(server_shutdown.clone()));

    let client = BridgeClient::new(base_url, Duration::from_secs(5)).unwrap();
    let health = client.health_check().await.unwrap();
    assert!(health.status);
    let reply: OrderResponse = client.order("1", "keyboard").await.unwrap();
    assert_eq!(reply.message, "Successfully ordered 1: keyboard");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let consumer_shutdown = CancellationToken::new();
    let running = ConsumerLoop::new(broker.clone(), "orders", 0, ConsumerConfig::default())
        .with_handler(tx)
        .start(consumer_shutdown.clone())
        .await
        .unwrap();

    let (count, record) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(
        Order::from_payload(&record.payload).unwrap(),
        Order::new("1", "keyboard")
    );

    consumer_shutdown.cancel();
    assert_eq!(running.stopped().await.unwrap().delivered, 1);
    server_shutdown.cancel();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bind_on_occupied_port_fails() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ServerConfig {
        listen_addr: occupied.local_addr().unwrap(),
        default_deadline: Duration::from_secs(5),
    };

    let outcome = BridgeServer::bind(&config, bridge(&MemoryBroker::new())).await;

    assert!(matches!(outcome, Err(LifecycleError::Bind { .. })));
}

#[tokio::test]
async fn test_client_surfaces_rpc_errors() {
    let broker = MemoryBroker::new();
    broker.fail_all_sends(false);
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        default_deadline: Duration::from_secs(5),
    };
    let server = BridgeServer::bind(&config, bridge(&broker)).await.unwrap();
    let base_url = format!("http://{}", server.local_addr());
    let client = BridgeClient::new(base_url, Duration::from_secs(5)).unwrap();
    let shutdown = CancellationToken::new();
    let serving = tokio::spawn(server.serve(shutdown.clone()));

    let err = client.order("1", "mug").await.unwrap_err();

    assert_eq!(err.code(), Some("unavailable"));
    assert_eq!(broker.send_attempts(), 1);
    shutdown.cancel();
    serving.await.unwrap().unwrap();
}
