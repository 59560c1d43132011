mod common;

use actix_web::{test, web, App};
use common::{record, FakeBrokerClient, Harness, TOPIC};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use transaction_processor::handlers::{register_routes, AppState};

fn state(h: Option<&Harness>) -> web::Data<AppState> {
    state_with_broker(h, FakeBrokerClient::new())
}

fn state_with_broker(h: Option<&Harness>, broker: Arc<FakeBrokerClient>) -> web::Data<AppState> {
    web::Data::new(AppState {
        consumer: h.map(|h| h.consumer.clone()),
        broker,
        topic: TOPIC.to_string(),
        bootstrap_servers: "localhost:9092".to_string(),
    })
}

#[actix_web::test]
async fn liveness_is_static() {
    let app = test::init_service(App::new().app_data(state(None)).configure(register_routes)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "transaction-processor");
}

#[actix_web::test]
async fn kafka_health_without_a_consumer() {
    let app = test::init_service(App::new().app_data(state(None)).configure(register_routes)).await;

    let req = test::TestRequest::get().uri("/health/kafka").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["kafka_connection"], "ok");
    assert_eq!(body["consumer_status"], "not_initialized");
    assert_eq!(body["topic"], TOPIC);
    assert_eq!(body["bootstrap_servers"], "localhost:9092");
    assert_eq!(body["consumer_details"]["initialized"], false);
    assert_eq!(body["consumer_details"]["consumer_created"], false);
}

#[actix_web::test]
async fn kafka_health_follows_the_consumer_lifecycle() {
    let h = Harness::new();
    let app =
        test::init_service(App::new().app_data(state(Some(&h))).configure(register_routes)).await;

    let req = test::TestRequest::get().uri("/health/kafka").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["consumer_status"], "stopped");
    assert_eq!(body["status"], "unhealthy");

    h.consumer.start().unwrap();
    let req = test::TestRequest::get().uri("/health/kafka").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(
        body["message"],
        "Kafka connection and consumer are working properly"
    );
    assert_eq!(body["consumer_status"], "running");
    assert_eq!(body["consumer_details"]["running"], true);
    assert_eq!(body["consumer_details"]["thread_alive"], true);
    assert_eq!(body["consumer_details"]["consumer_created"], true);

    h.consumer.stop().await;
    let req = test::TestRequest::get().uri("/health/kafka").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["consumer_status"], "stopped");
    assert_eq!(body["message"], "Kafka connection: ok, Consumer: stopped");
}

#[actix_web::test]
async fn unreachable_broker_marks_a_running_consumer_unhealthy() {
    let h = Harness::new();
    let broker = FakeBrokerClient::new();
    let app = test::init_service(
        App::new()
            .app_data(state_with_broker(Some(&h), broker.clone()))
            .configure(register_routes),
    )
    .await;
    h.consumer.start().unwrap();

    broker.set_down(true);
    let req = test::TestRequest::get().uri("/health/kafka").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["kafka_connection"], "failed");
    assert_eq!(body["consumer_status"], "running");
    assert_eq!(body["message"], "Kafka connection: failed, Consumer: running");
    assert_eq!(
        body["kafka_error"],
        "Kafka connection failed: broker unreachable"
    );

    broker.set_down(false);
    let req = test::TestRequest::get().uri("/health/kafka").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert!(body.get("kafka_error").is_none());

    h.consumer.stop().await;
}

#[actix_web::test]
async fn test_transaction_is_published_keyed_by_user() {
    let broker = FakeBrokerClient::new();
    let app = test::init_service(
        App::new()
            .app_data(state_with_broker(None, broker.clone()))
            .configure(register_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/send-test-transaction")
        .set_json(json!({"userId": "1", "creditCardId": "7"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body["message"], "Test transaction sent successfully");
    assert_eq!(body["topic"], TOPIC);
    assert_eq!(body["partition"], 0);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["transaction"]["user"], 1);
    assert_eq!(body["transaction"]["card"], 7);

    let sent = broker.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, TOPIC);
    assert_eq!(sent[0].1, "1");
}

#[actix_web::test]
async fn test_transaction_flows_through_the_consumer() {
    let h = Harness::new();
    let broker = FakeBrokerClient::new();
    let app = test::init_service(
        App::new()
            .app_data(state_with_broker(Some(&h), broker.clone()))
            .configure(register_routes),
    )
    .await;
    h.consumer.start().unwrap();

    let req = test::TestRequest::post()
        .uri("/send-test-transaction")
        .set_json(json!({"userId": "2", "creditCardId": "8"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let (_, _, payload) = broker.sent().remove(0);
    h.connector.current().push(record(0, 0, payload));
    h.wait_for_entry("offset:0:0").await;

    let stored = h.store.transactions();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, "2");
    assert_eq!(stored[0].amount, Decimal::new(15000, 2));

    h.consumer.stop().await;
}

#[actix_web::test]
async fn test_transaction_rejects_non_numeric_ids() {
    let broker = FakeBrokerClient::new();
    let app = test::init_service(
        App::new()
            .app_data(state_with_broker(None, broker.clone()))
            .configure(register_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/send-test-transaction")
        .set_json(json!({"userId": "abc", "creditCardId": "7"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
    assert!(broker.sent().is_empty());
}

#[actix_web::test]
async fn test_transaction_reports_broker_failure() {
    let broker = FakeBrokerClient::new();
    broker.set_down(true);
    let app = test::init_service(
        App::new()
            .app_data(state_with_broker(None, broker.clone()))
            .configure(register_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/send-test-transaction")
        .set_json(json!({"userId": "1", "creditCardId": "7"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"],
        "Failed to send test transaction: Kafka send failed: broker unreachable"
    );
}
