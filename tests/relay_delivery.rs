mod common;

use std::time::Duration;

use httpmock::prelude::*;
use meshrelay::frame::parse_frame;
use meshrelay::message::Urgency;
use meshrelay::pipeline::LineOutcome;
use meshrelay::relay::{DeliveryOutcome, DeliveryRelay};

fn classified(line: &str) -> meshrelay::message::Message {
    parse_frame(line)
        .expect("parse")
        .stamp(chrono::Utc::now())
        .classify_as(Urgency::Low)
        .expect("classify")
}

#[tokio::test]
async fn successful_post_is_delivered() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/GetMessages")
                .header("content-type", "application/json")
                .body_contains("\"logs\":[")
                .body_contains("\"source_node\":5")
                .body_contains("\"message_id\":\"0042\"")
                .body_contains("\"sender_name\":\"Alice\"")
                .body_contains("\"urgency\":\"LOW\"");
            then.status(200).body("ok");
        })
        .await;

    let relay = DeliveryRelay::new(server.url("/api/GetMessages"), Duration::from_secs(2)).unwrap();
    let outcome = relay
        .deliver(&classified("SRC=5,CUR=5,ID=0042:Alice-Need water"))
        .await;
    assert_eq!(outcome, DeliveryOutcome::Delivered);
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_is_a_failed_outcome() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/ingest");
            then.status(500).body("database down");
        })
        .await;

    let relay = DeliveryRelay::new(server.url("/ingest"), Duration::from_secs(2)).unwrap();
    match relay.deliver(&classified("SRC=1,CUR=1,ID=1:a-b")).await {
        DeliveryOutcome::Failed(reason) => {
            assert!(reason.contains("500"), "reason: {}", reason);
            assert!(reason.contains("database down"), "reason: {}", reason);
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_aggregator_is_a_failed_outcome() {
    let relay = DeliveryRelay::new("http://127.0.0.1:9/ingest", Duration::from_secs(2)).unwrap();
    let outcome = relay.deliver(&classified("SRC=1,CUR=1,ID=1:a-b")).await;
    assert!(!outcome.is_delivered());
}

#[tokio::test]
async fn slow_aggregator_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/slow");
            then.status(200).delay(Duration::from_secs(3));
        })
        .await;

    let relay = DeliveryRelay::new(server.url("/slow"), Duration::from_secs(1)).unwrap();
    assert_eq!(
        relay.deliver(&classified("SRC=1,CUR=1,ID=1:a-b")).await,
        DeliveryOutcome::Failed("request timed out".to_string())
    );
}

#[tokio::test]
async fn pipeline_keeps_messages_when_relay_fails() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/ingest");
            then.status(503);
        })
        .await;

    let (pipeline, reader) = common::offline_pipeline(200);
    let relay = DeliveryRelay::new(server.url("/ingest"), Duration::from_secs(2)).unwrap();
    let mut pipeline = pipeline.with_relay(Some(relay));

    for line in ["SRC=1,CUR=1,ID=1:a-one", "SRC=1,CUR=1,ID=2:a-two"] {
        match pipeline.process_line(line).await {
            LineOutcome::Accepted {
                delivery: Some(DeliveryOutcome::Failed(_)),
                ..
            } => {}
            other => panic!("Expected accepted with failed delivery, got {:?}", other),
        }
    }
    // Duplicates are not relayed again
    pipeline.process_line("SRC=1,CUR=1,ID=2:a-two").await;

    assert_eq!(reader.len(), 2);
    assert_eq!(mock.hits_async().await, 2);
    let snap = pipeline.metrics().snapshot();
    assert_eq!(snap.delivery_failed, 2);
    assert_eq!(snap.delivered, 0);
}
