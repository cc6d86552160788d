//! A producer connects, receives its deferred welcome only after its first
//! line, and a plotted frame reaches a connected viewer tagged with the
//! producer's session id.

#[path = "support.rs"]
mod support;

use jgd_test_utils::{MockProducer, MockViewer};
use support::RunningBroker;

#[tokio::test]
async fn producer_frame_reaches_viewer_with_session_id_tagged() {
    let broker = RunningBroker::start();

    let mut producer = MockProducer::connect(&broker.producer_addr)
        .await
        .expect("producer connects");
    let mut viewer = MockViewer::connect(&broker.ws_url())
        .await
        .expect("viewer connects");

    producer
        .send_line(r#"{"type":"frame","plot":{"ops":[]}}"#)
        .await
        .unwrap();

    let welcome = producer.recv_line().await.unwrap();
    assert!(welcome.contains(r#""type":"server_info""#));
    assert!(welcome.contains(r#""protocolVersion":1"#));
    assert!(welcome.contains("httpUrl"));

    let relayed = viewer.recv_line().await.expect("viewer sees the frame");
    assert!(relayed.contains(r#""type":"frame""#));
    assert!(relayed.contains(r#""sessionId":"conn-1""#));
}

#[tokio::test]
async fn second_producer_gets_a_distinct_internal_session_id() {
    let broker = RunningBroker::start();

    let mut first = MockProducer::connect(&broker.producer_addr).await.unwrap();
    first.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _ = first.recv_line().await.unwrap();

    let mut second = MockProducer::connect(&broker.producer_addr).await.unwrap();
    second.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _ = second.recv_line().await.unwrap();

    let mut viewer = MockViewer::connect(&broker.ws_url()).await.unwrap();
    first.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let line = viewer.recv_line().await.unwrap();
    assert!(line.contains(r#""sessionId":"conn-1""#));

    second.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let line2 = viewer.recv_line().await.unwrap();
    assert!(line2.contains(r#""sessionId":"conn-2""#));
}
