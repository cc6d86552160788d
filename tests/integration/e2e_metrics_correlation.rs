//! `metrics_request` round-trips through a viewer, and falls back to a
//! zero-valued response after the timeout window when nobody answers or
//! when there is no viewer connected at all.

#[path = "support.rs"]
mod support;

use jgd_test_utils::{MockProducer, MockViewer};
use support::RunningBroker;

#[tokio::test]
async fn metrics_request_round_trips_through_viewer() {
    let broker = RunningBroker::start();

    let mut producer = MockProducer::connect(&broker.producer_addr).await.unwrap();
    let mut viewer = MockViewer::connect(&broker.ws_url()).await.unwrap();

    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _welcome = producer.recv_line().await.unwrap();
    let _baseline = viewer.recv_line().await.unwrap();

    producer
        .send_line(r#"{"type":"metrics_request","id":5}"#)
        .await
        .unwrap();

    let request = viewer.recv_line().await.unwrap();
    assert!(request.contains(r#""type":"metrics_request""#));
    assert!(request.contains(r#""id":5"#));

    viewer
        .send_line(r#"{"type":"metrics_response","id":5,"width":120,"ascent":10,"descent":3}"#)
        .await
        .unwrap();

    let response = producer.recv_line().await.unwrap();
    assert!(response.contains(r#""width":120"#));
    assert!(response.contains(r#""ascent":10"#));
    assert!(response.contains(r#""descent":3"#));
}

#[tokio::test]
async fn metrics_request_with_no_viewers_gets_immediate_zero_fallback() {
    let broker = RunningBroker::start();

    let mut producer = MockProducer::connect(&broker.producer_addr).await.unwrap();
    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _welcome = producer.recv_line().await.unwrap();

    producer
        .send_line(r#"{"type":"metrics_request","id":1}"#)
        .await
        .unwrap();

    let fallback = producer.recv_line().await.unwrap();
    assert!(fallback.contains(r#""type":"metrics_response""#));
    assert!(fallback.contains(r#""id":1"#));
    assert!(fallback.contains(r#""width":0"#));
    assert!(fallback.contains(r#""ascent":0"#));
    assert!(fallback.contains(r#""descent":0"#));
}

#[tokio::test]
async fn metrics_request_falls_back_after_timeout_when_viewer_never_answers() {
    let broker = RunningBroker::start();

    let mut producer = MockProducer::connect(&broker.producer_addr).await.unwrap();
    let mut viewer = MockViewer::connect(&broker.ws_url()).await.unwrap();

    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _welcome = producer.recv_line().await.unwrap();
    let _baseline = viewer.recv_line().await.unwrap();

    producer
        .send_line(r#"{"type":"metrics_request","id":77}"#)
        .await
        .unwrap();
    let _request = viewer.recv_line().await.unwrap();

    let fallback = tokio::time::timeout(std::time::Duration::from_secs(4), producer.recv_line())
        .await
        .expect("fallback should arrive within the 2s timeout plus slack")
        .unwrap();
    assert!(fallback.contains(r#""id":77"#));
    assert!(fallback.contains(r#""width":0"#));
}
