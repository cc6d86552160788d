//! A producer that announces `plot.sessionId` on its first frame is
//! rekeyed from its internal `conn-N` id, and any metrics correlation
//! still outstanding from before the rename follows it to the new id.

#[path = "support.rs"]
mod support;

use jgd_test_utils::{MockProducer, MockViewer};
use support::RunningBroker;

#[tokio::test]
async fn frame_after_rename_carries_the_producer_chosen_session_id() {
    let broker = RunningBroker::start();

    let mut producer = MockProducer::connect(&broker.producer_addr).await.unwrap();
    let mut viewer = MockViewer::connect(&broker.ws_url()).await.unwrap();

    // First line carries no sessionId: registered under its internal id.
    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _welcome = producer.recv_line().await.unwrap();
    let first = viewer.recv_line().await.unwrap();
    assert!(first.contains(r#""sessionId":"conn-1""#));

    // Second line announces a producer-chosen id: the session is renamed.
    producer
        .send_line(r#"{"type":"frame","plot":{"sessionId":"notebook-7"}}"#)
        .await
        .unwrap();
    let renamed = viewer.recv_line().await.unwrap();
    assert!(renamed.contains(r#""sessionId":"notebook-7""#));
    assert!(!renamed.contains("conn-1"));
}

#[tokio::test]
async fn metrics_request_started_before_rename_resolves_after_it() {
    let broker = RunningBroker::start();

    let mut producer = MockProducer::connect(&broker.producer_addr).await.unwrap();
    let mut viewer = MockViewer::connect(&broker.ws_url()).await.unwrap();

    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _welcome = producer.recv_line().await.unwrap();
    let _baseline = viewer.recv_line().await.unwrap();

    producer
        .send_line(r#"{"type":"metrics_request","id":3}"#)
        .await
        .unwrap();
    let _request = viewer.recv_line().await.unwrap();

    // Rename happens on the very next inbound frame, while id 3 is still
    // outstanding.
    producer
        .send_line(r#"{"type":"frame","plot":{"sessionId":"renamed-session"}}"#)
        .await
        .unwrap();
    let relayed_frame = viewer.recv_line().await.unwrap();
    assert!(relayed_frame.contains(r#""sessionId":"renamed-session""#));

    viewer
        .send_line(r#"{"type":"metrics_response","id":3,"width":1,"ascent":2,"descent":3}"#)
        .await
        .unwrap();

    let response = producer.recv_line().await.unwrap();
    assert!(response.contains(r#""id":3"#));
    assert!(response.contains(r#""width":1"#));
}
