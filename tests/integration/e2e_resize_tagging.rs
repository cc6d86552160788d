//! A viewer-issued normal resize is forwarded to every connected producer
//! and tags the next frame from each with `resize:true`; a repeated resize
//! with the same dimensions is deduped.

#[path = "support.rs"]
mod support;

use jgd_test_utils::{MockProducer, MockViewer};
use support::RunningBroker;

#[tokio::test]
async fn resize_forwards_to_producer_and_tags_next_frame() {
    let broker = RunningBroker::start();

    let mut producer = MockProducer::connect(&broker.producer_addr).await.unwrap();
    let mut viewer = MockViewer::connect(&broker.ws_url()).await.unwrap();

    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _welcome = producer.recv_line().await.unwrap();
    let _baseline = viewer.recv_line().await.unwrap();

    viewer
        .send_line(r#"{"type":"resize","width":640,"height":480}"#)
        .await
        .unwrap();

    let forwarded = producer.recv_line().await.unwrap();
    assert!(forwarded.contains(r#""width":640"#));
    assert!(forwarded.contains(r#""height":480"#));

    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let tagged = viewer.recv_line().await.unwrap();
    assert!(tagged.starts_with(r#"{"resize":true"#));

    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let untagged = viewer.recv_line().await.unwrap();
    assert!(!untagged.contains(r#""resize""#));
}

#[tokio::test]
async fn repeated_identical_resize_is_not_forwarded_again() {
    let broker = RunningBroker::start();

    let mut producer = MockProducer::connect(&broker.producer_addr).await.unwrap();
    let mut viewer = MockViewer::connect(&broker.ws_url()).await.unwrap();

    producer.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let _welcome = producer.recv_line().await.unwrap();
    let _baseline = viewer.recv_line().await.unwrap();

    viewer
        .send_line(r#"{"type":"resize","width":100,"height":100}"#)
        .await
        .unwrap();
    let _ = producer.recv_line().await.unwrap();

    viewer
        .send_line(r#"{"type":"resize","width":100,"height":100}"#)
        .await
        .unwrap();
    // Distinguish "deduped" from "slow" by racing it against a second,
    // distinct resize that must still arrive.
    viewer
        .send_line(r#"{"type":"resize","width":101,"height":100}"#)
        .await
        .unwrap();

    let next = producer.recv_line().await.unwrap();
    assert!(next.contains(r#""width":101"#));
}
