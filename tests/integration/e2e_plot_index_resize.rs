//! A plotIndex-scoped resize targets exactly the named session, strips the
//! sessionId before forwarding, and does not touch other sessions' pending
//! resize state.

#[path = "support.rs"]
mod support;

use jgd_test_utils::{MockProducer, MockViewer};
use support::RunningBroker;

#[tokio::test]
async fn plot_index_resize_targets_only_the_named_session() {
    let broker = RunningBroker::start();

    let mut producer_a = MockProducer::connect(&broker.producer_addr).await.unwrap();
    let mut producer_b = MockProducer::connect(&broker.producer_addr).await.unwrap();
    let mut viewer = MockViewer::connect(&broker.ws_url()).await.unwrap();

    producer_a
        .send_line(r#"{"type":"frame","plot":{"sessionId":"dash-a"}}"#)
        .await
        .unwrap();
    let _welcome_a = producer_a.recv_line().await.unwrap();
    let frame_a = viewer.recv_line().await.unwrap();
    assert!(frame_a.contains(r#""sessionId":"dash-a""#));

    producer_b
        .send_line(r#"{"type":"frame","plot":{}}"#)
        .await
        .unwrap();
    let _welcome_b = producer_b.recv_line().await.unwrap();
    let _frame_b = viewer.recv_line().await.unwrap();

    viewer
        .send_line(r#"{"type":"resize","width":300,"height":200,"plotIndex":2,"sessionId":"dash-a"}"#)
        .await
        .unwrap();

    let forwarded = producer_a.recv_line().await.unwrap();
    assert!(forwarded.contains(r#""plotIndex":2"#));
    assert!(!forwarded.contains("sessionId"));

    producer_a
        .send_line(r#"{"type":"frame","plot":{"sessionId":"dash-a"}}"#)
        .await
        .unwrap();
    let tagged = viewer.recv_line().await.unwrap();
    assert!(tagged.contains(r#""resize":true"#));
    assert!(tagged.contains(r#""plotIndex":2"#));

    // producer_b never received a resize and its next frame stays untagged.
    producer_b.send_line(r#"{"type":"frame","plot":{}}"#).await.unwrap();
    let untagged_b = viewer.recv_line().await.unwrap();
    assert!(!untagged_b.contains(r#""resize""#));
}
