//! Discovery-file lifecycle and graceful shutdown ordering:
//! the file appears once the broker is ready, names this process, and is
//! removed again once it receives SIGTERM.

#[path = "support.rs"]
mod support;

use support::RunningBroker;

#[test]
#[cfg(unix)]
fn discovery_file_is_written_on_start_and_removed_on_graceful_shutdown() {
    let mut broker = RunningBroker::start();

    let discovery_path = std::env::temp_dir().join(jgd_discovery::DISCOVERY_FILENAME);
    // The broker writes discovery synchronously before printing readiness,
    // which `RunningBroker::start` already blocked on.
    let contents = std::fs::read(&discovery_path).expect("discovery file exists after startup");
    let info: jgd_discovery::DiscoveryInfo =
        serde_json::from_slice(&contents).expect("discovery file is valid json");
    assert_eq!(info.pid, broker.child.id());
    assert_eq!(info.http_port, broker.http_port);

    broker.shutdown_gracefully();

    // A file matching this pid should no longer be present; a concurrent
    // broker (different pid) would be left untouched, but in this test
    // environment no other instance is running against the same path.
    match std::fs::read(&discovery_path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Ok(bytes) => {
            let remaining: jgd_discovery::DiscoveryInfo =
                serde_json::from_slice(&bytes).expect("discovery file is valid json");
            assert_ne!(remaining.pid, broker.child.id());
        }
        Err(e) => panic!("unexpected error reading discovery file: {e}"),
    }
}

#[tokio::test]
async fn http_server_answers_on_the_announced_port_before_shutdown() {
    let broker = RunningBroker::start();
    let url = format!("http://127.0.0.1:{}/", broker.http_port);
    let response = reqwest::get(&url).await.expect("http server is reachable");
    assert!(response.status().is_client_error() || response.status().is_success());
}
