//! Supervisor / main: startup ordering, readiness signalling on stdout,
//! signal-driven shutdown, and draining. Uses a `tokio::select!` over
//! Ctrl-C/SIGTERM for the shutdown signal and
//! `axum::serve(..).with_graceful_shutdown(...)` for the HTTP half.

use std::process;
use std::time::Duration;

use jgd_discovery::DiscoveryInfo;
use jgd_hub::Hub;
use jgd_protocol::SocketAddress;
use jgd_transport::Listener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cli::{Config, ProducerTransport};
use crate::http::{build_router, AppState};
use crate::producer_session;

/// Grace period the supervisor waits for in-flight producer session loops
/// to finish after signalling shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn run(config: Config) {
    let log_filter = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter)),
        )
        .init();

    // 1. Construct Hub.
    let hub = Hub::new();

    // 2. Bind the producer-transport listener; the canonical URI is fixed
    //    from this point on.
    let (producer_addr, transport_tag) = resolve_producer_address(&config.producer_transport);
    let producer_listener = match Listener::bind(&producer_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            if matches!(e, jgd_transport::TransportError::SocketInUse) {
                error!(uri = %jgd_protocol::socket_uri::format(&producer_addr), "stale socket is in use by a live peer");
                process::exit(1);
            }
            error!(error = %e, "failed to bind producer transport");
            process::exit(1);
        }
    };
    let bound_producer_addr = match (&producer_addr, producer_listener.local_tcp_port()) {
        (SocketAddress::Tcp { host, .. }, Some(port)) => SocketAddress::Tcp {
            host: host.clone(),
            port,
        },
        _ => producer_addr,
    };
    let canonical_uri = jgd_protocol::socket_uri::format(&bound_producer_addr);

    // 3. Bind the HTTP server; note the bound port; store it on the Hub.
    let http_listener = match tokio::net::TcpListener::bind(&config.http_bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.http_bind, "failed to bind http listener");
            process::exit(1);
        }
    };
    let http_port = http_listener
        .local_addr()
        .expect("bound listener has a local address")
        .port();
    hub.set_http_port(http_port).await;
    let http_url = format!("http://127.0.0.1:{http_port}/");

    let app_state = AppState {
        hub: hub.clone(),
        verbose: config.verbose,
        web_dir: config.web_dir.map(std::path::PathBuf::from),
    };
    let router = build_router(app_state);

    // 4. Spawn the accept loop for producer connections. Session tasks are
    //    tracked in a shared JoinSet so shutdown can wait for them to drain.
    let sessions = std::sync::Arc::new(tokio::sync::Mutex::new(JoinSet::new()));
    let accept_hub = hub.clone();
    let accept_listener_handle = std::sync::Arc::new(producer_listener);
    let accept_loop_listener = accept_listener_handle.clone();
    let accept_http_url = http_url.clone();
    let accept_sessions = sessions.clone();
    let accept_task = tokio::spawn(async move {
        loop {
            match accept_loop_listener.accept().await {
                Ok(connection) => {
                    let hub = accept_hub.clone();
                    let http_url = accept_http_url.clone();
                    let mut sessions = accept_sessions.lock().await;
                    sessions.spawn(producer_session::run(hub, connection, transport_tag, http_url));
                }
                Err(jgd_transport::TransportError::Closed) => break,
                Err(e) => {
                    warn!(error = %e, "producer accept failed");
                }
            }
        }
    });

    // 5. Write discovery file.
    let discovery_info = DiscoveryInfo::for_current_process(canonical_uri.clone(), http_port);
    if let Err(e) = jgd_discovery::write_discovery(&discovery_info) {
        warn!(error = %e, "failed to write discovery file");
    }

    // 6. Install signal handlers (INT everywhere; TERM only where supported).
    // 7. Emit the readiness block, then serve until a shutdown signal.
    println!("jgd server ready");
    println!("  R socket:  {canonical_uri}");
    println!("  HTTP:      {http_url}");

    axum::serve(http_listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("http server error");

    info!("shutdown signal received, draining");

    jgd_discovery::remove_discovery();
    accept_listener_handle.close_and_cleanup();
    accept_task.abort();
    hub.close().await;

    let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let mut sessions = sessions.lock().await;
        while sessions.join_next().await.is_some() {}
    })
    .await;

    info!("jgd server stopped");
}

fn resolve_producer_address(transport: &ProducerTransport) -> (SocketAddress, &'static str) {
    match transport {
        ProducerTransport::Tcp { port } => (
            SocketAddress::Tcp {
                host: "127.0.0.1".to_owned(),
                port: *port,
            },
            "tcp",
        ),
        ProducerTransport::Default { socket_path } => {
            #[cfg(windows)]
            {
                let _ = socket_path;
                (
                    SocketAddress::NamedPipe {
                        name: format!("jgd-{}", process::id()),
                    },
                    "npipe",
                )
            }
            #[cfg(not(windows))]
            {
                let path = socket_path.clone().unwrap_or_else(default_unix_socket_path);
                (SocketAddress::Unix { path }, "unix")
            }
        }
    }
}

#[cfg(not(windows))]
fn default_unix_socket_path() -> String {
    std::env::temp_dir()
        .join(format!("jgd-{}.sock", process::id()))
        .to_string_lossy()
        .into_owned()
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful
/// shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C"); }
        _ = terminate => { info!("received SIGTERM"); }
    }
}
