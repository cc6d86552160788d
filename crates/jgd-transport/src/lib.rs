pub mod connection;
pub mod npipe;
pub mod tcp;
pub mod unix;

pub use connection::{Connection, TransportError};

use jgd_protocol::SocketAddress;
use tokio::sync::watch;

enum Backend {
    Tcp(tcp::TcpBackend),
    Unix(unix::UnixBackend),
    NamedPipe(npipe::NamedPipeBackend),
}

/// A bound listener for one of the three transports, cancellable via
/// [`Listener::close`]. `accept()` itself races the shutdown signal rather
/// than leaving that to a caller-owned select loop.
pub struct Listener {
    backend: Backend,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Listener {
    pub async fn bind(addr: &SocketAddress) -> Result<Self, TransportError> {
        let backend = match addr {
            SocketAddress::Tcp { host, port } => {
                Backend::Tcp(tcp::TcpBackend::bind(host, *port).await?)
            }
            SocketAddress::Unix { path } => {
                Backend::Unix(unix::UnixBackend::bind(std::path::Path::new(path)).await?)
            }
            SocketAddress::NamedPipe { name } => {
                Backend::NamedPipe(npipe::NamedPipeBackend::bind(name).await?)
            }
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Listener {
            backend,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// If this is a TCP listener bound to port 0, the port the OS assigned.
    pub fn local_tcp_port(&self) -> Option<u16> {
        match &self.backend {
            Backend::Tcp(t) => Some(t.local_port()),
            _ => None,
        }
    }

    /// Accept the next connection, or a terminal [`TransportError::Closed`]
    /// if [`Listener::close`] has been called — including a call that
    /// races a pending accept, which is rejected rather than completed.
    pub async fn accept(&self) -> Result<Connection, TransportError> {
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => Err(TransportError::Closed),
            result = self.accept_backend() => result,
        }
    }

    async fn accept_backend(&self) -> Result<Connection, TransportError> {
        match &self.backend {
            Backend::Tcp(t) => t.accept().await,
            Backend::Unix(u) => u.accept().await,
            Backend::NamedPipe(n) => n.accept().await,
        }
    }

    /// Signal shutdown; any in-flight or future `accept()` call returns
    /// `Closed` immediately. Does not perform filesystem cleanup — call
    /// [`Listener::close_and_cleanup`] for that.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signal shutdown and remove the Unix socket file, if any. Named-pipe
    /// and TCP backends have no filesystem entry to remove.
    pub fn close_and_cleanup(&self) {
        self.close();
        if let Backend::Unix(u) = &self.backend {
            u.remove_socket_file();
        }
    }
}
