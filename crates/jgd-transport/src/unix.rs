//! Unix-domain socket backend, with stale-socket probe-and-reclaim:
//! before binding, attempt to connect to a path that already exists — a
//! live peer fails the bind as `SocketInUse`, a dead one is removed and the
//! bind is retried.

use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::info;

use crate::connection::{Connection, TransportError};

pub struct UnixBackend {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixBackend {
    pub async fn bind(path: &Path) -> Result<Self, TransportError> {
        let listener = bind_with_stale_reclaim(path).await?;
        Ok(UnixBackend {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub async fn accept(&self) -> Result<Connection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let peer_description = addr
            .as_pathname()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unix-socket-peer".to_owned());
        Ok(connection_from_stream(stream, peer_description))
    }

    /// Remove the socket file. Only called on graceful shutdown of this
    /// listener, never speculatively.
    pub fn remove_socket_file(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove unix socket file");
            }
        }
    }
}

async fn bind_with_stale_reclaim(path: &Path) -> Result<UnixListener, TransportError> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            match UnixStream::connect(path).await {
                Ok(_) => Err(TransportError::SocketInUse),
                Err(_) => {
                    info!(path = %path.display(), "removing stale unix socket");
                    std::fs::remove_file(path).map_err(TransportError::BindFailed)?;
                    UnixListener::bind(path).map_err(TransportError::BindFailed)
                }
            }
        }
        Err(e) => Err(TransportError::BindFailed(e)),
    }
}

fn connection_from_stream(stream: UnixStream, peer_description: String) -> Connection {
    let (reader, writer) = stream.into_split();
    Connection::new(reader, writer, peer_description)
}
