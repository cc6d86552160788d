//! A type-erased, line-oriented duplex connection shared by every transport
//! backend. Erasing the concrete stream type at construction lets the
//! rest of the broker treat TCP, Unix-domain, and named-pipe connections
//! identically.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket already in use")]
    SocketInUse,
    #[error("bind failed: {0}")]
    BindFailed(#[source] io::Error),
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),
    #[error("broken pipe")]
    BrokenPipe,
    #[error("connection reset")]
    ConnectionReset,
    #[error("bad resource")]
    BadResource,
    #[error("listener closed")]
    Closed,
    #[error("unsupported transport on this platform")]
    Unsupported,
    #[error(transparent)]
    SocketUri(#[from] jgd_protocol::SocketUriError),
    #[error("io error: {0}")]
    Io(#[source] io::Error),
}

impl TransportError {
    pub(crate) fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe => TransportError::BrokenPipe,
            io::ErrorKind::ConnectionReset => TransportError::ConnectionReset,
            io::ErrorKind::NotConnected | io::ErrorKind::InvalidInput => {
                TransportError::BadResource
            }
            _ => TransportError::Io(e),
        }
    }
}

/// A connected peer, already split into a buffered line reader and a
/// plain writer. `write()` never short-writes — it always drives
/// `write_all` to completion or returns an error.
pub struct Connection {
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    pub peer_description: String,
}

impl Connection {
    pub fn new<R, W>(reader: R, writer: W, peer_description: impl Into<String>) -> Self
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Connection {
            reader: Box::new(BufReader::new(reader)),
            writer: Box::new(writer),
            peer_description: peer_description.into(),
        }
    }

    /// Read one NDJSON line, including its trailing `\n` if present.
    /// Returns `Ok(0)` at EOF, matching `AsyncBufReadExt::read_line`.
    pub async fn read_line(&mut self, buf: &mut String) -> Result<usize, TransportError> {
        self.reader
            .read_line(buf)
            .await
            .map_err(TransportError::from_io)
    }

    /// Write a full NDJSON line (the caller supplies the trailing `\n`).
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writer
            .write_all(data)
            .await
            .map_err(TransportError::from_io)?;
        self.writer.flush().await.map_err(TransportError::from_io)
    }
}
