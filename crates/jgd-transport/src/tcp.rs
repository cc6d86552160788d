use tokio::net::{TcpListener, TcpStream};

use crate::connection::{Connection, TransportError};

pub struct TcpBackend {
    listener: TcpListener,
}

impl TcpBackend {
    /// Binds loopback by default; `port == 0` lets the OS assign a port,
    /// which the caller reads back via [`TcpBackend::local_port`].
    pub async fn bind(host: &str, port: u16) -> Result<Self, TransportError> {
        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(TransportError::BindFailed)?;
        Ok(TcpBackend { listener })
    }

    pub fn local_port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or_default()
    }

    pub async fn accept(&self) -> Result<Connection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let _ = stream.set_nodelay(true);
        Ok(connection_from_stream(stream, peer.to_string()))
    }
}

fn connection_from_stream(stream: TcpStream, peer_description: String) -> Connection {
    let (reader, writer) = stream.into_split();
    Connection::new(reader, writer, peer_description)
}
