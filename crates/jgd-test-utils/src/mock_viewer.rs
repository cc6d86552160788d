//! A bare `/ws` client, standing in for the browser viewer UI during
//! integration tests.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub struct MockViewer {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl MockViewer {
    pub async fn connect(ws_url: &str) -> Result<Self, tokio_tungstenite::tungstenite::Error> {
        let (socket, _response) = connect_async(ws_url).await?;
        Ok(MockViewer { socket })
    }

    pub async fn send_line(&mut self, line: &str) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        self.socket.send(Message::Text(line.into())).await
    }

    /// Waits for the next text frame, ignoring anything else (pings, close
    /// frames handled by the stream itself).
    pub async fn recv_line(&mut self) -> Option<String> {
        while let Some(message) = self.socket.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    }
}
