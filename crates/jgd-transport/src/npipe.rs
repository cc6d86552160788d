//! Windows named-pipe backend. The accept loop runs over a single
//! process-global pipe name; there is no filesystem entry to reclaim or
//! clean up on shutdown, unlike the Unix backend.

use crate::connection::{Connection, TransportError};

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use interprocess::local_socket::tokio::{Listener as PipeListener, Stream as PipeStream};
    use interprocess::local_socket::{GenericNamespaced, ListenerOptions, ToNsName};
    use tokio::io::split;

    pub struct NamedPipeBackend {
        listener: PipeListener,
        name: String,
    }

    impl NamedPipeBackend {
        pub async fn bind(name: &str) -> Result<Self, TransportError> {
            let ns_name = name
                .to_ns_name::<GenericNamespaced>()
                .map_err(|e| TransportError::BindFailed(e))?;
            let listener = ListenerOptions::new()
                .name(ns_name)
                .create_tokio()
                .map_err(TransportError::BindFailed)?;
            Ok(NamedPipeBackend {
                listener,
                name: name.to_owned(),
            })
        }

        pub async fn accept(&self) -> Result<Connection, TransportError> {
            let stream: PipeStream = self
                .listener
                .accept()
                .await
                .map_err(TransportError::AcceptFailed)?;
            let (reader, writer) = split(stream);
            Ok(Connection::new(reader, writer, self.name.clone()))
        }
    }
}

#[cfg(windows)]
pub use windows_impl::NamedPipeBackend;

#[cfg(not(windows))]
pub struct NamedPipeBackend;

#[cfg(not(windows))]
impl NamedPipeBackend {
    pub async fn bind(_name: &str) -> Result<Self, TransportError> {
        Err(TransportError::Unsupported)
    }

    pub async fn accept(&self) -> Result<Connection, TransportError> {
        Err(TransportError::Unsupported)
    }
}
