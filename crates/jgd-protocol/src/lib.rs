pub mod socket_uri;
pub mod wire;

pub use socket_uri::{SocketAddress, SocketUriError};
pub use wire::{
    DecodeError, Frame, MetricsResponseFallback, MetricsResponseKind, ServerInfo,
    ServerInfoDetail, ServerInfoKind,
};
