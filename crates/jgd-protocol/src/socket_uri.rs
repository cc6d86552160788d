//! Socket URI parsing and canonical formatting.
//!
//! Three schemes are recognised: `tcp://host:port`, `unix:///abs/path`, and
//! `npipe:///name`. [`format`] is the canonical form used in logs, env vars,
//! and the discovery file; [`parse`] is its left inverse on every string
//! [`format`] can produce.

use std::fmt;

/// A parsed transport address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAddress {
    Tcp { host: String, port: u16 },
    Unix { path: String },
    NamedPipe { name: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SocketUriError {
    #[error("malformed socket uri '{0}'")]
    MalformedUri(String),
}

/// Parse a canonical socket URI. Does not accept bare filesystem paths —
/// see [`parse_lenient`] for that alias mode.
pub fn parse(s: &str) -> Result<SocketAddress, SocketUriError> {
    if let Some(rest) = s.strip_prefix("tcp://") {
        return parse_tcp(rest, s);
    }
    if let Some(rest) = s.strip_prefix("unix://") {
        return parse_unix(rest, s);
    }
    if let Some(rest) = s.strip_prefix("npipe://") {
        return parse_npipe(rest, s);
    }
    Err(SocketUriError::MalformedUri(s.to_owned()))
}

/// Parse a socket URI, additionally accepting a raw absolute filesystem
/// path as an alias for `unix://<path>`. Used only for producer-facing CLI
/// input; [`format`] never emits this bare form.
pub fn parse_lenient(s: &str) -> Result<SocketAddress, SocketUriError> {
    match parse(s) {
        Ok(addr) => Ok(addr),
        Err(e) => {
            if s.starts_with('/') {
                Ok(SocketAddress::Unix {
                    path: s.to_owned(),
                })
            } else {
                Err(e)
            }
        }
    }
}

fn parse_tcp(rest: &str, original: &str) -> Result<SocketAddress, SocketUriError> {
    let colon = rest
        .rfind(':')
        .ok_or_else(|| SocketUriError::MalformedUri(original.to_owned()))?;
    let host = &rest[..colon];
    let port_str = &rest[colon + 1..];
    if host.is_empty() {
        return Err(SocketUriError::MalformedUri(original.to_owned()));
    }
    let port: u16 = port_str
        .parse()
        .map_err(|_| SocketUriError::MalformedUri(original.to_owned()))?;
    Ok(SocketAddress::Tcp {
        host: host.to_owned(),
        port,
    })
}

fn parse_unix(rest: &str, original: &str) -> Result<SocketAddress, SocketUriError> {
    if rest.is_empty() {
        return Err(SocketUriError::MalformedUri(original.to_owned()));
    }
    // rest begins with the path's leading '/' since the scheme carries
    // three slashes for an absolute path (unix:///abs/path).
    let decoded = percent_decode(rest);
    if !decoded.starts_with('/') {
        return Err(SocketUriError::MalformedUri(original.to_owned()));
    }
    Ok(SocketAddress::Unix { path: decoded })
}

fn parse_npipe(rest: &str, original: &str) -> Result<SocketAddress, SocketUriError> {
    let name = rest.trim_start_matches('/');
    if name.is_empty() {
        return Err(SocketUriError::MalformedUri(original.to_owned()));
    }
    Ok(SocketAddress::NamedPipe {
        name: percent_decode(name),
    })
}

/// Canonical string form. Left inverse of [`parse`] (and of [`parse_lenient`]
/// restricted to its non-aliased inputs).
pub fn format(addr: &SocketAddress) -> String {
    match addr {
        SocketAddress::Tcp { host, port } => format!("tcp://{host}:{port}"),
        SocketAddress::Unix { path } => format!("unix://{}", percent_encode(path)),
        SocketAddress::NamedPipe { name } => format!("npipe:///{}", percent_encode(name)),
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format(self))
    }
}

/// Percent-encode only `#` and `?` — the two characters that would
/// otherwise be misread as a fragment or query delimiter in a path-shaped
/// URI component.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            _ => out.push(c),
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte as char);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}
