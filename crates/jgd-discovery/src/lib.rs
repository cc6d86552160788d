//! Discovery rendezvous file: a small JSON file naming where the
//! running broker can be reached, written atomically so a concurrent
//! reader never observes a half-written file, and removed on shutdown only
//! if the pid inside it still matches this process.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DISCOVERY_FILENAME: &str = "jgd-discovery.json";

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to write discovery file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read discovery file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed discovery file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryInfo {
    #[serde(rename = "socketPath")]
    pub socket_path: String,
    #[serde(rename = "httpPort")]
    pub http_port: u16,
    pub pid: u32,
}

impl DiscoveryInfo {
    pub fn for_current_process(socket_path: impl Into<String>, http_port: u16) -> Self {
        DiscoveryInfo {
            socket_path: socket_path.into(),
            http_port,
            pid: std::process::id(),
        }
    }
}

/// The set of paths the discovery file is written to: the system temp
/// directory, plus `/tmp` on POSIX when it differs from the system temp
/// directory — some POSIX systems route `$TMPDIR` elsewhere, but `/tmp`
/// remains the conventional rendezvous point other tools check.
pub fn discovery_paths() -> Vec<PathBuf> {
    let mut paths = vec![std::env::temp_dir().join(DISCOVERY_FILENAME)];
    #[cfg(unix)]
    {
        let posix_tmp = PathBuf::from("/tmp").join(DISCOVERY_FILENAME);
        if !paths.contains(&posix_tmp) {
            paths.push(posix_tmp);
        }
    }
    paths
}

/// Write `info` to every path in [`discovery_paths`], each via a
/// temp-file-in-the-same-directory-then-rename so no reader ever observes
/// a partial write. Each location is attempted independently and a failure
/// at one does not stop the others — a reader only needs to find the file
/// at one of them, so partial success is still success. Only reports an
/// error if every location failed.
pub fn write_discovery(info: &DiscoveryInfo) -> Result<(), DiscoveryError> {
    let json = serde_json::to_vec_pretty(info).expect("DiscoveryInfo always serializes");
    let mut last_error = None;
    let mut any_succeeded = false;
    for path in discovery_paths() {
        match write_atomic(&path, &json) {
            Ok(()) => any_succeeded = true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to write discovery file at this location");
                last_error = Some(e);
            }
        }
    }
    if any_succeeded {
        Ok(())
    } else {
        Err(last_error.expect("discovery_paths() is never empty"))
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), DiscoveryError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".jgd-discovery-")
        .tempfile_in(dir)
        .map_err(|source| DiscoveryError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.write_all(contents)
        .and_then(|()| tmp.flush())
        .map_err(|source| DiscoveryError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tmp.persist(path)
        .map_err(|e| DiscoveryError::Write {
            path: path.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

/// Remove every discovery file whose `pid` field matches this process,
/// leaving any belonging to a different (e.g. since-restarted) broker
/// untouched.
pub fn remove_discovery() {
    let current_pid = std::process::id();
    for path in discovery_paths() {
        match read_discovery_file(&path) {
            Ok(Some(info)) if info.pid == current_pid => {
                let _ = std::fs::remove_file(&path);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping discovery cleanup"),
        }
    }
}

fn read_discovery_file(path: &Path) -> Result<Option<DiscoveryInfo>, DiscoveryError> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| DiscoveryError::Malformed {
                path: path.to_path_buf(),
                source,
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(DiscoveryError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
