//! Shared helper for the end-to-end suites: spawns the real `jgd` binary
//! as a subprocess, parses its readiness block off stdout, and
//! exposes the producer/HTTP endpoints it bound to.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};

pub struct RunningBroker {
    pub child: Child,
    pub producer_addr: String,
    pub http_port: u16,
}

impl RunningBroker {
    /// Starts `jgd --tcp 0 --http 127.0.0.1:0` (TCP producer transport, so
    /// the test doesn't need a Unix socket path, and an OS-assigned HTTP
    /// port) and blocks until the readiness block appears on stdout.
    pub fn start() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_jgd"))
            .args(["--tcp", "0", "--http", "127.0.0.1:0"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn jgd binary");

        let stdout = child.stdout.take().expect("child stdout was piped");
        let mut lines = BufReader::new(stdout).lines();

        let ready = lines
            .next()
            .expect("child exited before announcing readiness")
            .unwrap();
        assert_eq!(ready, "jgd server ready");

        let socket_line = lines.next().unwrap().unwrap();
        let producer_addr = parse_socket_line(&socket_line);

        let http_line = lines.next().unwrap().unwrap();
        let http_port = parse_http_line(&http_line);

        RunningBroker {
            child,
            producer_addr,
            http_port,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.http_port)
    }

    #[cfg(unix)]
    pub fn shutdown_gracefully(&mut self) {
        let pid = self.child.id();
        let _ = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status();
        let _ = self.child.wait();
    }
}

impl Drop for RunningBroker {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Parses `  R socket:  tcp://127.0.0.1:54321` into `127.0.0.1:54321`, the
/// form `TcpStream::connect` wants.
fn parse_socket_line(line: &str) -> String {
    let uri = line.trim().strip_prefix("R socket:").unwrap().trim();
    uri.strip_prefix("tcp://")
        .expect("test broker always runs with --tcp")
        .to_owned()
}

/// Parses `  HTTP:      http://127.0.0.1:54322/` into `54322`.
fn parse_http_line(line: &str) -> u16 {
    let url = line.trim().strip_prefix("HTTP:").unwrap().trim();
    let without_scheme = url.strip_prefix("http://").unwrap();
    let host_port = without_scheme.trim_end_matches('/');
    host_port
        .rsplit(':')
        .next()
        .unwrap()
        .parse()
        .expect("HTTP readiness line carries a numeric port")
}
