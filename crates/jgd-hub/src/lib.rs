//! The Hub: the single serialized point of mutation for session and
//! viewer registries, pending-resize queues, and metrics correlation. Pure
//! routing logic with no socket I/O of its own — connections talk to it
//! through [`Outbound`] channels, which keeps it easy to unit test without
//! standing up any real transport.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use jgd_protocol::wire::{prepend_entries, prepend_entries_in, Frame, MetricsResponseFallback};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Cap on the number of pending resize entries queued per session.
/// Excess entries are silently dropped (logged at debug), never block
/// the producer or grow unbounded.
const PENDING_RESIZE_CAP: usize = 32;

/// Window a `metrics_request` is allowed to wait for a viewer's response
/// before the broker synthesizes a zero-valued fallback.
const METRICS_TIMEOUT: Duration = Duration::from_secs(2);

/// One line queued for a connection's serial writer task. Both hub-driven
/// forwards and a connection's own locally-triggered messages (e.g. a
/// producer's deferred welcome) go through this same channel so total
/// write order is preserved.
#[derive(Debug, Clone)]
pub enum Outbound {
    Line(String),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingResizeEntry {
    Normal,
    Indexed { plot_index: i64 },
}

struct SessionEntry {
    tx: mpsc::UnboundedSender<Outbound>,
    pending_resize: VecDeque<PendingResizeEntry>,
    /// Last `(width, height)` forwarded to this session via a normal
    /// (no-plotIndex) resize, used to dedup a repeated viewer resize.
    last_wh: Option<(f64, f64)>,
}

struct ClientEntry {
    tx: mpsc::UnboundedSender<Outbound>,
}

struct MetricsCorrelation {
    session_id: String,
}

struct Inner {
    sessions: HashMap<String, SessionEntry>,
    clients: HashMap<u64, ClientEntry>,
    metrics_pending: HashMap<String, MetricsCorrelation>,
    next_internal_id: u64,
    next_client_id: u64,
    http_port: Option<u16>,
}

impl Inner {
    fn new() -> Self {
        Inner {
            sessions: HashMap::new(),
            clients: HashMap::new(),
            metrics_pending: HashMap::new(),
            next_internal_id: 1,
            next_client_id: 0,
            http_port: None,
        }
    }
}

/// Shared handle to the hub. Cheap to clone; every clone sees the same
/// underlying state, serialized behind a single `tokio::sync::Mutex` —
/// the broker's single-writer actor.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<Mutex<Inner>>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Hub {
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    pub async fn set_http_port(&self, port: u16) {
        self.inner.lock().await.http_port = Some(port);
    }

    pub async fn http_port(&self) -> Option<u16> {
        self.inner.lock().await.http_port
    }

    /// Allocate the next globally-unique `conn-N` internal id.
    pub async fn next_internal_id(&self) -> String {
        let mut inner = self.inner.lock().await;
        let id = inner.next_internal_id;
        inner.next_internal_id += 1;
        format!("conn-{id}")
    }

    /// Register a new producer session under `id` (its `conn-N` internal
    /// id, until/unless it is renamed). Returns the receiver the session's
    /// write-pump task should drain.
    pub async fn register_session(&self, id: String) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        inner.sessions.insert(
            id,
            SessionEntry {
                tx,
                pending_resize: VecDeque::new(),
                last_wh: None,
            },
        );
        rx
    }

    pub async fn unregister_session(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(id);
        inner
            .metrics_pending
            .retain(|_, correlation| correlation.session_id != id);
    }

    /// Rename a session's key from `old_id` to `new_id` when a producer
    /// announces its own chosen session id. Any metrics correlation entries
    /// still pointing at `old_id` are rewritten atomically in the same lock
    /// so a response arriving right after the rename still finds its
    /// session.
    pub async fn update_session_id(&self, old_id: &str, new_id: &str) {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.sessions.remove(old_id) else {
            return;
        };
        for correlation in inner.metrics_pending.values_mut() {
            if correlation.session_id == old_id {
                correlation.session_id = new_id.to_owned();
            }
        }
        inner.sessions.insert(new_id.to_owned(), entry);
    }

    pub async fn register_client(&self) -> (u64, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        let id = inner.next_client_id;
        inner.next_client_id += 1;
        inner.clients.insert(id, ClientEntry { tx });
        (id, rx)
    }

    pub async fn unregister_client(&self, id: u64) {
        self.inner.lock().await.clients.remove(&id);
    }

    /// Dispatch one decoded line from a producer connection.
    pub async fn handle_producer_message(&self, session_id: &str, mut frame: Frame) {
        match frame.message_type() {
            Some("frame") => self.handle_frame(session_id, &mut frame).await,
            Some("metrics_request") => self.handle_metrics_request(session_id, &frame).await,
            Some("close") => self.broadcast_to_clients(frame.serialize()).await,
            Some("ping") => debug!(session_id, "ignoring producer ping"),
            Some(other) => {
                debug!(session_id, kind = other, "forwarding unrecognised producer message type verbatim");
                self.broadcast_to_clients(frame.serialize()).await;
            }
            None => debug!(session_id, "producer message missing type field, dropping"),
        }
    }

    async fn broadcast_to_clients(&self, line: String) {
        let inner = self.inner.lock().await;
        for client in inner.clients.values() {
            let _ = client.tx.send(Outbound::Line(line.clone()));
        }
    }

    /// Pop this session's next pending-resize entry (if any) and tag the
    /// outer object with `resize`/`plotIndex` accordingly; inject
    /// `plot.sessionId` if the producer didn't supply one. Consumes the
    /// head of the queue so pipelined frames each resolve the next entry
    /// in submission order.
    async fn handle_frame(&self, session_id: &str, frame: &mut Frame) {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.sessions.get_mut(session_id) else {
            return;
        };
        let popped = session.pending_resize.pop_front();

        match popped {
            Some(PendingResizeEntry::Normal) => {
                prepend_entries(&mut frame.object, vec![("resize", Value::Bool(true))]);
            }
            Some(PendingResizeEntry::Indexed { plot_index }) => {
                prepend_entries(
                    &mut frame.object,
                    vec![
                        ("resize", Value::Bool(true)),
                        ("plotIndex", Value::from(plot_index)),
                    ],
                );
            }
            None => {}
        }

        let needs_session_id = match frame.object.get("plot") {
            Some(Value::Object(plot)) => !matches!(plot.get("sessionId"), Some(Value::String(_))),
            _ => false,
        };
        if needs_session_id {
            prepend_entries_in(
                &mut frame.object,
                "plot",
                vec![("sessionId", Value::String(session_id.to_owned()))],
            );
        }

        let line = frame.serialize();
        for client in inner.clients.values() {
            let _ = client.tx.send(Outbound::Line(line.clone()));
        }
    }

    async fn handle_metrics_request(&self, session_id: &str, frame: &Frame) {
        let Some(id_value) = frame.object.get("id").cloned() else {
            debug!(session_id, "metrics_request missing id, dropping");
            return;
        };
        let Some(id_number) = id_value.as_f64() else {
            debug!(session_id, "metrics_request id is not a number, dropping");
            return;
        };
        if !id_number.is_finite() {
            debug!(session_id, "metrics_request id is not finite, dropping");
            return;
        }
        let id_key = canonical_id_key(&id_value);

        let mut inner = self.inner.lock().await;
        if inner.clients.is_empty() {
            self.send_metrics_fallback_locked(&mut inner, session_id, id_value);
            return;
        }

        inner.metrics_pending.insert(
            id_key.clone(),
            MetricsCorrelation {
                session_id: session_id.to_owned(),
            },
        );

        let line = frame.serialize();
        for client in inner.clients.values() {
            let _ = client.tx.send(Outbound::Line(line.clone()));
        }
        drop(inner);

        let hub = self.clone();
        let id_for_timeout = id_value.clone();
        tokio::spawn(async move {
            tokio::time::sleep(METRICS_TIMEOUT).await;
            hub.fire_metrics_timeout(&id_key, id_for_timeout).await;
        });
    }

    async fn fire_metrics_timeout(&self, id_key: &str, id_value: Value) {
        let mut inner = self.inner.lock().await;
        let Some(correlation) = inner.metrics_pending.remove(id_key) else {
            return;
        };
        warn!(session_id = %correlation.session_id, "metrics_request timed out, sending zero fallback");
        self.send_metrics_fallback_locked(&mut inner, &correlation.session_id, id_value);
    }

    fn send_metrics_fallback_locked(&self, inner: &mut Inner, session_id: &str, id: Value) {
        if let Some(session) = inner.sessions.get(session_id) {
            let fallback = MetricsResponseFallback::zero(id);
            let _ = session.tx.send(Outbound::Line(fallback.to_ndjson_line()));
        }
    }

    /// A viewer's `metrics_response` arrived: forward it to the producer
    /// that originally asked, if that correlation is still outstanding.
    /// Responses for an unknown or already-resolved id are silently
    /// dropped — the request either timed out or was already answered
    /// once.
    pub async fn handle_metrics_response(&self, line: &str) {
        let Ok(frame) = Frame::parse(line) else {
            debug!("metrics_response is not valid json, dropping");
            return;
        };
        let Some(id) = frame.object.get("id").cloned() else {
            debug!("metrics_response missing id, dropping");
            return;
        };
        let id_key = canonical_id_key(&id);
        let mut inner = self.inner.lock().await;
        let Some(correlation) = inner.metrics_pending.remove(&id_key) else {
            return;
        };
        if let Some(session) = inner.sessions.get(&correlation.session_id) {
            let _ = session.tx.send(Outbound::Line(frame.serialize()));
        }
    }

    /// A viewer sent a `resize`. Parsing and field validation happen here:
    /// an unparseable line is treated as having no dedup information — it
    /// is forwarded verbatim and enqueued as a plain no-plotIndex entry.
    pub async fn handle_resize(&self, line: &str) {
        match parse_resize(line) {
            ParsedResize::Indexed {
                session_id,
                plot_index,
                width,
                height,
            } => {
                self.handle_indexed_resize(&session_id, plot_index, width, height)
                    .await;
            }
            ParsedResize::Normal { width, height } => {
                self.handle_normal_resize(Some((width, height)), line).await;
            }
            ParsedResize::Unparseable => {
                self.handle_normal_resize(None, line).await;
            }
        }
    }

    async fn handle_indexed_resize(
        &self,
        session_id: &str,
        plot_index: i64,
        width: f64,
        height: f64,
    ) {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.sessions.get_mut(session_id) else {
            debug!(session_id, "plotIndex resize for unknown session, dropping");
            return;
        };
        if session.pending_resize.len() >= PENDING_RESIZE_CAP {
            debug!(session_id, "pending-resize queue at cap, dropping entry");
            return;
        }
        session
            .pending_resize
            .push_back(PendingResizeEntry::Indexed { plot_index });
        session.last_wh = Some((width, height));

        let forward = serde_json::json!({
            "type": "resize",
            "width": width,
            "height": height,
            "plotIndex": plot_index,
        });
        let _ = session.tx.send(Outbound::Line(forward.to_string()));
    }

    /// `wh`: `Some` when width/height parsed to a usable value; `None`
    /// when the line was unparseable, in which case dedup is skipped
    /// entirely and the original line is forwarded unchanged.
    async fn handle_normal_resize(&self, wh: Option<(f64, f64)>, original_line: &str) {
        let mut inner = self.inner.lock().await;
        let ids: Vec<String> = inner.sessions.keys().cloned().collect();
        for id in ids {
            let session = inner.sessions.get_mut(&id).expect("id came from keys()");
            if let Some(wh) = wh {
                if session.last_wh == Some(wh) {
                    continue;
                }
            }
            session
                .pending_resize
                .retain(|e| !matches!(e, PendingResizeEntry::Normal));
            if session.pending_resize.len() >= PENDING_RESIZE_CAP {
                debug!(session_id = %id, "pending-resize queue at cap, dropping entry");
            } else {
                session.pending_resize.push_back(PendingResizeEntry::Normal);
            }
            if let Some(wh) = wh {
                session.last_wh = Some(wh);
            }
            let _ = session
                .tx
                .send(Outbound::Line(original_line.to_owned()));
        }
    }

    /// Close every session and client, signaling their write-pump tasks
    /// to shut down.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        for session in inner.sessions.values() {
            let _ = session.tx.send(Outbound::Close);
        }
        for client in inner.clients.values() {
            let _ = client.tx.send(Outbound::Close);
        }
        inner.sessions.clear();
        inner.clients.clear();
    }
}

enum ParsedResize {
    Indexed {
        session_id: String,
        plot_index: i64,
        width: f64,
        height: f64,
    },
    Normal {
        width: f64,
        height: f64,
    },
    Unparseable,
}

/// Parse a viewer `resize` line: `plotIndex` present requires a
/// `sessionId` to target (handled by the caller, which drops it if absent);
/// a width and height that are both non-positive is treated identically to
/// a JSON-decode failure.
fn parse_resize(line: &str) -> ParsedResize {
    let Ok(value) = serde_json::from_str::<Value>(line) else {
        return ParsedResize::Unparseable;
    };
    let Some(object) = value.as_object() else {
        return ParsedResize::Unparseable;
    };
    let Some(width) = object.get("width").and_then(Value::as_f64) else {
        return ParsedResize::Unparseable;
    };
    let Some(height) = object.get("height").and_then(Value::as_f64) else {
        return ParsedResize::Unparseable;
    };
    if width <= 0.0 && height <= 0.0 {
        return ParsedResize::Unparseable;
    }
    match object.get("plotIndex").and_then(Value::as_i64) {
        Some(plot_index) => match object.get("sessionId").and_then(Value::as_str) {
            Some(session_id) => ParsedResize::Indexed {
                session_id: session_id.to_owned(),
                plot_index,
                width,
                height,
            },
            None => ParsedResize::Unparseable,
        },
        None => ParsedResize::Normal { width, height },
    }
}

/// `Value` doesn't implement `Hash`/`Eq` for floats, and `metrics_request`
/// ids are arbitrary JSON numbers — key the correlation table by the
/// canonical string form instead.
fn canonical_id_key(id: &Value) -> String {
    id.to_string()
}
