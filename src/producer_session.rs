//! Producer session state machine: frames NDJSON off one connection,
//! sends the deferred welcome once the first inbound line has been
//! consumed, extracts a producer-chosen session id from the first frame
//! that carries one, and forwards every decoded line to the Hub.
//!
//! The session's own task both drains the Hub's per-session outbound
//! channel and reads inbound lines; since only this task ever writes to
//! the connection, the channel itself is the serial write queue.

use jgd_hub::{Hub, Outbound};
use jgd_protocol::wire::{Frame, ServerInfo};
use jgd_transport::{Connection, TransportError};
use tracing::{debug, warn};

pub async fn run(hub: Hub, mut connection: Connection, transport_tag: &'static str, http_url: String) {
    let internal_id = hub.next_internal_id().await;
    let mut current_id = internal_id.clone();
    let mut rx = hub.register_session(current_id.clone()).await;
    debug!(session_id = %current_id, peer = %connection.peer_description, "producer connected");

    let mut welcome_sent = false;
    let mut first_session_id_extracted = false;
    let mut buf = String::new();

    loop {
        tokio::select! {
            biased;
            outbound = rx.recv() => {
                match outbound {
                    Some(Outbound::Line(line)) => {
                        if let Err(e) = write_line(&mut connection, &line).await {
                            log_write_error(&current_id, e);
                        }
                    }
                    Some(Outbound::Close) | None => break,
                }
            }
            read = connection.read_line(&mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = buf.trim_end_matches(['\n', '\r']).to_owned();
                        buf.clear();
                        if line.is_empty() {
                            continue;
                        }

                        if !welcome_sent {
                            welcome_sent = true;
                            let welcome = ServerInfo::new(transport_tag, http_url.clone());
                            if let Err(e) = write_line(&mut connection, &welcome.to_ndjson_line()).await {
                                log_write_error(&current_id, e);
                            }
                        }

                        match Frame::parse(&line) {
                            Ok(frame) => {
                                if !first_session_id_extracted {
                                    if let Some(new_id) = extract_plot_session_id(&frame) {
                                        first_session_id_extracted = true;
                                        hub.update_session_id(&current_id, &new_id).await;
                                        current_id = new_id;
                                    }
                                }
                                hub.handle_producer_message(&current_id, frame).await;
                            }
                            Err(_) => {
                                debug!(session_id = %current_id, "dropping undecodable producer line");
                            }
                        }
                    }
                    Err(e) => {
                        debug!(session_id = %current_id, error = ?e, "producer read error, closing session");
                        break;
                    }
                }
            }
        }
    }

    hub.unregister_session(&current_id).await;
    debug!(session_id = %current_id, "producer session closed");
}

async fn write_line(connection: &mut Connection, line: &str) -> Result<(), TransportError> {
    let mut data = Vec::with_capacity(line.len() + 1);
    data.extend_from_slice(line.as_bytes());
    data.push(b'\n');
    connection.write_all(&data).await
}

/// Welcome-send failures are expected whenever a producer closes right
/// after a fast plot; only surprising errors get logged above debug.
fn log_write_error(session_id: &str, err: TransportError) {
    match err {
        TransportError::BrokenPipe | TransportError::ConnectionReset | TransportError::BadResource => {
            debug!(session_id, "producer write failed: peer likely gone");
        }
        other => warn!(session_id, error = %other, "producer write failed"),
    }
}

/// `plot.sessionId`, if present and a non-empty string.
fn extract_plot_session_id(frame: &Frame) -> Option<String> {
    let plot = frame.object.get("plot")?.as_object()?;
    let session_id = plot.get("sessionId")?.as_str()?;
    if session_id.is_empty() {
        None
    } else {
        Some(session_id.to_owned())
    }
}
