// Push channel: the backend emits one `new_log` Socket.IO event per captured
// DNS query. Engine.IO v4 framing over a plain websocket.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

use crate::error::SourceError;
use crate::models::dto::RecordDTO;
use crate::session::SessionEvent;

pub const NEW_LOG_EVENT: &str = "new_log";

const ENGINE_OPEN: char = '0';
const ENGINE_CLOSE: char = '1';
const ENGINE_PING: char = '2';
const ENGINE_MESSAGE: char = '4';
const SOCKET_CONNECT: char = '0';
const SOCKET_DISCONNECT: char = '1';
const SOCKET_EVENT: char = '2';

const PONG: &str = "3";
const JOIN_DEFAULT_NAMESPACE: &str = "40";

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open,
    Connected,
    Ping,
    Event { name: String, payload: Value },
    Close,
    Other,
}

pub fn decode_frame(text: &str) -> Frame {
    let mut chars = text.chars();
    match chars.next() {
        Some(ENGINE_OPEN) => Frame::Open,
        Some(ENGINE_CLOSE) => Frame::Close,
        Some(ENGINE_PING) => Frame::Ping,
        Some(ENGINE_MESSAGE) => decode_packet(chars.as_str()),
        _ => Frame::Other,
    }
}

fn decode_packet(packet: &str) -> Frame {
    let mut chars = packet.chars();
    match chars.next() {
        Some(SOCKET_CONNECT) => Frame::Connected,
        Some(SOCKET_DISCONNECT) => Frame::Close,
        Some(SOCKET_EVENT) => decode_event(chars.as_str()),
        _ => Frame::Other,
    }
}

fn decode_event(body: &str) -> Frame {
    // optional "/namespace," then optional ack id before the JSON array
    let body = match body.strip_prefix('/') {
        Some(rest) => rest.split_once(',').map(|(_, b)| b).unwrap_or(""),
        None => body,
    };
    let body = body.trim_start_matches(|c: char| c.is_ascii_digit());

    let Ok(Value::Array(mut args)) = serde_json::from_str::<Value>(body) else {
        return Frame::Other;
    };
    if args.is_empty() {
        return Frame::Other;
    }
    let Value::String(name) = args.remove(0) else {
        return Frame::Other;
    };
    let payload = if args.is_empty() { Value::Null } else { args.remove(0) };
    Frame::Event { name, payload }
}

/// Reads one connection until it drops. Returns `Ok` only when the session
/// stopped listening.
pub async fn listen(url: &str, events: &UnboundedSender<SessionEvent>) -> Result<(), SourceError> {
    let (mut ws, _) = connect_async(url).await?;
    info!(url, "push channel connected");

    while let Some(message) = ws.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(SourceError::PushClosed),
            _ => continue,
        };

        match decode_frame(&text) {
            Frame::Open => ws.send(Message::Text(JOIN_DEFAULT_NAMESPACE.into())).await?,
            Frame::Ping => ws.send(Message::Text(PONG.into())).await?,
            Frame::Connected => debug!("joined default namespace"),
            Frame::Event { name, payload } if name == NEW_LOG_EVENT => {
                let dto: RecordDTO = serde_json::from_value(payload).unwrap_or_default();
                if events.send(SessionEvent::Pushed(dto)).is_err() {
                    return Ok(());
                }
            }
            Frame::Event { name, .. } => debug!(%name, "ignoring push event"),
            Frame::Close => return Err(SourceError::PushClosed),
            Frame::Other => {}
        }
    }
    Err(SourceError::PushClosed)
}

/// Keeps the push channel up, reconnecting after `delay`, until `running`
/// clears or the session goes away.
pub async fn run(url: String, events: UnboundedSender<SessionEvent>, running: Arc<AtomicBool>, delay: Duration) {
    while running.load(Ordering::SeqCst) && !events.is_closed() {
        match listen(&url, &events).await {
            Ok(()) => break,
            Err(e) => {
                error!("Push channel error: {}", e);
                if events.send(SessionEvent::PushLost(e)).is_err() {
                    break;
                }
            }
        }
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn engine_control_frames() {
        assert_eq!(decode_frame(r#"0{"sid":"abc","pingInterval":25000}"#), Frame::Open);
        assert_eq!(decode_frame("2"), Frame::Ping);
        assert_eq!(decode_frame("1"), Frame::Close);
        assert_eq!(decode_frame("40{\"sid\":\"x\"}"), Frame::Connected);
        assert_eq!(decode_frame("41"), Frame::Close);
        assert_eq!(decode_frame(""), Frame::Other);
    }

    #[test]
    fn new_log_event_carries_the_record() {
        let frame = decode_frame(
            r#"42["new_log",{"domain":"a.com","ip":"10.0.0.2","time":"2024-03-01 12:00:00","protocol":"UDP","length":74}]"#,
        );
        let Frame::Event { name, payload } = frame else {
            panic!("expected event, got {:?}", frame);
        };
        assert_eq!(name, NEW_LOG_EVENT);
        assert_eq!(payload["domain"], json!("a.com"));

        let dto: RecordDTO = serde_json::from_value(payload).unwrap();
        assert_eq!(dto.length, Some(json!(74)));
    }

    #[test]
    fn namespace_and_ack_id_are_skipped() {
        let frame = decode_frame(r#"42/dns,17["new_log",{"domain":"b.com"}]"#);
        assert_eq!(
            frame,
            Frame::Event {
                name: "new_log".into(),
                payload: json!({"domain": "b.com"})
            }
        );
    }

    #[test]
    fn malformed_events_are_ignored() {
        assert_eq!(decode_frame("42not json"), Frame::Other);
        assert_eq!(decode_frame("42[]"), Frame::Other);
        assert_eq!(decode_frame("42[5, {}]"), Frame::Other);
    }

    #[test]
    fn event_without_payload_has_null() {
        assert_eq!(
            decode_frame(r#"42["memory_stats"]"#),
            Frame::Event { name: "memory_stats".into(), payload: Value::Null }
        );
    }
}
