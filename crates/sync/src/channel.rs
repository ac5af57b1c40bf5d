//! Duplex event channel over WebSocket.
//!
//! Frames are JSON text `{"event": name, "data": payload}`. The reader task
//! turns frames into `ServerEvent`s; the writer task drains outbound
//! `ClientEvent`s. Reconnecting is left to the caller.

use futures::{SinkExt, StreamExt};
use helpdesk_protocol::{ClientEvent, ServerEvent};
use reqwest::Url;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::error::ChannelError;
use crate::rest::truncate_for_log;

const CHANNEL_CAPACITY: usize = 100;
const PREVIEW_MAX_CHARS: usize = 240;

/// A connected, registered channel
pub struct Channel {
    outbound: mpsc::Sender<ClientEvent>,
    inbound: mpsc::Receiver<ServerEvent>,
    tasks: ChannelTasks,
}

/// Reader and writer tasks behind a `Channel`
pub struct ChannelTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ChannelTasks {
    /// Resolves once the reader stops: the server closed the socket, or the
    /// connection failed
    pub async fn closed(&mut self) {
        if !self.reader.is_finished() {
            let _ = (&mut self.reader).await;
        }
    }

    /// Let the writer drain once every outbound sender is dropped, then
    /// stop the reader
    pub async fn finish(self) {
        let _ = self.writer.await;
        self.reader.abort();
    }

    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Channel {
    /// Connect, join `room`, and start the reader/writer tasks
    pub async fn connect(url: &Url, room: &str) -> Result<Self, ChannelError> {
        let (mut stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        info!(
            component = "channel",
            event = "channel.connected",
            url = %url,
            room = %room,
            "Event channel connected"
        );

        let register = ClientEvent::Register {
            room: room.to_string(),
        };
        stream
            .send(WsMessage::Text(encode_frame(&register)?.into()))
            .await?;

        let (mut ws_tx, mut ws_rx) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientEvent>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<ServerEvent>(CHANNEL_CAPACITY);
        // Control frames (pong) produced by the reader
        let (control_tx, mut control_rx) = mpsc::channel::<WsMessage>(8);

        let writer = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    event = outbound_rx.recv() => match event.map(|e| (encode_frame(&e), e)) {
                        None => break,
                        Some((Ok(text), event)) => {
                            debug!(
                                component = "channel",
                                event = "channel.publish",
                                name = event.name(),
                                "Publishing event"
                            );
                            WsMessage::Text(text.into())
                        }
                        Some((Err(e), event)) => {
                            error!(
                                component = "channel",
                                event = "channel.publish.serialize_failed",
                                name = event.name(),
                                error = %e,
                                "Failed to serialize client event"
                            );
                            continue;
                        }
                    },
                    Some(control) = control_rx.recv() => control,
                };

                if ws_tx.send(frame).await.is_err() {
                    debug!(
                        component = "channel",
                        event = "channel.send.disconnected",
                        "WebSocket send failed, server disconnected"
                    );
                    return;
                }
            }
            let _ = ws_tx.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(result) = ws_rx.next().await {
                let text = match result {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Ping(data)) => {
                        let _ = control_tx.send(WsMessage::Pong(data)).await;
                        continue;
                    }
                    Ok(WsMessage::Close(_)) => {
                        info!(
                            component = "channel",
                            event = "channel.close_frame",
                            "Server sent close frame"
                        );
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(
                            component = "channel",
                            event = "channel.error",
                            error = %e,
                            "WebSocket error"
                        );
                        break;
                    }
                };

                match decode_frame(text.as_str()) {
                    Ok(event) => {
                        if inbound_tx.send(event).await.is_err() {
                            debug!(
                                component = "channel",
                                event = "channel.inbound.dropped",
                                "Inbound receiver gone, stopping reader"
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(
                            component = "channel",
                            event = "channel.frame.parse_failed",
                            error = %e,
                            payload_bytes = text.len(),
                            payload_preview = %truncate_for_log(text.as_str(), PREVIEW_MAX_CHARS),
                            "Skipping unrecognized frame"
                        );
                    }
                }
            }
            info!(
                component = "channel",
                event = "channel.reader.stopped",
                "Event channel reader stopped"
            );
        });

        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            tasks: ChannelTasks { reader, writer },
        })
    }

    /// Sender for outbound events, receiver for inbound events, and the tasks
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Sender<ClientEvent>,
        mpsc::Receiver<ServerEvent>,
        ChannelTasks,
    ) {
        (self.outbound, self.inbound, self.tasks)
    }
}

pub fn encode_frame(event: &ClientEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// Parse one frame. Accepts the object form and the `[name, data]` array
/// form used by socket-style servers.
pub fn decode_frame(text: &str) -> Result<ServerEvent, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let value = match value {
        Value::Array(mut items) if matches!(items.first(), Some(Value::String(_))) => {
            let data = if items.len() > 1 {
                items.swap_remove(1)
            } else {
                Value::Null
            };
            serde_json::json!({ "event": items[0], "data": data })
        }
        other => other,
    };
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::{Message as AxumMessage, WebSocketUpgrade};
    use axum::routing::get;
    use axum::Router;
    use helpdesk_protocol::{Receipt, Role};
    use std::time::Duration;
    use tokio::time::timeout;

    const NEW_MESSAGE_FRAME: &str =
        r#"{"event":"newMessage","data":{"ticketId":"T1","sender":"user","text":"hi","isRead":false}}"#;

    async fn serve(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("ws://{}/socket", addr)).expect("url")
    }

    #[test]
    fn decodes_object_frame() {
        let event = decode_frame(NEW_MESSAGE_FRAME).expect("decode");
        assert_eq!(event.name(), "newMessage");
        assert_eq!(event.ticket_id(), "T1");
    }

    #[test]
    fn decodes_array_frame() {
        let event = decode_frame(r#"["messagesRead",{"ticketId":"T5"}]"#).expect("decode");
        assert_eq!(event.name(), "messagesRead");
        assert_eq!(event.ticket_id(), "T5");
    }

    #[test]
    fn rejects_unknown_and_malformed_frames() {
        assert!(decode_frame(r#"{"event":"typing","data":{}}"#).is_err());
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"["seen"]"#).is_err());
    }

    #[tokio::test]
    async fn registers_then_exchanges_events() {
        let (frames_tx, mut frames_rx) = mpsc::channel::<String>(8);
        let app = Router::new().route(
            "/socket",
            get(move |ws: WebSocketUpgrade| {
                let frames_tx = frames_tx.clone();
                async move {
                    ws.on_upgrade(move |mut socket| async move {
                        while let Some(Ok(msg)) = socket.recv().await {
                            if let AxumMessage::Text(text) = msg {
                                let text = text.as_str().to_string();
                                let is_register = text.contains("\"register\"");
                                let _ = frames_tx.send(text).await;
                                if is_register {
                                    let _ = socket
                                        .send(AxumMessage::Text(
                                            r#"{"event":"bogus","data":{}}"#.to_string().into(),
                                        ))
                                        .await;
                                    let _ = socket
                                        .send(AxumMessage::Text(
                                            NEW_MESSAGE_FRAME.to_string().into(),
                                        ))
                                        .await;
                                }
                            }
                        }
                    })
                }
            }),
        );
        let url = serve(app).await;
        let channel = Channel::connect(&url, "admin-room").await.expect("connect");
        let (outbound, mut inbound, tasks) = channel.into_parts();

        let register = timeout(Duration::from_secs(5), frames_rx.recv())
            .await
            .expect("register in time")
            .expect("register frame");
        let register: Value = serde_json::from_str(&register).expect("register json");
        assert_eq!(register["event"], "register");
        assert_eq!(register["data"]["room"], "admin-room");

        // The bogus frame is skipped; the next one arrives.
        let event = timeout(Duration::from_secs(5), inbound.recv())
            .await
            .expect("event in time")
            .expect("inbound event");
        match event {
            ServerEvent::NewMessage(payload) => {
                assert_eq!(payload.ticket_id, "T1");
                assert_eq!(payload.message.sender, Role::User);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        outbound
            .send(ClientEvent::Seen(Receipt::from_admin("T1", None)))
            .await
            .expect("publish");
        let seen = timeout(Duration::from_secs(5), frames_rx.recv())
            .await
            .expect("seen in time")
            .expect("seen frame");
        let seen: Value = serde_json::from_str(&seen).expect("seen json");
        assert_eq!(seen["event"], "seen");
        assert_eq!(seen["data"]["ticketId"], "T1");

        tasks.abort();
    }

    #[tokio::test]
    async fn answers_ping_and_stops_on_server_close() {
        let (pong_tx, mut pong_rx) = mpsc::channel::<Vec<u8>>(1);
        let app = Router::new().route(
            "/socket",
            get(move |ws: WebSocketUpgrade| {
                let pong_tx = pong_tx.clone();
                async move {
                    ws.on_upgrade(move |mut socket| async move {
                        // register
                        let _ = socket.recv().await;
                        let _ = socket.send(AxumMessage::Ping(b"x".to_vec().into())).await;
                        while let Some(Ok(msg)) = socket.recv().await {
                            if let AxumMessage::Pong(data) = msg {
                                let _ = pong_tx.send(data.to_vec()).await;
                                break;
                            }
                        }
                        let _ = socket.send(AxumMessage::Close(None)).await;
                        while let Some(Ok(_)) = socket.recv().await {}
                    })
                }
            }),
        );

        let url = serve(app).await;
        let channel = Channel::connect(&url, "admin-room").await.expect("connect");
        // Keep the outbound side open so only the server can end the session.
        let (_outbound, mut inbound, mut tasks) = channel.into_parts();

        let pong = timeout(Duration::from_secs(5), pong_rx.recv())
            .await
            .expect("pong in time")
            .expect("pong payload");
        assert_eq!(pong, b"x".to_vec());

        let next = timeout(Duration::from_secs(5), inbound.recv())
            .await
            .expect("reader ends in time");
        assert!(next.is_none());
        timeout(Duration::from_secs(5), tasks.closed())
            .await
            .expect("closed resolves");
        tasks.abort();
    }
}
