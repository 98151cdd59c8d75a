//! Socket Mode connection handling.
//!
//! [`SocketModeSource`] opens a WebSocket through `apps.connections.open`,
//! answers pings, swallows `hello` frames and reconnects on `disconnect`
//! envelopes or dropped sockets with capped exponential backoff.

use std::time::Duration;

use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    secrecy::Secret,
    serde::Deserialize,
    serde_json::{Value, json},
    tokio::net::TcpStream,
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use crate::{
    api::SlackApi,
    error::{Error, Result},
};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// One Socket Mode envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub envelope_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
    pub reason: Option<String>,
}

impl Envelope {
    pub fn is_interactive(&self) -> bool {
        self.kind == "interactive"
    }

    /// Value of the first clicked action, for both legacy attachment
    /// actions and block actions.
    pub fn action_value(&self) -> Option<&str> {
        self.payload
            .get("actions")?
            .get(0)?
            .get("value")?
            .as_str()
            .filter(|v| !v.trim().is_empty())
    }
}

/// Stream of envelopes that must be acknowledged.
#[async_trait]
pub trait EventSource: Send {
    /// Next envelope, or `None` once the source is exhausted.
    async fn next_envelope(&mut self) -> Option<Envelope>;

    async fn ack(&mut self, envelope_id: &str) -> Result<()>;

    async fn close(&mut self) {}
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct SocketModeSource {
    api: SlackApi,
    app_token: Secret<String>,
    socket: Option<Socket>,
    backoff: Duration,
}

impl SocketModeSource {
    pub fn new(api: SlackApi, app_token: Secret<String>) -> Self {
        Self {
            api,
            app_token,
            socket: None,
            backoff: INITIAL_BACKOFF,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        let url = self.api.open_connection(&self.app_token).await?;
        let (socket, _) = connect_async(url.as_str()).await?;
        self.socket = Some(socket);
        Ok(())
    }

    async fn reconnect(&mut self) {
        match self.connect().await {
            Ok(()) => {
                info!("socket mode connected");
                self.backoff = INITIAL_BACKOFF;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    delay_ms = self.backoff.as_millis(),
                    "socket mode connect failed, retrying"
                );
                tokio::time::sleep(self.backoff).await;
                self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
            },
        }
    }
}

#[async_trait]
impl EventSource for SocketModeSource {
    async fn next_envelope(&mut self) -> Option<Envelope> {
        loop {
            if self.socket.is_none() {
                self.reconnect().await;
                continue;
            }
            let Some(socket) = self.socket.as_mut() else {
                continue;
            };

            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Envelope>(text.as_str()) {
                        Ok(envelope) if envelope.kind == "hello" => {
                            debug!("socket mode hello");
                        },
                        Ok(envelope) if envelope.kind == "disconnect" => {
                            info!(reason = ?envelope.reason, "socket mode disconnect requested");
                            self.socket = None;
                        },
                        Ok(envelope) => return Some(envelope),
                        Err(e) => warn!(error = %e, "unparseable socket mode frame"),
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = socket.send(Message::Pong(data)).await {
                        warn!(error = %e, "socket mode pong failed");
                        self.socket = None;
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("socket mode connection closed");
                    self.socket = None;
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    warn!(error = %e, "socket mode read failed");
                    self.socket = None;
                },
            }
        }
    }

    async fn ack(&mut self, envelope_id: &str) -> Result<()> {
        let socket = self.socket.as_mut().ok_or(Error::Closed)?;
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        socket.send(Message::Text(ack.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        tokio::net::TcpListener,
        tokio_tungstenite::accept_async,
    };

    #[test]
    fn action_value_from_attachment_action() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": "interactive",
            "envelope_id": "e1",
            "payload": {
                "type": "interactive_message",
                "callback_id": "ask_assistant",
                "actions": [{ "name": "ask_assistant", "type": "button", "value": "Back-off" }],
            },
        }))
        .unwrap();

        assert!(envelope.is_interactive());
        assert_eq!(envelope.action_value(), Some("Back-off"));
    }

    #[test]
    fn blank_action_value_is_ignored() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": "interactive",
            "payload": { "actions": [{ "value": "  " }] },
        }))
        .unwrap();
        assert_eq!(envelope.action_value(), None);
    }

    /// Serves one Socket Mode session: hello, one interactive envelope, then
    /// waits for the ack and returns it.
    async fn serve_once(listener: TcpListener) -> String {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(json!({ "type": "hello" }).to_string().into()))
            .await
            .unwrap();
        ws.send(Message::Text(
            json!({
                "type": "interactive",
                "envelope_id": "env-1",
                "payload": { "actions": [{ "value": "Back-off" }] },
            })
            .to_string()
            .into(),
        ))
        .await
        .unwrap();

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn connects_skips_hello_and_acks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_url = format!("ws://{}/", listener.local_addr().unwrap());
        let server_task = tokio::spawn(serve_once(listener));

        let mut server = mockito::Server::new_async().await;
        let _open = server
            .mock("POST", "/apps.connections.open")
            .with_header("content-type", "application/json")
            .with_body(json!({ "ok": true, "url": ws_url }).to_string())
            .create_async()
            .await;

        let mut source =
            SocketModeSource::new(SlackApi::new(server.url()), Secret::new("xapp-test".into()));
        let envelope = source.next_envelope().await.unwrap();
        assert_eq!(envelope.envelope_id.as_deref(), Some("env-1"));

        source.ack("env-1").await.unwrap();
        let ack: Value = serde_json::from_str(&server_task.await.unwrap()).unwrap();
        assert_eq!(ack["envelope_id"], "env-1");

        source.close().await;
    }

    #[tokio::test]
    async fn ack_without_connection_fails() {
        let mut source = SocketModeSource::new(SlackApi::default(), Secret::new("xapp-test".into()));
        assert!(matches!(source.ack("e1").await, Err(Error::Closed)));
    }
}
