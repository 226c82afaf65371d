//! WebSocket client with automatic reconnection.
//!
//! A [`Connection`] keeps one session open at a time. Text frames are handed to a
//! callback, control messages queued on the [`ControlHandle`] are written to the
//! socket, and after any failure or close the loop waits a fixed delay and dials again.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::data::generator::GeneratorParams;
use crate::error::{ClientError, ProtocolError};
use crate::pipeline::IngestionPipeline;
use crate::protocol::ControlMessage;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// First connection attempt in progress.
    Connecting,
    Connected,
    /// Lost the connection; waiting before the next attempt.
    Reconnecting,
}

/// Queues control messages for whichever session is currently open.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: UnboundedSender<ControlMessage>,
}

impl ControlHandle {
    /// Returns false once the connection task is gone.
    pub fn send(&self, msg: ControlMessage) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub fn set_channel(&self, channel: i64) -> bool {
        self.send(ControlMessage::SetChannel { channel })
    }

    pub fn update_generator(&self, params: GeneratorParams) -> bool {
        self.send(ControlMessage::UpdateGenerator(params))
    }
}

pub struct Connection {
    url: String,
    reconnect_delay: Duration,
    state: watch::Sender<ClientState>,
    controls: UnboundedReceiver<ControlMessage>,
    on_connect: Vec<ControlMessage>,
}

/// Create a connection to `url` plus its control handle and state watch.
pub fn connection(url: impl Into<String>) -> (Connection, ControlHandle, watch::Receiver<ClientState>) {
    let (state, state_rx) = watch::channel(ClientState::Connecting);
    let (tx, controls) = unbounded_channel();
    (
        Connection {
            url: url.into(),
            reconnect_delay: RECONNECT_DELAY,
            state,
            controls,
            on_connect: Vec::new(),
        },
        ControlHandle { tx },
        state_rx,
    )
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

impl Connection {
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Send `msg` at the start of every session, so server-side settings survive a
    /// reconnect.
    pub fn with_on_connect(mut self, msg: ControlMessage) -> Self {
        self.on_connect.push(msg);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and keep reconnecting forever. Returns only when `on_text` breaks.
    pub async fn run<F>(mut self, mut on_text: F)
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((socket, _)) => {
                    info!(url = %self.url, "connected");
                    self.state.send_replace(ClientState::Connected);
                    match self.session(socket, &mut on_text).await {
                        Ok(ControlFlow::Break(())) => return,
                        Ok(ControlFlow::Continue(())) => info!(url = %self.url, "connection closed"),
                        Err(e) => warn!(url = %self.url, error = %e, "connection lost"),
                    }
                }
                Err(e) => warn!(url = %self.url, error = %e, "connect failed"),
            }
            self.state.send_replace(ClientState::Reconnecting);
            debug!(delay = ?self.reconnect_delay, "waiting before reconnect");
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn session<F>(&mut self, socket: Socket, on_text: &mut F) -> Result<ControlFlow<()>, ClientError>
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        let (mut write, mut read) = socket.split();
        for ctrl in &self.on_connect {
            let text = serde_json::to_string(ctrl)?;
            debug!(%text, "replaying control message");
            write.send(Message::Text(text)).await?;
        }
        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if on_text(&text).is_break() {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(ControlFlow::Break(()));
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        warn!(error = %ProtocolError::Binary(bytes.len()), "ignoring frame");
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(ControlFlow::Continue(())),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
                Some(ctrl) = self.controls.recv() => {
                    let text = serde_json::to_string(&ctrl)?;
                    debug!(%text, "sending control message");
                    write.send(Message::Text(text)).await?;
                }
            }
        }
    }
}

/// Feed every received message into `pipeline` until the task is cancelled.
pub async fn feed_pipeline(conn: Connection, pipeline: Arc<Mutex<IngestionPipeline>>) {
    conn.run(move |text| {
        pipeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_message(text);
        ControlFlow::Continue(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_connecting() {
        let (conn, ctrl, state) = connection("ws://127.0.0.1:1/ws");
        assert_eq!(*state.borrow(), ClientState::Connecting);
        assert_eq!(conn.url(), "ws://127.0.0.1:1/ws");
        assert!(ctrl.set_channel(2));
        drop(conn);
        assert!(!ctrl.set_channel(2));
    }

    #[tokio::test]
    async fn failed_connect_moves_to_reconnecting() {
        // nothing listens on port 1
        let (conn, _ctrl, mut state) = connection("ws://127.0.0.1:1/ws");
        let task = tokio::spawn(
            conn.with_reconnect_delay(Duration::from_secs(5))
                .run(|_| ControlFlow::Continue(())),
        );
        state.changed().await.unwrap();
        assert_eq!(*state.borrow(), ClientState::Reconnecting);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn default_delay_between_attempts() {
        let (conn, _ctrl, mut state) = connection("ws://127.0.0.1:1/ws");
        let task = tokio::spawn(conn.run(|_| ControlFlow::Continue(())));
        state.changed().await.unwrap();
        let first_failure = tokio::time::Instant::now();
        state.changed().await.unwrap();
        assert_eq!(*state.borrow(), ClientState::Reconnecting);
        let waited = first_failure.elapsed();
        assert!(
            waited >= RECONNECT_DELAY && waited < RECONNECT_DELAY + Duration::from_secs(1),
            "waited {waited:?}"
        );
        task.abort();
    }
}
