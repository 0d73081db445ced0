//! WebSocket link to the realtime assistant service.
//!
//! Owns the socket for its whole lifetime: fetches a fresh ephemeral secret,
//! connects with the device identity headers, then pumps inbound text frames
//! up as events and outbound command strings down to the wire. On any error
//! the link reports `Disconnected` and reconnects with exponential backoff;
//! session semantics are rebuilt from scratch by the coordinator on every
//! `Connected`.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use crate::config::Config;
use crate::credentials;

#[derive(Debug)]
pub enum NetEvent {
    /// A connection attempt has started.
    Connecting,
    /// The channel is open and ready for configuration.
    Connected,
    /// One inbound text frame, undecoded.
    Text(String),
    /// The channel is gone; everything session-scoped is now stale.
    Disconnected,
}

#[derive(Debug)]
pub enum NetCommand {
    /// Send one serialized event as a text frame.
    Send(String),
}

pub struct NetLink {
    config: Config,
    tx: mpsc::Sender<NetEvent>,
    rx_cmd: mpsc::Receiver<NetCommand>,
}

impl NetLink {
    pub fn new(
        config: Config,
        tx: mpsc::Sender<NetEvent>,
        rx_cmd: mpsc::Receiver<NetCommand>,
    ) -> Self {
        Self { config, tx, rx_cmd }
    }

    /// Drive the connection until the command channel closes. Reconnects
    /// after failures with exponential backoff capped at 60s.
    pub async fn run(mut self) {
        let mut retry_delay = 1;
        loop {
            match self.connect_and_loop().await {
                Err(e) => {
                    log::warn!("Channel error: {}. Reconnecting in {}s...", e, retry_delay);
                    let _ = self.tx.send(NetEvent::Disconnected).await;
                    tokio::time::sleep(tokio::time::Duration::from_secs(retry_delay)).await;
                    retry_delay = std::cmp::min(retry_delay * 2, 60);
                }
                Ok(()) => {
                    // Clean exit: the command side was dropped, we are
                    // shutting down.
                    break;
                }
            }
        }
    }

    async fn connect_and_loop(&mut self) -> anyhow::Result<()> {
        self.tx.send(NetEvent::Connecting).await?;

        // A fresh ephemeral secret per attempt; they expire quickly.
        let secret = credentials::fetch_client_secret(&self.config).await?;

        let url = Url::parse(self.config.ws_url)?;
        let host = url.host_str().unwrap_or_default().to_string();

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(self.config.ws_url)
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .header("Authorization", format!("Bearer {}", secret))
            .header("Device-Id", &self.config.device_id)
            .header("Client-Id", &self.config.client_id)
            .body(())?;

        log::info!("Connecting to {}...", self.config.ws_url);
        let (ws_stream, _) = connect_async(request).await?;
        log::info!("Channel open");

        let (mut write, mut read) = ws_stream.split();

        self.tx.send(NetEvent::Connected).await?;

        // The link holds the channel open for the whole conversation; there
        // is no steady-state timeout, only read errors and explicit close.
        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.tx.send(NetEvent::Text(text.to_string())).await?;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            log::debug!("Ignoring unexpected binary frame ({} bytes)", data.len());
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("Server closed channel: {:?}", frame);
                            return Err(anyhow::anyhow!("Channel closed by server"));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(anyhow::anyhow!("Channel closed")),
                    }
                }
                cmd = self.rx_cmd.recv() => {
                    match cmd {
                        Some(NetCommand::Send(text)) => {
                            write.send(Message::Text(text.into())).await?;
                        }
                        None => break,
                    }
                }
            }
        }
        Ok(())
    }
}
