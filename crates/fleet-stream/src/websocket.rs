//! WebSocket transport for the dispatch event stream.
//!
//! Each attempt runs on its own tokio task: dial, report `opened`, then
//! pump inbound text frames into the supervisor and outbound events onto
//! the socket until either side closes.

use fleetline_core::StreamConfig;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::TransportError;
use crate::events::{decode_frame, encode_frame, StreamEvent};
use crate::supervisor::{Transport, TransportLink};

/// Event-stream transport over ws:// or wss://
pub struct WsTransport {
    url: String,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Transport dialling `url`
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidUrl(format!(
                "{url}: expected ws:// or wss://"
            )));
        }
        Ok(Self {
            url: url.to_string(),
            outbound: Mutex::new(None),
            task: Mutex::new(None),
        })
    }

    /// Transport for the configured stream endpoint
    pub fn from_config(config: &StreamConfig) -> Result<Self, TransportError> {
        Self::new(&config.url)
    }

    fn stop(&self) {
        lock(&self.outbound).take();
        if let Some(task) = lock(&self.task).take() {
            if !task.is_finished() {
                task.abort();
            }
        }
    }
}

impl Transport for WsTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn open(&self, link: TransportLink) {
        self.stop();

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                link.failed(format!("no async runtime available: {e}"));
                return;
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.outbound) = Some(tx);
        let task = runtime.spawn(run(self.url.clone(), link, rx));
        *lock(&self.task) = Some(task);
    }

    fn send(&self, event: &StreamEvent) -> Result<(), TransportError> {
        let text = encode_frame(event)?;
        lock(&self.outbound)
            .as_ref()
            .ok_or(TransportError::NotConnected)?
            .send(Message::Text(text))
            .map_err(|_| TransportError::NotConnected)
    }

    fn close(&self) {
        // Dropping the sender makes the task send a close frame and exit.
        lock(&self.outbound).take();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(url: String, link: TransportLink, mut outbound: mpsc::UnboundedReceiver<Message>) {
    debug!(%url, attempt = link.attempt(), "dialling event stream");

    let ws_stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                link.failed(e.to_string());
                return;
            }
        },
        None = outbound.recv() => {
            debug!(%url, "attempt abandoned before the handshake finished");
            return;
        }
    };

    link.opened();
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                    Ok(event) => link.deliver(event),
                    Err(e) => warn!(error = %e, "dropping undecodable frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!(%url, "server closed the event stream");
                    link.closed();
                    break;
                }
                Some(Err(e)) => {
                    link.failed(e.to_string());
                    break;
                }
                Some(Ok(_)) => {}
            },

            outgoing = outbound.recv() => match outgoing {
                Some(message) => {
                    if let Err(e) = ws_sender.send(message).await {
                        link.failed(e.to_string());
                        break;
                    }
                }
                None => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
