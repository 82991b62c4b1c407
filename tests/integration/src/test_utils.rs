//! Local servers and helpers for cross-crate tests

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::info;

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Install a test subscriber once per process
pub fn init_logging() {
    let _ = fleetline_core::logging::try_init();
}

/// Poll `condition` every 10ms until it holds; panics after 5s
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// One request seen by [`DirectionsServer`]
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Coordinate segment after `/driving-traffic/`
    pub coordinates: String,
    /// Query parameters
    pub query: HashMap<String, String>,
}

/// Canned directions API
pub struct DirectionsServer {
    /// Base URL to configure the provider with
    pub base_url: String,
    /// Requests received so far
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Serve `body` with `status` for every `/driving-traffic/...` request
pub async fn spawn_directions_server(status: StatusCode, body: &'static str) -> DirectionsServer {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&requests);

    let app = Router::new().route(
        "/directions/v5/mapbox/driving-traffic/:coordinates",
        get(
            move |Path(coordinates): Path<String>, Query(query): Query<HashMap<String, String>>| {
                let captured = Arc::clone(&captured);
                async move {
                    captured
                        .lock()
                        .unwrap()
                        .push(CapturedRequest { coordinates, query });
                    (status, [("content-type", "application/json")], body)
                }
            },
        ),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    DirectionsServer {
        base_url: format!("http://{addr}/directions/v5/mapbox"),
        requests,
    }
}

/// Dispatch event-stream stand-in accepting a single client
pub struct StreamServer {
    /// ws:// URL of the server
    pub url: String,
    /// Text frames received from the client
    pub received: Arc<Mutex<Vec<String>>>,
}

/// Accept one WebSocket client, push `frames`, then echo nothing and record
/// what the client sends. With `hang_up`, close the socket after the frames.
pub async fn spawn_stream_server(frames: Vec<String>, hang_up: bool) -> StreamServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    tokio::spawn(async move {
        let (stream, peer) = listener.accept().await.unwrap();
        info!("stream client connected from {}", peer);
        let ws_stream = accept_async(stream).await.unwrap();
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        for frame in frames {
            ws_sender.send(Message::Text(frame)).await.unwrap();
        }
        if hang_up {
            let _ = ws_sender.send(Message::Close(None)).await;
        }

        while let Some(Ok(message)) = ws_receiver.next().await {
            match message {
                Message::Text(text) => sink.lock().unwrap().push(text),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    StreamServer {
        url: format!("ws://{addr}/stream"),
        received,
    }
}
