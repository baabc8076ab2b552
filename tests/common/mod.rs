//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use edge_relay::config::RelayConfig;
use edge_relay::net::SessionTracker;
use edge_relay::{HttpServer, Shutdown};

pub type TestClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// What the mock upstream observed.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Handshake completed for this path and query.
    Connected(String),
    /// A text or binary frame arrived.
    Frame(Message),
    /// A close frame arrived, with its code and reason if any.
    Closed(Option<(u16, String)>),
    /// The connection ended without a close frame.
    Dropped,
}

/// How the mock upstream behaves on each connection.
#[derive(Debug, Clone, Default)]
pub struct UpstreamBehavior {
    /// Sleep this long after TCP accept before answering the handshake.
    pub handshake_delay: Duration,
    /// Send every data frame straight back.
    pub echo: bool,
    /// After this many data frames, close with 1000 "done".
    pub close_after: Option<usize>,
}

/// A WebSocket server standing in for the real upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<UpstreamEvent>,
    connections: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub async fn start(behavior: UpstreamBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, events) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(tcp, behavior.clone(), events_tx.clone()));
            }
        });

        Self {
            addr,
            events,
            connections,
        }
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next observed event, failing the test after [`WAIT`].
    pub async fn next_event(&mut self) -> UpstreamEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for upstream event")
            .expect("mock upstream stopped")
    }

    /// Collect the next `count` data frames, skipping other events.
    pub async fn frames(&mut self, count: usize) -> Vec<Message> {
        let mut frames = Vec::with_capacity(count);
        while frames.len() < count {
            if let UpstreamEvent::Frame(message) = self.next_event().await {
                frames.push(message);
            }
        }
        frames
    }
}

async fn serve_connection(
    tcp: TcpStream,
    behavior: UpstreamBehavior,
    events: mpsc::UnboundedSender<UpstreamEvent>,
) {
    tokio::time::sleep(behavior.handshake_delay).await;

    let on_request = {
        let events = events.clone();
        move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = events.send(UpstreamEvent::Connected(request.uri().to_string()));
            Ok(response)
        }
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(tcp, on_request).await else {
        return;
    };

    let mut received = 0;
    loop {
        match ws.next().await {
            Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                received += 1;
                let _ = events.send(UpstreamEvent::Frame(message.clone()));
                if behavior.echo {
                    let _ = ws.send(message).await;
                }
                if behavior.close_after == Some(received) {
                    let close = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "done".into(),
                    };
                    let _ = ws.send(Message::Close(Some(close))).await;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let close = frame.map(|f| (u16::from(f.code), f.reason.to_string()));
                let _ = events.send(UpstreamEvent::Closed(close));
                // Sends our reply if the relay started the close.
                let _ = ws.close(None).await;
                return;
            }
            Some(Ok(_)) => {}
            Some(Err(_)) | None => {
                let _ = events.send(UpstreamEvent::Dropped);
                return;
            }
        }
    }
}

/// Defaults pointed at a local upstream.
pub fn relay_config(upstream: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.upstream.endpoint = format!("ws://{}", upstream);
    config.upstream.handshake_timeout_secs = 2;
    config
}

/// An address nothing listens on.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A relay server running on an ephemeral port.
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub sessions: SessionTracker,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl RunningRelay {
    pub fn ws_url(&self, path_and_query: &str) -> String {
        format!("ws://{}{}", self.addr, path_and_query)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, path_and_query: &str) -> TestClient {
        let (client, _) = tokio_tungstenite::connect_async(self.ws_url(path_and_query))
            .await
            .expect("relay refused WebSocket upgrade");
        client
    }
}

pub async fn spawn_relay(config: RelayConfig) -> RunningRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone()).unwrap();
    let sessions = server.sessions().clone();
    let handle = tokio::spawn(server.run(listener));

    RunningRelay {
        addr,
        shutdown,
        sessions,
        handle,
    }
}

/// Next text, binary or close message on the client, failing after [`WAIT`].
pub async fn next_message(client: &mut TestClient) -> Message {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for relay message")
            .expect("relay stream ended")
            .expect("relay stream errored");
        match message {
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            other => return other,
        }
    }
}

/// Wait for the client to receive a close frame and return its code and reason.
pub async fn expect_close(client: &mut TestClient) -> (u16, String) {
    match next_message(client).await {
        Message::Close(Some(frame)) => (u16::from(frame.code), frame.reason.to_string()),
        other => panic!("expected close frame, got {:?}", other),
    }
}

/// Read until the relay hangs up, failing on anything but a clean end.
///
/// A connection dropped without completing the closing handshake shows up
/// here as an error.
pub async fn expect_clean_end(client: &mut TestClient) {
    loop {
        let next = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for the relay to hang up");
        match next {
            None => return,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(other) => panic!("expected a clean end of stream, got {:?}", other),
        }
    }
}

/// Skip to the upstream's close, failing if it was dropped without one.
pub async fn expect_upstream_close(upstream: &mut MockUpstream) -> Option<(u16, String)> {
    loop {
        match upstream.next_event().await {
            UpstreamEvent::Closed(close) => return close,
            UpstreamEvent::Dropped => panic!("upstream dropped without a close frame"),
            _ => {}
        }
    }
}
