//! Drives one [`RelaySession`] over real sockets.
//!
//! One task per session. The upstream handshake, both read halves and the
//! shutdown signal are polled from a single `select!` loop, so the session
//! (and its pending queue) is only ever touched from this task.

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::{Duration, Instant};

use axum::extract::ws::{self, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use crate::lifecycle::ShutdownListener;
use crate::net::{SessionGuard, SessionId};
use crate::observability::metrics::{self, Direction};
use crate::relay::frame::{self, Inbound};
use crate::relay::session::{Action, RelaySession, RelayState};
use crate::relay::upstream::{self, UpstreamStream, UpstreamTarget};

type ClientWriter = SplitSink<WebSocket, ws::Message>;
type ClientReader = SplitStream<WebSocket>;
type UpstreamWriter = SplitSink<UpstreamStream, tungstenite::Message>;
type UpstreamReader = SplitStream<UpstreamStream>;

/// Upper bound on finishing the closing handshake once the session is over.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-session knobs taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    pub max_pending_frames: usize,
    pub handshake_timeout: Duration,
    /// Bound on a single outbound send, in either direction.
    pub send_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Client,
    Upstream,
}

/// What became of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Performed {
    Delivered,
    /// Logged and counted; the next action still runs.
    Dropped,
    /// The peer did not take the frame within the send timeout.
    Stalled(Side),
}

/// Relay frames between an accepted client socket and `target` until
/// either side closes or `shutdown` fires.
pub async fn run_session(
    client: WebSocket,
    target: UpstreamTarget,
    options: RelayOptions,
    mut shutdown: ShutdownListener,
    guard: SessionGuard,
) {
    let id = guard.id();
    let started = Instant::now();
    metrics::session_started();
    tracing::info!(session_id = %id, target_url = %target, "Relay session started");

    let mut session = RelaySession::new(id, options.max_pending_frames);
    let (mut client_tx, mut client_rx) = client.split();
    let mut upstream_tx: Option<UpstreamWriter> = None;
    let mut upstream_rx: Option<UpstreamReader> = None;
    let mut upstream_reached = false;

    // Started before the first client read: the handshake runs while the
    // client is already sending.
    let connect = upstream::connect(&target, options.handshake_timeout);
    tokio::pin!(connect);

    while !session.is_closed() {
        let actions = tokio::select! {
            result = &mut connect, if session.state() == RelayState::Connecting => match result {
                Ok(stream) => {
                    tracing::info!(
                        session_id = %id,
                        pending = session.pending_len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Connected to upstream"
                    );
                    let (tx, rx) = stream.split();
                    upstream_tx = Some(tx);
                    upstream_rx = Some(rx);
                    upstream_reached = true;
                    session.on_upstream_open()
                }
                Err(e) => session.on_upstream_error(&e),
            },
            message = client_rx.next() => match message {
                Some(Ok(message)) => match frame::from_client(message) {
                    Inbound::Data(frame) => session.on_client_frame(frame),
                    Inbound::Close(close) => session.on_client_close(close),
                    Inbound::Control => Vec::new(),
                },
                Some(Err(e)) => session.on_client_error(&e),
                None => session.on_client_close(None),
            },
            message = next_upstream(&mut upstream_rx) => match message {
                Some(Ok(message)) => match frame::from_upstream(message) {
                    Inbound::Data(frame) => session.on_upstream_frame(frame),
                    Inbound::Close(close) => session.on_upstream_close(close),
                    Inbound::Control => Vec::new(),
                },
                Some(Err(e)) => session.on_upstream_error(&e),
                None => session.on_upstream_close(None),
            },
            _ = shutdown.recv() => session.on_shutdown(),
        };

        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            let performed = perform(
                id,
                action,
                &mut client_tx,
                upstream_tx.as_mut(),
                options.send_timeout,
            )
            .await;
            if let Performed::Stalled(side) = performed {
                let follow_up = on_stalled(&mut session, &mut queue, side);
                queue.extend(follow_up);
            }
        }
    }

    finish_close(
        id,
        &mut client_tx,
        &mut client_rx,
        upstream_tx.as_mut(),
        upstream_rx.as_mut(),
    )
    .await;

    let outcome = if upstream_reached { "completed" } else { "upstream_unreachable" };
    metrics::session_finished(outcome);
    tracing::info!(
        session_id = %id,
        outcome,
        duration_ms = started.elapsed().as_millis() as u64,
        "Relay session closed"
    );
}

/// Pending forever until the upstream exists.
async fn next_upstream(
    reader: &mut Option<UpstreamReader>,
) -> Option<Result<tungstenite::Message, tungstenite::Error>> {
    match reader {
        Some(reader) => reader.next().await,
        None => std::future::pending().await,
    }
}

/// A side that stops reading is treated as failed. Work still queued for it
/// is abandoned so the session does not wait out the timeout once per frame.
fn on_stalled(
    session: &mut RelaySession,
    queue: &mut VecDeque<Action>,
    side: Side,
) -> Vec<Action> {
    let error = "send timed out";
    match side {
        Side::Client => {
            queue.retain(|a| !matches!(a, Action::SendClient(_) | Action::CloseClient(_)));
            session.on_client_error(&error)
        }
        Side::Upstream => {
            queue.retain(|a| !matches!(a, Action::SendUpstream(_) | Action::CloseUpstream(_)));
            session.on_upstream_error(&error)
        }
    }
}

/// Carry out one action. Failures are logged and never stop the caller
/// from performing the next action.
async fn perform<C, U>(
    id: SessionId,
    action: Action,
    client_tx: &mut C,
    upstream_tx: Option<&mut U>,
    send_timeout: Duration,
) -> Performed
where
    C: Sink<ws::Message> + Unpin,
    C::Error: Display,
    U: Sink<tungstenite::Message> + Unpin,
    U::Error: Display,
{
    match action {
        Action::SendUpstream(frame) => {
            let Some(tx) = upstream_tx else {
                tracing::warn!(session_id = %id, "No upstream writer, dropping client frame");
                metrics::frame_dropped("upstream_missing");
                return Performed::Dropped;
            };
            let bytes = frame.len();
            match tokio::time::timeout(send_timeout, tx.send(frame::to_upstream(frame))).await {
                Ok(Ok(())) => {
                    metrics::frame_forwarded(Direction::ClientToUpstream);
                    Performed::Delivered
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        session_id = %id,
                        bytes,
                        error = %e,
                        "Failed to send frame upstream, dropping"
                    );
                    metrics::frame_dropped("upstream_send");
                    Performed::Dropped
                }
                Err(_) => {
                    tracing::warn!(
                        session_id = %id,
                        bytes,
                        timeout_ms = send_timeout.as_millis() as u64,
                        "Upstream not accepting frames"
                    );
                    metrics::frame_dropped("upstream_stalled");
                    Performed::Stalled(Side::Upstream)
                }
            }
        }
        Action::SendClient(frame) => {
            let bytes = frame.len();
            match tokio::time::timeout(send_timeout, client_tx.send(frame::to_client(frame))).await {
                Ok(Ok(())) => {
                    metrics::frame_forwarded(Direction::UpstreamToClient);
                    Performed::Delivered
                }
                Ok(Err(e)) => {
                    tracing::debug!(
                        session_id = %id,
                        bytes,
                        error = %e,
                        "Failed to forward frame to client"
                    );
                    metrics::frame_dropped("client_send");
                    Performed::Dropped
                }
                Err(_) => {
                    tracing::warn!(
                        session_id = %id,
                        bytes,
                        timeout_ms = send_timeout.as_millis() as u64,
                        "Client not accepting frames"
                    );
                    metrics::frame_dropped("client_stalled");
                    Performed::Stalled(Side::Client)
                }
            }
        }
        Action::CloseClient(close) => {
            tracing::debug!(
                session_id = %id,
                close = ?close.as_ref().map(ToString::to_string),
                "Closing client"
            );
            let message = frame::close_to_client(close);
            match tokio::time::timeout(send_timeout, client_tx.send(message)).await {
                Ok(Ok(())) => Performed::Delivered,
                Ok(Err(e)) => {
                    tracing::debug!(session_id = %id, error = %e, "Client close frame not sent");
                    Performed::Dropped
                }
                Err(_) => Performed::Stalled(Side::Client),
            }
        }
        Action::CloseUpstream(close) => {
            let Some(tx) = upstream_tx else {
                return Performed::Dropped;
            };
            tracing::debug!(
                session_id = %id,
                close = ?close.as_ref().map(ToString::to_string),
                "Closing upstream"
            );
            let message = frame::close_to_upstream(close);
            match tokio::time::timeout(send_timeout, tx.send(message)).await {
                Ok(Ok(())) => Performed::Delivered,
                Ok(Err(e)) => {
                    tracing::debug!(session_id = %id, error = %e, "Upstream close frame not sent");
                    Performed::Dropped
                }
                Err(_) => Performed::Stalled(Side::Upstream),
            }
        }
    }
}

/// Complete the closing handshake on each side before the sockets drop.
///
/// Closing the writer flushes whatever close frame is outstanding: ours, or
/// the reply the transport queued to a close the peer started. Reading
/// then waits for the peer's half of the handshake and for it to hang up.
async fn finish_close(
    id: SessionId,
    client_tx: &mut ClientWriter,
    client_rx: &mut ClientReader,
    upstream_tx: Option<&mut UpstreamWriter>,
    upstream_rx: Option<&mut UpstreamReader>,
) {
    let client = async move {
        let _ = client_tx.close().await;
        while let Some(Ok(_)) = client_rx.next().await {}
    };
    let upstream = async move {
        if let Some(tx) = upstream_tx {
            let _ = tx.close().await;
        }
        if let Some(rx) = upstream_rx {
            while let Some(Ok(_)) = rx.next().await {}
        }
    };

    let both = async move {
        tokio::join!(client, upstream);
    };
    if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, both).await.is_err() {
        tracing::debug!(session_id = %id, "Closing handshake not completed, dropping sockets");
    }
}
