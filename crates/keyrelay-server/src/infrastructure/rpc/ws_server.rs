//! WebSocket server: accept loop and per-session task management.
//!
//! Each accepted connection becomes one session running in its own Tokio
//! task.  A session has two halves:
//!
//! - **Reader** – reads text frames, decodes them, answers `test` and
//!   undecodable frames directly, and forwards input calls to the lane.
//! - **Lane** – dispatches the session's input calls one after another, in
//!   frame order, and writes each reply as soon as its outcome is known.
//!
//! The lane keeps a single client's requests in the order it sent them.
//! Ordering *across* clients is decided by the injection pipeline.  Because
//! `test` never enters the lane, a probe is answered even while the lane is
//! waiting on a full injection queue.  The reader never waits on the lane
//! either: an input call that finds the lane full is answered at once with a
//! back-pressure failure.
//!
//! Shutdown is triggered by clearing a shared `AtomicBool`; the accept loop
//! checks it every 200 ms.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use keyrelay_core::{Empty, WireRequest};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::dispatch::{render, Dispatcher};
use crate::application::pipeline::InjectError;
use crate::infrastructure::rpc::messages::{decode_frame, RpcCall, RpcReply};

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Input calls a session may have waiting in its lane before further calls
/// are refused with a back-pressure failure.
pub const LANE_CAPACITY: usize = 256;

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the WebSocket listener.
///
/// # Errors
///
/// Returns an error if the address is in use or cannot be bound.
pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;
    info!(
        "keyrelay listening on ws://{}",
        listener.local_addr().context("listener has no local address")?
    );
    Ok(listener)
}

/// Binds `addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    addr: &str,
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = bind(addr).await?;
    serve(listener, dispatcher, running).await
}

/// Runs the accept loop on an already bound listener until `running` is set
/// to `false`.
///
/// # Errors
///
/// Currently never fails; accept errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, dispatcher).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {
                // No connection within the poll interval.
            }
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_session(stream: TcpStream, peer_addr: SocketAddr, dispatcher: Arc<Dispatcher>) {
    let session = Uuid::new_v4();
    info!("session {session}: connection from {peer_addr}");
    match run_session(stream, session, dispatcher).await {
        Ok(()) => info!("session {session} closed normally"),
        Err(e) => warn!("session {session} closed with error: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    session: Uuid,
    dispatcher: Arc<Dispatcher>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("session {session}: WebSocket handshake failed"))?;

    let (ws_tx, mut ws_rx) = ws_stream.split();
    let ws_tx = Arc::new(Mutex::new(ws_tx));

    // ── Lane: this session's input calls, in frame order ──────────────────────
    let (lane_tx, mut lane_rx) = mpsc::channel::<(Option<u64>, WireRequest)>(LANE_CAPACITY);
    let lane_sink = Arc::clone(&ws_tx);
    let lane_dispatcher = Arc::clone(&dispatcher);
    let lane = tokio::spawn(async move {
        while let Some((id, request)) = lane_rx.recv().await {
            let response = lane_dispatcher.dispatch(request).await;
            if let Err(e) = send_reply(&lane_sink, &RpcReply::response(id, &response)).await {
                debug!("session {session}: reply {id:?} not delivered: {e}");
            }
        }
    });

    // ── Reader ────────────────────────────────────────────────────────────────
    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!("session {session}: WebSocket closed");
                break;
            }
            Some(Err(e)) => {
                warn!("session {session}: WebSocket error: {e}");
                break;
            }
            None => {
                debug!("session {session}: stream ended");
                break;
            }
        };

        match ws_msg {
            WsMessage::Text(text) => {
                let inbound = decode_frame(&text);
                match inbound.call {
                    Ok(RpcCall::Input(request)) => {
                        debug!("session {session}: {} #{:?}", request.operation(), inbound.id);
                        match lane_tx.try_send((inbound.id, request)) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full((id, _))) => {
                                warn!("session {session}: lane full, refusing #{id:?}");
                                let busy = render(Err(InjectError::Backpressure));
                                send_reply(&ws_tx, &RpcReply::response(id, &busy)).await?;
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                warn!("session {session}: lane stopped unexpectedly");
                                break;
                            }
                        }
                    }
                    Ok(RpcCall::Test) => {
                        let probe = dispatcher.test(Empty {});
                        send_reply(&ws_tx, &RpcReply::empty(inbound.id, probe)).await?;
                    }
                    Err(e) => {
                        warn!("session {session}: rejected frame: {e}");
                        send_reply(&ws_tx, &RpcReply::error(inbound.id, &e)).await?;
                    }
                }
            }
            WsMessage::Binary(_) => {
                warn!("session {session}: unexpected binary WebSocket frame (ignored)");
            }
            WsMessage::Ping(data) => {
                debug!("session {session}: WebSocket ping ({} bytes)", data.len());
            }
            WsMessage::Pong(_) => {
                debug!("session {session}: WebSocket pong received");
            }
            WsMessage::Close(_) => {
                debug!("session {session}: WebSocket Close frame received");
                break;
            }
            WsMessage::Frame(_) => {
                debug!("session {session}: raw frame (ignored)");
            }
        }
    }

    // Calls already read still run; their replies go out if the socket is open.
    drop(lane_tx);
    if let Err(e) = lane.await {
        error!("session {session}: lane task failed: {e}");
    }
    Ok(())
}

async fn send_reply(sink: &Mutex<WsSink>, reply: &RpcReply) -> anyhow::Result<()> {
    let text = serde_json::to_string(reply).context("failed to encode reply")?;
    sink.lock()
        .await
        .send(WsMessage::Text(text))
        .await
        .context("failed to send reply")
}
