//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from clients.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Admitting the session to the [`SessionRegistry`] with its initial sync.
//! 5. Running the session's writer and reader tasks until both finish.
//! 6. Stopping the accept loop when the `running` flag is cleared.
//!
//! Each session runs in its own Tokio task, which spawns one task per socket
//! half.  The accept loop never waits on a session: it spawns and moves on.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tracing::{error, info, warn};

use crate::application::bridge_service::initial_sync;
use crate::application::codec::MessageCodec;
use crate::application::registry::{SessionEndpoints, SessionHandle, SessionId, SessionRegistry};
use crate::application::state_cache::DeviceStateCache;
use crate::domain::config::SessionPolicy;
use crate::infrastructure::device_link::CommandSink;
use crate::infrastructure::session::{run_reader, run_writer};

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Everything a session needs, shared by all sessions.
pub struct BridgeContext {
    pub cache: Arc<DeviceStateCache>,
    pub registry: Arc<SessionRegistry>,
    pub codec: Arc<dyn MessageCodec>,
    pub device: Arc<dyn CommandSink>,
    pub policy: SessionPolicy,
    pub queue_capacity: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the client listener.
///
/// # Errors
///
/// Returns an error if the address is in use or cannot be bound.
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;
    info!("WebSocket bridge listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Runs the accept loop on `listener` until `running` is set to `false`.
///
/// Accept errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<BridgeContext>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // The timeout lets the loop notice the flag while no one connects.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new client connection from {peer_addr}");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_client_session(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

/// Binds `addr` and serves until `running` is cleared.
pub async fn run_server(
    addr: SocketAddr,
    ctx: Arc<BridgeContext>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = bind(addr).await?;
    serve(listener, ctx, running).await
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-session task: runs [`run_session`] and logs how
/// it ended.
async fn handle_client_session(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<BridgeContext>) {
    match run_session(stream, peer_addr, ctx).await {
        Ok(id) => info!("session {id} ({peer_addr}) closed"),
        Err(e) => warn!("session with {peer_addr} failed: {e:#}"),
    }
}

/// Runs the complete lifecycle of one client session:
///
/// 1. WebSocket handshake.
/// 2. Registration, with the cached device state queued as the first message.
/// 3. Writer and reader tasks; either one tears the session down on exit,
///    which stops the other.
/// 4. Returns once both tasks have finished and the socket is released.
///
/// # Errors
///
/// Returns an error if the handshake fails or the session cannot be admitted.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<BridgeContext>,
) -> anyhow::Result<SessionId> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let id = ctx.registry.next_session_id();
    let (handle, endpoints) = SessionHandle::new(id, peer_addr.to_string(), ctx.queue_capacity);

    ctx.registry
        .admit(Arc::clone(&handle), || {
            initial_sync(&ctx.cache, ctx.codec.as_ref())
        })
        .with_context(|| format!("session {id} ({peer_addr}) not admitted"))?;

    info!(
        "session {id} ({peer_addr}) established; {} session(s) live",
        ctx.registry.len()
    );

    let (ws_tx, ws_rx) = ws_stream.split();
    let SessionEndpoints { queue_rx, stop_rx } = endpoints;

    let writer = tokio::spawn({
        let ctx = Arc::clone(&ctx);
        let handle = Arc::clone(&handle);
        let stop_rx = stop_rx.clone();
        async move {
            let result = run_writer(id, ws_tx, queue_rx, stop_rx, ctx.policy.write_timeout).await;
            ctx.registry.teardown(&handle);
            result
        }
    });

    let reader = tokio::spawn({
        let ctx = Arc::clone(&ctx);
        let handle = Arc::clone(&handle);
        async move {
            let result = run_reader(
                id,
                ws_rx,
                stop_rx,
                ctx.codec.as_ref(),
                ctx.device.as_ref(),
                ctx.policy.read_idle_timeout,
            )
            .await;
            ctx.registry.teardown(&handle);
            result
        }
    });

    let (writer, reader) = tokio::join!(writer, reader);
    for (half, outcome) in [("writer", writer), ("reader", reader)] {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("session {id} ({peer_addr}): {half} stopped: {e}"),
            Err(e) => error!("session {id} ({peer_addr}): {half} task failed: {e}"),
        }
    }

    Ok(id)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
