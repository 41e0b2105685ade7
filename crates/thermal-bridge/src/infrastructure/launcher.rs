//! Startup wiring: device link, inbound pump and client listener.

use std::sync::{atomic::AtomicBool, Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::application::codec::codec_for;
use crate::application::dispatcher::InboundDispatcher;
use crate::application::registry::SessionRegistry;
use crate::application::state_cache::DeviceStateCache;
use crate::domain::config::BridgeConfig;
use crate::infrastructure::device_link::{
    pump_device_frames, DeviceChannels, FifoChannels, PacketTransport,
};
use crate::infrastructure::ws_server::{bind, serve, BridgeContext};

/// Runs the bridge against the configured named pipes until shutdown or until
/// the device link is lost.
///
/// # Errors
///
/// - the listener cannot be bound;
/// - either device channel cannot be opened;
/// - the inbound pump gives up after `receive_retry_limit` retries.
pub async fn run_bridge(config: BridgeConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = bind(config.ws_bind_addr).await?;

    info!(
        "opening device channels {} (read) and {} (write)",
        config.from_device_path.display(),
        config.to_device_path.display()
    );
    let channels = FifoChannels::new(&config.from_device_path, &config.to_device_path);
    let transport = PacketTransport::open(channels)
        .await
        .context("cannot reach the device process")?;

    run_bridge_with(listener, transport, &config, running).await
}

/// Runs the bridge on an already bound listener and an already open
/// transport.
///
/// # Errors
///
/// Returns an error at once if `session_queue_capacity` is zero, otherwise
/// under the same conditions as [`run_bridge`] after startup.
pub async fn run_bridge_with<C: DeviceChannels>(
    listener: TcpListener,
    transport: PacketTransport<C>,
    config: &BridgeConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        config.session_queue_capacity > 0,
        "session queue capacity must be at least 1"
    );

    let (receiver, sender) = transport.split();

    let cache = Arc::new(DeviceStateCache::new());
    let registry = Arc::new(SessionRegistry::new());
    let codec = codec_for(config.codec);
    info!("client messages use the {} codec", codec.name());

    let dispatcher =
        InboundDispatcher::new(Arc::clone(&cache), Arc::clone(&registry), Arc::clone(&codec));
    let retry_limit = config.receive_retry_limit;
    let mut pump = tokio::spawn(async move {
        pump_device_frames(receiver, &dispatcher, retry_limit).await
    });

    let ctx = Arc::new(BridgeContext {
        cache,
        registry,
        codec,
        device: Arc::new(tokio::sync::Mutex::new(sender)),
        policy: config.session_policy,
        queue_capacity: config.session_queue_capacity,
    });

    tokio::select! {
        result = serve(listener, ctx, running) => {
            pump.abort();
            result
        }
        joined = &mut pump => match joined {
            Ok(e) => {
                error!("device link lost: {e}");
                Err(anyhow::Error::new(e).context("inbound device pipeline stopped"))
            }
            Err(e) => Err(anyhow::anyhow!("inbound pump task failed: {e}")),
        },
    }
}
