//! Packet transport to the device process.
//!
//! The device process is reachable only through two one-way byte channels
//! (named pipes by default):
//!
//! ```text
//! device ──▶ from-device channel ──▶ FrameReceiver ──▶ pump_device_frames
//! device ◀── to-device channel   ◀── FrameSender   ◀── client sessions
//! ```
//!
//! Each direction is owned by exactly one value, [`FrameReceiver`] or
//! [`FrameSender`].  There are no global handles: the receiver is moved into
//! the inbound pump task, and the sender is shared by client sessions behind
//! an async mutex, which also serializes concurrent writes.
//!
//! # Self-healing channels
//!
//! Both halves follow the same rule on an I/O error: drop the broken handle,
//! try once to open a fresh one, and return the original error to the caller.
//! The failed read or write is *not* retried internally.  The caller decides
//! whether to call again; the next call starts with a fresh handle (or tries
//! to open one if the immediate reopen failed).
//!
//! # Fixed-size framing
//!
//! Every record is exactly [`FRAME_SIZE`] bytes with no delimiter, so reads
//! use `read_exact`: a short read from a pipe is completed by the following
//! reads instead of being mistaken for a whole frame.

use std::fmt;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use thermal_core::{decode_frame, Frame, FrameError, FRAME_SIZE};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::application::dispatcher::InboundDispatcher;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Which device channel an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The channel the bridge reads frames from.
    FromDevice,
    /// The channel the bridge writes frames to.
    ToDevice,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::FromDevice => f.write_str("from-device"),
            Direction::ToDevice => f.write_str("to-device"),
        }
    }
}

/// Errors raised by the device transport.
///
/// Everything except [`TransportError::Open`] at startup is retryable: the
/// transport has already reopened (or tried to reopen) the channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel could not be opened at startup.
    #[error("failed to open {direction} channel {channel}: {source}")]
    Open {
        direction: Direction,
        channel: String,
        #[source]
        source: io::Error,
    },

    /// Reading a frame failed; the read channel has been reopened if possible.
    #[error("read from device failed: {0}")]
    Read(#[source] io::Error),

    /// Writing a frame failed; the write channel has been reopened if possible.
    #[error("write to device failed: {0}")]
    Write(#[source] io::Error),

    /// A previous failure left the channel closed and opening it again failed.
    #[error("{direction} channel {channel} is unavailable: {source}")]
    Unavailable {
        direction: Direction,
        channel: String,
        #[source]
        source: io::Error,
    },

    /// The bytes read did not form a frame.
    #[error("device sent a malformed frame: {0}")]
    Frame(#[from] FrameError),
}

// ── Channel abstraction ───────────────────────────────────────────────────────

/// Something that can (re)open the two device channels.
///
/// Production code uses [`FifoChannels`]; tests substitute in-memory streams.
#[async_trait]
pub trait DeviceChannels: Send + Sync + 'static {
    type Reader: AsyncRead + Unpin + Send + 'static;
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Opens the from-device channel for reading.
    async fn open_reader(&self) -> io::Result<Self::Reader>;

    /// Opens the to-device channel for writing.
    async fn open_writer(&self) -> io::Result<Self::Writer>;

    /// Human-readable address of a channel, for log messages.
    fn describe(&self, direction: Direction) -> String;
}

/// The two named pipes shared with the device process.
///
/// Opening a FIFO blocks until the other end is opened too; `tokio::fs` runs
/// the open on the blocking thread pool, so only the awaiting task waits.
#[derive(Debug, Clone)]
pub struct FifoChannels {
    pub from_device: PathBuf,
    pub to_device: PathBuf,
}

impl FifoChannels {
    pub fn new(from_device: impl Into<PathBuf>, to_device: impl Into<PathBuf>) -> Self {
        Self {
            from_device: from_device.into(),
            to_device: to_device.into(),
        }
    }
}

#[async_trait]
impl DeviceChannels for FifoChannels {
    type Reader = tokio::fs::File;
    type Writer = tokio::fs::File;

    async fn open_reader(&self) -> io::Result<Self::Reader> {
        tokio::fs::File::open(&self.from_device).await
    }

    async fn open_writer(&self) -> io::Result<Self::Writer> {
        tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.to_device)
            .await
    }

    fn describe(&self, direction: Direction) -> String {
        match direction {
            Direction::FromDevice => self.from_device.display().to_string(),
            Direction::ToDevice => self.to_device.display().to_string(),
        }
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// Both directions of the device link, opened together.
pub struct PacketTransport<C: DeviceChannels> {
    receiver: FrameReceiver<C>,
    sender: FrameSender<C>,
}

impl<C: DeviceChannels> PacketTransport<C> {
    /// Opens both channels.
    ///
    /// The two opens run concurrently: a FIFO open blocks until the peer opens
    /// its end, and the device process may open its ends in either order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] as soon as either channel fails to
    /// open, without waiting for the other.  The bridge has no function
    /// without both directions, so callers treat this as fatal.
    pub async fn open(channels: C) -> Result<Self, TransportError> {
        let channels = std::sync::Arc::new(channels);

        // The first failure drops the other, possibly still blocked, open.
        let (reader, writer) = tokio::try_join!(
            async {
                channels
                    .open_reader()
                    .await
                    .map_err(|source| TransportError::Open {
                        direction: Direction::FromDevice,
                        channel: channels.describe(Direction::FromDevice),
                        source,
                    })
            },
            async {
                channels
                    .open_writer()
                    .await
                    .map_err(|source| TransportError::Open {
                        direction: Direction::ToDevice,
                        channel: channels.describe(Direction::ToDevice),
                        source,
                    })
            },
        )?;

        info!(
            "device channels open: reading {}, writing {}",
            channels.describe(Direction::FromDevice),
            channels.describe(Direction::ToDevice)
        );

        Ok(Self {
            receiver: FrameReceiver {
                channels: std::sync::Arc::clone(&channels),
                reader: Some(reader),
            },
            sender: FrameSender {
                channels,
                writer: Some(writer),
            },
        })
    }

    /// Reads one frame.  See [`FrameReceiver::receive`].
    pub async fn receive(&mut self) -> Result<Frame, TransportError> {
        self.receiver.receive().await
    }

    /// Writes one frame.  See [`FrameSender::send`].
    pub async fn send(&mut self, id: u32, payload: &[u8]) -> Result<(), TransportError> {
        self.sender.send(id, payload).await
    }

    /// Separates the two directions so they can be owned by different tasks.
    pub fn split(self) -> (FrameReceiver<C>, FrameSender<C>) {
        (self.receiver, self.sender)
    }
}

/// Read half of the device link.
pub struct FrameReceiver<C: DeviceChannels> {
    channels: std::sync::Arc<C>,
    reader: Option<C::Reader>,
}

impl<C: DeviceChannels> FrameReceiver<C> {
    /// Blocks until one full frame has been read.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Read`] if the read failed (including EOF).  The
    ///   channel has been closed and one reopen attempted.
    /// - [`TransportError::Unavailable`] if the channel was already closed and
    ///   could not be reopened.
    pub async fn receive(&mut self) -> Result<Frame, TransportError> {
        let mut reader = match self.reader.take() {
            Some(reader) => reader,
            None => self
                .channels
                .open_reader()
                .await
                .map_err(|source| TransportError::Unavailable {
                    direction: Direction::FromDevice,
                    channel: self.channels.describe(Direction::FromDevice),
                    source,
                })?,
        };

        let mut buf = [0u8; FRAME_SIZE];
        match reader.read_exact(&mut buf).await {
            Ok(_) => {
                self.reader = Some(reader);
                let frame = decode_frame(&buf)?;
                debug!("device frame received: id={}", frame.id());
                Ok(frame)
            }
            Err(e) => {
                drop(reader);
                warn!(
                    "read from {} failed: {e}; reopening",
                    self.channels.describe(Direction::FromDevice)
                );
                self.reopen().await;
                Err(TransportError::Read(e))
            }
        }
    }

    async fn reopen(&mut self) {
        match self.channels.open_reader().await {
            Ok(reader) => {
                info!(
                    "reopened device read channel {}",
                    self.channels.describe(Direction::FromDevice)
                );
                self.reader = Some(reader);
            }
            Err(e) => warn!(
                "failed to reopen device read channel {}: {e}",
                self.channels.describe(Direction::FromDevice)
            ),
        }
    }
}

/// Write half of the device link.
///
/// Share it between sessions as `Arc<tokio::sync::Mutex<FrameSender<C>>>`;
/// holding the lock for a whole `send` keeps frames from interleaving.
pub struct FrameSender<C: DeviceChannels> {
    channels: std::sync::Arc<C>,
    writer: Option<C::Writer>,
}

impl<C: DeviceChannels> FrameSender<C> {
    /// Encodes and writes one frame (`payload` is zero-padded/truncated to 64
    /// bytes).
    ///
    /// # Errors
    ///
    /// - [`TransportError::Write`] if the write failed.  The channel has been
    ///   closed and one reopen attempted, so the *next* call has a fresh
    ///   handle.  Nothing is buffered for a retry.
    /// - [`TransportError::Unavailable`] if the channel was already closed and
    ///   could not be reopened.
    pub async fn send(&mut self, id: u32, payload: &[u8]) -> Result<(), TransportError> {
        self.send_frame(&Frame::new(id, payload)).await
    }

    /// Writes an already built frame.  Same error behaviour as [`Self::send`].
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => self
                .channels
                .open_writer()
                .await
                .map_err(|source| TransportError::Unavailable {
                    direction: Direction::ToDevice,
                    channel: self.channels.describe(Direction::ToDevice),
                    source,
                })?,
        };

        let bytes = frame.to_bytes();
        let result = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.writer = Some(writer);
                debug!("device frame sent: id={}", frame.id());
                Ok(())
            }
            Err(e) => {
                drop(writer);
                warn!(
                    "write to {} failed: {e}; reopening",
                    self.channels.describe(Direction::ToDevice)
                );
                self.reopen().await;
                Err(TransportError::Write(e))
            }
        }
    }

    async fn reopen(&mut self) {
        match self.channels.open_writer().await {
            Ok(writer) => {
                info!(
                    "reopened device write channel {}",
                    self.channels.describe(Direction::ToDevice)
                );
                self.writer = Some(writer);
            }
            Err(e) => warn!(
                "failed to reopen device write channel {}: {e}",
                self.channels.describe(Direction::ToDevice)
            ),
        }
    }
}

/// Where client sessions send command frames.
///
/// Sessions see the device only through this trait, so they do not carry the
/// channel type parameter around.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send_frame(&self, frame: &Frame) -> Result<(), TransportError>;
}

#[async_trait]
impl<C: DeviceChannels> CommandSink for tokio::sync::Mutex<FrameSender<C>> {
    async fn send_frame(&self, frame: &Frame) -> Result<(), TransportError> {
        self.lock().await.send_frame(frame).await
    }
}

// ── Inbound pump ──────────────────────────────────────────────────────────────

/// The single consumer of [`FrameReceiver::receive`].
///
/// Feeds every frame to `dispatcher`.  A failed receive has already reopened
/// the channel, so the pump only tolerates `retry_limit` *consecutive*
/// failures before giving up; any successful frame resets the count.
///
/// Runs until the limit is exceeded and returns the last error.
pub async fn pump_device_frames<C: DeviceChannels>(
    mut receiver: FrameReceiver<C>,
    dispatcher: &InboundDispatcher,
    retry_limit: u32,
) -> TransportError {
    let mut failures: u32 = 0;

    loop {
        match receiver.receive().await {
            Ok(frame) => {
                failures = 0;
                dispatcher.dispatch(&frame);
            }
            Err(e) => {
                if retry_budget_spent(&mut failures, retry_limit) {
                    error!(
                        "inbound device pipeline stopping after {failures} consecutive failure(s): {e}"
                    );
                    return e;
                }
                warn!("device receive failed ({failures}/{retry_limit} retries used): {e}");
            }
        }
    }
}

/// Counts one more consecutive failure and reports whether it exceeds
/// `retry_limit`.  The count saturates, so `u32::MAX` never gives up.
fn retry_budget_spent(failures: &mut u32, retry_limit: u32) -> bool {
    *failures = failures.saturating_add(1);
    *failures > retry_limit
}

// ── Tests ─────────────────────────────────────────────────────────────────────
