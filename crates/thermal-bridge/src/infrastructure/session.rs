//! The two halves of a client session.
//!
//! Every accepted WebSocket is split into a sink and a stream, and each half
//! gets its own task:
//!
//! - [`run_writer`] is the **only** writer to the socket.  It drains the
//!   session's outbound queue in FIFO order, so broadcasts never contend for
//!   the socket.
//! - [`run_reader`] decodes client commands and forwards them to the device.
//!
//! Both loops also watch the session's stop signal.  Whichever side ends
//! first tears the session down, which fires the signal and ends the other.
//!
//! The functions are generic over `Sink`/`Stream` so tests can drive them with
//! in-memory channels instead of real sockets.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, warn};

use crate::application::bridge_service::command_to_frame;
use crate::application::codec::MessageCodec;
use crate::application::registry::SessionId;
use crate::domain::messages::OutMessage;
use crate::infrastructure::device_link::CommandSink;

/// Upper bound on the closing handshake when no write timeout is configured.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Why a session half stopped abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("websocket error: {0}")]
    Socket(#[from] WsError),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("no client traffic for {0:?}")]
    ReadIdle(Duration),
}

/// Resolves once the stop signal has fired (or its sender is gone).
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stop| *stop).await;
}

fn to_ws_message(message: OutMessage) -> WsMessage {
    match message {
        OutMessage::Text(text) => WsMessage::Text(text.to_string()),
        OutMessage::Binary(bytes) => WsMessage::Binary(bytes.to_vec()),
        OutMessage::Close => WsMessage::Close(None),
    }
}

async fn send_bounded<S>(
    sink: &mut S,
    message: WsMessage,
    limit: Option<Duration>,
) -> Result<(), SessionError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    match limit {
        Some(limit) => timeout(limit, sink.send(message))
            .await
            .map_err(|_| SessionError::WriteTimeout(limit))?
            .map_err(SessionError::from),
        None => sink.send(message).await.map_err(SessionError::from),
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Drains `queue_rx` into `sink` until the queue closes, an
/// [`OutMessage::Close`] is dequeued, a write fails, or stop is signaled.
///
/// A Close frame is sent on the way out unless the sink already failed.
pub async fn run_writer<S>(
    id: SessionId,
    mut sink: S,
    mut queue_rx: mpsc::Receiver<OutMessage>,
    mut stop_rx: watch::Receiver<bool>,
    write_timeout: Option<Duration>,
) -> Result<(), SessionError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    let result = loop {
        let message = tokio::select! {
            biased;
            _ = stopped(&mut stop_rx) => {
                debug!("session {id}: writer stopping on signal");
                break Ok(());
            }
            message = queue_rx.recv() => message,
        };

        match message {
            None => {
                debug!("session {id}: outbound queue closed");
                break Ok(());
            }
            Some(OutMessage::Close) => {
                debug!("session {id}: close requested");
                break Ok(());
            }
            Some(message) => {
                if let Err(e) = send_bounded(&mut sink, to_ws_message(message), write_timeout).await {
                    break Err(e);
                }
            }
        }
    };

    if result.is_ok() {
        // `close` sends the Close frame and flushes.
        let grace = write_timeout.unwrap_or(CLOSE_GRACE);
        match timeout(grace, sink.close()).await {
            Ok(Ok(())) | Ok(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {}
            Ok(Err(e)) => debug!("session {id}: close frame not sent: {e}"),
            Err(_) => debug!("session {id}: close frame timed out"),
        }
    }

    result
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Forwards client commands from `stream` to `device` until the client closes,
/// the stream fails or ends, the idle timeout expires, or stop is signaled.
///
/// Messages the codec cannot decode are skipped, and so are device write
/// failures: the transport has already reopened its channel, and the session
/// itself is still healthy.
pub async fn run_reader<St>(
    id: SessionId,
    mut stream: St,
    mut stop_rx: watch::Receiver<bool>,
    codec: &dyn MessageCodec,
    device: &dyn CommandSink,
    read_idle_timeout: Option<Duration>,
) -> Result<(), SessionError>
where
    St: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = stopped(&mut stop_rx) => {
                debug!("session {id}: reader stopping on signal");
                return Ok(());
            }
            next = next_within(&mut stream, read_idle_timeout) => next?,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Protocol(_))) => {
                debug!("session {id}: client socket closed");
                return Ok(());
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                debug!("session {id}: client stream ended");
                return Ok(());
            }
        };

        let payload = match message {
            WsMessage::Text(text) => text.into_bytes(),
            WsMessage::Binary(bytes) => bytes,
            WsMessage::Close(_) => {
                debug!("session {id}: Close frame received");
                return Ok(());
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
        };

        forward_command(id, &payload, codec, device).await;
    }
}

async fn next_within<St>(
    stream: &mut St,
    limit: Option<Duration>,
) -> Result<Option<Result<WsMessage, WsError>>, SessionError>
where
    St: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    match limit {
        Some(limit) => timeout(limit, stream.next())
            .await
            .map_err(|_| SessionError::ReadIdle(limit)),
        None => Ok(stream.next().await),
    }
}

async fn forward_command(
    id: SessionId,
    payload: &[u8],
    codec: &dyn MessageCodec,
    device: &dyn CommandSink,
) {
    let command = match codec.decode_command(payload) {
        Ok(command) => command,
        Err(e) => {
            warn!("session {id}: undecodable client message ({} bytes): {e}", payload.len());
            return;
        }
    };

    debug!("session {id}: client → device: {}", command.name());
    if let Err(e) = device.send_frame(&command_to_frame(&command)).await {
        warn!("session {id}: {} not delivered to device: {e}", command.name());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures_util::stream;
    use thermal_core::{ColorScheme, Frame};

    use crate::application::codec::JsonCodec;
    use crate::infrastructure::device_link::TransportError;

    /// Records every frame; optionally fails the first `fail_first` sends.
    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<Frame>>,
        fail_first: Mutex<usize>,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn send_frame(&self, frame: &Frame) -> Result<(), TransportError> {
            let mut fail = self.fail_first.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(TransportError::Write(std::io::ErrorKind::BrokenPipe.into()));
            }
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    /// A sink that collects into a futures channel.
    fn channel_sink() -> (
        impl Sink<WsMessage, Error = WsError> + Unpin,
        futures::channel::mpsc::UnboundedReceiver<WsMessage>,
    ) {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let sink = tx.sink_map_err(|_| WsError::ConnectionClosed);
        (sink, rx)
    }

    fn text(s: &str) -> Result<WsMessage, WsError> {
        Ok(WsMessage::Text(s.to_string()))
    }

    // ── Writer ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_writer_sends_queue_in_order_then_close_frame() {
        // Arrange
        let (sink, mut sent) = channel_sink();
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);
        queue_tx.send(OutMessage::Text(Arc::from("first"))).await.unwrap();
        queue_tx.send(OutMessage::Binary(Arc::from(vec![1u8, 2]))).await.unwrap();
        drop(queue_tx);

        // Act
        let result = run_writer(1, sink, queue_rx, stop_rx, None).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(sent.try_next().unwrap(), Some(WsMessage::Text("first".into())));
        assert_eq!(sent.try_next().unwrap(), Some(WsMessage::Binary(vec![1, 2])));
        assert_eq!(sent.try_next().unwrap(), None, "channel closed by sink.close()");
    }

    #[tokio::test]
    async fn test_writer_stops_at_close_message() {
        let (sink, mut sent) = channel_sink();
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);
        queue_tx.send(OutMessage::Close).await.unwrap();
        queue_tx.send(OutMessage::Text(Arc::from("never"))).await.unwrap();

        run_writer(1, sink, queue_rx, stop_rx, None).await.unwrap();

        assert_eq!(sent.try_next().unwrap(), None);
    }

    #[tokio::test]
    async fn test_writer_exits_on_stop_signal_with_messages_pending() {
        // Arrange: stop already signaled
        let (sink, mut sent) = channel_sink();
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        queue_tx.send(OutMessage::Text(Arc::from("late"))).await.unwrap();
        stop_tx.send_replace(true);

        // Act
        let result = run_writer(1, sink, queue_rx, stop_rx, None).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(sent.try_next().unwrap(), None);
    }

    #[tokio::test]
    async fn test_writer_reports_socket_failure() {
        // Arrange: the receiving end is gone
        let (sink, sent) = channel_sink();
        drop(sent);
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);
        queue_tx.send(OutMessage::Text(Arc::from("x"))).await.unwrap();

        // Act
        let result = run_writer(1, sink, queue_rx, stop_rx, None).await;

        // Assert
        assert!(matches!(result, Err(SessionError::Socket(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_writer_times_out_on_stalled_socket() {
        // Arrange: a sink that never becomes ready
        let sink = futures_util::sink::unfold((), |(), _msg: WsMessage| async {
            std::future::pending::<Result<(), WsError>>().await
        });
        let sink = Box::pin(sink);
        let (queue_tx, queue_rx) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);
        queue_tx.send(OutMessage::Text(Arc::from("x"))).await.unwrap();

        // Act
        let result = run_writer(1, sink, queue_rx, stop_rx, Some(Duration::from_secs(2))).await;

        // Assert
        assert!(matches!(result, Err(SessionError::WriteTimeout(_))));
    }

    // ── Reader ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_reader_forwards_commands_and_skips_garbage() {
        // Arrange
        let device = RecordingSink::default();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let incoming = stream::iter(vec![
            text(r#"{"setZoomLevel":{"level":4}}"#),
            text("garbage"),
            Ok(WsMessage::Binary(br#"{"setColorScheme":{"scheme":2}}"#.to_vec())),
            Ok(WsMessage::Ping(vec![1])),
        ]);

        // Act
        let result = run_reader(1, incoming, stop_rx, &JsonCodec, &device, None).await;

        // Assert
        assert!(result.is_ok());
        let frames = device.frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!((frames[0].id(), frames[0].read_i32()), (1, 4));
        assert_eq!(
            (frames[1].id(), frames[1].read_i32()),
            (2, ColorScheme::BlackHot.ordinal())
        );
    }

    #[tokio::test]
    async fn test_reader_survives_device_write_failure() {
        // Arrange: the first device write fails
        let device = RecordingSink {
            fail_first: Mutex::new(1),
            ..Default::default()
        };
        let (_stop_tx, stop_rx) = watch::channel(false);
        let incoming = stream::iter(vec![
            text(r#"{"setZoomLevel":{"level":1}}"#),
            text(r#"{"setZoomLevel":{"level":2}}"#),
        ]);

        // Act
        run_reader(1, incoming, stop_rx, &JsonCodec, &device, None)
            .await
            .unwrap();

        // Assert
        let frames = device.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].read_i32(), 2);
    }

    #[tokio::test]
    async fn test_reader_stops_at_close_frame() {
        let device = RecordingSink::default();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let incoming = stream::iter(vec![
            Ok(WsMessage::Close(None)),
            text(r#"{"setZoomLevel":{"level":9}}"#),
        ]);

        run_reader(1, incoming, stop_rx, &JsonCodec, &device, None)
            .await
            .unwrap();

        assert!(device.frames.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reader_reports_socket_error() {
        let device = RecordingSink::default();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let incoming = stream::iter(vec![Err(WsError::Io(
            std::io::ErrorKind::ConnectionReset.into(),
        ))]);

        let result = run_reader(1, incoming, stop_rx, &JsonCodec, &device, None).await;

        assert!(matches!(result, Err(SessionError::Socket(WsError::Io(_)))));
    }

    #[tokio::test]
    async fn test_reader_exits_on_stop_signal() {
        // Arrange: a client that never sends anything
        let device = RecordingSink::default();
        let (stop_tx, stop_rx) = watch::channel(false);
        let incoming = stream::pending::<Result<WsMessage, WsError>>();

        // Act
        let reader = run_reader(1, incoming, stop_rx, &JsonCodec, &device, None);
        stop_tx.send_replace(true);

        // Assert
        assert!(reader.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_idle_timeout() {
        let device = RecordingSink::default();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let incoming = stream::pending::<Result<WsMessage, WsError>>();

        let result = run_reader(
            1,
            incoming,
            stop_rx,
            &JsonCodec,
            &device,
            Some(Duration::from_secs(30)),
        )
        .await;

        assert!(matches!(result, Err(SessionError::ReadIdle(_))));
    }
}
