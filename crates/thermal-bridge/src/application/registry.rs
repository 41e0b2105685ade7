//! Connection registry and broadcaster.
//!
//! The registry tracks every live client session and fans device updates out
//! to all of them.  It has two jobs that pull in opposite directions:
//!
//! - deliver each update to every client, and
//! - never let one slow or dead client hold up delivery to the others.
//!
//! It resolves them with a single admission-control rule: a broadcast only
//! ever *tries* to enqueue (`try_send`).  If a session's bounded queue is
//! full, that session is evicted on the spot.
//!
//! # Session lifecycle
//!
//! ```text
//!  Active ──CAS──▶ Stopping ──▶ Stopped
//! ```
//!
//! The only way out of `Active` is a compare-and-set, and it is always
//! performed while holding the registry lock together with the map removal.
//! So:
//!
//! - a session is in the map if and only if it is `Active`;
//! - exactly one caller (reader exit, writer exit, or eviction) wins the
//!   transition, signals stop and removes the session; every other caller
//!   gets `false` and does nothing;
//! - nothing is ever enqueued after stop has been signaled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::domain::messages::OutMessage;

/// Unique, process-local session identifier.
pub type SessionId = u64;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// Registered (or about to be) and eligible for broadcasts.
    Active = 0,
    /// Stop signaled; teardown in progress.
    Stopping = 1,
    /// Removed from the registry.
    Stopped = 2,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Active,
            1 => Lifecycle::Stopping,
            _ => Lifecycle::Stopped,
        }
    }
}

/// Why a message could not be placed on a session's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("outbound queue is full")]
    Full,
    #[error("outbound queue is closed")]
    Closed,
    #[error("session is no longer active")]
    Stopped,
}

/// Why a session could not be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmitError {
    #[error("session {0} is already registered")]
    Duplicate(SessionId),
    #[error("session {0} was stopped before it was registered")]
    Stopped(SessionId),
    #[error("session {id}: initial sync could not be queued: {reason}")]
    InitialSync { id: SessionId, reason: EnqueueError },
}

/// The registry-facing half of a session.
///
/// Holds the sending side of the session's bounded outbound queue plus the
/// lifecycle flag and stop signal.  The receiving halves are handed to the
/// session's writer and reader tasks as a [`SessionEndpoints`].
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    peer: String,
    queue: mpsc::Sender<OutMessage>,
    lifecycle: AtomicU8,
    stop_tx: watch::Sender<bool>,
}

/// The task-facing half of a session, returned by [`SessionHandle::new`].
#[derive(Debug)]
pub struct SessionEndpoints {
    /// Outbound queue, drained by the writer pump only.
    pub queue_rx: mpsc::Receiver<OutMessage>,
    /// Stop signal; flips to `true` exactly once.
    pub stop_rx: watch::Receiver<bool>,
}

impl SessionHandle {
    /// Creates a session with an outbound queue of `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a tokio bounded channel requirement).
    pub fn new(
        id: SessionId,
        peer: impl Into<String>,
        capacity: usize,
    ) -> (Arc<Self>, SessionEndpoints) {
        let (queue, queue_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Arc::new(Self {
            id,
            peer: peer.into(),
            queue,
            lifecycle: AtomicU8::new(Lifecycle::Active as u8),
            stop_tx,
        });
        (handle, SessionEndpoints { queue_rx, stop_rx })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Peer label used in log messages (usually the remote socket address).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    /// `true` once stop has been signaled.
    pub fn is_stop_signaled(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// A fresh receiver for the stop signal.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Non-blocking enqueue.  Refused once the session has left `Active`.
    pub fn try_enqueue(&self, message: OutMessage) -> Result<(), EnqueueError> {
        if !self.is_active() {
            return Err(EnqueueError::Stopped);
        }
        self.queue.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// `Active → Stopping`.  Only the winning caller signals stop.
    fn begin_stop(&self) -> bool {
        let won = self
            .lifecycle
            .compare_exchange(
                Lifecycle::Active as u8,
                Lifecycle::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            self.stop_tx.send_replace(true);
        }
        won
    }

    fn finish_stop(&self) {
        self.lifecycle
            .store(Lifecycle::Stopped as u8, Ordering::Release);
    }
}

/// Outcome of one [`SessionRegistry::broadcast`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    /// Sessions that accepted the message onto their queue.
    pub delivered: usize,
    /// Sessions stopped and removed because their queue refused it.
    pub evicted: usize,
}

/// The live set of sessions, guarded by one mutex.
///
/// The lock is never held across an `.await`: every operation here is
/// synchronous and non-blocking, so the registry can be shared freely between
/// the inbound dispatcher and all session tasks.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the map consistent before it can panic,
    // so a poisoned lock still guards a valid map.
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<SessionHandle>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates the next session id.  Ids start at 1 and are never reused.
    pub fn next_session_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Registers `handle`, first queueing the message produced by
    /// `initial_sync` (if any).
    ///
    /// `initial_sync` runs under the registry lock.  A broadcast therefore
    /// either completes before it (and the sync reflects that update) or
    /// starts after the session is visible (and queues behind the sync), so a
    /// new client never misses an update and never sees one ahead of its
    /// initial state.
    ///
    /// # Errors
    ///
    /// - [`AdmitError::Duplicate`] if a session with the same id is registered.
    /// - [`AdmitError::Stopped`] if the handle was already torn down.
    /// - [`AdmitError::InitialSync`] if the sync message could not be queued.
    pub fn admit<F>(&self, handle: Arc<SessionHandle>, initial_sync: F) -> Result<(), AdmitError>
    where
        F: FnOnce() -> Option<OutMessage>,
    {
        let mut sessions = self.lock();

        if sessions.contains_key(&handle.id) {
            return Err(AdmitError::Duplicate(handle.id));
        }
        if !handle.is_active() {
            return Err(AdmitError::Stopped(handle.id));
        }
        if let Some(message) = initial_sync() {
            handle
                .try_enqueue(message)
                .map_err(|reason| AdmitError::InitialSync {
                    id: handle.id,
                    reason,
                })?;
        }

        debug!("session {} ({}) registered", handle.id, handle.peer);
        sessions.insert(handle.id, handle);
        Ok(())
    }

    /// Offers `message` to every registered session without blocking.
    ///
    /// Sessions whose queue is full or closed are treated as dead: stop is
    /// signaled and they are removed in the same pass.  Delivery to the other
    /// sessions is unaffected.
    pub fn broadcast(&self, message: &OutMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut sessions = self.lock();

        sessions.retain(|id, handle| match handle.try_enqueue(message.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(reason) => {
                handle.begin_stop();
                handle.finish_stop();
                report.evicted += 1;
                info!("session {id} ({}) evicted: {reason}", handle.peer);
                false
            }
        });

        report
    }

    /// Stops and unregisters `handle`.
    ///
    /// Safe to call from any number of paths, concurrently.  Returns `true`
    /// for the single call that performed the teardown and `false` for every
    /// other call (including after an eviction).
    pub fn teardown(&self, handle: &SessionHandle) -> bool {
        let mut sessions = self.lock();
        if !handle.begin_stop() {
            return false;
        }
        sessions.remove(&handle.id);
        drop(sessions);

        handle.finish_stop();
        debug!("session {} ({}) unregistered", handle.id, handle.peer);
        true
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.lock().contains_key(&id)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> OutMessage {
        OutMessage::Text(Arc::from(s))
    }

    fn admitted(
        registry: &SessionRegistry,
        capacity: usize,
    ) -> (Arc<SessionHandle>, SessionEndpoints) {
        let id = registry.next_session_id();
        let (handle, endpoints) = SessionHandle::new(id, format!("peer-{id}"), capacity);
        registry.admit(Arc::clone(&handle), || None).unwrap();
        (handle, endpoints)
    }

    #[test]
    fn test_session_ids_are_unique_and_start_at_one() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.next_session_id(), 1);
        assert_eq!(registry.next_session_id(), 2);
    }

    #[test]
    fn test_admit_registers_session() {
        // Arrange
        let registry = SessionRegistry::new();

        // Act
        let (handle, _ep) = admitted(&registry, 4);

        // Assert
        assert!(registry.contains(handle.id()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_admit_rejects_duplicate_id() {
        let registry = SessionRegistry::new();
        let (handle, _ep) = admitted(&registry, 4);

        let result = registry.admit(Arc::clone(&handle), || None);

        assert_eq!(result, Err(AdmitError::Duplicate(handle.id())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_admit_rejects_torn_down_handle() {
        let registry = SessionRegistry::new();
        let (handle, _ep) = SessionHandle::new(7, "peer", 4);
        assert!(registry.teardown(&handle));

        let result = registry.admit(Arc::clone(&handle), || None);

        assert_eq!(result, Err(AdmitError::Stopped(7)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_admit_queues_initial_sync_first() {
        // Arrange
        let registry = SessionRegistry::new();
        let (handle, mut ep) = SessionHandle::new(1, "peer", 4);

        // Act
        registry
            .admit(Arc::clone(&handle), || Some(text("sync")))
            .unwrap();
        registry.broadcast(&text("update"));

        // Assert: FIFO, sync before the update
        assert_eq!(ep.queue_rx.try_recv().unwrap(), text("sync"));
        assert_eq!(ep.queue_rx.try_recv().unwrap(), text("update"));
    }

    #[test]
    fn test_broadcast_reaches_every_session() {
        let registry = SessionRegistry::new();
        let mut endpoints: Vec<_> = (0..3).map(|_| admitted(&registry, 4)).collect();

        let report = registry.broadcast(&text("zoom"));

        assert_eq!(report, BroadcastReport { delivered: 3, evicted: 0 });
        for (_, ep) in endpoints.iter_mut() {
            assert_eq!(ep.queue_rx.try_recv().unwrap(), text("zoom"));
        }
    }

    #[test]
    fn test_broadcast_evicts_full_session_and_still_delivers_to_others() {
        // Arrange: the slow session has capacity 1 and is already full
        let registry = SessionRegistry::new();
        let (slow, slow_ep) = admitted(&registry, 1);
        slow.try_enqueue(text("backlog")).unwrap();
        let (fast, mut fast_ep) = admitted(&registry, 4);

        // Act
        let report = registry.broadcast(&text("update"));

        // Assert: slow evicted and stopped, fast received the message
        assert_eq!(report, BroadcastReport { delivered: 1, evicted: 1 });
        assert!(!registry.contains(slow.id()));
        assert!(registry.contains(fast.id()));
        assert_eq!(slow.lifecycle(), Lifecycle::Stopped);
        assert!(*slow_ep.stop_rx.borrow());
        assert_eq!(fast_ep.queue_rx.try_recv().unwrap(), text("update"));
    }

    #[test]
    fn test_broadcast_evicts_session_whose_writer_is_gone() {
        let registry = SessionRegistry::new();
        let (handle, ep) = admitted(&registry, 4);
        drop(ep); // writer task gone: queue closed

        let report = registry.broadcast(&text("x"));

        assert_eq!(report.evicted, 1);
        assert!(!registry.contains(handle.id()));
    }

    #[test]
    fn test_evicted_session_refuses_further_enqueues() {
        let registry = SessionRegistry::new();
        let (handle, _ep) = admitted(&registry, 1);
        handle.try_enqueue(text("fill")).unwrap();
        registry.broadcast(&text("overflow"));

        assert_eq!(handle.try_enqueue(text("late")), Err(EnqueueError::Stopped));
    }

    #[test]
    fn test_teardown_after_eviction_is_a_no_op() {
        let registry = SessionRegistry::new();
        let (handle, _ep) = admitted(&registry, 1);
        handle.try_enqueue(text("fill")).unwrap();
        registry.broadcast(&text("overflow"));

        assert!(!registry.teardown(&handle));
    }

    #[test]
    fn test_teardown_signals_stop_and_unregisters_once() {
        // Arrange
        let registry = SessionRegistry::new();
        let (handle, mut ep) = admitted(&registry, 4);

        // Act
        let first = registry.teardown(&handle);
        let second = registry.teardown(&handle);

        // Assert
        assert!(first);
        assert!(!second);
        assert!(registry.is_empty());
        assert_eq!(handle.lifecycle(), Lifecycle::Stopped);
        assert!(ep.stop_rx.has_changed().unwrap());
        assert!(*ep.stop_rx.borrow_and_update());
        assert!(!ep.stop_rx.has_changed().unwrap(), "stop must be signaled only once");
    }

    #[test]
    fn test_concurrent_teardown_has_exactly_one_winner() {
        // Arrange
        let registry = Arc::new(SessionRegistry::new());
        let (handle, _ep) = admitted(&registry, 4);
        let barrier = Arc::new(std::sync::Barrier::new(8));

        // Act: eight threads race to tear the same session down
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let handle = Arc::clone(&handle);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.teardown(&handle)
                })
            })
            .collect();
        let winners = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|won| *won)
            .count();

        // Assert
        assert_eq!(winners, 1);
        assert!(registry.is_empty());
        assert!(handle.is_stop_signaled());
    }

    #[test]
    fn test_broadcast_with_no_sessions_reports_nothing() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.broadcast(&text("x")), BroadcastReport::default());
    }

    #[test]
    fn test_stop_signal_subscriber_sees_stop() {
        let registry = SessionRegistry::new();
        let (handle, _ep) = admitted(&registry, 4);
        let rx = handle.stop_signal();

        registry.teardown(&handle);

        assert!(*rx.borrow());
    }
}
