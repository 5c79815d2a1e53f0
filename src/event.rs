//! Connection events for other subsystems
//!
//! Registry changes are published on a bounded channel so that subsystems
//! outside the hub (status LEDs, idle timers, ...) can react to clients
//! coming and going. Publishing is best-effort: a full or closed channel
//! is logged and counted, and the registry operation that triggered the
//! event completes regardless. Until a subscriber takes the receiver,
//! posting is a no-op.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::registry::ClientHandle;

/// Events published by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubEvent {
    /// A client was added to the registry
    ClientConnected(ClientHandle),
    /// A client was removed from the registry
    ClientDisconnected(ClientHandle),
}

impl HubEvent {
    /// Client the event refers to
    pub fn client(&self) -> ClientHandle {
        match self {
            HubEvent::ClientConnected(handle) | HubEvent::ClientDisconnected(handle) => *handle,
        }
    }
}

/// Bounded, best-effort event publisher
#[derive(Debug)]
pub struct EventNotifier {
    tx: mpsc::Sender<HubEvent>,
    /// Receiver not yet handed to a subscriber
    pending: Mutex<Option<mpsc::Receiver<HubEvent>>>,
    subscribed: AtomicBool,
    posted: AtomicU64,
    dropped: AtomicU64,
}

impl EventNotifier {
    /// Create a notifier and the receiver its events arrive on
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<HubEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::with_sender(tx, None, true), rx)
    }

    /// Create a notifier whose receiver waits for [`subscribe`](Self::subscribe)
    pub fn unsubscribed(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self::with_sender(tx, Some(rx), false)
    }

    fn with_sender(
        tx: mpsc::Sender<HubEvent>,
        pending: Option<mpsc::Receiver<HubEvent>>,
        subscribed: bool,
    ) -> Self {
        Self {
            tx,
            pending: Mutex::new(pending),
            subscribed: AtomicBool::new(subscribed),
            posted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Hand out the receiver; `None` once it has been taken
    pub fn subscribe(&self) -> Option<mpsc::Receiver<HubEvent>> {
        let rx = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        self.subscribed.store(true, Ordering::Release);
        Some(rx)
    }

    /// Whether a receiver has been handed out
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// Publish an event, waiting at most `wait` for channel space
    ///
    /// Returns whether the event was delivered to the channel. Without a
    /// subscriber the event is discarded at once and not counted.
    pub async fn post(&self, event: HubEvent, wait: Duration) -> bool {
        if !self.is_subscribed() {
            return false;
        }

        let event = match self.tx.try_send(event) {
            Ok(()) => {
                self.posted.fetch_add(1, Ordering::Relaxed);
                return true;
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(event = ?event, "Event receiver closed, event dropped");
                return false;
            }
            Err(TrySendError::Full(event)) => event,
        };

        match tokio::time::timeout(wait, self.tx.send(event)).await {
            Ok(Ok(())) => {
                self.posted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(Err(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(event = ?event, "Event receiver closed, event dropped");
                false
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    event = ?event,
                    wait_ms = wait.as_millis() as u64,
                    "Event queue full, event dropped"
                );
                false
            }
        }
    }

    /// Number of events delivered to the channel
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    /// Number of events dropped (timeout or closed receiver)
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
