//! Cloneable entry point into a running hub

use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use crate::error::{HubError, Result};
use crate::queue::Reservation;
use crate::registry::ClientHandle;
use crate::stats::HubStats;

use super::shared::Shared;

/// Handle to the hub owned by a [`Console`](super::Console)
///
/// Clones share one slot. While the console is stopped every operation
/// fails with `NotRunning` (or returns `None` for peeks); after a restart
/// the same handle reaches the new instance.
#[derive(Clone, Default)]
pub struct Hub {
    slot: Arc<RwLock<Option<Arc<Shared>>>>,
}

impl Hub {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn install(&self, shared: Arc<Shared>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(shared);
    }

    pub(crate) fn withdraw(&self) -> Option<Arc<Shared>> {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Current instance; the slot lock is released before returning
    fn shared(&self) -> Result<Arc<Shared>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
            .ok_or(HubError::NotRunning)
    }

    /// Whether a hub instance is installed
    pub fn is_running(&self) -> bool {
        self.shared().map(|s| s.is_running()).unwrap_or(false)
    }

    /// Queue `message` for delivery to every connected client
    ///
    /// Never waits for delivery. Fails with `Full` when the outbound queue
    /// has no room; queued messages are unaffected.
    pub fn broadcast(&self, message: impl AsRef<[u8]>) -> Result<()> {
        let shared = self.shared()?;
        shared.outbound.enqueue(message.as_ref())?;
        shared.wake.notify_one();
        Ok(())
    }

    /// Queue one received frame for application processing
    pub fn inbound(&self, frame: &[u8]) -> Result<()> {
        let shared = self.shared()?;
        shared.inbound.enqueue(frame).map_err(|e| {
            tracing::debug!(len = frame.len(), error = %e, "Inbound frame dropped");
            e
        })
    }

    /// Reserve inbound space so the transport can read a frame in place
    ///
    /// Commit the reservation once the payload is written; dropping it
    /// returns the space.
    pub fn inbound_reserve(&self, len: usize) -> Result<Reservation> {
        self.shared()?.inbound.reserve(len)
    }

    /// Oldest unprocessed inbound message, without removing it
    ///
    /// Returns `None` when nothing is pending or the hub is stopped.
    pub fn inbound_peek(&self) -> Option<Bytes> {
        self.shared().ok()?.inbound.peek()
    }

    /// Release a message previously returned by [`inbound_peek`](Self::inbound_peek)
    pub fn inbound_dequeue(&self, message: &Bytes) -> Result<()> {
        self.shared()?.inbound.release(message)
    }

    /// Transport callback: a client completed its upgrade
    pub async fn client_connected(&self, handle: ClientHandle) -> Result<()> {
        self.shared()?.registry.add(handle).await
    }

    /// Transport callback: a client is going away
    ///
    /// Close the connection only after this returns.
    pub async fn client_disconnected(&self, handle: ClientHandle) -> Result<()> {
        self.shared()?.registry.remove(handle).await
    }

    /// Handles of the currently registered clients
    pub async fn clients(&self) -> Result<Vec<ClientHandle>> {
        self.shared()?.registry.snapshot().await
    }

    pub async fn client_count(&self) -> Result<usize> {
        self.shared()?.registry.count().await
    }

    /// Statistics of the current instance, or defaults when stopped
    pub async fn stats(&self) -> HubStats {
        match self.shared() {
            Ok(shared) => shared.stats().await,
            Err(_) => HubStats::new(),
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("running", &self.is_running())
            .finish()
    }
}
