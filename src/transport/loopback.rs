//! In-memory transport
//!
//! Each connected client is a bounded channel. Used by the demo binary and
//! by tests that need a transport with controllable failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::error::{HubError, Result};
use crate::hub::Hub;
use crate::registry::ClientHandle;

use super::{SendError, Transport};

const DEFAULT_PEER_BUFFER: usize = 64;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receiving end of a loopback connection
#[derive(Debug)]
pub struct LoopbackClient {
    handle: ClientHandle,
    rx: mpsc::Receiver<Bytes>,
}

impl LoopbackClient {
    pub fn handle(&self) -> ClientHandle {
        self.handle
    }

    /// Next message sent to this client; `None` once the transport
    /// closed the connection
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

/// Channel-backed [`Transport`]
#[derive(Debug)]
pub struct LoopbackTransport {
    hub: Mutex<Option<Hub>>,
    peers: Mutex<HashMap<ClientHandle, mpsc::Sender<Bytes>>>,
    failing: Mutex<HashSet<ClientHandle>>,
    paused: watch::Sender<bool>,
    next_handle: AtomicI32,
    send_calls: AtomicU64,
    peer_buffer: usize,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::with_peer_buffer(DEFAULT_PEER_BUFFER)
    }

    /// Per-client buffer of `messages`; a full buffer fails the send
    pub fn with_peer_buffer(messages: usize) -> Self {
        let (paused, _) = watch::channel(false);

        Self {
            hub: Mutex::new(None),
            peers: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            paused,
            next_handle: AtomicI32::new(1),
            send_calls: AtomicU64::new(0),
            peer_buffer: messages.max(1),
        }
    }

    fn hub(&self) -> Result<Hub> {
        locked(&self.hub).clone().ok_or(HubError::NotRunning)
    }

    pub fn is_attached(&self) -> bool {
        locked(&self.hub).is_some()
    }

    /// Open a connection and register it with the hub
    pub async fn connect(&self) -> Result<LoopbackClient> {
        let hub = self.hub()?;
        let handle = ClientHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.peer_buffer);

        locked(&self.peers).insert(handle, tx);
        if let Err(e) = hub.client_connected(handle).await {
            locked(&self.peers).remove(&handle);
            return Err(e);
        }

        Ok(LoopbackClient { handle, rx })
    }

    /// Unregister a connection, then close it
    pub async fn disconnect(&self, handle: ClientHandle) -> Result<()> {
        let result = match self.hub() {
            Ok(hub) => hub.client_disconnected(handle).await,
            Err(e) => Err(e),
        };

        locked(&self.peers).remove(&handle);
        locked(&self.failing).remove(&handle);
        result
    }

    /// Deliver a frame from a client into the inbound queue
    pub fn receive(&self, frame: &[u8]) -> Result<()> {
        self.hub()?.inbound(frame)
    }

    /// Like [`receive`](Self::receive), writing straight into reserved
    /// inbound space
    pub fn receive_in_place(&self, frame: &[u8]) -> Result<()> {
        let mut slot = self.hub()?.inbound_reserve(frame.len())?;
        slot.copy_from_slice(frame);
        slot.commit();
        Ok(())
    }

    /// Make every later send to `handle` fail with an I/O error
    pub fn fail_sends_to(&self, handle: ClientHandle) {
        locked(&self.failing).insert(handle);
    }

    /// Hold every send until [`resume_sends`](Self::resume_sends)
    pub fn pause_sends(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_sends(&self) {
        self.paused.send_replace(false);
    }

    /// Sends attempted so far, including failed and held ones
    pub fn send_calls(&self) -> u64 {
        self.send_calls.load(Ordering::SeqCst)
    }
}

impl Transport for LoopbackTransport {
    async fn send(&self, client: ClientHandle, message: &Bytes) -> std::result::Result<(), SendError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);

        let mut paused = self.paused.subscribe();
        while *paused.borrow_and_update() {
            if paused.changed().await.is_err() {
                return Err(SendError::Closed);
            }
        }

        if locked(&self.failing).contains(&client) {
            return Err(SendError::Io("injected failure".into()));
        }

        let Some(tx) = locked(&self.peers).get(&client).cloned() else {
            return Err(SendError::Closed);
        };

        tx.try_send(message.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn attach(&self, hub: Hub) {
        *locked(&self.hub) = Some(hub);
        tracing::debug!("Loopback transport attached");
    }

    fn detach(&self) {
        locked(&self.hub).take();
        tracing::debug!("Loopback transport detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detached_transport() {
        let transport = LoopbackTransport::new();

        assert!(!transport.is_attached());
        assert_eq!(transport.connect().await.err(), Some(HubError::NotRunning));
        assert_eq!(transport.receive(b"frame"), Err(HubError::NotRunning));
    }

    #[tokio::test]
    async fn test_send_to_unknown_client() {
        let transport = LoopbackTransport::new();
        let result = transport
            .send(ClientHandle::new(42), &Bytes::from_static(b"x"))
            .await;

        assert_eq!(result, Err(SendError::Closed));
        assert_eq!(transport.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_peer_backpressure() {
        let transport = LoopbackTransport::with_peer_buffer(1);
        let handle = ClientHandle::new(1);
        let (tx, mut rx) = mpsc::channel(1);
        transport.peers.lock().unwrap().insert(handle, tx);

        let message = Bytes::from_static(b"m");
        assert_eq!(transport.send(handle, &message).await, Ok(()));
        assert_eq!(
            transport.send(handle, &message).await,
            Err(SendError::Backpressure)
        );
        assert_eq!(rx.recv().await, Some(message));
    }
}
