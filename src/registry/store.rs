//! Client registry implementation
//!
//! A fixed table of client slots. Every mutation happens under one async
//! mutex whose acquisition is bounded by `lock_timeout`; a timeout is
//! reported to the caller instead of stalling the transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::event::{EventNotifier, HubEvent};

use super::handle::ClientHandle;

/// Slot table guarded by the registry lock
#[derive(Debug)]
struct ClientTable {
    /// `None` marks a free slot
    slots: Box<[Option<ClientHandle>]>,
    /// Number of occupied slots
    count: usize,
}

impl ClientTable {
    fn position(&self, handle: ClientHandle) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(handle))
    }

    fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }
}

/// Bounded set of active clients
///
/// Thread-safe via an async `Mutex`. Callers that need to talk to clients
/// take a [`snapshot`](ClientRegistry::snapshot) and send outside the lock.
#[derive(Debug)]
pub struct ClientRegistry {
    table: Mutex<ClientTable>,
    capacity: usize,
    lock_timeout: Duration,
    notifier: Arc<EventNotifier>,
    connect_event_wait: Duration,
    disconnect_event_wait: Duration,
}

impl ClientRegistry {
    /// Create an empty registry sized by `config.max_clients`
    ///
    /// Fails with `AllocationFailure` if the slot table cannot be allocated.
    pub fn new(config: &HubConfig, notifier: Arc<EventNotifier>) -> Result<Self> {
        let capacity = config.max_clients;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| HubError::AllocationFailure {
                resource: "client table",
            })?;
        slots.resize(capacity, None);

        Ok(Self {
            table: Mutex::new(ClientTable {
                slots: slots.into_boxed_slice(),
                count: 0,
            }),
            capacity,
            lock_timeout: config.lock_timeout,
            notifier,
            connect_event_wait: config.connect_event_wait,
            disconnect_event_wait: config.disconnect_event_wait,
        })
    }

    /// Number of slots in the table
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn lock(&self) -> Result<MutexGuard<'_, ClientTable>> {
        tokio::time::timeout(self.lock_timeout, self.table.lock())
            .await
            .map_err(|_| HubError::LockTimeout(self.lock_timeout))
    }

    /// Register a client
    ///
    /// A connect event is posted on success; failing to post it does not
    /// undo the registration.
    pub async fn add(&self, handle: ClientHandle) -> Result<()> {
        if !handle.is_valid() {
            tracing::error!(client = %handle, "Rejected malformed client handle");
            return Err(HubError::InvalidArgument("client handle must be non-negative"));
        }

        let mut table = self.lock().await.map_err(|e| {
            tracing::error!(client = %handle, "Registry lock timeout on add");
            e
        })?;

        if table.position(handle).is_some() {
            tracing::warn!(client = %handle, "Client already registered");
            return Err(HubError::AlreadyExists(handle));
        }

        let Some(slot) = table.first_free() else {
            tracing::error!(client = %handle, capacity = self.capacity, "No free client slot");
            return Err(HubError::NoCapacity {
                capacity: self.capacity,
            });
        };

        table.slots[slot] = Some(handle);
        table.count += 1;

        tracing::info!(
            client = %handle,
            slot = slot,
            clients = table.count,
            "Client registered"
        );

        // Posted under the lock so connect/disconnect events for one
        // handle keep their order.
        self.notifier
            .post(HubEvent::ClientConnected(handle), self.connect_event_wait)
            .await;

        Ok(())
    }

    /// Unregister a client
    ///
    /// The transport must close the connection only after this returns,
    /// so the handle cannot be reused while it is still registered.
    pub async fn remove(&self, handle: ClientHandle) -> Result<()> {
        if !handle.is_valid() {
            tracing::error!(client = %handle, "Rejected malformed client handle");
            return Err(HubError::InvalidArgument("client handle must be non-negative"));
        }

        let mut table = self.lock().await.map_err(|e| {
            tracing::error!(client = %handle, "Registry lock timeout on remove");
            e
        })?;

        let Some(slot) = table.position(handle) else {
            tracing::warn!(client = %handle, "Client not registered");
            return Err(HubError::NotFound(handle));
        };

        table.slots[slot] = None;
        table.count -= 1;

        tracing::info!(client = %handle, clients = table.count, "Client removed");

        self.notifier
            .post(
                HubEvent::ClientDisconnected(handle),
                self.disconnect_event_wait,
            )
            .await;

        Ok(())
    }

    /// Copy the active handles into `out`, replacing its contents
    ///
    /// Returns the number of handles copied. `out` keeps its allocation
    /// between calls, so a caller snapshotting in a loop allocates once.
    pub async fn snapshot_into(&self, out: &mut Vec<ClientHandle>) -> Result<usize> {
        let table = self.lock().await?;

        out.clear();
        out.extend(table.slots.iter().flatten().copied());

        Ok(out.len())
    }

    /// Point-in-time copy of the active handles
    pub async fn snapshot(&self) -> Result<Vec<ClientHandle>> {
        let mut out = Vec::with_capacity(self.capacity);
        self.snapshot_into(&mut out).await?;
        Ok(out)
    }

    /// Number of registered clients
    pub async fn count(&self) -> Result<usize> {
        Ok(self.lock().await?.count)
    }

    /// Check whether a handle is registered
    pub async fn contains(&self, handle: ClientHandle) -> Result<bool> {
        Ok(self.lock().await?.position(handle).is_some())
    }

    /// Hold the registry lock until the returned guard is dropped
    #[cfg(test)]
    pub(crate) async fn hold_lock(&self) -> impl Sized + '_ {
        self.table.lock().await
    }

    #[cfg(test)]
    async fn assert_consistent(&self) {
        let table = self.table.lock().await;
        let occupied: Vec<ClientHandle> = table.slots.iter().flatten().copied().collect();

        assert_eq!(table.count, occupied.len(), "count out of sync with slots");

        let mut unique = occupied.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), occupied.len(), "duplicate handle in table");
    }
}
