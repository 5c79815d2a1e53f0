//! Resources owned by one running hub
//!
//! Created in one piece by `Console::start` and released in one piece by
//! `Console::stop`. Nothing outside the lifecycle controller can observe a
//! partially built instance.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::HubConfig;
use crate::error::Result;
use crate::event::EventNotifier;
use crate::queue::{BoundedQueue, QueueKind};
use crate::registry::ClientRegistry;
use crate::stats::{DeliveryStats, HubStats};

/// Fan-out counters updated by the drain task
#[derive(Debug, Default)]
pub(crate) struct DeliveryCounters {
    pub(crate) messages: AtomicU64,
    pub(crate) sends: AtomicU64,
    pub(crate) send_failures: AtomicU64,
    pub(crate) unaddressed: AtomicU64,
    pub(crate) snapshot_failures: AtomicU64,
}

impl DeliveryCounters {
    pub(crate) fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            messages: self.messages.load(Ordering::Relaxed),
            sends: self.sends.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            unaddressed: self.unaddressed.load(Ordering::Relaxed),
            snapshot_failures: self.snapshot_failures.load(Ordering::Relaxed),
        }
    }
}

/// Registry, queues and drain-task signals of a running hub
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) registry: ClientRegistry,
    pub(crate) outbound: Arc<BoundedQueue>,
    pub(crate) inbound: Arc<BoundedQueue>,
    pub(crate) notifier: Arc<EventNotifier>,
    /// Wakes the drain task ahead of its period
    pub(crate) wake: Notify,
    /// Cleared by stop(); the drain task exits when it sees it false
    pub(crate) running: AtomicBool,
    pub(crate) delivery: DeliveryCounters,
}

impl Shared {
    /// Allocate every resource, in order
    ///
    /// On failure the resources already created are dropped before the
    /// error is returned.
    pub(crate) fn allocate(config: &HubConfig, notifier: Arc<EventNotifier>) -> Result<Self> {
        let outbound = BoundedQueue::with_capacity(
            QueueKind::Outbound,
            config.outbound_capacity,
            config.max_message_size,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create outbound queue");
            e
        })?;

        let inbound = BoundedQueue::with_capacity(
            QueueKind::Inbound,
            config.inbound_capacity,
            config.max_message_size,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create inbound queue, releasing outbound queue");
            e
        })?;

        let registry = ClientRegistry::new(config, Arc::clone(&notifier)).map_err(|e| {
            tracing::error!(error = %e, "Failed to create client registry, releasing queues");
            e
        })?;

        Ok(Self {
            registry,
            outbound: Arc::new(outbound),
            inbound: Arc::new(inbound),
            notifier,
            wake: Notify::new(),
            running: AtomicBool::new(false),
            delivery: DeliveryCounters::default(),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) async fn stats(&self) -> HubStats {
        HubStats {
            running: self.is_running(),
            // A contended registry reports zero rather than stalling stats
            clients: self.registry.count().await.unwrap_or(0),
            outbound: self.outbound.stats(),
            inbound: self.inbound.stats(),
            delivery: self.delivery.snapshot(),
            events_posted: self.notifier.posted(),
            events_dropped: self.notifier.dropped(),
        }
    }
}
