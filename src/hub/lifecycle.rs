//! Start/stop control of the hub

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::event::{EventNotifier, HubEvent};
use crate::stats::HubStats;
use crate::transport::Transport;

use super::drain::{self, DrainSettings};
use super::handle::Hub;
use super::shared::Shared;

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Running,
}

/// Everything `stop` has to tear down
struct Running<T> {
    shared: Arc<Shared>,
    transport: Arc<T>,
    task: JoinHandle<()>,
    done: oneshot::Receiver<()>,
}

/// Owner of the hub lifecycle
///
/// `start` brings up the queues, the registry and the drain task and
/// attaches the transport; `stop` tears all of it down again. Restarting
/// after a stop is supported and yields a fresh instance.
pub struct Console<T: Transport> {
    config: HubConfig,
    hub: Hub,
    notifier: Arc<EventNotifier>,
    running: Option<Running<T>>,
}

impl<T: Transport> Console<T> {
    /// Create a stopped console
    pub fn new(config: HubConfig) -> Self {
        let notifier = EventNotifier::unsubscribed(config.event_capacity);

        Self {
            config,
            hub: Hub::new(),
            notifier: Arc::new(notifier),
            running: None,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Handle for application code; stays valid across restarts
    pub fn hub(&self) -> Hub {
        self.hub.clone()
    }

    /// Take the connection event stream
    ///
    /// Events are only published from this call on, and the stream
    /// survives restarts. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<HubEvent>> {
        self.notifier.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        if self.running.is_some() {
            LifecycleState::Running
        } else {
            LifecycleState::Uninitialized
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bring the hub up and attach `transport`
    ///
    /// On any failure every resource created so far is released and the
    /// console stays stopped.
    pub async fn start(&mut self, transport: Arc<T>) -> Result<()> {
        if self.running.is_some() {
            tracing::warn!("Console hub already running");
            return Err(HubError::AlreadyRunning);
        }

        self.config.validate().map_err(|e| {
            tracing::error!(error = %e, "Invalid console configuration");
            e
        })?;

        tracing::info!(
            max_clients = self.config.max_clients,
            outbound_bytes = self.config.outbound_capacity,
            inbound_bytes = self.config.inbound_capacity,
            "Starting console hub"
        );

        let shared = Arc::new(Shared::allocate(&self.config, Arc::clone(&self.notifier))?);
        shared.running.store(true, Ordering::Release);

        let (ready_tx, ready_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let task = tokio::spawn(drain::run(
            Arc::clone(&shared),
            Arc::clone(&transport),
            DrainSettings::from(&self.config),
            ready_tx,
            done_tx,
        ));

        if ready_rx.await.is_err() {
            shared.running.store(false, Ordering::Release);
            task.abort();
            tracing::error!("Drain task failed to start");
            return Err(HubError::AllocationFailure {
                resource: "drain task",
            });
        }

        self.hub.install(Arc::clone(&shared));
        transport.attach(self.hub.clone());

        self.running = Some(Running {
            shared,
            transport,
            task,
            done: done_rx,
        });

        tracing::info!("Console hub started");
        Ok(())
    }

    /// Tear the hub down
    ///
    /// No-op when not running. Messages still queued are discarded.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            tracing::debug!("Console hub not running, nothing to stop");
            return;
        };

        tracing::info!("Stopping console hub");

        running.transport.detach();
        self.hub.withdraw();

        let shared = running.shared;
        shared.running.store(false, Ordering::Release);
        shared.wake.notify_one();

        let mut task = running.task;
        match tokio::time::timeout(self.config.stop_timeout, running.done).await {
            Ok(_) => {
                let _ = (&mut task).await;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.stop_timeout.as_millis() as u64,
                    "Drain task did not stop in time, aborting"
                );
                task.abort();
                let _ = task.await;
            }
        }

        let discarded = shared.outbound.clear() + shared.inbound.clear();
        if discarded > 0 {
            tracing::debug!(discarded, "Discarded queued messages");
        }
        drop(shared);

        tracing::info!("Console hub stopped");
    }

    /// Hub statistics, or defaults while stopped
    pub async fn stats(&self) -> HubStats {
        match &self.running {
            Some(running) => running.shared.stats().await,
            None => HubStats::new(),
        }
    }
}

impl<T: Transport> Drop for Console<T> {
    fn drop(&mut self) {
        // Without an executor to await on, signal the drain task and let it
        // exit on its own.
        if let Some(running) = self.running.take() {
            running.transport.detach();
            self.hub.withdraw();
            running.shared.running.store(false, Ordering::Release);
            running.shared.wake.notify_one();
        }
    }
}

impl<T: Transport> std::fmt::Debug for Console<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}
