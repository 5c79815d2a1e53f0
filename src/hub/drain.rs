//! Outbound drain task
//!
//! Pops messages off the outbound queue and sends each one to every
//! client registered at that moment. Wakes on every broadcast and at
//! least once per `drain_interval`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::config::HubConfig;
use crate::registry::ClientHandle;
use crate::transport::Transport;

use super::shared::Shared;

/// Drain loop tuning taken from the hub configuration
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrainSettings {
    pub(crate) interval: Duration,
    pub(crate) batch: usize,
    pub(crate) send_timeout: Duration,
}

impl From<&HubConfig> for DrainSettings {
    fn from(config: &HubConfig) -> Self {
        Self {
            interval: config.drain_interval,
            batch: config.drain_batch.max(1),
            send_timeout: config.send_timeout,
        }
    }
}

/// Run until `shared.running` is cleared
///
/// `ready` fires once the loop is about to start, `done` once it has left
/// the loop. A message being fanned out when stop is requested finishes
/// its fan-out first.
pub(crate) async fn run<T: Transport>(
    shared: Arc<Shared>,
    transport: Arc<T>,
    settings: DrainSettings,
    ready: oneshot::Sender<()>,
    done: oneshot::Sender<()>,
) {
    tracing::debug!(
        interval_ms = settings.interval.as_millis() as u64,
        batch = settings.batch,
        "Drain task started"
    );
    let _ = ready.send(());

    let mut clients = Vec::with_capacity(shared.registry.capacity());
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while shared.is_running() {
        let mut drained = 0;
        while drained < settings.batch && shared.is_running() {
            let Some(message) = shared.outbound.pop() else {
                break;
            };
            fan_out(&shared, transport.as_ref(), &message, &mut clients, settings.send_timeout).await;
            drained += 1;
        }

        if drained == settings.batch {
            // More may be waiting; let other tasks run before the next batch
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            _ = shared.wake.notified() => {}
            _ = ticker.tick() => {}
        }
    }

    tracing::debug!("Drain task exiting");
    let _ = done.send(());
}

/// Send one message to every currently registered client
///
/// A failed send is logged and counted; delivery continues with the next
/// client. The message is released by the caller afterwards either way.
async fn fan_out<T: Transport>(
    shared: &Shared,
    transport: &T,
    message: &Bytes,
    clients: &mut Vec<ClientHandle>,
    send_timeout: Duration,
) {
    let delivery = &shared.delivery;
    delivery.messages.fetch_add(1, Ordering::Relaxed);

    if let Err(e) = shared.registry.snapshot_into(clients).await {
        delivery.snapshot_failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!(error = %e, len = message.len(), "Client snapshot failed, message dropped");
        return;
    }

    if clients.is_empty() {
        delivery.unaddressed.fetch_add(1, Ordering::Relaxed);
        return;
    }

    for &client in clients.iter() {
        match tokio::time::timeout(send_timeout, transport.send(client, message)).await {
            Ok(Ok(())) => {
                delivery.sends.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                delivery.send_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(client = %client, error = %e, "Send to client failed");
            }
            Err(_) => {
                delivery.send_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    client = %client,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "Send to client timed out"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::event::EventNotifier;
    use crate::hub::Hub;
    use crate::transport::SendError;

    use super::*;

    /// Records every send; fails sends to the listed handles
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(ClientHandle, Bytes)>>,
        failing: Vec<ClientHandle>,
    }

    impl Transport for Recorder {
        async fn send(&self, client: ClientHandle, message: &Bytes) -> Result<(), SendError> {
            self.sent.lock().unwrap().push((client, message.clone()));
            if self.failing.contains(&client) {
                return Err(SendError::Closed);
            }
            Ok(())
        }

        fn attach(&self, _hub: Hub) {}

        fn detach(&self) {}
    }

    fn shared() -> Arc<Shared> {
        let (notifier, _events) = EventNotifier::new(16);
        Arc::new(Shared::allocate(&HubConfig::default(), Arc::new(notifier)).unwrap())
    }

    #[tokio::test]
    async fn test_fan_out_continues_past_failure() {
        let shared = shared();
        for raw in [3, 4, 5] {
            shared.registry.add(ClientHandle::new(raw)).await.unwrap();
        }
        let transport = Recorder {
            failing: vec![ClientHandle::new(4)],
            ..Default::default()
        };

        let message = Bytes::from_static(b"status");
        let mut clients = Vec::new();
        fan_out(&shared, &transport, &message, &mut clients, Duration::from_secs(1)).await;

        let sent = transport.sent.lock().unwrap();
        let targets: Vec<i32> = sent.iter().map(|(c, _)| c.raw()).collect();
        assert_eq!(targets, vec![3, 4, 5]);
        assert!(sent.iter().all(|(_, m)| m == &message));

        let stats = shared.delivery.snapshot();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.sends, 2);
        assert_eq!(stats.send_failures, 1);
    }

    #[tokio::test]
    async fn test_fan_out_without_clients() {
        let shared = shared();
        let transport = Recorder::default();

        let mut clients = Vec::new();
        fan_out(&shared, &transport, &Bytes::from_static(b"x"), &mut clients, Duration::from_secs(1)).await;

        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(shared.delivery.snapshot().unaddressed, 1);
    }

    #[tokio::test]
    async fn test_fan_out_drops_message_on_lock_timeout() {
        let (notifier, _events) = EventNotifier::new(16);
        let config = HubConfig::default().lock_timeout(Duration::from_millis(20));
        let shared = Shared::allocate(&config, Arc::new(notifier)).unwrap();
        shared.registry.add(ClientHandle::new(1)).await.unwrap();
        let transport = Recorder::default();

        let guard = shared.registry.hold_lock().await;
        let mut clients = Vec::new();
        fan_out(&shared, &transport, &Bytes::from_static(b"x"), &mut clients, Duration::from_secs(1)).await;
        drop(guard);

        assert!(transport.sent.lock().unwrap().is_empty());
        let stats = shared.delivery.snapshot();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.snapshot_failures, 1);
        assert_eq!(stats.sends, 0);

        // The next message goes out once the lock is free again
        fan_out(&shared, &transport, &Bytes::from_static(b"y"), &mut clients, Duration::from_secs(1)).await;
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        assert_eq!(shared.delivery.snapshot().snapshot_failures, 1);
    }

    #[tokio::test]
    async fn test_run_drains_and_exits() {
        let shared = shared();
        shared.registry.add(ClientHandle::new(1)).await.unwrap();
        shared.running.store(true, Ordering::Release);

        let transport = Arc::new(Recorder::default());
        let (ready_tx, ready_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let settings = DrainSettings {
            interval: Duration::from_millis(5),
            batch: 2,
            send_timeout: Duration::from_secs(1),
        };
        let task = tokio::spawn(run(
            Arc::clone(&shared),
            Arc::clone(&transport),
            settings,
            ready_tx,
            done_tx,
        ));
        ready_rx.await.unwrap();

        for i in 0..5 {
            shared.outbound.enqueue(format!("m{}", i).as_bytes()).unwrap();
        }
        shared.wake.notify_one();

        tokio::time::timeout(Duration::from_secs(5), async {
            while transport.sent.lock().unwrap().len() < 5 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        shared.running.store(false, Ordering::Release);
        shared.wake.notify_one();
        tokio::time::timeout(Duration::from_secs(5), done_rx)
            .await
            .unwrap()
            .unwrap();
        task.await.unwrap();

        let sent = transport.sent.lock().unwrap();
        let bodies: Vec<&[u8]> = sent.iter().map(|(_, m)| &m[..]).collect();
        assert_eq!(bodies, vec![&b"m0"[..], b"m1", b"m2", b"m3", b"m4"]);
        assert!(shared.outbound.is_empty());
    }
}
