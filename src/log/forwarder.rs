//! Log-to-broadcast forwarder
//!
//! Every log line that passes the exclusion list is queued on the outbound
//! queue so that connected clients see the device log live. Forwarding a
//! line can itself log (a full queue warns), so the forwarder carries a
//! per-thread guard: a line produced while the same thread is already
//! forwarding is skipped instead of recursing.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::HubConfig;
use crate::error::HubError;
use crate::hub::Hub;
use crate::stats::ForwarderStats;

use super::line::{self, LineBuffer};

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as forwarding until dropped
struct ForwardGuard;

impl ForwardGuard {
    /// `None` if this thread is already forwarding
    fn enter() -> Option<Self> {
        FORWARDING
            .try_with(|active| {
                if active.replace(true) {
                    None
                } else {
                    Some(ForwardGuard)
                }
            })
            .ok()
            .flatten()
    }
}

impl Drop for ForwardGuard {
    fn drop(&mut self) {
        let _ = FORWARDING.try_with(|active| active.set(false));
    }
}

/// Outcome of forwarding one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forward {
    /// Queued for broadcast
    Forwarded,
    /// Matched an exclusion pattern
    Filtered,
    /// Produced while this thread was already forwarding
    Reentrant,
    /// Refused by the hub
    Dropped(HubError),
}

#[derive(Debug, Default)]
struct Counters {
    forwarded: AtomicU64,
    filtered: AtomicU64,
    reentrant: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug)]
struct Inner {
    hub: Hub,
    exclusions: Vec<String>,
    line_capacity: usize,
    counters: Counters,
}

/// Forwards log lines into the hub's outbound queue
///
/// Usable directly through [`forward`](LogForwarder::forward) or as a
/// `tracing_subscriber` layer. Clones share counters.
#[derive(Debug, Clone)]
pub struct LogForwarder {
    inner: Arc<Inner>,
}

impl LogForwarder {
    pub fn new(hub: Hub, config: &HubConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                hub,
                exclusions: config.log_exclusions.clone(),
                line_capacity: config.log_line_capacity,
                counters: Counters::default(),
            }),
        }
    }

    /// Forward one already formatted line
    ///
    /// Lines longer than the configured line capacity are truncated.
    pub fn forward(&self, line: &str) -> Forward {
        let Some(_guard) = ForwardGuard::enter() else {
            return self.skip_reentrant();
        };

        let mut buf = LineBuffer::with_capacity(self.inner.line_capacity);
        let _ = std::fmt::Write::write_str(&mut buf, line);
        self.forward_guarded(buf.as_str())
    }

    fn skip_reentrant(&self) -> Forward {
        self.inner.counters.reentrant.fetch_add(1, Ordering::Relaxed);
        Forward::Reentrant
    }

    /// Caller holds the thread's `ForwardGuard`
    fn forward_guarded(&self, line: &str) -> Forward {
        let counters = &self.inner.counters;

        if self.is_excluded(line) {
            counters.filtered.fetch_add(1, Ordering::Relaxed);
            return Forward::Filtered;
        }

        match self.inner.hub.broadcast(line) {
            Ok(()) => {
                counters.forwarded.fetch_add(1, Ordering::Relaxed);
                Forward::Forwarded
            }
            Err(e) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                Forward::Dropped(e)
            }
        }
    }

    fn is_excluded(&self, line: &str) -> bool {
        self.inner
            .exclusions
            .iter()
            .any(|pattern| line.contains(pattern.as_str()))
    }

    pub fn stats(&self) -> ForwarderStats {
        let counters = &self.inner.counters;
        ForwarderStats {
            forwarded: counters.forwarded.load(Ordering::Relaxed),
            filtered: counters.filtered.load(Ordering::Relaxed),
            reentrant: counters.reentrant.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogForwarder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(_guard) = ForwardGuard::enter() else {
            self.skip_reentrant();
            return;
        };

        let mut buf = LineBuffer::with_capacity(self.inner.line_capacity);
        line::format_event(event, &mut buf);
        self.forward_guarded(buf.as_str());
    }
}
