//! Hub configuration

use std::time::Duration;

use crate::error::{HubError, Result};
use crate::queue::checked_message_cost;

/// Default size of the client table (platform socket limit)
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Default byte capacity of each queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Default largest accepted message
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024;

/// Default size of a forwarded log line
pub const DEFAULT_LOG_LINE_CAPACITY: usize = 128;

/// Log targets never forwarded to clients: the hub's own plumbing and the
/// transport stack's frame-level diagnostics.
pub const DEFAULT_LOG_EXCLUSIONS: &[&str] = &["ws_console", "hyper", "tungstenite"];

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of client slots
    pub max_clients: usize,

    /// Outbound (broadcast) queue capacity in bytes
    pub outbound_capacity: usize,

    /// Inbound queue capacity in bytes
    pub inbound_capacity: usize,

    /// Largest message accepted by either queue
    pub max_message_size: usize,

    /// Bounded wait for the registry lock
    pub lock_timeout: Duration,

    /// Drain task wake period
    pub drain_interval: Duration,

    /// Messages drained per wake before yielding
    pub drain_batch: usize,

    /// Bound on a single per-client send
    pub send_timeout: Duration,

    /// How long stop() waits for the drain task before aborting it
    pub stop_timeout: Duration,

    /// Event channel capacity
    pub event_capacity: usize,

    /// Bounded wait when posting a connect event
    pub connect_event_wait: Duration,

    /// Bounded wait when posting a disconnect event
    pub disconnect_event_wait: Duration,

    /// Forwarded log lines are truncated to this many bytes
    pub log_line_capacity: usize,

    /// Log lines containing any of these are not forwarded
    pub log_exclusions: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            outbound_capacity: DEFAULT_QUEUE_CAPACITY,
            inbound_capacity: DEFAULT_QUEUE_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            lock_timeout: Duration::from_secs(1),
            drain_interval: Duration::from_millis(10),
            drain_batch: 16,
            send_timeout: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(2),
            event_capacity: 32,
            connect_event_wait: Duration::from_millis(10),
            disconnect_event_wait: Duration::from_millis(50),
            log_line_capacity: DEFAULT_LOG_LINE_CAPACITY,
            log_exclusions: DEFAULT_LOG_EXCLUSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl HubConfig {
    /// Set the number of client slots
    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Set the outbound queue capacity in bytes
    pub fn outbound_capacity(mut self, bytes: usize) -> Self {
        self.outbound_capacity = bytes;
        self
    }

    /// Set the inbound queue capacity in bytes
    pub fn inbound_capacity(mut self, bytes: usize) -> Self {
        self.inbound_capacity = bytes;
        self
    }

    /// Set the largest accepted message
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the registry lock wait
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the drain wake period
    pub fn drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Set how many messages the drain task handles per wake
    pub fn drain_batch(mut self, batch: usize) -> Self {
        self.drain_batch = batch.max(1);
        self
    }

    /// Set the per-client send bound
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the stop wait
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Set the event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Set the forwarded log line size
    pub fn log_line_capacity(mut self, bytes: usize) -> Self {
        self.log_line_capacity = bytes;
        self
    }

    /// Add a log exclusion pattern
    pub fn exclude_log(mut self, pattern: impl Into<String>) -> Self {
        self.log_exclusions.push(pattern.into());
        self
    }

    /// Replace the log exclusion list
    pub fn log_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log_exclusions = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Check that the configuration describes resources that can exist
    pub fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(HubError::InvalidArgument("max_clients must be non-zero"));
        }
        if self.max_message_size == 0 {
            return Err(HubError::InvalidArgument("max_message_size must be non-zero"));
        }
        let Some(largest) = checked_message_cost(self.max_message_size) else {
            return Err(HubError::InvalidArgument("max_message_size is too large"));
        };
        if largest > self.outbound_capacity || largest > self.inbound_capacity {
            return Err(HubError::InvalidArgument(
                "queue capacity cannot hold a maximum-size message",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.max_clients, DEFAULT_MAX_CLIENTS);
        assert_eq!(config.outbound_capacity, 4096);
        assert_eq!(config.inbound_capacity, 4096);
        assert_eq!(config.drain_interval, Duration::from_millis(10));
        assert_eq!(config.log_line_capacity, 128);
        assert!(config.log_exclusions.iter().any(|e| e == "ws_console"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .max_clients(3)
            .outbound_capacity(256)
            .inbound_capacity(512)
            .max_message_size(64)
            .lock_timeout(Duration::from_millis(20))
            .drain_batch(0)
            .exclude_log("noisy");

        assert_eq!(config.max_clients, 3);
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.inbound_capacity, 512);
        assert_eq!(config.max_message_size, 64);
        assert_eq!(config.lock_timeout, Duration::from_millis(20));
        assert_eq!(config.drain_batch, 1);
        assert_eq!(config.log_exclusions.last().map(String::as_str), Some("noisy"));
    }

    #[test]
    fn test_validate_rejects_unusable_sizes() {
        assert!(HubConfig::default().max_clients(0).validate().is_err());
        assert!(HubConfig::default().max_message_size(0).validate().is_err());

        // 64 bytes of payload plus framing cannot fit in 64 bytes
        let config = HubConfig::default()
            .max_message_size(64)
            .outbound_capacity(64);
        assert!(matches!(
            config.validate(),
            Err(HubError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_huge_message_size() {
        let config = HubConfig::default()
            .max_message_size(usize::MAX - 1)
            .outbound_capacity(usize::MAX)
            .inbound_capacity(usize::MAX);

        assert_eq!(
            config.validate(),
            Err(HubError::InvalidArgument("max_message_size is too large"))
        );
    }

    #[test]
    fn test_replace_exclusions() {
        let config = HubConfig::default().log_exclusions(["a", "b"]);
        assert_eq!(config.log_exclusions, vec!["a".to_string(), "b".to_string()]);
    }
}
