//! Statistics for the hub and its queues

/// Queue-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Buffered messages
    pub len: usize,
    /// Bytes charged for buffered and reserved messages
    pub used_bytes: usize,
    /// Capacity in bytes
    pub capacity: usize,
    /// Messages accepted since creation
    pub enqueued: u64,
    /// Messages rejected because the queue was full
    pub dropped: u64,
}

impl QueueStats {
    /// Buffer utilization as a percentage
    pub fn utilization(&self) -> f32 {
        if self.capacity > 0 {
            (self.used_bytes as f32 / self.capacity as f32) * 100.0
        } else {
            0.0
        }
    }
}

/// Fan-out statistics of the drain task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Messages taken off the outbound queue
    pub messages: u64,
    /// Successful per-client sends
    pub sends: u64,
    /// Failed or timed-out per-client sends
    pub send_failures: u64,
    /// Messages dropped because no client was connected
    pub unaddressed: u64,
    /// Messages dropped because the registry snapshot failed
    pub snapshot_failures: u64,
}

/// Log forwarder statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    /// Lines handed to the outbound queue
    pub forwarded: u64,
    /// Lines matching the exclusion list
    pub filtered: u64,
    /// Lines skipped because forwarding was already in progress
    pub reentrant: u64,
    /// Lines the outbound queue refused (full or hub stopped)
    pub dropped: u64,
}

impl ForwarderStats {
    /// Every line the forwarder has seen
    pub fn total(&self) -> u64 {
        self.forwarded + self.filtered + self.reentrant + self.dropped
    }
}

/// Hub-wide statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubStats {
    /// Whether the hub is running
    pub running: bool,
    /// Registered clients
    pub clients: usize,
    /// Outbound queue
    pub outbound: QueueStats,
    /// Inbound queue
    pub inbound: QueueStats,
    /// Drain task fan-out
    pub delivery: DeliveryStats,
    /// Connection events delivered
    pub events_posted: u64,
    /// Connection events dropped
    pub events_dropped: u64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_stats_new() {
        let stats = HubStats::new();
        assert!(!stats.running);
        assert_eq!(stats.clients, 0);
        assert_eq!(stats.outbound, QueueStats::default());
        assert_eq!(stats.delivery.sends, 0);
        assert_eq!(stats.events_dropped, 0);
    }

    #[test]
    fn test_queue_utilization() {
        let stats = QueueStats {
            used_bytes: 1024,
            capacity: 4096,
            ..Default::default()
        };
        assert_eq!(stats.utilization(), 25.0);

        // Zero capacity must not divide by zero
        assert_eq!(QueueStats::default().utilization(), 0.0);
    }

    #[test]
    fn test_forwarder_total() {
        let stats = ForwarderStats {
            forwarded: 3,
            filtered: 2,
            reentrant: 1,
            dropped: 4,
        };
        assert_eq!(stats.total(), 10);
    }
}
