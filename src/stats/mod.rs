//! Statistics snapshots
//!
//! Counters are kept as atomics next to the state they describe and copied
//! into these plain structs on request.

pub mod metrics;

pub use metrics::{DeliveryStats, ForwarderStats, HubStats, QueueStats};
