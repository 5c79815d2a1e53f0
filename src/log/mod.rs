//! Log forwarding
//!
//! [`init`] installs the process-wide subscriber: an env filter, the usual
//! formatted console output, and a [`LogForwarder`] that copies every line
//! to connected clients through the hub.

pub mod forwarder;
pub mod line;

pub use forwarder::{Forward, LogForwarder};
pub use line::LineBuffer;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::config::HubConfig;
use crate::hub::Hub;

/// Install the global subscriber with log forwarding into `hub`
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Fails if a
/// global subscriber is already set.
pub fn init(hub: Hub, config: &HubConfig) -> Result<LogForwarder, TryInitError> {
    let forwarder = LogForwarder::new(hub, config);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(forwarder.clone())
        .try_init()?;

    Ok(forwarder)
}
