//! Broadcast messaging core for a wireless diagnostic console
//!
//! A device serves a small web console; every connected browser sees the
//! same live stream of status lines and log output, and can send commands
//! back. This crate is the part between the application and the socket:
//!
//! - [`registry`]: bounded set of connected clients with connection events
//! - [`queue`]: bounded outbound and inbound message queues
//! - [`hub`]: lifecycle control ([`Console`]) and the broadcast handle ([`Hub`])
//! - [`log`]: forwarding of log lines to every client
//! - [`transport`]: the seam a WebSocket server (or a test double) plugs into
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ws_console::{Console, HubConfig, LoopbackTransport};
//!
//! # async fn run() -> ws_console::Result<()> {
//! let transport = Arc::new(LoopbackTransport::new());
//! let mut console = Console::new(HubConfig::default());
//! console.start(Arc::clone(&transport)).await?;
//!
//! let hub = console.hub();
//! hub.broadcast("battery 87%")?;
//!
//! while let Some(command) = hub.inbound_peek() {
//!     println!("command: {}", String::from_utf8_lossy(&command));
//!     hub.inbound_dequeue(&command)?;
//! }
//!
//! console.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod hub;
pub mod log;
pub mod queue;
pub mod registry;
pub mod stats;
pub mod transport;

pub use config::HubConfig;
pub use error::{HubError, Result};
pub use event::{EventNotifier, HubEvent};
pub use hub::{Console, Hub, LifecycleState};
pub use log::LogForwarder;
pub use registry::ClientHandle;
pub use stats::HubStats;
pub use transport::{LoopbackClient, LoopbackTransport, SendError, Transport};
