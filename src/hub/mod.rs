//! Broadcast hub
//!
//! # Architecture
//!
//! ```text
//!  producers                         Console::start / stop
//!  (app, timers, log forwarder)              │
//!        │ Hub::broadcast                    ▼
//!        ▼                          ┌──────────────────┐
//!  ┌───────────┐   pop   ┌────────┐ │ Shared           │
//!  │ outbound  │────────►│ drain  │ │  registry        │
//!  │ queue     │         │ task   │ │  outbound queue  │
//!  └───────────┘         └───┬────┘ │  inbound queue   │
//!                            │      │  wake / running  │
//!            snapshot clients│      └──────────────────┘
//!                            ▼
//!                  Transport::send(client, msg)  x N
//!
//!  Transport ──► Hub::client_connected / client_disconnected ──► registry ──► events
//!  Transport ──► Hub::inbound ──► inbound queue ──► Hub::inbound_peek / inbound_dequeue
//! ```
//!
//! [`Console`] owns the lifecycle. [`Hub`] is the cloneable handle the
//! application and the transport use; it follows the console across
//! restarts and reports `NotRunning` while stopped.

mod drain;
pub mod handle;
pub mod lifecycle;
mod shared;

pub use handle::Hub;
pub use lifecycle::{Console, LifecycleState};
