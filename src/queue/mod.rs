//! Bounded message queues
//!
//! The hub runs two instances of [`BoundedQueue`]:
//!
//! - **outbound**: many producers (application code, timers, the log
//!   forwarder) enqueue; the drain task pops and fans out.
//! - **inbound**: the transport enqueues one message per received frame;
//!   application logic peeks, processes in place, then releases.
//!
//! Neither side ever waits on the other. A full queue rejects the message,
//! an empty queue returns `None`.
//!
//! # Zero-Copy Design
//!
//! Messages are `bytes::Bytes`. Peeking hands out a reference-counted view
//! of the queued buffer rather than a copy, and [`Reservation`] lets a
//! producer write straight into the buffer that will be queued.

pub mod reservation;
pub mod ring;

pub use reservation::Reservation;
pub use ring::{checked_message_cost, message_cost, BoundedQueue, QueueKind, FRAME_OVERHEAD};
