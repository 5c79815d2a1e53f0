//! Transport seam
//!
//! The hub does not speak any wire protocol. A transport (HTTP/WebSocket
//! server, serial bridge, in-memory loopback, ...) implements [`Transport`]
//! and drives the hub through the [`Hub`] it is handed on attach:
//!
//! - `Hub::client_connected` when a client finishes its upgrade,
//! - `Hub::inbound` / `Hub::inbound_reserve` once per received frame,
//! - `Hub::client_disconnected` before closing the connection.
//!
//! In the other direction the drain task calls [`Transport::send`] once
//! per registered client for every broadcast message.

use std::future::Future;

use bytes::Bytes;

use crate::hub::Hub;
use crate::registry::ClientHandle;

pub mod loopback;

pub use loopback::{LoopbackClient, LoopbackTransport};

/// Error type for a single per-client send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Connection is closed or unknown to the transport
    Closed,
    /// Client is not keeping up; the message was not accepted
    Backpressure,
    /// I/O failure on the connection
    Io(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Closed => write!(f, "Connection closed"),
            SendError::Backpressure => write!(f, "Client send buffer full"),
            SendError::Io(reason) => write!(f, "I/O error: {}", reason),
        }
    }
}

impl std::error::Error for SendError {}

/// Wire transport collaborating with the hub
pub trait Transport: Send + Sync + 'static {
    /// Deliver one message to one client
    ///
    /// The drain task bounds each call with the configured send timeout,
    /// so an implementation may await the socket.
    fn send(
        &self,
        client: ClientHandle,
        message: &Bytes,
    ) -> impl Future<Output = Result<(), SendError>> + Send;

    /// Start delivering connection and inbound callbacks into `hub`
    ///
    /// Called by `Console::start` once every hub resource exists and the
    /// drain task is running.
    fn attach(&self, hub: Hub);

    /// Stop delivering callbacks; called first thing in `Console::stop`
    fn detach(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_display() {
        assert_eq!(SendError::Closed.to_string(), "Connection closed");
        assert_eq!(
            SendError::Io("reset by peer".into()).to_string(),
            "I/O error: reset by peer"
        );
    }
}
