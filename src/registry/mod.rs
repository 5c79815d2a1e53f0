//! Client registry
//!
//! The registry tracks which console clients are connected. The transport
//! adds a client when a WebSocket upgrade completes and removes it before
//! closing the socket. The drain task reads it through snapshots.
//!
//! # Architecture
//!
//! ```text
//!      transport I/O                      drain task
//!   add() / remove()                    snapshot_into()
//!          │                                  │
//!          ▼                                  ▼
//!   ┌──────────────────────────────────────────────┐
//!   │ Mutex<ClientTable>  (bounded lock wait)      │
//!   │   slots: [Some(4), None, Some(7), None, ..]  │
//!   │   count: 2                                   │
//!   └──────────────────────────────────────────────┘
//!          │
//!          └──► EventNotifier (ClientConnected / ClientDisconnected)
//! ```
//!
//! The table is a fixed array of handles, not a map: it never grows, and a
//! full table rejects new clients outright.

pub mod handle;
pub mod store;

pub use handle::ClientHandle;
pub use store::ClientRegistry;
