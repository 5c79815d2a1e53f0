//! Reserve-then-commit writes
//!
//! A transport that knows a frame's length before reading its payload can
//! reserve queue space, read the payload straight into the reserved buffer
//! and commit it, skipping the intermediate copy that
//! [`BoundedQueue::enqueue`] makes.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::BytesMut;

use super::ring::BoundedQueue;

/// Queue space held for a message being written in place
///
/// Dropping a reservation without committing it returns the space.
#[derive(Debug)]
pub struct Reservation {
    queue: Arc<BoundedQueue>,
    buf: BytesMut,
    cost: usize,
    committed: bool,
}

impl Reservation {
    pub(super) fn new(queue: Arc<BoundedQueue>, buf: BytesMut, cost: usize) -> Self {
        Self {
            queue,
            buf,
            cost,
            committed: false,
        }
    }

    /// Shorten the message, e.g. when the frame turned out smaller
    ///
    /// The space charged stays what was reserved until the message is
    /// consumed.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Append the written message to the queue
    ///
    /// The message lands behind everything committed or enqueued before
    /// this call, including reservations taken after this one.
    /// An empty (fully truncated) reservation is released instead.
    pub fn commit(mut self) {
        if self.buf.is_empty() {
            return;
        }
        let message = std::mem::take(&mut self.buf).freeze();
        self.queue.commit_reserved(message, self.cost);
        self.committed = true;
    }
}

impl Deref for Reservation {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for Reservation {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            self.queue.cancel_reserved(self.cost);
        }
    }
}
