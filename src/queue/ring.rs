//! Byte-bounded message queue
//!
//! Messages are variable-length `Bytes` buffers. The queue's capacity is
//! expressed in bytes, and each message is charged its payload rounded up
//! to a 4-byte boundary plus a fixed header, the way a no-split ring buffer
//! lays items out. Space reserved for an in-flight
//! [`Reservation`](super::Reservation) counts as used.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};

use crate::error::{HubError, Result};
use crate::stats::QueueStats;

use super::reservation::Reservation;

/// Per-message header charged against capacity
pub const FRAME_OVERHEAD: usize = 8;

/// Bytes a message of `len` bytes occupies in a queue, `None` on overflow
pub const fn checked_message_cost(len: usize) -> Option<usize> {
    match len.checked_add(3) {
        Some(padded) => (padded & !3).checked_add(FRAME_OVERHEAD),
        None => None,
    }
}

/// Bytes a message of `len` bytes occupies in a queue
///
/// Saturates at `usize::MAX`; use [`checked_message_cost`] to validate
/// untrusted sizes.
pub const fn message_cost(len: usize) -> usize {
    match checked_message_cost(len) {
        Some(cost) => cost,
        None => usize::MAX,
    }
}

/// Which of the hub's two queues this is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Broadcast queue drained by the fan-out task
    Outbound,
    /// Frames received from clients, pulled by application logic
    Inbound,
}

impl QueueKind {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            QueueKind::Outbound => "outbound",
            QueueKind::Inbound => "inbound",
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            QueueKind::Outbound => "outbound queue",
            QueueKind::Inbound => "inbound queue",
        }
    }
}

#[derive(Debug)]
struct Queued {
    data: Bytes,
    /// Bytes charged when the message was admitted
    cost: usize,
}

#[derive(Debug)]
struct RingState {
    messages: VecDeque<Queued>,
    /// Bytes charged for buffered and reserved messages
    used: usize,
}

/// Fixed-capacity FIFO of byte messages
///
/// Producers and the single consumer share one short critical section;
/// nothing inside it awaits, allocates a message, or logs. Enqueue on a
/// full queue and dequeue on an empty one return immediately.
#[derive(Debug)]
pub struct BoundedQueue {
    kind: QueueKind,
    capacity: usize,
    max_message_size: usize,
    state: Mutex<RingState>,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl BoundedQueue {
    /// Create a queue holding at most `capacity` bytes
    ///
    /// Storage for the message index is allocated up front; failure to
    /// allocate it is reported as `AllocationFailure`.
    pub fn with_capacity(kind: QueueKind, capacity: usize, max_message_size: usize) -> Result<Self> {
        if max_message_size == 0 {
            return Err(HubError::InvalidArgument("max_message_size must be non-zero"));
        }
        match checked_message_cost(max_message_size) {
            Some(largest) if largest <= capacity => {}
            Some(_) => {
                return Err(HubError::InvalidArgument(
                    "queue capacity cannot hold a maximum-size message",
                ))
            }
            None => return Err(HubError::InvalidArgument("max_message_size is too large")),
        }

        let max_messages = capacity / message_cost(1);
        let mut messages = VecDeque::new();
        messages
            .try_reserve(max_messages)
            .map_err(|_| HubError::AllocationFailure {
                resource: kind.resource(),
            })?;

        Ok(Self {
            kind,
            capacity,
            max_message_size,
            state: Mutex::new(RingState { messages, used: 0 }),
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    fn state(&self) -> MutexGuard<'_, RingState> {
        // Critical sections never panic midway, so a poisoned lock still
        // holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(HubError::InvalidArgument("message is empty"));
        }
        if len > self.max_message_size {
            return Err(HubError::InvalidArgument("message exceeds maximum size"));
        }
        Ok(())
    }

    fn overflow(&self, needed: usize, available: usize) -> HubError {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            queue = self.kind.name(),
            needed = needed,
            available = available,
            "Queue full, message dropped"
        );
        HubError::Full {
            queue: self.kind.name(),
            needed,
            available,
        }
    }

    /// Copy `data` into the queue
    ///
    /// Never blocks. Returns `Full` if the message does not fit; already
    /// buffered messages are untouched.
    pub fn enqueue(&self, data: &[u8]) -> Result<()> {
        self.check_len(data.len())?;

        let cost = message_cost(data.len());
        let message = Bytes::copy_from_slice(data);

        let rejected = {
            let mut state = self.state();
            if state.used + cost > self.capacity {
                Some(self.capacity - state.used)
            } else {
                state.used += cost;
                state.messages.push_back(Queued {
                    data: message,
                    cost,
                });
                None
            }
        };

        match rejected {
            // Logged after the lock is released: the log path may enqueue.
            Some(available) => Err(self.overflow(cost, available)),
            None => {
                self.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Reserve room for a `len`-byte message to be written in place
    ///
    /// The space is charged now, but the message joins the queue only when
    /// the reservation is committed. Concurrent reservations are therefore
    /// ordered by commit, not by reserve, and a reservation that is never
    /// committed holds back nothing behind it.
    pub fn reserve(self: &Arc<Self>, len: usize) -> Result<Reservation> {
        self.check_len(len)?;

        let cost = message_cost(len);
        let rejected = {
            let mut state = self.state();
            if state.used + cost > self.capacity {
                Some(self.capacity - state.used)
            } else {
                state.used += cost;
                None
            }
        };

        if let Some(available) = rejected {
            return Err(self.overflow(cost, available));
        }

        Ok(Reservation::new(Arc::clone(self), BytesMut::zeroed(len), cost))
    }

    /// Append a message whose space was reserved earlier
    pub(super) fn commit_reserved(&self, message: Bytes, cost: usize) {
        self.state().messages.push_back(Queued {
            data: message,
            cost,
        });
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Return space held by an abandoned reservation
    pub(super) fn cancel_reserved(&self, cost: usize) {
        let mut state = self.state();
        state.used = state.used.saturating_sub(cost);
    }

    /// Remove and return the oldest message
    pub fn pop(&self) -> Option<Bytes> {
        let mut state = self.state();
        let message = state.messages.pop_front()?;
        state.used -= message.cost;
        Some(message.data)
    }

    /// View the oldest message without releasing its storage
    ///
    /// The returned `Bytes` shares the queued buffer; the space stays
    /// charged until [`release`](Self::release) is called with it.
    pub fn peek(&self) -> Option<Bytes> {
        self.state().messages.front().map(|head| head.data.clone())
    }

    /// Release the message previously returned by [`peek`](Self::peek)
    pub fn release(&self, message: &Bytes) -> Result<()> {
        let mut state = self.state();

        let is_head = state
            .messages
            .front()
            .is_some_and(|head| {
                head.data.as_ptr() == message.as_ptr() && head.data.len() == message.len()
            });

        if !is_head {
            return Err(HubError::InvalidArgument("message is not the queue head"));
        }

        if let Some(head) = state.messages.pop_front() {
            state.used -= head.cost;
        }
        Ok(())
    }

    /// Discard every buffered message, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let discarded = state.messages.len();
        let released: usize = state.messages.drain(..).map(|m| m.cost).sum();
        state.used -= released;
        discarded
    }

    /// Which queue this is
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest accepted message
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Number of buffered messages
    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    /// Whether no message is buffered
    pub fn is_empty(&self) -> bool {
        self.state().messages.is_empty()
    }

    /// Bytes charged for buffered and reserved messages
    pub fn used(&self) -> usize {
        self.state().used
    }

    /// Bytes still free
    pub fn available(&self) -> usize {
        self.capacity - self.used()
    }

    /// Number of messages rejected because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Current queue statistics
    pub fn stats(&self) -> QueueStats {
        let (len, used) = {
            let state = self.state();
            (state.messages.len(), state.used)
        };

        QueueStats {
            len,
            used_bytes: used,
            capacity: self.capacity,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    fn queue(capacity: usize, max_message_size: usize) -> BoundedQueue {
        BoundedQueue::with_capacity(QueueKind::Outbound, capacity, max_message_size).unwrap()
    }

    #[test]
    fn test_message_cost() {
        assert_eq!(message_cost(1), 12);
        assert_eq!(message_cost(4), 12);
        assert_eq!(message_cost(5), 16);
        assert_eq!(message_cost(64), 72);

        assert_eq!(checked_message_cost(usize::MAX - 1), None);
        assert_eq!(checked_message_cost(usize::MAX - 11), Some(usize::MAX - 3));
        assert_eq!(message_cost(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_fifo_exact_bytes() {
        let queue = queue(1024, 64);
        let messages: Vec<Vec<u8>> = vec![
            b"hello".to_vec(),
            vec![0x00, 0xFF, 0x00, 0x80],
            vec![0xAB; 64],
            b"x".to_vec(),
        ];

        for message in &messages {
            assert_ok!(queue.enqueue(message));
        }
        assert_eq!(queue.len(), 4);

        for message in &messages {
            assert_eq!(queue.pop().as_deref(), Some(message.as_slice()));
        }
        assert!(queue.pop().is_none());
        assert_eq!(queue.used(), 0);
    }

    #[test]
    fn test_full_queue_rejects_without_corruption() {
        // Room for exactly two 16-byte messages
        let queue = queue(2 * message_cost(16), 16);

        queue.enqueue(&[1u8; 16]).unwrap();
        queue.enqueue(&[2u8; 16]).unwrap();

        let result = queue.enqueue(&[3u8; 1]);
        assert_eq!(
            result,
            Err(HubError::Full {
                queue: "outbound",
                needed: 12,
                available: 0,
            })
        );
        assert_eq!(queue.dropped(), 1);

        assert_eq!(queue.pop().as_deref(), Some(&[1u8; 16][..]));
        assert_eq!(queue.pop().as_deref(), Some(&[2u8; 16][..]));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_invalid_lengths() {
        let queue = queue(1024, 64);

        assert!(matches!(queue.enqueue(&[]), Err(HubError::InvalidArgument(_))));
        assert!(matches!(
            queue.enqueue(&[0u8; 65]),
            Err(HubError::InvalidArgument(_))
        ));
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn test_unusable_capacity() {
        let result = BoundedQueue::with_capacity(QueueKind::Inbound, 16, 64);
        assert!(matches!(result, Err(HubError::InvalidArgument(_))));
    }

    #[test]
    fn test_huge_message_size_rejected() {
        let result = BoundedQueue::with_capacity(QueueKind::Outbound, usize::MAX, usize::MAX - 1);
        assert_eq!(
            result.err(),
            Some(HubError::InvalidArgument("max_message_size is too large"))
        );
    }

    #[test]
    fn test_index_allocation_failure() {
        let result = BoundedQueue::with_capacity(QueueKind::Inbound, usize::MAX, 64);
        assert_eq!(
            result.err(),
            Some(HubError::AllocationFailure {
                resource: "inbound queue"
            })
        );
    }

    #[test]
    fn test_peek_then_release() {
        let queue = queue(1024, 64);
        queue.enqueue(b"first").unwrap();
        queue.enqueue(b"second").unwrap();

        let head = queue.peek().unwrap();
        assert_eq!(&head[..], b"first");
        // Peeking does not free anything
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().unwrap(), head);

        assert_ok!(queue.release(&head));
        assert_eq!(&queue.peek().unwrap()[..], b"second");
    }

    #[test]
    fn test_release_requires_head() {
        let queue = queue(1024, 64);
        queue.enqueue(b"first").unwrap();

        let stranger = Bytes::from_static(b"first");
        assert!(matches!(
            queue.release(&stranger),
            Err(HubError::InvalidArgument(_))
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_space_is_reused_after_pop() {
        let queue = queue(message_cost(32), 32);

        for round in 0..100u8 {
            queue.enqueue(&[round; 32]).unwrap();
            assert!(queue.enqueue(&[0u8; 1]).is_err());
            assert_eq!(queue.pop().as_deref(), Some(&[round; 32][..]));
        }
        assert_eq!(queue.stats().enqueued, 100);
        assert_eq!(queue.stats().dropped, 100);
    }

    #[test]
    fn test_clear() {
        let queue = queue(1024, 64);
        queue.enqueue(b"a").unwrap();
        queue.enqueue(b"b").unwrap();

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.used(), 0);
        assert_eq!(queue.available(), 1024);
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        let queue = Arc::new(queue(64 * 1024, 64));
        let producers = 4u8;
        let per_producer = 200u16;

        let threads: Vec<_> = (0..producers)
            .map(|p| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for seq in 0..per_producer {
                        let [hi, lo] = seq.to_be_bytes();
                        queue.enqueue(&[p, hi, lo]).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let mut next = vec![0u16; producers as usize];
        while let Some(message) = queue.pop() {
            let p = message[0] as usize;
            let seq = u16::from_be_bytes([message[1], message[2]]);
            assert_eq!(seq, next[p]);
            next[p] += 1;
        }
        assert!(next.iter().all(|n| *n == per_producer));
    }
}
