//! Lock-free SPSC queue for inter-thread communication.
//!
//! A wait-free bounded queue with one producer and one consumer.
//!
//! # Overview
//!
//! - [`Producer`] - Write end (single producer per queue)
//! - [`Consumer`] - Read end (single consumer per queue)
//! - Lock-free, wait-free: no mutexes, no syscalls, no allocation in the
//!   hot path
//!
//! The queue holds at most `capacity - 1` items: one slot stays unoccupied
//! so that the full and empty states remain distinguishable from the two
//! cursors alone.
//!
//! # Example
//!
//! ```
//! use rhea::spsc;
//!
//! let (mut producer, mut consumer) = spsc::channel::<u64>(1024).unwrap();
//!
//! // Producer thread
//! producer.push(42).expect("queue full");
//!
//! // Consumer thread
//! assert_eq!(consumer.pop(), Some(42));
//! ```

pub(crate) mod ring;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::CapacityError;
use crate::queue::{BoundedQueue, QueueConsumer, QueueProducer};
use crate::ring::PhantomUnsync;
use crate::trace::debug;

use ring::Ring;

/// Write end of the SPSC queue.
///
/// Only one producer exists per queue; the type is neither `Clone` nor
/// `Sync`, so a second pushing thread cannot be created without `unsafe`.
///
/// # Thread Safety
///
/// `Producer` is [`Send`] but **not** [`Sync`]:
/// - Can transfer ownership to another thread
/// - Cannot share `&Producer` (no concurrent `push()`)
pub struct Producer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Send> std::fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

/// Read end of the SPSC queue.
///
/// Only one consumer exists per queue. See [`Producer`] for thread safety
/// details (same semantics apply).
pub struct Consumer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Send> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").finish_non_exhaustive()
    }
}

/// Creates a new SPSC channel with the given capacity.
///
/// Returns a `(Producer, Consumer)` pair. The producer and consumer can be
/// sent to different threads. The ring is freed when the last handle drops;
/// any unconsumed items are dropped with it.
///
/// # Errors
///
/// Returns [`CapacityError`] unless `capacity` is a power of two and at
/// least 2.
///
/// # Example
///
/// ```
/// use rhea::spsc;
///
/// let (mut tx, mut rx) = spsc::channel::<String>(16).unwrap();
///
/// tx.push("hello".to_string()).unwrap();
/// assert_eq!(rx.pop(), Some("hello".to_string()));
/// ```
pub fn channel<T: Send>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), CapacityError> {
    let ring = Arc::new(Ring::with_capacity(capacity)?);
    debug!(capacity, "spsc channel created");

    let producer = Producer {
        ring: Arc::clone(&ring),
        _unsync: PhantomData,
    };

    let consumer = Consumer {
        ring,
        _unsync: PhantomData,
    };

    Ok((producer, consumer))
}

impl<T: Send> Producer<T> {
    /// Attempts to push an item onto the queue (wait-free).
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the queue is full, handing the item back so it
    /// can be retried.
    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), T> {
        // SAFETY: There is exactly one Producer per ring (not Clone, not
        // Sync), so this thread has exclusive access to the producer role.
        unsafe { self.ring.push(item) }
    }

    /// Total number of slots; at most `capacity() - 1` can be occupied.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of occupied slots. Racy snapshot: the consumer may drain
    /// concurrently, so the value is stale by the time it is returned.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the queue appears empty (racy snapshot).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether the queue appears full (racy snapshot).
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

impl<T: Send> Consumer<T> {
    /// Attempts to pop an item from the queue (wait-free).
    ///
    /// Returns `None` if the queue is empty.
    #[inline]
    #[must_use]
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: There is exactly one Consumer per ring (not Clone, not
        // Sync), so this thread has exclusive access to the consumer role.
        unsafe { self.ring.pop() }
    }

    /// Total number of slots; at most `capacity() - 1` can be occupied.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of occupied slots. Racy snapshot; see [`Producer::len`].
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the queue appears empty (racy snapshot).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether the queue appears full (racy snapshot).
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

impl<T: Send> BoundedQueue for Producer<T> {
    fn capacity(&self) -> usize {
        Producer::capacity(self)
    }

    fn len(&self) -> usize {
        Producer::len(self)
    }

    fn is_empty(&self) -> bool {
        Producer::is_empty(self)
    }

    fn is_full(&self) -> bool {
        Producer::is_full(self)
    }
}

impl<T: Send> BoundedQueue for Consumer<T> {
    fn capacity(&self) -> usize {
        Consumer::capacity(self)
    }

    fn len(&self) -> usize {
        Consumer::len(self)
    }

    fn is_empty(&self) -> bool {
        Consumer::is_empty(self)
    }

    fn is_full(&self) -> bool {
        Consumer::is_full(self)
    }
}

impl<T: Send> QueueProducer<T> for Producer<T> {
    #[inline]
    fn try_push(&mut self, value: T) -> Result<(), T> {
        self.push(value)
    }
}

impl<T: Send> QueueConsumer<T> for Consumer<T> {
    #[inline]
    fn try_pop(&mut self) -> Option<T> {
        self.pop()
    }
}
