//! Lock-free MPSC queue for inter-thread communication.
//!
//! A bounded queue where any number of producers push concurrently and a
//! single consumer pops. Producers coordinate through a compare-and-swap on
//! the head cursor plus per-cell sequence numbers; the consumer observes
//! their pushes in the total order fixed by the CAS winners.
//!
//! # Overview
//!
//! - [`Producer`] - Write end; `Clone` it once per pushing thread
//! - [`Consumer`] - Read end (single consumer per queue)
//! - Push is lock-free (retries only under producer contention); pop is
//!   wait-free
//! - No fairness between producers: a producer may be starved by contention
//!   but never blocks
//!
//! # Example
//!
//! ```
//! use rhea::mpsc;
//!
//! let (producer, mut consumer) = mpsc::channel::<u64>(64).unwrap();
//!
//! let handles: Vec<_> = (0..3)
//!     .map(|p| {
//!         let mut producer = producer.clone();
//!         std::thread::spawn(move || {
//!             while producer.push(p).is_err() {}
//!         })
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! let mut got = Vec::new();
//! while let Some(v) = consumer.pop() {
//!     got.push(v);
//! }
//! got.sort_unstable();
//! assert_eq!(got, vec![0, 1, 2]);
//! ```

pub(crate) mod ring;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::CapacityError;
use crate::queue::{BoundedQueue, QueueConsumer, QueueProducer};
use crate::ring::PhantomUnsync;
use crate::trace::debug;

use ring::Ring;

/// Write end of the MPSC queue.
///
/// Cloning yields another producer for the same queue; each pushing thread
/// should own its own clone.
///
/// # Thread Safety
///
/// `Producer` is [`Send`] but **not** [`Sync`]: move a clone to each thread
/// instead of sharing one handle behind a reference.
pub struct Producer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Send> std::fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

/// Read end of the MPSC queue.
///
/// Only one consumer exists per queue; the type is neither `Clone` nor
/// `Sync`, so a second popping thread cannot be created without `unsafe`.
pub struct Consumer<T: Send> {
    ring: Arc<Ring<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Send> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").finish_non_exhaustive()
    }
}

/// Creates a new MPSC channel with the given capacity.
///
/// Returns a `(Producer, Consumer)` pair; clone the producer for every
/// additional pushing thread. All `capacity` slots are usable. The ring is
/// freed when the last handle drops; unconsumed items are dropped with it.
///
/// # Errors
///
/// Returns [`CapacityError`] unless `capacity` is a power of two and at
/// least 2.
pub fn channel<T: Send>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), CapacityError> {
    let ring = Arc::new(Ring::with_capacity(capacity)?);
    debug!(capacity, "mpsc channel created");

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
    /// Attempts to push an item onto the queue.
    ///
    /// Lock-free: under contention the internal claim loop retries against
    /// other producers, but a full queue returns immediately and nothing
    /// ever blocks.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the queue is full, handing the item back so it
    /// can be retried.
    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), T> {
        self.ring.push(item)
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of occupied slots. Racy snapshot.
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

impl<T: Send> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
            _unsync: PhantomData,
        }
    }
}

impl<T: Send> Consumer<T> {
    /// Attempts to pop an item from the queue (wait-free).
    ///
    /// Returns `None` if no published item is available.
    #[inline]
    #[must_use]
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: There is exactly one Consumer per ring (not Clone, not
        // Sync), so this thread has exclusive access to the consumer role.
        unsafe { self.ring.pop() }
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of occupied slots. Racy snapshot.
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
