//! Lock-free broadcast SPMC queue for inter-thread communication.
//!
//! One producer, any number of independent consumers. This is a broadcast
//! ring, not a work-stealing queue: every consumer observes every published
//! value in the producer's order, and consumers never coordinate with each
//! other or with the producer.
//!
//! # Overview
//!
//! - [`Producer`] - Write end; never fails, overwrites the oldest slot
//! - [`Consumer`] - Read end; `Clone` it for additional independent readers
//! - All operations are wait-free
//!
//! Bounded capacity and broadcast semantics conflict when a consumer falls
//! behind: the producer does not wait, so it eventually laps the slow
//! consumer and overwrites values that consumer has not seen. The lap is
//! detected at pop time via a per-slot version tag and surfaces as the
//! [`Overlapped`] error; [`Consumer::respawn`] resynchronizes to the
//! producer's current position, accepting the dropped interval. Callers that
//! need every value must size `capacity` to the worst expected lag.
//!
//! Elements must be `Copy`: values are copied out so that other consumers
//! can still read them, and a copy torn by a concurrent overwrite is
//! discarded by the version check.
//!
//! # Example
//!
//! ```
//! use rhea::spmc;
//!
//! let (mut producer, mut c1) = spmc::channel::<u64>(256).unwrap();
//! let mut c2 = c1.clone();
//!
//! producer.push(1);
//! producer.push(2);
//!
//! // Both consumers see the full sequence.
//! assert_eq!(c1.pop().unwrap(), Some(1));
//! assert_eq!(c2.pop().unwrap(), Some(1));
//! assert_eq!(c1.pop().unwrap(), Some(2));
//! assert_eq!(c2.pop().unwrap(), Some(2));
//! ```

pub(crate) mod ring;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{CapacityError, Overlapped};
use crate::queue::{BoundedQueue, QueueProducer};
use crate::ring::PhantomUnsync;
use crate::trace::{debug, trace};

use ring::Ring;

/// Write end of the broadcast queue.
///
/// Only one producer exists per queue; the type is neither `Clone` nor
/// `Sync`. The write cursor lives in the handle, so the producer never
/// touches shared state except to publish.
pub struct Producer<T: Copy + Send> {
    ring: Arc<Ring<T>>,

    /// Next write sequence. The slot index and lap tag derive from it.
    seq: u64,

    _unsync: PhantomUnsync,
}

impl<T: Copy + Send> std::fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

/// Read end of the broadcast queue.
///
/// Each consumer owns an independent read cursor. Cloning a consumer yields
/// a new independent consumer starting at the clone source's position;
/// [`Consumer::respawn`] moves a consumer to the producer's current
/// position.
///
/// # Thread Safety
///
/// `Consumer` is [`Send`] but **not** [`Sync`]: move one clone to each
/// reading thread.
pub struct Consumer<T: Copy + Send> {
    ring: Arc<Ring<T>>,

    /// Next read sequence. The expected lap tag derives from it.
    seq: u64,

    _unsync: PhantomUnsync,
}

impl<T: Copy + Send> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").finish_non_exhaustive()
    }
}

/// Creates a new broadcast SPMC channel with the given capacity.
///
/// Returns a `(Producer, Consumer)` pair. The consumer starts at the head
/// of the sequence; clone it for additional independent readers.
///
/// # Errors
///
/// Returns [`CapacityError`] unless `capacity` is a power of two and at
/// least 2.
pub fn channel<T: Copy + Send>(
    capacity: usize,
) -> Result<(Producer<T>, Consumer<T>), CapacityError> {
    let ring = Arc::new(Ring::with_capacity(capacity)?);
    debug!(capacity, "spmc broadcast channel created");

    let producer = Producer {
        ring: Arc::clone(&ring),
        seq: 0,
        _unsync: PhantomData,
    };

    let consumer = Consumer {
        ring,
        seq: 0,
        _unsync: PhantomData,
    };

    Ok((producer, consumer))
}

impl<T: Copy + Send> Producer<T> {
    /// Publishes an item (wait-free, never fails).
    ///
    /// When the ring is full this overwrites the oldest slot; slow consumers
    /// discover the loss through [`Overlapped`] on their next pop. The
    /// producer never inspects consumer state.
    #[inline]
    pub fn push(&mut self, item: T) {
        // SAFETY: There is exactly one Producer per ring (not Clone, not
        // Sync), and `seq` counts up from 0 by construction.
        unsafe { self.ring.publish(self.seq, item) };
        self.seq += 1;
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of slots holding live values; saturates at `capacity` once
    /// the ring wraps, since broadcast slots are never vacated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether nothing has been published yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether every slot holds a live value (the producer is overwriting).
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

impl<T: Copy + Send> Consumer<T> {
    /// Attempts to pop the next value in the broadcast sequence (wait-free).
    ///
    /// Returns `Ok(None)` when this consumer has caught up with the
    /// producer. The value is copied out; other consumers still observe it.
    ///
    /// # Errors
    ///
    /// Returns [`Overlapped`] when the producer has lapped this consumer:
    /// the value at the consumer's position has been overwritten and the
    /// interval up to the producer's cursor is lost. Call
    /// [`respawn`](Self::respawn) to resume from the producer's current
    /// position.
    #[inline]
    pub fn pop(&mut self) -> Result<Option<T>, Overlapped> {
        match self.ring.read(self.seq) {
            Ok(Some(value)) => {
                self.seq += 1;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(overlap) => {
                trace!(
                    seq = overlap.seq,
                    expected_lap = overlap.expected_lap,
                    observed_lap = overlap.observed_lap,
                    "spmc consumer lapped"
                );
                Err(overlap)
            }
        }
    }

    /// Resynchronizes this consumer to the producer's current position.
    ///
    /// Every value published before the call is abandoned; the next `pop`
    /// observes only values published after it. This is the recovery path
    /// for [`Overlapped`].
    pub fn respawn(&mut self) {
        let published = self.ring.published();
        debug!(from = self.seq, to = published, "spmc consumer respawn");
        self.seq = published;
    }

    /// Whether this consumer has caught up with the producer.
    #[inline]
    #[must_use]
    pub fn is_caught_up(&self) -> bool {
        self.seq == self.ring.published()
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of slots holding live values; see [`Producer::len`].
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether nothing has been published yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether every slot holds a live value.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

impl<T: Copy + Send> Clone for Consumer<T> {
    /// The clone is a new independent consumer positioned where `self`
    /// currently is.
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
            seq: self.seq,
            _unsync: PhantomData,
        }
    }
}

impl<T: Copy + Send> BoundedQueue for Producer<T> {
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

impl<T: Copy + Send> BoundedQueue for Consumer<T> {
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

impl<T: Copy + Send> QueueProducer<T> for Producer<T> {
    /// Broadcast push cannot fail; the impl always returns `Ok`.
    #[inline]
    fn try_push(&mut self, value: T) -> Result<(), T> {
        self.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_broadcast() {
        let (mut producer, mut consumer) = channel::<u64>(8).unwrap();

        producer.push(1);
        producer.push(2);
        producer.push(3);

        assert_eq!(consumer.pop().unwrap(), Some(1));
        assert_eq!(consumer.pop().unwrap(), Some(2));
        assert_eq!(consumer.pop().unwrap(), Some(3));
        assert_eq!(consumer.pop().unwrap(), None);
        assert!(consumer.is_caught_up());
    }

    #[test]
    fn test_rejects_bad_capacity() {
        assert_eq!(
            channel::<u64>(12).unwrap_err(),
            CapacityError { requested: 12 }
        );
        assert!(channel::<u64>(1).is_err());
    }

    #[test]
    fn test_cloned_consumers_are_independent() {
        let (mut producer, mut c1) = channel::<u64>(16).unwrap();
        let mut c2 = c1.clone();

        for i in 0..5 {
            producer.push(i);
        }

        // c1 races ahead; c2 is untouched.
        for i in 0..5 {
            assert_eq!(c1.pop().unwrap(), Some(i));
        }
        assert_eq!(c1.pop().unwrap(), None);

        for i in 0..5 {
            assert_eq!(c2.pop().unwrap(), Some(i));
        }
    }

    #[test]
    fn test_clone_inherits_position() {
        let (mut producer, mut c1) = channel::<u64>(16).unwrap();

        for i in 0..4 {
            producer.push(i);
        }
        assert_eq!(c1.pop().unwrap(), Some(0));
        assert_eq!(c1.pop().unwrap(), Some(1));

        let mut c2 = c1.clone();
        assert_eq!(c2.pop().unwrap(), Some(2));
        assert_eq!(c1.pop().unwrap(), Some(2));
    }

    #[test]
    fn test_producer_never_fails() {
        let (mut producer, _consumer) = channel::<u64>(4).unwrap();

        // Far more pushes than capacity: every one succeeds.
        for i in 0..40 {
            producer.push(i);
        }
        assert!(producer.is_full());
        assert_eq!(producer.len(), 4);
    }

    #[test]
    fn test_overlapped_then_respawn() {
        let (mut producer, mut consumer) = channel::<u64>(4).unwrap();

        // Lap the idle consumer.
        for i in 0..9 {
            producer.push(i);
        }

        let err = consumer.pop().unwrap_err();
        assert_eq!(err.seq, 0);
        assert_eq!(err.expected_lap, 0);

        // A lapped consumer stays lapped until it resynchronizes.
        assert!(consumer.pop().is_err());

        consumer.respawn();
        assert_eq!(consumer.pop().unwrap(), None);

        producer.push(100);
        assert_eq!(consumer.pop().unwrap(), Some(100));
    }

    #[test]
    fn test_no_overlap_within_capacity_window() {
        let (mut producer, mut consumer) = channel::<u64>(8).unwrap();

        // Stay exactly one capacity behind: never overlapped.
        for i in 0..8 {
            producer.push(i);
        }
        for i in 0..8 {
            assert_eq!(consumer.pop().unwrap(), Some(i));
        }
    }
}
