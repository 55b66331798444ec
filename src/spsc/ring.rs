//! Core lock-free SPSC ring buffer algorithm.
//!
//! A bounded wait-free ring with two masked cursors. The producer owns
//! `write`, the consumer owns `read`; each publishes its own cursor with
//! release stores and reads the peer's with acquire loads, which is the
//! entire synchronization protocol. One slot is left unused so that
//! `write == read` means empty while `write + 1 == read` means full, keeping
//! the two states disjoint without extra bookkeeping.
//!
//! # Safety
//!
//! The types in this module have unsafe APIs because they require the caller
//! to uphold the SPSC invariant: exactly one producer and one consumer, with
//! no concurrent access to either role.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::CapacityError;
use crate::ring::{CachePadded, validate_capacity};

/// A single slot in the ring buffer.
struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Core SPSC ring buffer state.
pub(crate) struct Ring<T> {
    /// Index mask, `capacity - 1`.
    mask: usize,

    /// Ring buffer slots. Exactly one slot is always unoccupied.
    slots: Box<[Slot<T>]>,

    /// Producer cursor (next slot to write), already masked into `[0, capacity)`.
    /// Owned by the producer, read by the consumer.
    write: CachePadded<AtomicUsize>,

    /// Consumer cursor (next slot to read), already masked into `[0, capacity)`.
    /// Owned by the consumer, read by the producer.
    read: CachePadded<AtomicUsize>,
}

impl<T> Ring<T> {
    /// Allocates a ring with `capacity` slots, of which `capacity - 1` are usable.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, CapacityError> {
        let mask = validate_capacity(capacity)?;
        let slots = (0..capacity)
            .map(|_| Slot {
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Ok(Self {
            mask,
            slots,
            write: CachePadded::new(AtomicUsize::new(0)),
            read: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of occupied slots. Racy snapshot; at most `capacity - 1`.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Relaxed);
        write.wrapping_sub(read) & self.mask
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Relaxed);
        write == read
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Relaxed);
        (write + 1) & self.mask == read
    }

    /// Attempts to push an item onto the queue.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the queue is full.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls this method (single producer).
    #[inline]
    pub(crate) unsafe fn push(&self, item: T) -> Result<(), T> {
        // Load own cursor (producer-local, relaxed is fine), then the peer's
        // cursor with acquire to observe the slots it has released.
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);

        let next = (write + 1) & self.mask;
        if next == read {
            return Err(item); // Queue is full
        }

        // SAFETY: The producer owns the slot at `write` because:
        // - `write` hasn't been published yet (store happens after this write)
        // - The check above ensures the consumer is not reading this slot
        // - `write` is in [0, capacity) since it is only ever stored masked
        unsafe {
            (*self.slots[write].value.get()).write(item);
        }

        // Publish the new write cursor (release to sync with the consumer).
        self.write.store(next, Ordering::Release);

        Ok(())
    }

    /// Attempts to pop an item from the queue.
    ///
    /// Returns `None` if the queue is empty.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls this method (single consumer).
    #[inline]
    pub(crate) unsafe fn pop(&self) -> Option<T> {
        // Load own cursor (consumer-local, relaxed is fine), then the peer's
        // cursor with acquire to observe the payloads it has published.
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);

        if read == write {
            return None; // Queue is empty
        }

        // SAFETY: The consumer owns the slot at `read` because:
        // - The check above ensures the slot was published by the producer
        // - `read` hasn't been published yet (store happens after this read)
        // - The producer won't overwrite this slot until the new `read` lands
        // - The slot was initialized by the producer, so assume_init is valid
        let item = unsafe { (*self.slots[read].value.get()).assume_init_read() };

        // Publish the new read cursor (release to hand the slot back).
        self.read.store((read + 1) & self.mask, Ordering::Release);

        Some(item)
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        // Exclusive access: drop any items still sitting between the cursors.
        let write = self.write.load(Ordering::Relaxed);
        let mut read = self.read.load(Ordering::Relaxed);

        while read != write {
            // SAFETY: Slots in [read, write) were initialized by the producer
            // and not yet consumed; we have `&mut self`, so no handle is live.
            unsafe {
                (*self.slots[read].value.get()).assume_init_drop();
            }
            read = (read + 1) & self.mask;
        }
    }
}

// SAFETY: Ring is Send because cursors are atomics and slot contents are
// only ever transferred between threads, never shared.
unsafe impl<T: Send> Send for Ring<T> {}

// SAFETY: Ring is Sync because concurrent access is mediated by atomics:
// each slot is either being written (by the producer) or read (by the
// consumer), never both, with the Release/Acquire cursor pair providing the
// happens-before edge between the payload store and its load.
unsafe impl<T: Send> Sync for Ring<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_capacity() {
        assert!(Ring::<u64>::with_capacity(0).is_err());
        assert!(Ring::<u64>::with_capacity(1).is_err());
        assert!(Ring::<u64>::with_capacity(3).is_err());
        assert!(Ring::<u64>::with_capacity(4).is_ok());
    }

    #[test]
    fn test_one_slot_reserved() {
        let ring: Ring<u64> = Ring::with_capacity(4).unwrap();

        unsafe {
            assert!(ring.push(1).is_ok());
            assert!(ring.push(2).is_ok());
            assert!(ring.push(3).is_ok());
            // Capacity 4 holds at most 3 items.
            assert_eq!(ring.push(4), Err(4));
        }
        assert!(ring.is_full());
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_fifo_order_with_wrapping() {
        let ring: Ring<u64> = Ring::with_capacity(4).unwrap();

        for round in 0..5 {
            for i in 0..3 {
                unsafe { ring.push(round * 10 + i).unwrap() };
            }
            for i in 0..3 {
                assert_eq!(unsafe { ring.pop() }, Some(round * 10 + i));
            }
            assert_eq!(unsafe { ring.pop() }, None);
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn test_drops_unconsumed_items() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicUsize;

        #[derive(Debug)]
        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let ring: Ring<Counted> = Ring::with_capacity(8).unwrap();
            for _ in 0..5 {
                unsafe { ring.push(Counted(Arc::clone(&drops))).unwrap() };
            }
            drop(unsafe { ring.pop() }.unwrap());
            assert_eq!(drops.load(Ordering::Relaxed), 1);
        }
        // The four unconsumed items were dropped with the ring.
        assert_eq!(drops.load(Ordering::Relaxed), 5);
    }
}
